use std::{
    alloc::{self, Layout},
    cell::Cell,
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    process,
    ptr::{self, NonNull},
};

use log::trace;

use crate::AllocError;

/// The control block shared by every [`Rc`][crate::Rc] and [`Weak`][crate::Weak] pointing at the
/// same allocation.
///
/// Every storage kind starts with a `Header` (all of them are `repr(C)`), so a
/// `NonNull<Header>` can be cast back to the concrete block inside the two function pointers.
#[repr(C)]
pub(crate) struct Header {
    strong: Cell<usize>,
    weak: Cell<usize>,
    drop_value: unsafe fn(NonNull<Header>),
    dealloc: unsafe fn(NonNull<Header>),
}

impl Header {
    fn new(drop_value: unsafe fn(NonNull<Header>), dealloc: unsafe fn(NonNull<Header>)) -> Self {
        Header {
            strong: Cell::new(1),
            weak: Cell::new(0),
            drop_value,
            dealloc,
        }
    }

    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    pub(crate) fn inc_strong(&self) {
        increment(&self.strong);
    }

    pub(crate) fn inc_weak(&self) {
        increment(&self.weak);
    }

    /// Increments the strong count unless the value is already gone.
    pub(crate) fn try_inc_strong(&self) -> bool {
        if self.strong.get() == 0 {
            return false;
        }

        self.inc_strong();
        true
    }
}

fn increment(count: &Cell<usize>) {
    let n = count.get();
    if n == usize::MAX {
        // the counts are the only thing preventing a use after free.
        process::abort();
    }
    count.set(n + 1);
}

/// Releases one strong share of `block`. Drops the value when this was the last strong share and
/// frees the block when no weak shares remain either.
///
/// # Safety
///
/// `block` must be live and the caller must own one of its strong shares, which is consumed.
pub(crate) unsafe fn release_strong(block: NonNull<Header>) {
    let drop_value = {
        let header = block.as_ref();
        let n = header.strong.get();
        debug_assert!(n > 0, "released a strong share of a dead value");

        header.strong.set(n - 1);
        if n != 1 {
            return;
        }

        // the value may own weak pointers to itself. hold a weak share while it drops so that
        // releasing those cannot free the block before we are done with it.
        header.inc_weak();
        header.drop_value
    };

    drop_value(block);
    trace!("dropped value of block {:p}", block);

    release_weak(block);
}

/// Releases one weak share of `block`, freeing it when both counts are zero.
///
/// # Safety
///
/// `block` must be live and the caller must own one of its weak shares, which is consumed.
pub(crate) unsafe fn release_weak(block: NonNull<Header>) {
    let dealloc = {
        let header = block.as_ref();
        let n = header.weak.get();
        debug_assert!(n > 0, "released a weak share of a freed block");

        header.weak.set(n - 1);
        if n != 1 || header.strong.get() != 0 {
            return;
        }
        header.dealloc
    };

    dealloc(block);
    trace!("freed block {:p}", block);
}

#[cfg(test)]
thread_local! {
    /// Control blocks freed on this thread.
    pub(crate) static FREED: Cell<usize> = Cell::new(0);
}

#[cfg(test)]
fn count_free() {
    FREED.with(|n| n.set(n.get() + 1));
}

/// A counted share of a block, together with the address of the value it manages.
pub(crate) struct Share<T: ?Sized> {
    pub(crate) block: NonNull<Header>,
    pub(crate) value: NonNull<T>,
}

impl<T: ?Sized> Share<T> {
    pub(crate) fn header(&self) -> &Header {
        // a share only exists while it is counted, so the header is live.
        unsafe { self.block.as_ref() }
    }
}

impl<T: ?Sized> Clone for Share<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Share<T> {}

/// Combined allocation: header and value in one `Box`.
#[repr(C)]
pub(crate) struct Inline<T> {
    header: Header,
    value: ManuallyDrop<T>,
}

impl<T> Inline<T> {
    pub(crate) fn allocate(value: T) -> Share<T> {
        let block = Box::new(Inline {
            header: Header::new(Self::drop_value, Self::dealloc),
            value: ManuallyDrop::new(value),
        });
        let block = NonNull::from(Box::leak(block));

        unsafe {
            let value = ptr::addr_of_mut!((*block.as_ptr()).value).cast::<T>();
            Share {
                block: block.cast(),
                value: NonNull::new_unchecked(value),
            }
        }
    }

    unsafe fn drop_value(block: NonNull<Header>) {
        let block = block.cast::<Self>().as_ptr();
        ptr::drop_in_place(ptr::addr_of_mut!((*block).value).cast::<T>());
    }

    unsafe fn dealloc(block: NonNull<Header>) {
        // `value` is `ManuallyDrop`, so this only returns the memory.
        drop(Box::from_raw(block.cast::<Self>().as_ptr()));
        #[cfg(test)]
        count_free();
    }
}

/// Separate allocation: the block only points at the value and releases it through `deleter`.
#[repr(C)]
pub(crate) struct Detached<T: ?Sized, D> {
    header: Header,
    value: NonNull<T>,
    deleter: ManuallyDrop<D>,
}

impl<T, D> Detached<T, D>
where
    T: ?Sized,
    D: FnOnce(*mut T),
{
    pub(crate) fn allocate(value: NonNull<T>, deleter: D) -> Share<T> {
        let block = Box::new(Detached {
            header: Header::new(Self::drop_value, Self::dealloc),
            value,
            deleter: ManuallyDrop::new(deleter),
        });

        Share {
            block: NonNull::from(Box::leak(block)).cast(),
            value,
        }
    }

    unsafe fn drop_value(block: NonNull<Header>) {
        let block = block.cast::<Self>().as_ptr();
        let value = (*block).value;
        let deleter = ManuallyDrop::take(&mut (*block).deleter);
        deleter(value.as_ptr());
    }

    unsafe fn dealloc(block: NonNull<Header>) {
        // the deleter has already been taken by `drop_value`.
        drop(Box::from_raw(block.cast::<Self>().as_ptr()));
        #[cfg(test)]
        count_free();
    }
}

/// Combined allocation of `len` elements. The elements start `offset` bytes after the header.
#[repr(C)]
pub(crate) struct Array<T> {
    header: Header,
    layout: Layout,
    offset: usize,
    len: usize,
    _elements: PhantomData<T>,
}

impl<T> Array<T> {
    fn layout(len: usize) -> Option<(Layout, usize)> {
        let (layout, offset) = Layout::new::<Self>()
            .extend(Layout::array::<T>(len).ok()?)
            .ok()?;
        Some((layout.pad_to_align(), offset))
    }

    pub(crate) fn allocate(len: usize, value: T) -> Result<Share<[T]>, AllocError>
    where
        T: Clone,
    {
        let (layout, offset) = Self::layout(len).ok_or(AllocError::CapacityOverflow { len })?;

        // the layout always holds a header, so it is never zero sized.
        let Some(block) = NonNull::new(unsafe { alloc::alloc(layout) }) else {
            return Err(AllocError::OutOfMemory { layout });
        };

        unsafe {
            block.cast::<Self>().as_ptr().write(Array {
                header: Header::new(Self::drop_value, Self::dealloc),
                layout,
                offset,
                len,
                _elements: PhantomData,
            });

            let elements = block.as_ptr().add(offset).cast::<T>();
            let mut filling = Filling {
                block,
                layout,
                elements,
                written: 0,
            };
            while filling.written < len {
                elements.add(filling.written).write(value.clone());
                filling.written += 1;
            }
            mem::forget(filling);

            trace!("allocated block {:p} for {} elements", block, len);

            Ok(Share {
                block: block.cast(),
                value: NonNull::new_unchecked(ptr::slice_from_raw_parts_mut(elements, len)),
            })
        }
    }

    unsafe fn drop_value(block: NonNull<Header>) {
        let array = block.cast::<Self>().as_ptr();
        let (offset, len) = ((*array).offset, (*array).len);

        let elements = block.as_ptr().cast::<u8>().add(offset).cast::<T>();
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(elements, len));
    }

    unsafe fn dealloc(block: NonNull<Header>) {
        let layout = (*block.cast::<Self>().as_ptr()).layout;
        alloc::dealloc(block.as_ptr().cast(), layout);
        #[cfg(test)]
        count_free();
    }
}

/// Cleans up a half built array when `T::clone` panics.
struct Filling<T> {
    block: NonNull<u8>,
    layout: Layout,
    elements: *mut T,
    written: usize,
}

impl<T> Drop for Filling<T> {
    fn drop(&mut self) {
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.elements, self.written));
            alloc::dealloc(self.block.as_ptr(), self.layout);
        }
    }
}
