use std::{fmt, marker::PhantomData, mem, ops::Deref, ptr, ptr::NonNull};

use log::debug;

use crate::block::{self, Detached, Inline, Share};
use crate::Weak;

/// A reference counted pointer, similar to [`std::rc::Rc`].
///
/// An `Rc` is either empty or shares a control block with every other `Rc` and [`Weak`] created
/// from it. The value is dropped as soon as the last `Rc` goes away, the control block once the
/// last `Weak` is gone as well.
///
/// `Rc` dereferences to `T`, so its inherent methods ([`get`][Rc::get], [`take`][Rc::take],
/// [`reset`][Rc::reset], [`swap`][Rc::swap], [`is_empty`][Rc::is_empty], ...) shadow methods of
/// the same name on the value. Call those through the value instead: `(*rc).get()` on an
/// `Rc<Cell<i32>>`, `rc.as_slice().get(0)` on an `Rc<[T]>`.
pub struct Rc<T>
where
    T: ?Sized,
{
    share: Option<Share<T>>,
    _owns: PhantomData<T>,
}

impl<T> Drop for Rc<T>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        if let Some(share) = self.share.take() {
            unsafe { block::release_strong(share.block) }
        }
    }
}

impl<T> fmt::Debug for Rc<T>
where
    T: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("(empty)"),
        }
    }
}

/// Allocates `value` together with its control block. Same as [`Rc::new`].
///
/// ```
/// # use duorc::make_rc;
/// let rc = make_rc(String::from("test"));
/// assert!(*rc == "test");
/// assert!(rc.strong_count() == 1);
/// ```
pub fn make_rc<T>(value: T) -> Rc<T> {
    Rc::new(value)
}

impl<T> Rc<T> {
    /// Allocates the control block and `value` in a single allocation.
    ///
    /// Prefer this over [`Rc::from_box`] unless a value has already been allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// # use duorc::Rc;
    /// let rc = Rc::new(42);
    /// assert!(*rc == 42);
    /// assert!(rc.strong_count() == 1);
    /// assert!(rc.weak_count() == 0);
    /// ```
    pub fn new(value: T) -> Self {
        Self::from_share(Inline::allocate(value))
    }

    /// Gets a raw pointer to the value, or null if the `Rc` is empty.
    pub fn as_ptr(&self) -> *const T {
        match self.share {
            Some(share) => share.value.as_ptr() as *const T,
            None => ptr::null(),
        }
    }
}

impl<T> Rc<T>
where
    T: ?Sized,
{
    /// Creates an `Rc` that owns nothing.
    ///
    /// ```
    /// # use duorc::Rc;
    /// let rc = Rc::<i32>::empty();
    /// assert!(rc.get().is_none());
    /// assert!(rc.strong_count() == 0);
    /// ```
    pub const fn empty() -> Self {
        Rc {
            share: None,
            _owns: PhantomData,
        }
    }

    /// Takes ownership of a value allocated with [`Box`]. The value will be released with
    /// `drop(Box::from_raw(ptr))`.
    ///
    /// A null `ptr` gives an empty `Rc`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Box::into_raw`] and must not be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        // the closure borrows nothing, so unlike `from_raw_with` it needs no `'static` bound.
        Self::adopt(ptr, |ptr: *mut T| unsafe { drop(Box::from_raw(ptr)) })
    }

    /// Takes ownership of the value behind `ptr`. Once the last `Rc` is dropped `deleter` is called
    /// exactly once with `ptr`.
    ///
    /// A null `ptr` gives an empty `Rc`, `deleter` is dropped without being called.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads until `deleter` runs and must not be owned by anything else.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::cell::Cell;
    /// # use std::rc::Rc as StdRc;
    /// # use duorc::Rc;
    /// let deleted = StdRc::new(Cell::new(false));
    ///
    /// let flag = StdRc::clone(&deleted);
    /// let rc = unsafe {
    ///     Rc::from_raw_with(Box::into_raw(Box::new(42)), move |ptr| {
    ///         flag.set(true);
    ///         drop(Box::from_raw(ptr));
    ///     })
    /// };
    ///
    /// assert!(*rc == 42);
    /// drop(rc);
    /// assert!(deleted.get());
    /// ```
    pub unsafe fn from_raw_with<D>(ptr: *mut T, deleter: D) -> Self
    where
        D: FnOnce(*mut T) + 'static,
    {
        Self::adopt(ptr, deleter)
    }

    unsafe fn adopt<D>(ptr: *mut T, deleter: D) -> Self
    where
        D: FnOnce(*mut T),
    {
        match NonNull::new(ptr) {
            Some(value) => Self::from_share(Detached::allocate(value, deleter)),
            None => {
                debug!("adopting a null pointer, the deleter will never run");
                Self::empty()
            }
        }
    }

    /// Takes ownership of a boxed value. This costs a second allocation for the control block,
    /// see [`Rc::new`].
    ///
    /// ```
    /// # use duorc::Rc;
    /// let rc: Rc<str> = Rc::from_box(Box::from("hello"));
    /// assert!(&*rc == "hello");
    /// ```
    pub fn from_box(value: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    pub(crate) fn from_share(share: Share<T>) -> Self {
        Rc {
            share: Some(share),
            _owns: PhantomData,
        }
    }

    /// Gets a reference to the value, or `None` if the `Rc` is empty.
    pub fn get(&self) -> Option<&T> {
        self.share.map(|share| unsafe { &*share.value.as_ptr() })
    }

    /// Gets a mutable reference to the value if [`is_unique`][Rc::is_unique] holds.
    ///
    /// ```
    /// # use duorc::Rc;
    /// let mut rc = Rc::new(1);
    /// *rc.get_mut().unwrap() += 1;
    ///
    /// let w = rc.downgrade();
    /// assert!(rc.get_mut().is_none());
    ///
    /// drop(w);
    /// assert!(*rc.get_mut().unwrap() == 2);
    /// ```
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if !self.is_unique() {
            return None;
        }

        self.share.map(|share| unsafe { &mut *share.value.as_ptr() })
    }

    /// Returns `true` if the `Rc` owns nothing.
    ///
    /// On an `Rc<[T]>` this shadows `<[T]>::is_empty`; a zero length array is not an empty `Rc`.
    pub fn is_empty(&self) -> bool {
        self.share.is_none()
    }

    /// Gets the number of strong pointers to this allocation, `0` for an empty `Rc`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::mem::drop;
    /// # use duorc::Rc;
    /// let s1 = Rc::new(5);
    /// assert!(s1.strong_count() == 1);
    ///
    /// let s2 = s1.clone();
    /// assert!(s1.strong_count() == 2);
    ///
    /// drop(s2);
    /// assert!(s1.strong_count() == 1);
    /// ```
    pub fn strong_count(&self) -> usize {
        self.share.map_or(0, |share| share.header().strong())
    }

    /// Gets the number of weak pointers to this allocation, `0` for an empty `Rc`.
    pub fn weak_count(&self) -> usize {
        self.share.map_or(0, |share| share.header().weak())
    }

    /// Returns `true` if this is the only `Rc` to the allocation *and* there are no [`Weak`]
    /// pointers to it.
    ///
    /// This is stricter than checking `strong_count() == 1`: an outstanding `Weak` could be
    /// upgraded at any time, so its presence alone makes the `Rc` not unique.
    ///
    /// ```
    /// # use duorc::Rc;
    /// let rc = Rc::new(42);
    /// assert!(rc.is_unique());
    ///
    /// let w = rc.downgrade();
    /// assert!(!rc.is_unique());
    /// assert!(rc.strong_count() == 1);
    /// ```
    pub fn is_unique(&self) -> bool {
        self.strong_count() == 1 && self.weak_count() == 0
    }

    /// Creates a new weak pointer to the allocation. Downgrading an empty `Rc` gives an empty
    /// `Weak`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use duorc::Rc;
    /// let s = Rc::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(s.strong_count() == 1);
    /// assert!(s.weak_count() == 1);
    /// assert!(*w.upgrade().unwrap() == 5);
    /// ```
    pub fn downgrade(&self) -> Weak<T> {
        match self.share {
            Some(share) => {
                share.header().inc_weak();
                Weak::from_share(share)
            }
            None => Weak::new(),
        }
    }

    /// Exchanges the allocations of two `Rc`s. No count changes.
    ///
    /// ```
    /// # use duorc::Rc;
    /// let mut a = Rc::new(1);
    /// let mut b = Rc::new(2);
    ///
    /// Rc::swap(&mut a, &mut b);
    /// assert!(*a == 2 && *b == 1);
    /// ```
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.share, &mut other.share);
    }

    /// Moves the allocation out of `self`, leaving an empty `Rc` behind.
    ///
    /// ```
    /// # use duorc::Rc;
    /// let mut a = Rc::new(42);
    /// let b = a.clone();
    ///
    /// let c = a.take();
    /// assert!(a.get().is_none());
    /// assert!(a.strong_count() == 0);
    /// assert!(b.strong_count() == 2);
    /// assert!(c.strong_count() == 2);
    /// ```
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Releases the allocation now and leaves `self` empty.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Returns `true` if both `Rc`s share an allocation, or both are empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.share, other.share) {
            (Some(a), Some(b)) => a.block == b.block,
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Rc<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        match self.share {
            Some(share) => {
                share.header().inc_strong();
                Self::from_share(share)
            }
            None => Self::empty(),
        }
    }
}

impl<T> Default for Rc<T>
where
    T: ?Sized,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for Rc<T>
where
    T: ?Sized,
{
    type Target = T;

    /// # Panics
    ///
    /// Panics if the `Rc` is empty.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty Rc"),
        }
    }
}

impl<T> From<Box<T>> for Rc<T>
where
    T: ?Sized,
{
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}
