use std::alloc;

use crate::block::Array;
use crate::{AllocError, Rc};

impl<T> Rc<[T]>
where
    T: Clone,
{
    /// Allocates `len` clones of `value` together with the control block.
    ///
    /// # Panics
    ///
    /// Panics if the allocation size overflows and aborts through
    /// [`handle_alloc_error`][std::alloc::handle_alloc_error] if the allocation fails. Use
    /// [`Rc::try_make`] to handle both.
    ///
    /// # Examples
    ///
    /// ```
    /// # use duorc::Rc;
    /// let rc = Rc::<[i32]>::make(3, 42);
    /// assert!(rc.get().unwrap()[2] == 42);
    /// assert!(rc.len() == 3);
    /// assert!(rc.strong_count() == 1);
    /// ```
    pub fn make(len: usize, value: T) -> Self {
        match Self::try_make(len, value) {
            Ok(rc) => rc,
            Err(AllocError::OutOfMemory { layout }) => alloc::handle_alloc_error(layout),
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`Rc::make`], but returns an error instead of panicking.
    ///
    /// ```
    /// # use duorc::{AllocError, Rc};
    /// let err = Rc::<[u64]>::try_make(usize::MAX, 0).unwrap_err();
    /// assert!(err == AllocError::CapacityOverflow { len: usize::MAX });
    /// ```
    pub fn try_make(len: usize, value: T) -> Result<Self, AllocError> {
        Array::allocate(len, value).map(Self::from_share)
    }
}

impl<T> Rc<[T]> {
    /// Gets the elements, or an empty slice if the `Rc` is empty.
    pub fn as_slice(&self) -> &[T] {
        self.get().unwrap_or(&[])
    }
}

impl<T> From<Vec<T>> for Rc<[T]> {
    /// Takes over the vector's buffer. The control block is allocated separately, see
    /// [`Rc::make`] for a single allocation.
    fn from(value: Vec<T>) -> Self {
        Self::from_box(value.into_boxed_slice())
    }
}
