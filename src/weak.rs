use std::{fmt, mem};

use crate::block::{self, Share};
use crate::Rc;

/// A weak pointer to an allocation, created by [`Rc::downgrade`].
///
/// Weak pointers keep the control block alive but not the value. To access the value you must
/// first [`upgrade`][Weak::upgrade] the weak pointer, which fails once the last [`Rc`] is gone.
pub struct Weak<T>
where
    T: ?Sized,
{
    share: Option<Share<T>>,
}

impl<T> Drop for Weak<T>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        if let Some(share) = self.share.take() {
            unsafe { block::release_weak(share.block) }
        }
    }
}

impl<T> fmt::Debug for Weak<T>
where
    T: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("Weak");
        if let Some(strong) = self.upgrade() {
            f.field(&&*strong);
        }
        f.finish()
    }
}

impl<T> Weak<T>
where
    T: ?Sized,
{
    /// Creates a `Weak` that observes nothing. It never upgrades.
    pub const fn new() -> Self {
        Weak { share: None }
    }

    pub(crate) fn from_share(share: Share<T>) -> Self {
        Weak { share: Some(share) }
    }

    /// Creates a strong pointer to the allocation. Returns `None` if the value has already been
    /// dropped because there are no more strong pointers to it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::mem::drop;
    /// # use duorc::Rc;
    /// let s = Rc::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(*w.upgrade().unwrap() == 5);
    ///
    /// drop(s);
    /// assert!(w.upgrade().is_none());
    /// assert!(w.weak_count() == 1);
    /// ```
    pub fn upgrade(&self) -> Option<Rc<T>> {
        let share = self.share?;
        if !share.header().try_inc_strong() {
            return None;
        }

        Some(Rc::from_share(share))
    }

    /// See [`Rc::strong_count`]. Unlike there this can be `0` for a non-empty `Weak`, once the
    /// value has been dropped.
    pub fn strong_count(&self) -> usize {
        self.share.map_or(0, |share| share.header().strong())
    }

    /// See [`Rc::weak_count`]. Includes `self`.
    pub fn weak_count(&self) -> usize {
        self.share.map_or(0, |share| share.header().weak())
    }

    /// Moves the observed allocation out of `self`, leaving an empty `Weak` behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Returns `true` if both `Weak`s observe the same allocation, or both are empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.share, other.share) {
            (Some(a), Some(b)) => a.block == b.block,
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Weak<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        match self.share {
            Some(share) => {
                share.header().inc_weak();
                Self::from_share(share)
            }
            None => Self::new(),
        }
    }
}

impl<T> Default for Weak<T>
where
    T: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<&Rc<T>> for Weak<T>
where
    T: ?Sized,
{
    fn from(value: &Rc<T>) -> Self {
        value.downgrade()
    }
}
