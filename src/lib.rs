//! A reference counted [`Rc`] and [`Weak`] pointer.
//!
//! The provided types behave much like [`std::rc::Rc`] and [`std::rc::Weak`]: counting is not
//! atomic and neither pointer can be sent to another thread. The differences are in how an
//! allocation comes to be managed:
//!
//! - [`Rc::new`] (or [`make_rc`]) puts the control block and the value in one allocation.
//! - [`Rc::from_raw_with`] adopts a value that already lives somewhere else and releases it with
//!   a custom deleter, [`Rc::from_box`] does the same for a [`Box`].
//! - [`Rc::<[T]>::make`][Rc::make] builds `len` clones of a value behind one control block.
//!
//! An `Rc` can also be empty, like a null pointer. Empty pointers report counts of `0`, return
//! `None` from [`Rc::get`] and panic when dereferenced.
//!
//! [`Rc::is_unique`] only holds when there is exactly one `Rc` and no [`Weak`] at all. An
//! outstanding `Weak` counts against uniqueness because it could be upgraded at any moment.
//!
//! ```
//! # use duorc::{make_rc, Rc};
//! let mut a = make_rc(42);
//! let b = a.clone();
//! assert!(a.strong_count() == 2 && b.strong_count() == 2);
//!
//! let c = a.take();
//! assert!(a.get().is_none());
//! assert!(c.strong_count() == 2);
//!
//! let w = c.downgrade();
//! drop((b, c));
//! assert!(w.upgrade().is_none());
//! ```

mod array;
mod block;
mod error;
mod rc;
mod weak;

pub use crate::error::AllocError;
pub use crate::rc::{make_rc, Rc};
pub use crate::weak::Weak;
