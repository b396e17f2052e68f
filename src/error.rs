use std::alloc::Layout;

use thiserror::Error;

/// Returned by [`Rc::try_make`][crate::Rc::try_make] when the array block cannot be allocated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The header plus `len` elements does not fit in `isize::MAX` bytes.
    #[error("an array of {len} elements exceeds the maximum allocation size")]
    CapacityOverflow { len: usize },

    /// The global allocator returned null.
    #[error("failed to allocate {} bytes", .layout.size())]
    OutOfMemory { layout: Layout },
}
