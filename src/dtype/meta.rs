//! TypeMeta: the type descriptor governing copy semantics
//!
//! A `TypeMeta` describes how to move `n` elements of a type between buffers:
//! either a flat byte copy (memcpy-equivalent), or an element-wise routine
//! invoked once per element in index order. Element-wise copies are only
//! well-defined for host-resident data; the copy dispatch layer rejects them
//! across domain boundaries.

use super::{DType, Element};

/// Per-element copy routine for types that cannot be moved byte-wise
///
/// # Safety
///
/// `src` must point to a valid, initialized element of the described type and
/// `dst` to writable storage of at least the element size.
pub type ElementCopyFn = unsafe fn(src: *const u8, dst: *mut u8);

/// Type descriptor for the contents of a tensor buffer
///
/// Immutable once associated with a tensor's contents; rewriting a buffer
/// through [`raw_mutable_data`](crate::tensor::Tensor::raw_mutable_data)
/// swaps in the new descriptor atomically with the buffer itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeMeta {
    size: usize,
    dtype: Option<DType>,
    copy_fn: Option<ElementCopyFn>,
}

impl TypeMeta {
    /// The descriptor of a freshly created tensor before its first write
    ///
    /// Has size 0 and no dtype; any buffer request through it stays null.
    pub const fn unknown() -> Self {
        Self {
            size: 0,
            dtype: None,
            copy_fn: None,
        }
    }

    /// Descriptor for a primitive element type (byte-copyable)
    pub fn of<T: Element>() -> Self {
        Self {
            size: std::mem::size_of::<T>(),
            dtype: Some(T::DTYPE),
            copy_fn: None,
        }
    }

    /// Descriptor for a runtime-selected dtype (byte-copyable)
    pub const fn from_dtype(dtype: DType) -> Self {
        Self {
            size: dtype.size_in_bytes(),
            dtype: Some(dtype),
            copy_fn: None,
        }
    }

    /// Descriptor for an opaque type that requires element-wise copies
    ///
    /// `copy_fn` is invoked exactly once per element, in index order.
    pub const fn opaque(size: usize, copy_fn: ElementCopyFn) -> Self {
        Self {
            size,
            dtype: None,
            copy_fn: Some(copy_fn),
        }
    }

    /// Size of one element in bytes
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The runtime dtype, if this descriptor was built from one
    #[inline]
    pub const fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    /// Whether buffers of this type can be moved with a flat byte copy
    #[inline]
    pub const fn is_byte_copyable(&self) -> bool {
        self.copy_fn.is_none()
    }

    /// Invoke the element copy routine for `count` contiguous elements
    ///
    /// Elements are visited in index order, 0 to `count - 1`.
    ///
    /// # Safety
    ///
    /// `src` and `dst` must be valid for `count * self.size()` bytes, must not
    /// overlap, and the descriptor must carry a copy routine
    /// (`!is_byte_copyable()`).
    pub unsafe fn copy_elements(&self, src: *const u8, dst: *mut u8, count: usize) {
        debug_assert!(!self.is_byte_copyable());
        if let Some(copy_fn) = self.copy_fn {
            for i in 0..count {
                unsafe {
                    copy_fn(src.add(i * self.size), dst.add(i * self.size));
                }
            }
        }
    }
}

impl Default for TypeMeta {
    fn default() -> Self {
        Self::unknown()
    }
}
