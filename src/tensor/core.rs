//! Core Tensor type

use super::{Shape, Storage};
use crate::dtype::{Element, TypeMeta};
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use std::fmt;

/// A shaped, typed buffer bound to one memory domain
///
/// `Tensor` is the passive data carrier of the copy dispatch layer. It
/// consists of:
/// - **Shape**: dimensions, with element count as their product
/// - **TypeMeta**: the descriptor governing how its elements are copied
/// - **Storage**: a raw device buffer, allocated lazily on first write
///
/// The buffer is allocated by the runtime named in the type parameter and is
/// deallocated by the same runtime; whenever the buffer is non-null its
/// capacity is at least `numel() * meta().size()` bytes. A tensor with
/// element count 0 keeps a null buffer.
///
/// # Example
///
/// ```ignore
/// use movr::prelude::*;
///
/// let device = CpuDevice::new();
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);
/// assert_eq!(a.numel(), 4);
/// ```
pub struct Tensor<R: Runtime> {
    shape: Shape,
    meta: TypeMeta,
    storage: Option<Storage<R>>,
    device: R::Device,
}

impl<R: Runtime> Tensor<R> {
    /// Create an empty tensor bound to a device
    ///
    /// The tensor has element count 0, no buffer, and an unknown meta; it is
    /// materialized by `resize` followed by `raw_mutable_data`.
    pub fn new(device: &R::Device) -> Self {
        Self {
            shape: Shape::from([0usize]),
            meta: TypeMeta::unknown(),
            storage: None,
            device: device.clone(),
        }
    }

    /// Create a tensor from a slice of data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of the `shape`
    /// dimensions. For a fallible alternative, use [`Self::try_from_slice`].
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], device: &R::Device) -> Self {
        Self::try_from_slice(data, shape, device).expect("Tensor::from_slice failed")
    }

    /// Create a tensor from a slice of data (fallible version)
    ///
    /// Returns an error if `data.len()` does not equal the product of the
    /// `shape` dimensions, or if memory allocation fails.
    pub fn try_from_slice<T: Element>(
        data: &[T],
        shape: &[usize],
        device: &R::Device,
    ) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }

        let meta = TypeMeta::of::<T>();
        let mut tensor = Self {
            shape: Shape::from(shape),
            meta: TypeMeta::unknown(),
            storage: None,
            device: device.clone(),
        };

        let ptr = tensor.raw_mutable_data(&meta)?;
        if ptr != 0 {
            R::copy_to_device(bytemuck::cast_slice(data), ptr, device)?;
        }
        Ok(tensor)
    }

    // ===== Accessors =====

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.shape.as_slice()
    }

    /// Get the element count: the product of all dimensions
    #[inline]
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Get the type descriptor
    #[inline]
    pub fn meta(&self) -> TypeMeta {
        self.meta
    }

    /// Get the device this tensor is bound to
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Get the raw buffer pointer, 0 when no buffer is allocated
    #[inline]
    pub fn raw_data(&self) -> u64 {
        self.storage.as_ref().map_or(0, |s| s.ptr())
    }

    // ===== Sizing =====

    /// Set the shape, keeping the buffer only if its capacity still matches
    ///
    /// Allocation for a changed capacity is deferred to the next
    /// [`raw_mutable_data`](Self::raw_mutable_data) call.
    pub fn resize(&mut self, dims: &[usize]) {
        self.shape = Shape::from(dims);
        let needed = self.numel() * self.meta.size();
        if let Some(storage) = &self.storage {
            if storage.size_in_bytes() != needed {
                self.storage = None;
            }
        }
    }

    /// Set the shape to match another tensor's, which may live in any domain
    pub fn resize_like<S: Runtime>(&mut self, other: &Tensor<S>) {
        self.resize(other.shape());
    }

    /// Get a mutable buffer sized for the current shape and the given meta
    ///
    /// Reuses the existing buffer when the meta is unchanged and the capacity
    /// suffices; otherwise allocates through the tensor's device. An element
    /// count of 0 keeps a null buffer and returns 0.
    pub fn raw_mutable_data(&mut self, meta: &TypeMeta) -> Result<u64> {
        let needed = self.numel() * meta.size();
        let reusable = self.meta == *meta
            && self
                .storage
                .as_ref()
                .is_some_and(|s| s.size_in_bytes() >= needed);

        if !reusable {
            self.meta = *meta;
            self.storage = if needed == 0 {
                None
            } else {
                Some(Storage::new(needed, &self.device)?)
            };
        }
        Ok(self.raw_data())
    }

    // ===== Host read-back =====

    /// Copy the tensor's contents back to a host `Vec`
    ///
    /// # Panics
    ///
    /// Panics on dtype mismatch or transfer failure. For a fallible
    /// alternative, use [`Self::try_to_vec`].
    pub fn to_vec<T: Element>(&self) -> Vec<T> {
        self.try_to_vec().expect("Tensor::to_vec failed")
    }

    /// Copy the tensor's contents back to a host `Vec` (fallible version)
    pub fn try_to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if let Some(dtype) = self.meta.dtype() {
            if dtype != T::DTYPE {
                return Err(Error::DTypeMismatch {
                    lhs: dtype,
                    rhs: T::DTYPE,
                });
            }
        } else if self.meta.size() != std::mem::size_of::<T>() {
            return Err(Error::invalid_argument(
                "T",
                format!(
                    "element size {} does not match meta size {}",
                    std::mem::size_of::<T>(),
                    self.meta.size()
                ),
            ));
        }

        if self.numel() == 0 {
            return Ok(Vec::new());
        }

        // Allocate with correct alignment for T, then cast to bytes for the
        // copy. This avoids alignment violations that would occur if we
        // allocated a Vec<u8> and cast to stricter-aligned types like f64.
        let mut result = vec![T::zeroed(); self.numel()];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        R::copy_from_device(self.raw_data(), bytes, &self.device)?;
        Ok(result)
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("meta", &self.meta)
            .field("device", &self.device.name())
            .field("ptr", &format!("0x{:x}", self.raw_data()))
            .finish()
    }
}
