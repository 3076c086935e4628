//! Storage: device memory management with Arc-based sharing

use crate::error::Result;
use crate::runtime::Runtime;
use std::sync::Arc;

/// Storage for tensor data on a device
///
/// Storage wraps a raw device buffer with reference counting. The buffer is
/// allocated by the runtime of the owning device and deallocated through the
/// same runtime when the last reference is dropped; device allocations are
/// tracked in the process-wide pointer registry by the runtime itself.
pub struct Storage<R: Runtime> {
    inner: Arc<StorageInner<R>>,
}

struct StorageInner<R: Runtime> {
    /// Raw device pointer (GPU address or CPU ptr cast to u64)
    ptr: u64,
    /// Capacity in bytes
    size_bytes: usize,
    /// Device where memory is allocated
    device: R::Device,
}

impl<R: Runtime> Storage<R> {
    /// Allocate `size_bytes` of uninitialized storage on the given device
    pub fn new(size_bytes: usize, device: &R::Device) -> Result<Self> {
        let ptr = R::allocate(size_bytes, device)?;

        Ok(Self {
            inner: Arc::new(StorageInner {
                ptr,
                size_bytes,
                device: device.clone(),
            }),
        })
    }

    /// Get the raw device pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get capacity in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.size_bytes
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.inner.device
    }
}

impl<R: Runtime> Clone for Storage<R> {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runtime> Drop for StorageInner<R> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            R::deallocate(self.ptr, self.size_bytes, &self.device);
        }
    }
}

impl<R: Runtime> std::fmt::Debug for Storage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("size_bytes", &self.inner.size_bytes)
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

// Storage tests are in the tensor core module (require a concrete runtime).
