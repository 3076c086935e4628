//! CUDA device implementation

use crate::error::Result;
use crate::runtime::{pointer_registry, Device};

/// CUDA device identified by its physical index
#[derive(Clone, Debug)]
pub struct CudaDevice {
    /// Index of the GPU device (0, 1, 2, ...)
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Create a new CUDA device
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Resolve the device that owns an allocated pointer
    ///
    /// This is the implicit construction path: it lets an operation target
    /// whichever device already holds the data behind `ptr`, without the
    /// caller naming a device index. Fails with `UnknownDevicePointer` if
    /// `ptr` was never registered by a device allocation.
    pub fn for_pointer(ptr: u64) -> Result<Self> {
        pointer_registry().device_for_pointer(ptr).map(Self::new)
    }

    /// Get the device index
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}

impl Default for CudaDevice {
    fn default() -> Self {
        Self::new(0)
    }
}
