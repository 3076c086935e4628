//! Runtime backends: execution contexts for memory domains
//!
//! This module defines the `Runtime` trait and provides implementations for
//! the host (CPU) and accelerator (CUDA) domains.
//!
//! # Architecture
//!
//! ```text
//! Runtime (domain identity + allocation primitives)
//! ├── Device (identifies a specific CPU/GPU instance)
//! └── Client (dispatches copies, owns the ordering stream)
//! ```
//!
//! Device allocations are tracked in the process-wide [`PointerRegistry`],
//! which maps every live device pointer to the device index that owns it.

pub mod cpu;
mod registry;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use registry::{pointer_registry, PointerRegistry};

use crate::dtype::TypeMeta;
use crate::error::Result;
use std::fmt;

/// Tag identifying a memory/compute domain kind
///
/// The set is closed: every buffer in the system is owned either by host
/// memory or by one CUDA device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Host memory
    Cpu,
    /// An NVIDIA GPU
    Cuda,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Core trait for compute backends
///
/// `Runtime` abstracts over the memory domains data can live in (host, CUDA).
/// It uses static dispatch via generics for zero-cost abstraction.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific domain instance (e.g., GPU 0, GPU 1)
/// - `Client`: Handles copy dispatch and synchronization
///
/// # Example
///
/// ```ignore
/// let device = CpuRuntime::default_device();
/// let ptr = CpuRuntime::allocate(1024, &device)?;
/// // ... use memory ...
/// CpuRuntime::deallocate(ptr, 1024, &device);
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching operations
    type Client: RuntimeClient<Self>;

    /// The domain kind every device of this runtime belongs to
    const DEVICE_TYPE: DeviceType;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate device memory
    ///
    /// Returns a device pointer (u64) that can be used for operations, 0 for
    /// a zero-sized request. Device-domain runtimes record the allocation in
    /// the process-wide pointer registry.
    /// Returns `Err(OutOfMemory)` if allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate device memory and drop its registry entry
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    ///
    /// Synchronizes before returning so the host buffer may be reused.
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    ///
    /// Synchronizes before returning so the host buffer is readable.
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Copy data within device (device to device)
    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()>;

    /// Get the device with the given index
    ///
    /// For the host domain there is a single device and the index is ignored.
    fn device(id: usize) -> Self::Device;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Resolve the device that owns an allocated pointer
    ///
    /// For the host domain every pointer trivially belongs to the single host
    /// device. Device-domain runtimes consult the pointer registry and fail
    /// with `UnknownDevicePointer` for pointers they never allocated. This is
    /// the mechanism that lets an operation run on whichever device already
    /// holds its data, without the caller naming the device.
    fn device_for_pointer(ptr: u64) -> Result<Self::Device>;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that dispatch copies for one domain instance
///
/// A client is the execution-context handle of the copy layer: it owns the
/// ordering stream its operations are issued on and carries the copy
/// primitive that moves typed buffers between domains.
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations on this client's stream
    fn synchronize(&self) -> Result<()>;

    /// Move `count` elements described by `meta` from `src` to `dst`
    ///
    /// The source buffer lives in `Src`'s domain and the destination in
    /// `Dst`'s; the copy itself is issued through this client's stream.
    /// Byte-copyable metas are moved with a flat copy honoring the domain
    /// pair, including between two distinct device indices. Element-copy
    /// metas invoke the element routine exactly `count` times in index order
    /// and are only supported when both ends are host-resident; any other
    /// combination fails with `CrossDomainElementCopy`.
    ///
    /// A host client only dispatches host-to-host copies: transfers touching
    /// a device must be dispatched from the device domain, since only the
    /// device context can issue the transfer instruction. A `count` of 0
    /// succeeds without touching either buffer.
    ///
    /// Device-domain work is asynchronous: completion is observed by the next
    /// operation enqueued on the same stream, or by [`synchronize`].
    ///
    /// [`synchronize`]: Self::synchronize
    fn copy_items<Src: Runtime, Dst: Runtime>(
        &self,
        meta: &TypeMeta,
        count: usize,
        src: u64,
        src_device: &Src::Device,
        dst: u64,
        dst_device: &Dst::Device,
    ) -> Result<()>;
}
