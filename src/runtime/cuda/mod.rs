//! CUDA (accelerator) backend
//!
//! One execution context per physical device index; all work a client issues
//! goes onto its own stream and runs asynchronously. Device allocations are
//! recorded in the process-wide pointer registry so any pointer can be
//! resolved back to the device that owns it.

mod cache;
mod client;
mod device;
mod guard;
mod runtime;

pub use client::CudaClient;
pub use device::CudaDevice;
pub use runtime::{cuda_device_count, is_cuda_available, CudaRuntime};
