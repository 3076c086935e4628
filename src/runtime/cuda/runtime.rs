//! CUDA runtime implementation

use super::cache::{
    get_or_create_client, is_cuda_context_valid, log_cuda_memory_error, try_get_cached_stream,
};
use super::client::CudaClient;
use super::device::CudaDevice;
use crate::error::{Error, Result};
use crate::runtime::{pointer_registry, DeviceType, Runtime};

/// CUDA runtime adapter
///
/// Implements the generic Runtime trait for the CUDA backend.
/// Uses cudarc for direct GPU control. Every allocation is recorded in the
/// process-wide pointer registry under the owning device index and removed
/// again on deallocation.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;

    const DEVICE_TYPE: DeviceType = DeviceType::Cuda;

    fn name() -> &'static str {
        "cuda"
    }

    /// Allocate GPU memory.
    ///
    /// Returns `Err(OutOfMemory)` if CUDA memory allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let client = get_or_create_client(device);

        unsafe {
            let mut ptr: u64 = 0;
            let result = cudarc::driver::sys::cuMemAllocAsync(
                &mut ptr,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result == cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                pointer_registry().register(ptr, size_bytes, device.index);
                return Ok(ptr);
            }

            // First attempt failed - sync the stream to flush pending frees
            // and retry once.
            let _ = client.stream.synchronize();

            let result = cudarc::driver::sys::cuMemAllocAsync(
                &mut ptr,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result == cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                pointer_registry().register(ptr, size_bytes, device.index);
                return Ok(ptr);
            }

            Err(Error::OutOfMemory { size: size_bytes })
        }
    }

    fn deallocate(ptr: u64, _size_bytes: usize, device: &Self::Device) {
        if ptr == 0 {
            return;
        }

        // The registry entry dies with the allocation, even when the driver
        // free below is skipped because the context is already gone.
        pointer_registry().unregister(ptr);

        unsafe {
            // Check if CUDA context is still valid before attempting free
            if !is_cuda_context_valid() {
                // Context is gone - memory will be reclaimed by the driver
                return;
            }

            // Prefer stream-ordered async free if a client is cached
            let result = if let Some(stream) = try_get_cached_stream(device.index) {
                cudarc::driver::sys::cuMemFreeAsync(ptr, stream)
            } else {
                cudarc::driver::sys::cuMemFree_v2(ptr)
            };

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS
                && result != cudarc::driver::sys::CUresult::CUDA_ERROR_ILLEGAL_ADDRESS
            {
                log_cuda_memory_error("cuMemFree", ptr, result);
            }
        }
    }

    /// Copy data from host to device.
    ///
    /// Synchronizes before returning so the host buffer may be reused.
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Backend(format!(
                    "[movr::cuda] host-to-device copy failed: {} bytes ({:?})",
                    src.len(),
                    result
                )));
            }

            let _ = client.stream.synchronize();
        }
        Ok(())
    }

    /// Copy data from device to host.
    ///
    /// Synchronizes before returning so the host buffer is readable.
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut std::ffi::c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Backend(format!(
                    "[movr::cuda] device-to-host copy failed: {} bytes ({:?})",
                    dst.len(),
                    result
                )));
            }

            let _ = client.stream.synchronize();
        }
        Ok(())
    }

    /// Copy data within one device's memory.
    ///
    /// Asynchronous: ordered by the device's stream, not synchronized here.
    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()> {
        if size_bytes == 0 || src == 0 || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyDtoDAsync_v2(
                dst,
                src,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Backend(format!(
                    "[movr::cuda] device-to-device copy failed: {} bytes ({:?})",
                    size_bytes, result
                )));
            }
        }
        Ok(())
    }

    fn device(id: usize) -> Self::Device {
        CudaDevice::new(id)
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn device_for_pointer(ptr: u64) -> Result<Self::Device> {
        CudaDevice::for_pointer(ptr)
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        get_or_create_client(device)
    }
}

/// Check if CUDA is available on this system
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| {
        let device = CudaDevice::new(0);
        let _client = get_or_create_client(&device);
    })
    .is_ok()
}

/// Number of CUDA devices visible to this process
pub fn cuda_device_count() -> usize {
    cudarc::driver::result::device::get_count()
        .map(|count| count as usize)
        .unwrap_or(0)
}
