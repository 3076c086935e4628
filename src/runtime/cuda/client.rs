//! CUDA client implementation
//!
//! CudaClient owns the stream and context for one device.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone` and can be shared across threads. The underlying
//! CUDA context and stream are reference-counted via `Arc`.

use cudarc::driver::safe::{CudaContext, CudaStream};
use cudarc::driver::sys;
use std::sync::Arc;

use super::device::CudaDevice;
use super::guard::CurrentContextGuard;
use super::runtime::CudaRuntime;
use crate::dtype::TypeMeta;
use crate::error::{Error, Result};
use crate::runtime::{Device, DeviceType, Runtime, RuntimeClient};

/// CUDA runtime client
///
/// Owns the CUDA context and stream for one device. All copies this client
/// dispatches launch on `self.stream`; operations launched on different
/// streams carry no ordering guarantee relative to each other.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device this client operates on
    pub(crate) device: CudaDevice,

    /// CUDA context for this device
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all work launches
    pub(crate) stream: Arc<CudaStream>,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Create a new CUDA client for a device.
    ///
    /// This initializes the CUDA context and creates a stream in it.
    ///
    /// # Errors
    ///
    /// Returns an error if context or stream creation fails (e.g., invalid
    /// device index).
    pub fn new(device: CudaDevice) -> Result<Self> {
        let context = CudaContext::new(device.index).map_err(|e| {
            Error::Backend(format!(
                "[movr::cuda] failed to create context for device {}: {:?}",
                device.index, e
            ))
        })?;

        context.bind_to_thread().map_err(|e| {
            Error::Backend(format!(
                "[movr::cuda] failed to bind context to thread: {:?}",
                e
            ))
        })?;

        let stream = context.new_stream().map_err(|e| {
            Error::Backend(format!("[movr::cuda] failed to create stream: {:?}", e))
        })?;

        Ok(Self {
            device,
            context,
            stream,
        })
    }

    /// Get reference to the CUDA stream.
    ///
    /// All work this client issues is ordered on this stream.
    #[inline]
    pub fn stream(&self) -> &CudaStream {
        &self.stream
    }

    /// Get reference to the CUDA context.
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize()?;
        Ok(())
    }

    fn copy_items<Src: Runtime, Dst: Runtime>(
        &self,
        meta: &TypeMeta,
        count: usize,
        src: u64,
        src_device: &Src::Device,
        dst: u64,
        dst_device: &Dst::Device,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        let bytes = count * meta.size();

        if !meta.is_byte_copyable() {
            // Element-wise copies are only well-defined for host-resident
            // data; there is no device-side copy-constructor protocol.
            if Src::DEVICE_TYPE == DeviceType::Cpu && Dst::DEVICE_TYPE == DeviceType::Cpu {
                unsafe {
                    meta.copy_elements(src as *const u8, dst as *mut u8, count);
                }
                return Ok(());
            }
            return Err(Error::CrossDomainElementCopy {
                src: Src::DEVICE_TYPE,
                dst: Dst::DEVICE_TYPE,
            });
        }

        match (Src::DEVICE_TYPE, Dst::DEVICE_TYPE) {
            (DeviceType::Cpu, DeviceType::Cpu) => {
                unsafe {
                    std::ptr::copy(src as *const u8, dst as *mut u8, bytes);
                }
                Ok(())
            }
            (DeviceType::Cpu, DeviceType::Cuda) => unsafe {
                let result = sys::cuMemcpyHtoDAsync_v2(
                    dst,
                    src as *const std::ffi::c_void,
                    bytes,
                    self.stream.cu_stream(),
                );
                if result != sys::CUresult::CUDA_SUCCESS {
                    return Err(Error::Backend(format!(
                        "[movr::cuda] host-to-device copy failed: {} bytes ({:?})",
                        bytes, result
                    )));
                }
                Ok(())
            },
            (DeviceType::Cuda, DeviceType::Cpu) => unsafe {
                let result = sys::cuMemcpyDtoHAsync_v2(
                    dst as *mut std::ffi::c_void,
                    src,
                    bytes,
                    self.stream.cu_stream(),
                );
                if result != sys::CUresult::CUDA_SUCCESS {
                    return Err(Error::Backend(format!(
                        "[movr::cuda] device-to-host copy failed: {} bytes ({:?})",
                        bytes, result
                    )));
                }
                Ok(())
            },
            (DeviceType::Cuda, DeviceType::Cuda) => {
                if src_device.id() == dst_device.id() {
                    return CudaRuntime::copy_within_device(src, dst, bytes, &self.device);
                }

                // Crossing device indices: switch the current context for the
                // duration of the launch, restoring the previous one on exit.
                let _device_switch = CurrentContextGuard::activate(&self.context)?;
                unsafe {
                    // Unified addressing routes the transfer between devices.
                    let result = sys::cuMemcpyAsync(dst, src, bytes, self.stream.cu_stream());
                    if result != sys::CUresult::CUDA_SUCCESS {
                        return Err(Error::Backend(format!(
                            "[movr::cuda] cross-device copy failed: {} bytes, device {} -> {} ({:?})",
                            bytes,
                            src_device.id(),
                            dst_device.id(),
                            result
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}
