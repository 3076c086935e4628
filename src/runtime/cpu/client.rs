//! CPU client implementation

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::dtype::TypeMeta;
use crate::error::{Error, Result};
use crate::runtime::{DeviceType, Runtime, RuntimeClient};

/// CPU client for copy dispatch
///
/// Host operations complete synchronously; there is no stream to order.
/// A host client only dispatches host-to-host copies: transfers touching a
/// device must be issued from the device domain.
#[derive(Clone, Debug)]
pub struct CpuClient {
    device: CpuDevice,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self { device }
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // CPU operations are synchronous, nothing to do
        Ok(())
    }

    fn copy_items<Src: Runtime, Dst: Runtime>(
        &self,
        meta: &TypeMeta,
        count: usize,
        src: u64,
        _src_device: &Src::Device,
        dst: u64,
        _dst_device: &Dst::Device,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        match (Src::DEVICE_TYPE, Dst::DEVICE_TYPE) {
            (DeviceType::Cpu, DeviceType::Cpu) => {
                if meta.is_byte_copyable() {
                    CpuRuntime::copy_within_device(src, dst, count * meta.size(), &self.device)
                } else {
                    unsafe {
                        meta.copy_elements(src as *const u8, dst as *mut u8, count);
                    }
                    Ok(())
                }
            }
            (src_domain, dst_domain) => Err(Error::UnsupportedTransfer {
                src: src_domain,
                dst: dst_domain,
                dispatch: DeviceType::Cpu,
            }),
        }
    }
}
