//! Scoped switch of the thread's current CUDA context

use crate::error::{Error, Result};
use cudarc::driver::safe::CudaContext;
use cudarc::driver::sys;

/// Binds a context to the calling thread and restores the previous one on
/// drop, success or failure
///
/// Cross-device copies must switch the thread's current device; this guard
/// brackets that switch so the ambient current-device setting observed by the
/// rest of the process is never left dangling.
pub(super) struct CurrentContextGuard {
    previous: sys::CUcontext,
}

impl CurrentContextGuard {
    /// Capture the current context and bind `context` in its place
    pub(super) fn activate(context: &CudaContext) -> Result<Self> {
        let mut previous: sys::CUcontext = std::ptr::null_mut();
        unsafe {
            let result = sys::cuCtxGetCurrent(&mut previous);
            if result != sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Backend(format!(
                    "[movr::cuda] cuCtxGetCurrent failed: {:?}",
                    result
                )));
            }
        }
        context.bind_to_thread()?;
        Ok(Self { previous })
    }
}

impl Drop for CurrentContextGuard {
    fn drop(&mut self) {
        // A null previous context is restored as-is: the thread had none.
        unsafe {
            let _ = sys::cuCtxSetCurrent(self.previous);
        }
    }
}
