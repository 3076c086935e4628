//! # movr
//!
//! **Device-aware tensor copy dispatch for Rust.**
//!
//! movr moves typed, shaped buffers (tensors) between memory domains - host
//! memory and one or more CUDA devices - behind a uniform operator contract,
//! hiding per-domain allocation, pointer-to-device resolution, and stream
//! ordering.
//!
//! ## Architecture
//!
//! - **Execution contexts**: a [`Runtime`](runtime::Runtime) per domain, with
//!   one [`RuntimeClient`](runtime::RuntimeClient) per device instance owning
//!   the stream its work is ordered on
//! - **Pointer registry**: a process-wide map from every live device
//!   allocation to the device index that owns it, so operations can run on
//!   whichever device already holds their data
//! - **Copy operators**: [`CopyOp`](ops::CopyOp) parameterized independently
//!   over dispatch context, destination domain, and source domain, plus
//!   [`CopyOnDeviceLikeOp`](ops::CopyOnDeviceLikeOp) whose destination device
//!   is derived from data at run time
//! - **Registration table**: (operator name, domain) to factory, consulted by
//!   the external scheduler
//!
//! ## Quick Start
//!
//! ```ignore
//! use movr::prelude::*;
//!
//! let device = CpuDevice::new();
//! let mut ws = Workspace::new();
//! ws.feed_tensor::<CpuRuntime, f32>("x", &[1.0, 2.0, 3.0], &[3], &device)?;
//!
//! let def = OperatorDef::new("Copy").add_input("x").add_output("y");
//! assert!(run_operator_once(&def, &mut ws)?);
//!
//! let y = ws.fetch_tensor::<CpuRuntime, f32>("y")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cuda`: NVIDIA CUDA backend for the accelerator domain
//! - `f16`: Half-precision element types (F16, BF16)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dtype;
pub mod error;
pub mod ops;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::{DType, Element, TypeMeta};
    pub use crate::error::{Error, Result};
    pub use crate::ops::{
        run_operator_once, DeviceOption, Operator, OperatorDef, OperatorRegistry, Workspace,
    };
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
    pub use crate::runtime::{Device, DeviceType, Runtime, RuntimeClient};
    pub use crate::tensor::Tensor;

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
