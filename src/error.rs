//! Error types for movr

use crate::dtype::DType;
use crate::runtime::DeviceType;
use thiserror::Error;

/// Result type alias using movr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in movr operations
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// DType mismatch between a tensor and a requested element type
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Left-hand side dtype
        lhs: DType,
        /// Right-hand side dtype
        rhs: DType,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// A pointer was resolved through the device registry but was never
    /// registered by any device allocation
    #[error("Unknown device pointer 0x{ptr:x}: not registered by any device allocation")]
    UnknownDevicePointer {
        /// The unresolvable pointer
        ptr: u64,
    },

    /// An element-copy type was asked to cross a host/device boundary
    #[error("Element-wise copy is not supported across domains: {src} -> {dst}")]
    CrossDomainElementCopy {
        /// Domain owning the source buffer
        src: DeviceType,
        /// Domain owning the destination buffer
        dst: DeviceType,
    },

    /// A transfer was requested from a context that cannot issue it
    #[error("Unsupported transfer {src} -> {dst} dispatched from {dispatch} context")]
    UnsupportedTransfer {
        /// Domain owning the source buffer
        src: DeviceType,
        /// Domain owning the destination buffer
        dst: DeviceType,
        /// Domain of the dispatching context
        dispatch: DeviceType,
    },

    /// No operator is registered for a (name, device) pair
    #[error("No operator '{name}' registered for {device} device")]
    UnregisteredOperator {
        /// Operator type name
        name: String,
        /// Device the lookup was keyed on
        device: DeviceType,
    },

    /// A named blob an operator declared as input does not exist or is empty
    #[error("Blob '{name}' does not exist or holds no value")]
    BlobMissing {
        /// The blob name
        name: String,
    },

    /// A named blob holds a value of a different type than requested
    #[error("Blob '{name}' holds a value of an unexpected type")]
    BlobTypeMismatch {
        /// The blob name
        name: String,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}
