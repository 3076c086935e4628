//! CPU (host) backend
//!
//! The host domain has a single device; its copies are plain memory moves
//! and complete synchronously.

mod client;
mod device;
mod runtime;

pub use client::CpuClient;
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
