//! Operator registration table
//!
//! Maps an operator type name plus a concrete domain binding to a factory.
//! The process-wide table is populated once at first use and read-only
//! afterwards; looking up an unregistered (name, domain) pair is a
//! configuration error surfaced to the caller, never a silent default.

use super::{CopyOnDeviceLikeOp, CopyOp, Operator, OperatorDef, Workspace};
use crate::error::{Error, Result};
use crate::runtime::cpu::CpuRuntime;
use crate::runtime::DeviceType;
use std::collections::HashMap;
use std::sync::OnceLock;

#[cfg(feature = "cuda")]
use crate::runtime::cuda::CudaRuntime;

/// Builds an executable operator bound to the named blobs of a workspace
pub type OperatorFactory = fn(&OperatorDef, &mut Workspace) -> Result<Box<dyn Operator>>;

/// Table from (operator name, domain) to operator factory
pub struct OperatorRegistry {
    factories: HashMap<(DeviceType, String), OperatorFactory>,
}

impl OperatorRegistry {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Insert a factory for a (name, domain) pair
    ///
    /// Later registrations replace earlier ones for the same pair.
    pub fn register(&mut self, name: &str, device: DeviceType, factory: OperatorFactory) {
        self.factories.insert((device, name.to_string()), factory);
    }

    /// Whether a factory is registered for the pair
    pub fn has(&self, name: &str, device: DeviceType) -> bool {
        self.factories.contains_key(&(device, name.to_string()))
    }

    /// Construct the operator a definition names, bound to `ws`
    ///
    /// Fails with `UnregisteredOperator` when no factory exists for the
    /// definition's (name, domain) pair.
    pub fn create(&self, def: &OperatorDef, ws: &mut Workspace) -> Result<Box<dyn Operator>> {
        let device = def.device_option().device_type;
        let factory = self
            .factories
            .get(&(device, def.op_type().to_string()))
            .ok_or_else(|| Error::UnregisteredOperator {
                name: def.op_type().to_string(),
                device,
            })?;
        factory(def, ws)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide table with every standard copy binding
///
/// Host bindings dispatch, source, and materialize on the host. CUDA
/// bindings dispatch from the device context, since GPU code is involved in
/// every leg that touches a device; a bare "Copy" under CUDA is a
/// device-to-device copy, possibly between two distinct GPUs.
pub fn operator_registry() -> &'static OperatorRegistry {
    static REGISTRY: OnceLock<OperatorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = OperatorRegistry::new();

        registry.register("Copy", DeviceType::Cpu, |def, ws| {
            Ok(Box::new(CopyOp::<CpuRuntime, CpuRuntime, CpuRuntime>::new(
                def, ws,
            )?))
        });
        registry.register("CopyFromCPUInput", DeviceType::Cpu, |def, ws| {
            Ok(Box::new(CopyOp::<CpuRuntime, CpuRuntime, CpuRuntime>::new(
                def, ws,
            )?))
        });
        registry.register("EnsureCPUOutput", DeviceType::Cpu, |def, ws| {
            Ok(Box::new(CopyOp::<CpuRuntime, CpuRuntime, CpuRuntime>::new(
                def, ws,
            )?))
        });
        registry.register("CopyOnDeviceLike", DeviceType::Cpu, |def, ws| {
            Ok(Box::new(CopyOnDeviceLikeOp::<CpuRuntime>::new(def, ws)?))
        });

        #[cfg(feature = "cuda")]
        {
            registry.register("Copy", DeviceType::Cuda, |def, ws| {
                Ok(Box::new(
                    CopyOp::<CudaRuntime, CudaRuntime, CudaRuntime>::new(def, ws)?,
                ))
            });
            // From CPU, copy to whatever the bound device is
            registry.register("CopyFromCPUInput", DeviceType::Cuda, |def, ws| {
                Ok(Box::new(CopyOp::<CudaRuntime, CudaRuntime, CpuRuntime>::new(def, ws)?))
            });
            // From whatever the bound device is, ensure the output is host-resident
            registry.register("EnsureCPUOutput", DeviceType::Cuda, |def, ws| {
                Ok(Box::new(CopyOp::<CudaRuntime, CpuRuntime, CudaRuntime>::new(def, ws)?))
            });
            registry.register("CopyGPUToCPU", DeviceType::Cuda, |def, ws| {
                Ok(Box::new(CopyOp::<CudaRuntime, CpuRuntime, CudaRuntime>::new(def, ws)?))
            });
            registry.register("CopyCPUToGPU", DeviceType::Cuda, |def, ws| {
                Ok(Box::new(CopyOp::<CudaRuntime, CudaRuntime, CpuRuntime>::new(def, ws)?))
            });
            registry.register("CopyOnDeviceLike", DeviceType::Cuda, |def, ws| {
                Ok(Box::new(CopyOnDeviceLikeOp::<CudaRuntime>::new(def, ws)?))
            });
        }

        registry
    })
}

/// Construct and run a single operator: the scheduler-facing entry point
///
/// Construction errors (unknown binding, missing blobs, bad arity) surface
/// as `Err`; a constructed operator's runtime failure surfaces as
/// `Ok(false)`.
pub fn run_operator_once(def: &OperatorDef, ws: &mut Workspace) -> Result<bool> {
    let mut operator = operator_registry().create(def, ws)?;
    Ok(operator.run())
}
