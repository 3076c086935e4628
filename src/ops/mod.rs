//! Copy operators and their registration table
//!
//! Operators are units of work bound to named workspace blobs at
//! construction time and invoked once per scheduling step through
//! [`Operator::run`]. The registration table maps an operator type name plus
//! a domain binding to a factory; the external scheduler looks operators up
//! there, constructs them, and sequences the calls.

mod copy;
mod def;
mod registry;
mod workspace;

pub use copy::{CopyOnDeviceLikeOp, CopyOp};
pub use def::{DeviceOption, OperatorDef};
pub use registry::{operator_registry, run_operator_once, OperatorFactory, OperatorRegistry};
pub use workspace::{Blob, Workspace};

use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::tensor::Tensor;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::sync::Arc;

/// A constructed operator, ready to run against its bound blobs
pub trait Operator: Send {
    /// Execute the operator once
    ///
    /// Returns `true` on success. On failure the error is logged, `false` is
    /// returned, and the contents of the declared outputs are undefined; the
    /// scheduler is expected to abort the remaining sequence. Failures are
    /// never retried here.
    fn run(&mut self) -> bool;

    /// The definition this operator was constructed from
    fn def(&self) -> &OperatorDef;
}

/// Shared construction-time plumbing: arity checks and blob resolution
///
/// Declared inputs must already exist in the workspace (`BlobMissing`
/// otherwise); declared outputs are created on demand.
pub(crate) struct OperatorBase {
    def: OperatorDef,
    inputs: Vec<Arc<RwLock<Blob>>>,
    outputs: Vec<Arc<RwLock<Blob>>>,
}

impl OperatorBase {
    pub(crate) fn from_def(
        def: &OperatorDef,
        ws: &mut Workspace,
        num_inputs: usize,
        num_outputs: usize,
    ) -> Result<Self> {
        if def.inputs().len() != num_inputs {
            return Err(Error::invalid_argument(
                "inputs",
                format!(
                    "{} expects {} inputs, got {}",
                    def.op_type(),
                    num_inputs,
                    def.inputs().len()
                ),
            ));
        }
        if def.outputs().len() != num_outputs {
            return Err(Error::invalid_argument(
                "outputs",
                format!(
                    "{} expects {} outputs, got {}",
                    def.op_type(),
                    num_outputs,
                    def.outputs().len()
                ),
            ));
        }

        let inputs = def
            .inputs()
            .iter()
            .map(|name| {
                ws.blob(name).ok_or_else(|| Error::BlobMissing {
                    name: name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let outputs = def
            .outputs()
            .iter()
            .map(|name| ws.create_blob(name))
            .collect();

        Ok(Self {
            def: def.clone(),
            inputs,
            outputs,
        })
    }

    pub(crate) fn def(&self) -> &OperatorDef {
        &self.def
    }

    /// Read-borrow input `i` as a tensor of runtime `R`
    pub(crate) fn input_tensor<R: Runtime>(
        &self,
        i: usize,
    ) -> Result<MappedRwLockReadGuard<'_, Tensor<R>>> {
        let guard = self.inputs[i].read();
        if guard.is_empty() {
            return Err(Error::BlobMissing {
                name: self.def.input(i).to_string(),
            });
        }
        RwLockReadGuard::try_map(guard, |blob| blob.get::<Tensor<R>>()).map_err(|_| {
            Error::BlobTypeMismatch {
                name: self.def.input(i).to_string(),
            }
        })
    }

    /// Write-borrow output `i` as a tensor of runtime `R`
    ///
    /// Materializes an empty tensor on `device` if the blob is empty or
    /// holds something else.
    pub(crate) fn output_tensor<R: Runtime>(
        &self,
        i: usize,
        device: &R::Device,
    ) -> MappedRwLockWriteGuard<'_, Tensor<R>> {
        RwLockWriteGuard::map(self.outputs[i].write(), |blob| {
            blob.get_mut_or_insert_with(|| Tensor::<R>::new(device))
        })
    }
}

/// Reject defs that name the same blob as input `i` and output `j`
///
/// The copy operators never run in place; allowing it would also deadlock
/// the blob locks.
pub(crate) fn reject_in_place(def: &OperatorDef, input: usize, output: usize) -> Result<()> {
    if def.input(input) == def.output(output) {
        return Err(Error::invalid_argument(
            "outputs",
            format!("{} does not support in-place operation", def.op_type()),
        ));
    }
    Ok(())
}
