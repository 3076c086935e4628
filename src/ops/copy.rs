//! The copy operator family
//!
//! Two operator shapes cover every registered copy variant. [`CopyOp`] is
//! parameterized independently over the context that dispatches the copy,
//! the domain that owns the destination, and the domain that owns the
//! source; choosing the three runtimes realizes every directional
//! combination (host-to-host, host-to-device, device-to-host,
//! device-to-device). [`CopyOnDeviceLikeOp`] instead derives its destination
//! device at run time from the data of a second input.

use super::{reject_in_place, Operator, OperatorBase, OperatorDef, Workspace};
use crate::error::Result;
use crate::runtime::{Device, Runtime, RuntimeClient};
use crate::tensor::Tensor;
use log::error;
use std::marker::PhantomData;

/// Generic copy operator: one input tensor in `Src`'s domain, one output
/// materialized in `Dst`'s domain, dispatched through a `C` context
///
/// The output is always freshly resized from the input, never pre-sized by
/// the caller, so its capacity can never disagree with the input's element
/// count. Cross-domain copies that touch a device must name the device
/// runtime as `C`: only the device context can issue the transfer
/// instruction, and a host dispatch context rejects such legs.
pub struct CopyOp<C: Runtime, Dst: Runtime, Src: Runtime> {
    base: OperatorBase,
    client: C::Client,
    dst_device: Dst::Device,
    _runtimes: PhantomData<fn() -> (C, Dst, Src)>,
}

impl<C: Runtime, Dst: Runtime, Src: Runtime> CopyOp<C, Dst, Src> {
    /// Construct against a definition with one input and one output
    pub fn new(def: &OperatorDef, ws: &mut Workspace) -> Result<Self> {
        let base = OperatorBase::from_def(def, ws, 1, 1)?;
        reject_in_place(def, 0, 0)?;

        let dispatch_device = C::device(def.device_option().device_id);
        let client = C::default_client(&dispatch_device);
        let dst_device = Dst::device(def.device_option().device_id);

        Ok(Self {
            base,
            client,
            dst_device,
            _runtimes: PhantomData,
        })
    }

    fn execute(&mut self) -> Result<()> {
        let input = self.base.input_tensor::<Src>(0)?;
        let mut output = self.base.output_tensor::<Dst>(0, &self.dst_device);

        output.resize_like(&*input);
        let meta = input.meta();
        let count = input.numel();
        let dst = output.raw_mutable_data(&meta)?;

        self.client.copy_items::<Src, Dst>(
            &meta,
            count,
            input.raw_data(),
            input.device(),
            dst,
            output.device(),
        )
    }
}

impl<C: Runtime, Dst: Runtime, Src: Runtime> Operator for CopyOp<C, Dst, Src> {
    fn run(&mut self) -> bool {
        match self.execute() {
            Ok(()) => true,
            Err(err) => {
                error!("{} failed: {}", self.base.def(), err);
                false
            }
        }
    }

    fn def(&self) -> &OperatorDef {
        self.base.def()
    }
}

/// Copy operator whose destination device is a runtime value derived from
/// data
///
/// Takes the tensor to copy (input 0) and a placement reference (input 1).
/// The output is allocated on whichever device currently owns the
/// reference's buffer, resolved through the pointer registry, regardless of
/// which device the calling thread is nominally associated with. On the host
/// runtime the owning domain is trivially the host.
pub struct CopyOnDeviceLikeOp<R: Runtime> {
    base: OperatorBase,
    _runtime: PhantomData<fn() -> R>,
}

impl<R: Runtime> CopyOnDeviceLikeOp<R> {
    /// Construct against a definition with two inputs and one output
    pub fn new(def: &OperatorDef, ws: &mut Workspace) -> Result<Self> {
        let base = OperatorBase::from_def(def, ws, 2, 1)?;
        reject_in_place(def, 0, 0)?;

        Ok(Self {
            base,
            _runtime: PhantomData,
        })
    }

    fn execute(&mut self) -> Result<()> {
        let device = {
            let like = self.base.input_tensor::<R>(1)?;
            R::device_for_pointer(like.raw_data())?
        };
        let client = R::default_client(&device);

        let input = self.base.input_tensor::<R>(0)?;
        let mut output = self.base.output_tensor::<R>(0, &device);
        if !output.device().is_same(&device) {
            *output = Tensor::<R>::new(&device);
        }

        output.resize_like(&*input);
        let meta = input.meta();
        let count = input.numel();
        let dst = output.raw_mutable_data(&meta)?;

        client.copy_items::<R, R>(
            &meta,
            count,
            input.raw_data(),
            input.device(),
            dst,
            output.device(),
        )
    }
}

impl<R: Runtime> Operator for CopyOnDeviceLikeOp<R> {
    fn run(&mut self) -> bool {
        match self.execute() {
            Ok(()) => true,
            Err(err) => {
                error!("{} failed: {}", self.base.def(), err);
                false
            }
        }
    }

    fn def(&self) -> &OperatorDef {
        self.base.def()
    }
}
