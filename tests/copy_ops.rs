//! Integration tests for the host copy operators
//!
//! These tests exercise the registered operator bindings end to end: feed
//! named tensors into a workspace, construct operators through the
//! registration table, run them, and read the results back.

use movr::dtype::TypeMeta;
use movr::error::Error;
use movr::ops::{run_operator_once, DeviceOption, OperatorDef, Workspace};
use movr::runtime::cpu::{CpuDevice, CpuRuntime};
use movr::runtime::{Runtime, RuntimeClient};
use movr::tensor::Tensor;

fn copy_def(op_type: &str, input: &str, output: &str) -> OperatorDef {
    OperatorDef::new(op_type).add_input(input).add_output(output)
}

#[test]
fn test_copy_roundtrip_is_bit_identical() {
    let device = CpuDevice::new();
    let mut ws = Workspace::new();
    let data = [1.5f32, -2.25, 0.0, f32::MIN_POSITIVE, 1.0e30, -0.5];
    ws.feed_tensor::<CpuRuntime, f32>("x", &data, &[2, 3], &device)
        .unwrap();

    assert!(run_operator_once(&copy_def("Copy", "x", "y"), &mut ws).unwrap());
    // Reverse direction: y back into a third blob.
    assert!(run_operator_once(&copy_def("Copy", "y", "z"), &mut ws).unwrap());

    let z = ws.fetch_tensor::<CpuRuntime, f32>("z").unwrap();
    assert_eq!(z, data);
}

#[test]
fn test_copy_preserves_shape_and_bytes() {
    let device = CpuDevice::new();
    let mut ws = Workspace::new();
    let data: Vec<u8> = (0..=255).collect();
    ws.feed_tensor::<CpuRuntime, u8>("x", &data, &[16, 16], &device)
        .unwrap();

    assert!(run_operator_once(&copy_def("Copy", "x", "y"), &mut ws).unwrap());

    let blob = ws.blob("y").unwrap();
    let guard = blob.read();
    let output = guard.get::<Tensor<CpuRuntime>>().unwrap();
    assert_eq!(output.shape(), &[16, 16]);
    assert_eq!(output.to_vec::<u8>(), data);
    assert_ne!(output.raw_data(), 0);
}

#[test]
fn test_copy_zero_element_tensor() {
    let device = CpuDevice::new();
    let mut ws = Workspace::new();
    ws.feed_tensor::<CpuRuntime, f32>("x", &[], &[0, 3], &device)
        .unwrap();

    assert!(run_operator_once(&copy_def("Copy", "x", "y"), &mut ws).unwrap());

    let blob = ws.blob("y").unwrap();
    let guard = blob.read();
    let output = guard.get::<Tensor<CpuRuntime>>().unwrap();
    assert_eq!(output.numel(), 0);
    assert_eq!(output.raw_data(), 0);
    assert!(ws.fetch_tensor::<CpuRuntime, f32>("y").unwrap().is_empty());
}

#[test]
fn test_host_aliases_of_copy() {
    let device = CpuDevice::new();
    let mut ws = Workspace::new();
    let data = [7i64, 8, 9];
    ws.feed_tensor::<CpuRuntime, i64>("x", &data, &[3], &device)
        .unwrap();

    // On the host these bindings all degenerate to a host-to-host copy.
    assert!(run_operator_once(&copy_def("CopyFromCPUInput", "x", "a"), &mut ws).unwrap());
    assert!(run_operator_once(&copy_def("EnsureCPUOutput", "x", "b"), &mut ws).unwrap());

    assert_eq!(ws.fetch_tensor::<CpuRuntime, i64>("a").unwrap(), data);
    assert_eq!(ws.fetch_tensor::<CpuRuntime, i64>("b").unwrap(), data);
}

#[test]
fn test_copy_overwrites_stale_output() {
    let device = CpuDevice::new();
    let mut ws = Workspace::new();
    ws.feed_tensor::<CpuRuntime, f32>("x", &[1.0, 2.0], &[2], &device)
        .unwrap();
    ws.feed_tensor::<CpuRuntime, f32>("y", &[9.0; 8], &[8], &device)
        .unwrap();

    assert!(run_operator_once(&copy_def("Copy", "x", "y"), &mut ws).unwrap());

    let y = ws.fetch_tensor::<CpuRuntime, f32>("y").unwrap();
    assert_eq!(y, [1.0, 2.0]);
}

#[test]
fn test_copy_on_device_like_host() {
    let device = CpuDevice::new();
    let mut ws = Workspace::new();
    let data = [1.0f32, 2.0, 3.0, 4.0];
    ws.feed_tensor::<CpuRuntime, f32>("a", &data, &[2, 2], &device)
        .unwrap();
    ws.feed_tensor::<CpuRuntime, f32>("b", &[0.0; 6], &[6], &device)
        .unwrap();

    let def = OperatorDef::new("CopyOnDeviceLike")
        .add_input("a")
        .add_input("b")
        .add_output("out");
    assert!(run_operator_once(&def, &mut ws).unwrap());

    // Output follows input 0's shape and contents; input 1 only picks the
    // placement, which on the host is trivially the host.
    let blob = ws.blob("out").unwrap();
    let guard = blob.read();
    let output = guard.get::<Tensor<CpuRuntime>>().unwrap();
    assert_eq!(output.shape(), &[2, 2]);
    assert_eq!(output.to_vec::<f32>(), data);
}

#[test]
fn test_unregistered_name_fails_at_construction() {
    let mut ws = Workspace::new();
    let result = run_operator_once(&copy_def("Teleport", "x", "y"), &mut ws);
    assert!(matches!(result, Err(Error::UnregisteredOperator { .. })));
}

#[test]
fn test_device_binding_unregistered_without_backend() {
    // CopyGPUToCPU has no host registration; looking it up under the host
    // binding is a configuration error, not a fallback.
    let mut ws = Workspace::new();
    let def = copy_def("CopyGPUToCPU", "x", "y").device(DeviceOption::cpu());
    let result = run_operator_once(&def, &mut ws);
    assert!(matches!(result, Err(Error::UnregisteredOperator { .. })));
}

#[test]
fn test_missing_input_fails_at_construction() {
    let mut ws = Workspace::new();
    let result = run_operator_once(&copy_def("Copy", "missing", "y"), &mut ws);
    assert!(matches!(result, Err(Error::BlobMissing { .. })));
}

#[test]
fn test_in_place_copy_rejected() {
    let device = CpuDevice::new();
    let mut ws = Workspace::new();
    ws.feed_tensor::<CpuRuntime, f32>("x", &[1.0], &[1], &device)
        .unwrap();

    let result = run_operator_once(&copy_def("Copy", "x", "x"), &mut ws);
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
}

#[test]
fn test_wrong_input_type_fails_at_run_time() {
    let mut ws = Workspace::new();
    ws.create_blob("x").write().set("not a tensor".to_string());

    // Construction succeeds (the blob exists); the type mismatch surfaces as
    // a failed run.
    assert!(!run_operator_once(&copy_def("Copy", "x", "y"), &mut ws).unwrap());
}

// ===== Element-copy metas =====

mod element_copy {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static SEEN: Mutex<Vec<u32>> = Mutex::new(Vec::new());

    unsafe fn counting_copy_u32(src: *const u8, dst: *mut u8) {
        CALLS.fetch_add(1, Ordering::SeqCst);
        unsafe {
            let value = *(src as *const u32);
            SEEN.lock().unwrap().push(value);
            *(dst as *mut u32) = value;
        }
    }

    #[test]
    fn test_element_routine_invoked_once_per_element_in_order() {
        let device = CpuDevice::new();
        let meta = TypeMeta::opaque(4, counting_copy_u32);
        let values = [10u32, 20, 30, 40];

        let mut src = Tensor::<CpuRuntime>::new(&device);
        src.resize(&[4]);
        let src_ptr = src.raw_mutable_data(&meta).unwrap();
        unsafe {
            std::slice::from_raw_parts_mut(src_ptr as *mut u32, 4).copy_from_slice(&values);
        }

        let mut dst = Tensor::<CpuRuntime>::new(&device);
        dst.resize_like(&src);
        let dst_ptr = dst.raw_mutable_data(&meta).unwrap();

        let client = CpuRuntime::default_client(&device);
        client
            .copy_items::<CpuRuntime, CpuRuntime>(
                &meta,
                4,
                src_ptr,
                src.device(),
                dst_ptr,
                dst.device(),
            )
            .unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 4);
        assert_eq!(*SEEN.lock().unwrap(), values);
        assert_eq!(dst.to_vec::<u32>(), values);
    }
}

mod element_copy_operator {
    use super::*;

    unsafe fn copy_u32(src: *const u8, dst: *mut u8) {
        unsafe {
            *(dst as *mut u32) = *(src as *const u32);
        }
    }

    #[test]
    fn test_copy_operator_carries_element_copy_meta() {
        let device = CpuDevice::new();
        let meta = TypeMeta::opaque(4, copy_u32);
        let values = [5u32, 6, 7];

        let mut input = Tensor::<CpuRuntime>::new(&device);
        input.resize(&[3]);
        let ptr = input.raw_mutable_data(&meta).unwrap();
        unsafe {
            std::slice::from_raw_parts_mut(ptr as *mut u32, 3).copy_from_slice(&values);
        }

        let mut ws = Workspace::new();
        ws.create_blob("x").write().set(input);

        assert!(run_operator_once(&copy_def("Copy", "x", "y"), &mut ws).unwrap());

        let blob = ws.blob("y").unwrap();
        let guard = blob.read();
        let output = guard.get::<Tensor<CpuRuntime>>().unwrap();
        assert_eq!(output.meta(), meta);
        assert_eq!(output.to_vec::<u32>(), values);
    }
}
