//! Integration tests for the CUDA copy operators
//!
//! These require a CUDA device; every test bails out early when none is
//! visible. Cross-device cases additionally require two GPUs.

#![cfg(feature = "cuda")]

use movr::dtype::TypeMeta;
use movr::error::Error;
use movr::ops::{run_operator_once, DeviceOption, OperatorDef, Workspace};
use movr::runtime::cpu::{CpuDevice, CpuRuntime};
use movr::runtime::cuda::{cuda_device_count, is_cuda_available, CudaDevice, CudaRuntime};
use movr::runtime::{pointer_registry, Device, Runtime, RuntimeClient};
use movr::tensor::Tensor;

macro_rules! require_cuda {
    () => {
        if !is_cuda_available() {
            eprintln!("skipping: no CUDA device");
            return;
        }
    };
}

#[test]
fn test_host_device_host_is_identity() {
    require_cuda!();

    let host = CpuDevice::new();
    let mut ws = Workspace::new();
    let data = [1.5f32, -2.25, 0.0, 3.75, -1.0e-20, 6.5];
    ws.feed_tensor::<CpuRuntime, f32>("x", &data, &[2, 3], &host)
        .unwrap();

    let gpu = DeviceOption::cuda(0);
    let up = OperatorDef::new("CopyCPUToGPU")
        .add_input("x")
        .add_output("x_gpu")
        .device(gpu);
    let on = OperatorDef::new("Copy")
        .add_input("x_gpu")
        .add_output("y_gpu")
        .device(gpu);
    let down = OperatorDef::new("CopyGPUToCPU")
        .add_input("y_gpu")
        .add_output("y")
        .device(gpu);

    assert!(run_operator_once(&up, &mut ws).unwrap());
    assert!(run_operator_once(&on, &mut ws).unwrap());
    assert!(run_operator_once(&down, &mut ws).unwrap());

    // Copies are stream-ordered and asynchronous; the scheduler observes
    // completion with an explicit synchronize.
    let client = CudaRuntime::default_client(&CudaDevice::new(0));
    client.synchronize().unwrap();

    assert_eq!(ws.fetch_tensor::<CpuRuntime, f32>("y").unwrap(), data);
}

#[test]
fn test_ensure_cpu_output_from_device() {
    require_cuda!();

    let gpu0 = CudaDevice::new(0);
    let mut ws = Workspace::new();
    let data = [4i32, 5, 6];
    ws.feed_tensor::<CudaRuntime, i32>("a", &data, &[3], &gpu0)
        .unwrap();

    let def = OperatorDef::new("EnsureCPUOutput")
        .add_input("a")
        .add_output("a_cpu")
        .device(DeviceOption::cuda(0));
    assert!(run_operator_once(&def, &mut ws).unwrap());

    CudaRuntime::default_client(&gpu0).synchronize().unwrap();
    assert_eq!(ws.fetch_tensor::<CpuRuntime, i32>("a_cpu").unwrap(), data);
}

#[test]
fn test_device_allocation_is_registered() {
    require_cuda!();

    let device = CudaDevice::new(0);
    let ptr = CudaRuntime::allocate(1024, &device).unwrap();
    assert_ne!(ptr, 0);

    // Interior pointers resolve to the owning device as well.
    assert_eq!(pointer_registry().device_for_pointer(ptr).unwrap(), 0);
    assert_eq!(pointer_registry().device_for_pointer(ptr + 512).unwrap(), 0);

    CudaRuntime::deallocate(ptr, 1024, &device);
    assert!(pointer_registry().device_for_pointer(ptr).is_err());
}

#[test]
fn test_zero_sized_allocation_not_registered() {
    require_cuda!();

    let device = CudaDevice::new(0);
    let ptr = CudaRuntime::allocate(0, &device).unwrap();
    assert_eq!(ptr, 0);
    CudaRuntime::deallocate(ptr, 0, &device);
}

#[test]
fn test_unknown_pointer_resolution_fails() {
    assert!(matches!(
        CudaDevice::for_pointer(0xdead_beef),
        Err(Error::UnknownDevicePointer { ptr: 0xdead_beef })
    ));
}

#[test]
fn test_copy_on_device_like_follows_reference() {
    require_cuda!();

    let gpu0 = CudaDevice::new(0);
    let mut ws = Workspace::new();
    let data = [1.0f32, 2.0, 3.0, 4.0];
    ws.feed_tensor::<CudaRuntime, f32>("a", &data, &[2, 2], &gpu0)
        .unwrap();
    ws.feed_tensor::<CudaRuntime, f32>("b", &[0.0; 3], &[3], &gpu0)
        .unwrap();

    let def = OperatorDef::new("CopyOnDeviceLike")
        .add_input("a")
        .add_input("b")
        .add_output("out")
        .device(DeviceOption::cuda(0));
    assert!(run_operator_once(&def, &mut ws).unwrap());

    let blob = ws.blob("out").unwrap();
    let guard = blob.read();
    let output = guard.get::<Tensor<CudaRuntime>>().unwrap();

    // The output's backing allocation resolves, through the registry, to the
    // device owning the reference tensor's buffer.
    assert_eq!(
        pointer_registry()
            .device_for_pointer(output.raw_data())
            .unwrap(),
        0
    );
    assert_eq!(output.shape(), &[2, 2]);
    assert_eq!(output.to_vec::<f32>(), data);
}

#[test]
fn test_copy_on_device_like_crosses_devices() {
    require_cuda!();
    if cuda_device_count() < 2 {
        eprintln!("skipping: needs two CUDA devices");
        return;
    }

    // Tensor A lives on device 1, the placement reference B on device 0. The
    // output must land on device 0 no matter which device dispatched.
    let gpu0 = CudaDevice::new(0);
    let gpu1 = CudaDevice::new(1);
    let mut ws = Workspace::new();
    let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    ws.feed_tensor::<CudaRuntime, f32>("a", &data, &[2, 3], &gpu1)
        .unwrap();
    ws.feed_tensor::<CudaRuntime, f32>("b", &[0.0; 2], &[2], &gpu0)
        .unwrap();

    let def = OperatorDef::new("CopyOnDeviceLike")
        .add_input("a")
        .add_input("b")
        .add_output("out")
        .device(DeviceOption::cuda(1));
    assert!(run_operator_once(&def, &mut ws).unwrap());

    let blob = ws.blob("out").unwrap();
    let guard = blob.read();
    let output = guard.get::<Tensor<CudaRuntime>>().unwrap();

    assert_eq!(output.device().id(), 0);
    assert_eq!(
        pointer_registry()
            .device_for_pointer(output.raw_data())
            .unwrap(),
        0
    );
    assert_eq!(output.shape(), &[2, 3]);
    assert_eq!(output.to_vec::<f32>(), data);
}

#[test]
fn test_cross_device_copy_roundtrip() {
    require_cuda!();
    if cuda_device_count() < 2 {
        eprintln!("skipping: needs two CUDA devices");
        return;
    }

    let gpu1 = CudaDevice::new(1);
    let mut ws = Workspace::new();
    let data = [9u64, 8, 7, 6];
    ws.feed_tensor::<CudaRuntime, u64>("a", &data, &[4], &gpu1)
        .unwrap();

    // A bare Copy under the device domain may cross device indices; binding
    // it to device 0 materializes the output there.
    let def = OperatorDef::new("Copy")
        .add_input("a")
        .add_output("a0")
        .device(DeviceOption::cuda(0));
    assert!(run_operator_once(&def, &mut ws).unwrap());

    let blob = ws.blob("a0").unwrap();
    let guard = blob.read();
    let output = guard.get::<Tensor<CudaRuntime>>().unwrap();
    assert_eq!(output.device().id(), 0);
    assert_eq!(output.to_vec::<u64>(), data);
}

#[test]
fn test_element_copy_cannot_cross_domains() {
    require_cuda!();

    unsafe fn copy_u32(src: *const u8, dst: *mut u8) {
        unsafe {
            *(dst as *mut u32) = *(src as *const u32);
        }
    }

    let host = CpuDevice::new();
    let gpu0 = CudaDevice::new(0);
    let meta = TypeMeta::opaque(4, copy_u32);

    let source = Tensor::<CpuRuntime>::from_slice(&[1u32, 2], &[2], &host);
    let mut target = Tensor::<CudaRuntime>::new(&gpu0);
    target.resize(&[2]);
    let dst = target.raw_mutable_data(&TypeMeta::of::<u32>()).unwrap();

    let client = CudaRuntime::default_client(&gpu0);
    let result = client.copy_items::<CpuRuntime, CudaRuntime>(
        &meta,
        2,
        source.raw_data(),
        source.device(),
        dst,
        target.device(),
    );
    assert!(matches!(
        result,
        Err(Error::CrossDomainElementCopy { .. })
    ));
}

#[test]
fn test_host_client_rejects_device_legs() {
    require_cuda!();

    let host = CpuDevice::new();
    let gpu0 = CudaDevice::new(0);

    let source = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0], &[2], &host);
    let mut target = Tensor::<CudaRuntime>::new(&gpu0);
    target.resize(&[2]);
    let meta = TypeMeta::of::<f32>();
    let dst = target.raw_mutable_data(&meta).unwrap();

    // Only the device context can issue this transfer.
    let client = CpuRuntime::default_client(&host);
    let result = client.copy_items::<CpuRuntime, CudaRuntime>(
        &meta,
        2,
        source.raw_data(),
        source.device(),
        dst,
        target.device(),
    );
    assert!(matches!(result, Err(Error::UnsupportedTransfer { .. })));
}
