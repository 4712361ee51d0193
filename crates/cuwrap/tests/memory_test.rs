//! Integration test: device buffers.
//!
//! Run with: cargo test --test memory_test -- --nocapture

mod common;

use common::*;
use cuwrap::driver::sys::CUDA_ERROR_INVALID_VALUE;
use cuwrap::{DeviceBuffer, Error};

#[test]
fn test_copy_to_and_from_device() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let dev = device(&rt, 0);

    let host: Vec<f32> = (0..256).map(|i| i as f32 * 0.5).collect();
    let buffer = DeviceBuffer::alloc(&dev, host.len() * 4).unwrap();
    assert_eq!(buffer.len(), 1024);
    buffer.copy_from_slice(&host).unwrap();

    let mut back = vec![0f32; 256];
    buffer.copy_to_slice(&mut back).unwrap();
    assert_eq!(back, host);
    assert_eq!(mock.current_on_this_thread(), 0);
}

#[test]
fn test_oversized_copy_rejected() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let buffer = DeviceBuffer::alloc(&device(&rt, 1), 16).unwrap();

    let err = buffer.copy_from_host(&[0u8; 17]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    let mut dst = [0u8; 32];
    assert!(buffer.copy_to_host(&mut dst).is_err());

    // Partial copies are fine.
    buffer.copy_from_host(&[1, 2, 3]).unwrap();
    let mut head = [0u8; 4];
    buffer.copy_to_host(&mut head).unwrap();
    assert_eq!(head, [1, 2, 3, 0]);
}

#[test]
fn test_memset() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let buffer = DeviceBuffer::alloc(&device(&rt, 0), 8).unwrap();

    buffer.memset(0x5a).unwrap();
    let mut out = [0u8; 8];
    buffer.copy_to_host(&mut out).unwrap();
    assert_eq!(out, [0x5a; 8]);
}

#[test]
fn test_async_copies_on_stream() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let dev = device(&rt, 1);
    let stream = dev.create_stream(false, 0).unwrap();
    let buffer = DeviceBuffer::alloc(&dev, 4).unwrap();

    let src = [9u8, 8, 7, 6];
    let mut dst = [0u8; 4];
    unsafe {
        buffer.copy_from_host_async(&src, &stream).unwrap();
        buffer.copy_to_host_async(&mut dst, &stream).unwrap();
    }
    stream.synchronize().unwrap();
    assert_eq!(dst, src);
}

#[test]
fn test_freed_on_drop_in_its_own_context() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let buffer = DeviceBuffer::alloc(&device(&rt, 1), 64).unwrap();
    let ptr = buffer.device_ptr();
    assert!(buffer.identify().starts_with("device allocation 0x"));

    // No context is current here; dropping must still free on device 1.
    drop(buffer);
    assert_eq!(mock.destroy_count("memory", ptr), 1);
    assert_eq!(mock.current_on_this_thread(), 0);
}

#[test]
fn test_stream_ordered_allocation() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let stream = device(&rt, 0).create_stream(false, 0).unwrap();

    let buffer = DeviceBuffer::alloc_async(&stream, 128).unwrap();
    let ptr = buffer.device_ptr();
    buffer.free_async(&stream).unwrap();

    assert!(mock.calls().contains(&Call::MemFreeAsync { dptr: ptr, stream: stream.raw() as usize }));
    assert_eq!(mock.destroy_count("memory", ptr), 0, "not freed twice");
}

#[test]
fn test_rejected_free_async_frees_on_return() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let stream = device(&rt, 0).create_stream(false, 0).unwrap();

    let buffer = DeviceBuffer::alloc_async(&stream, 128).unwrap();
    let ptr = buffer.device_ptr();
    mock.state().free_async_failure = Some(CUDA_ERROR_INVALID_VALUE);

    let err = buffer.free_async(&stream).unwrap_err();
    println!("{}", err);
    assert_eq!(err.code(), Some(CUDA_ERROR_INVALID_VALUE));
    // The buffer still owned the memory and released it on the way out.
    assert_eq!(mock.destroy_count("memory", ptr), 1);
}

#[test]
fn test_stream_ordered_allocation_needs_recent_driver() {
    let mock = MockDriver::with_version(11000);
    let rt = runtime(&mock);
    let stream = device(&rt, 0).create_stream(false, 0).unwrap();

    let err = DeviceBuffer::alloc_async(&stream, 128).unwrap_err();
    assert!(matches!(err, Error::NotYetImplemented { required: 11020, found: 11000, .. }));
}

#[test]
fn test_allocation_on_missing_device() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);

    let err = cuwrap::Device::get(&rt, 2).unwrap_err();
    println!("{}", err);
    assert!(matches!(err, Error::InvalidArgument(_)));
}
