//! Integration test: occupancy queries and the block-size search.
//!
//! The mock device has 10 multiprocessors of 2048 threads, at most 16
//! resident blocks each and 100 KiB of shared memory per multiprocessor.
//!
//! Run with: cargo test --test occupancy_test -- --nocapture

mod common;

use common::*;
use cuwrap::driver::sys::*;
use cuwrap::{
    min_grid_params_for_max_occupancy, min_grid_params_for_max_occupancy_with, Error, GridParams,
    LaunchConfig,
};

fn occupancy_calls(mock: &MockDriver) -> Vec<(i32, usize, u32)> {
    mock.calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Occupancy { block_size, dynamic_smem, flags, .. } => Some((block_size, dynamic_smem, flags)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_active_blocks_per_multiprocessor() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    assert_eq!(kernel.maximum_active_blocks_per_multiprocessor(256, 0, false).unwrap(), 8);
    assert_eq!(kernel.maximum_active_blocks_per_multiprocessor(64, 0, false).unwrap(), 16);
    assert_eq!(kernel.maximum_active_blocks_per_multiprocessor(128, 50 * 1024, true).unwrap(), 2);
    assert_eq!(
        occupancy_calls(&mock),
        vec![
            (256, 0, CU_OCCUPANCY_DEFAULT),
            (64, 0, CU_OCCUPANCY_DEFAULT),
            (128, 50 * 1024, CU_OCCUPANCY_DISABLE_CACHING_OVERRIDE),
        ]
    );
}

#[test]
fn test_full_occupancy_found_at_largest_block() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    let params = min_grid_params_for_max_occupancy(&kernel, 0, 0, false).unwrap();
    println!("{:?}", params);
    assert_eq!(params, GridParams { grid_size_in_blocks: 20, block_size: 1024 });
    // Full occupancy on the first candidate ends the search.
    assert_eq!(occupancy_calls(&mock).len(), 1);
}

#[test]
fn test_block_size_dependent_shared_memory() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    let params =
        min_grid_params_for_max_occupancy_with(&kernel, |block_size| block_size as usize * 64, 0, false)
            .unwrap();
    assert_eq!(params, GridParams { grid_size_in_blocks: 20, block_size: 800 });

    let calls = occupancy_calls(&mock);
    assert_eq!(calls.first(), Some(&(1024, 1024 * 64, CU_OCCUPANCY_DEFAULT)));
    assert_eq!(calls.last(), Some(&(32, 32 * 64, CU_OCCUPANCY_DEFAULT)));
    assert_eq!(calls.len(), 32);
}

#[test]
fn test_block_size_limit_not_warp_aligned() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    let params = min_grid_params_for_max_occupancy(&kernel, 0, 100, false).unwrap();
    assert_eq!(params, GridParams { grid_size_in_blocks: 160, block_size: 100 });

    let sizes: Vec<i32> = occupancy_calls(&mock).iter().map(|c| c.0).take(3).collect();
    assert_eq!(sizes, vec![100, 96, 64]);
}

#[test]
fn test_kernel_thread_limit_caps_search() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);
    mock.state()
        .function_attributes
        .insert((kernel.raw() as usize, CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK), 256);

    let params = min_grid_params_for_max_occupancy(&kernel, 0, 0, false).unwrap();
    assert_eq!(params, GridParams { grid_size_in_blocks: 80, block_size: 256 });
}

#[test]
fn test_disable_caching_flag_forwarded() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    min_grid_params_for_max_occupancy(&kernel, 0, 0, true).unwrap();
    assert!(occupancy_calls(&mock)
        .iter()
        .all(|c| c.2 == CU_OCCUPANCY_DISABLE_CACHING_OVERRIDE));
}

#[test]
fn test_search_restores_current_context() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 1);

    min_grid_params_for_max_occupancy(&kernel, 0, 0, false).unwrap();
    assert_eq!(mock.current_on_this_thread(), 0);
}

#[test]
fn test_occupancy_needs_recent_driver() {
    let mock = MockDriver::with_version(10000);
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    let err = min_grid_params_for_max_occupancy(&kernel, 0, 0, false).unwrap_err();
    assert!(matches!(err, Error::NotYetImplemented { required: 10010, .. }));
    let err = kernel.maximum_active_blocks_per_multiprocessor(128, 0, false).unwrap_err();
    assert!(matches!(err, Error::NotYetImplemented { .. }));
    assert!(occupancy_calls(&mock).is_empty());
}

#[test]
fn test_zero_warp_size_rejected() {
    let mock = MockDriver::new();
    mock.state().device_attributes.insert(CU_DEVICE_ATTRIBUTE_WARP_SIZE, 0);
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    let err = min_grid_params_for_max_occupancy(&kernel, 0, 0, false).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_launch_config_for_max_occupancy() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    let config = LaunchConfig::for_max_occupancy(&kernel, 60 * 1024, 0).unwrap();
    println!("grid {} block {}", config.grid, config.block);
    // 60 KiB per block leaves room for one block per multiprocessor.
    assert_eq!(config.block.x, 1024);
    assert_eq!(config.grid.x, 10);
    assert_eq!(config.dynamic_shared_mem, 60 * 1024);
    assert_eq!(config.total_threads(), 10 * 1024);

    let limited = LaunchConfig::for_max_occupancy(&kernel, 0, 100).unwrap();
    assert_eq!((limited.grid.x, limited.block.x), (160, 100));
}

#[test]
fn test_constant_and_function_forms_agree() {
    let mock = MockDriver::new();
    let rt = runtime(&mock);
    let (_module, kernel) = load_kernel(&rt, 0);

    for (smem, limit) in [(0, 0), (30 * 1024, 0), (8 * 1024, 200), (60 * 1024, 512)] {
        let constant = min_grid_params_for_max_occupancy(&kernel, smem, limit, false).unwrap();
        let function = min_grid_params_for_max_occupancy_with(&kernel, |_| smem, limit, false).unwrap();
        assert_eq!(constant, function, "smem {} limit {}", smem, limit);
    }
}
