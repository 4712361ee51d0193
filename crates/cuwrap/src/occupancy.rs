//! Block-size search for maximal multiprocessor occupancy.
//!
//! The search runs on the host: the driver's own callback-based variant
//! cannot call back into a Rust closure, so candidate block sizes are
//! enumerated here and the driver is asked for the resident block count of
//! each.

use tracing::debug;

use cuwrap_core::{Error, Result};
use cuwrap_driver::sys::*;
use cuwrap_driver::{Capability, Driver};

use crate::context::current;
use crate::kernel::{Kernel, KernelAttribute};
use crate::launch::GridParams;

/// Occupancy search for a kernel whose dynamic shared memory use does not
/// depend on its block size.
///
/// `block_size_limit` caps the block size; 0 means no cap beyond the
/// device's and the kernel's own limits.
pub fn min_grid_params_for_max_occupancy(
    kernel: &Kernel,
    dynamic_shared_memory_size: usize,
    block_size_limit: u32,
    disable_caching_override: bool,
) -> Result<GridParams> {
    min_grid_params_for_max_occupancy_with(
        kernel,
        move |_| dynamic_shared_memory_size,
        block_size_limit,
        disable_caching_override,
    )
}

/// Occupancy search where `block_size_to_dynamic_shared_mem_size` gives the
/// dynamic shared memory a block of the given size needs.
pub fn min_grid_params_for_max_occupancy_with<F>(
    kernel: &Kernel,
    block_size_to_dynamic_shared_mem_size: F,
    block_size_limit: u32,
    disable_caching_override: bool,
) -> Result<GridParams>
where
    F: Fn(u32) -> usize,
{
    let runtime = kernel.runtime();
    runtime.require(Capability::OccupancyCalculation)?;

    current::with_override(runtime, kernel.context(), || {
        let driver = runtime.driver();
        let native = runtime.native_device(kernel.device_id())?;
        let attr = |attrib| device_attribute(driver, native, kernel, attrib);

        let max_threads_per_multiprocessor =
            attr(CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_MULTIPROCESSOR)?;
        let warp_size = attr(CU_DEVICE_ATTRIBUTE_WARP_SIZE)?;
        let device_max_threads_per_block = attr(CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?;
        let multiprocessor_count = attr(CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?;
        let kernel_max_threads_per_block = kernel
            .runtime()
            .driver()
            .func_get_attribute(KernelAttribute::MaxThreadsPerBlock.raw(), kernel.raw())
            .map_err(|code| {
                Error::driver(
                    code,
                    format!(
                        "reading the {} of {}",
                        KernelAttribute::MaxThreadsPerBlock.name(),
                        kernel.identify()
                    ),
                )
            })?
            .max(0) as u32;

        if warp_size == 0 {
            return Err(Error::InvalidArgument(format!(
                "device {} reports a warp size of 0",
                kernel.device_id()
            )));
        }

        let mut limit = if block_size_limit == 0 {
            device_max_threads_per_block
        } else {
            block_size_limit
        };
        limit = limit.min(device_max_threads_per_block).min(kernel_max_threads_per_block);
        let limit_aligned = limit.div_ceil(warp_size) * warp_size;

        let mut max_occupancy = 0u32;
        let mut best_block_size = 0u32;
        let mut best_num_blocks = 0u32;

        let mut aligned = limit_aligned;
        while aligned > 0 {
            let block_size = limit.min(aligned);
            let dynamic_shared_mem = block_size_to_dynamic_shared_mem_size(block_size);
            let num_blocks = kernel.active_blocks_in_current_context(
                block_size,
                dynamic_shared_mem,
                disable_caching_override,
            )?;
            let occupancy = block_size.saturating_mul(num_blocks);
            if occupancy > max_occupancy {
                max_occupancy = occupancy;
                best_block_size = block_size;
                best_num_blocks = num_blocks;
            }
            if max_occupancy == max_threads_per_multiprocessor {
                break;
            }
            aligned -= warp_size;
        }

        let params = GridParams {
            grid_size_in_blocks: best_num_blocks.saturating_mul(multiprocessor_count),
            block_size: best_block_size,
        };
        debug!(
            kernel = %kernel.identify(),
            "max occupancy {} threads/SM with blocks of {}, grid of {}",
            max_occupancy,
            params.block_size,
            params.grid_size_in_blocks
        );
        Ok(params)
    })
}

fn device_attribute(
    driver: &dyn Driver,
    native: CUdevice,
    kernel: &Kernel,
    attrib: i32,
) -> Result<u32> {
    driver
        .device_get_attribute(attrib, native)
        .map(|v| v.max(0) as u32)
        .map_err(|code| {
            Error::driver(
                code,
                format!("reading attribute {} of device {}", attrib, kernel.device_id()),
            )
        })
}
