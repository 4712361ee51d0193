use std::fmt;

use cuwrap_core::{Error, Result};
use cuwrap_driver::sys::*;

use crate::device::Device;
use crate::kernel::Kernel;
use crate::occupancy;

/// Extent of a grid (in blocks) or a block (in threads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dim3 {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn linear(x: u32) -> Self {
        Self { x, y: 1, z: 1 }
    }

    pub fn volume(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }

    pub fn as_array(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    fn has_zero(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

impl From<u32> for Dim3 {
    fn from(x: u32) -> Self {
        Dim3::linear(x)
    }
}

impl From<(u32, u32)> for Dim3 {
    fn from((x, y): (u32, u32)) -> Self {
        Dim3::new(x, y, 1)
    }
}

impl From<(u32, u32, u32)> for Dim3 {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Dim3::new(x, y, z)
    }
}

impl From<[u32; 3]> for Dim3 {
    fn from([x, y, z]: [u32; 3]) -> Self {
        Dim3::new(x, y, z)
    }
}

/// Result of an occupancy search: the smallest grid that keeps every
/// multiprocessor fully occupied, and the block size achieving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridParams {
    pub grid_size_in_blocks: u32,
    pub block_size: u32,
}

/// Shape and resources of one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid: Dim3,
    pub block: Dim3,
    /// Bytes of dynamic shared memory per block.
    pub dynamic_shared_mem: u32,
    /// Launch so that all blocks may synchronize with each other.
    pub cooperative: bool,
}

impl LaunchConfig {
    pub fn new(grid: impl Into<Dim3>, block: impl Into<Dim3>) -> Self {
        Self {
            grid: grid.into(),
            block: block.into(),
            dynamic_shared_mem: 0,
            cooperative: false,
        }
    }

    /// A 1-D launch with enough blocks of `block_size` threads to cover `num_elements`.
    pub fn for_num_elements(num_elements: u32, block_size: u32) -> Self {
        let blocks = if block_size == 0 { 0 } else { num_elements.div_ceil(block_size) };
        Self::new(blocks, block_size)
    }

    pub fn with_dynamic_shared_mem(mut self, bytes: u32) -> Self {
        self.dynamic_shared_mem = bytes;
        self
    }

    pub fn with_cooperative(mut self, cooperative: bool) -> Self {
        self.cooperative = cooperative;
        self
    }

    /// A 1-D configuration giving `kernel` maximal occupancy on its device.
    pub fn for_max_occupancy(
        kernel: &Kernel,
        dynamic_shared_mem: u32,
        block_size_limit: u32,
    ) -> Result<Self> {
        let params = occupancy::min_grid_params_for_max_occupancy(
            kernel,
            dynamic_shared_mem as usize,
            block_size_limit,
            false,
        )?;
        Ok(Self::new(params.grid_size_in_blocks, params.block_size)
            .with_dynamic_shared_mem(dynamic_shared_mem))
    }

    pub fn total_threads(&self) -> u64 {
        self.grid.volume() * self.block.volume()
    }

    /// Reject shapes no device accepts.
    pub fn validate(&self) -> Result<()> {
        if self.grid.has_zero() {
            return Err(Error::InvalidArgument(format!(
                "grid dimensions must all be positive (got {})",
                self.grid
            )));
        }
        if self.block.has_zero() {
            return Err(Error::InvalidArgument(format!(
                "block dimensions must all be positive (got {})",
                self.block
            )));
        }
        Ok(())
    }

    /// Check the launch against the hardware limits of `device`.
    pub fn validate_for(&self, device: &Device) -> Result<()> {
        self.validate()?;

        let max_threads = device.attribute(CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?;
        if self.block.volume() > max_threads.max(0) as u64 {
            return Err(Error::InvalidArgument(format!(
                "block of {} ({} threads) exceeds the {} threads per block supported by device {}",
                self.block,
                self.block.volume(),
                max_threads,
                device.id()
            )));
        }

        let block_limits = [
            CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_X,
            CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Y,
            CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Z,
        ];
        let grid_limits = [
            CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_X,
            CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Y,
            CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Z,
        ];
        for (axis, name) in ["x", "y", "z"].iter().enumerate() {
            let limit = device.attribute(block_limits[axis])?.max(0) as u32;
            if self.block.as_array()[axis] > limit {
                return Err(Error::InvalidArgument(format!(
                    "block {} dimension {} exceeds device {} limit of {}",
                    name,
                    self.block.as_array()[axis],
                    device.id(),
                    limit
                )));
            }
            let limit = device.attribute(grid_limits[axis])?.max(0) as u32;
            if self.grid.as_array()[axis] > limit {
                return Err(Error::InvalidArgument(format!(
                    "grid {} dimension {} exceeds device {} limit of {}",
                    name,
                    self.grid.as_array()[axis],
                    device.id(),
                    limit
                )));
            }
        }

        let opt_in = device.attribute(CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK_OPTIN)?;
        let shared_limit = if opt_in > 0 {
            opt_in
        } else {
            device.attribute(CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK)?
        };
        if i64::from(self.dynamic_shared_mem) > i64::from(shared_limit) {
            return Err(Error::InvalidArgument(format!(
                "{} bytes of dynamic shared memory exceeds the {} bytes per block available on device {}",
                self.dynamic_shared_mem,
                shared_limit,
                device.id()
            )));
        }

        if self.cooperative && device.attribute(CU_DEVICE_ATTRIBUTE_COOPERATIVE_LAUNCH)? == 0 {
            return Err(Error::InvalidArgument(format!(
                "device {} does not support cooperative launches",
                device.id()
            )));
        }
        Ok(())
    }
}
