//! Safe proxies over the CUDA driver API: devices, contexts, streams, events,
//! modules and kernels, with per-thread context scoping and kernel launch
//! dispatch including occupancy-based launch configuration.

pub mod runtime;
pub mod handle;
pub mod context;
pub mod device;
pub mod stream;
pub mod event;
pub mod module;
pub mod kernel;
pub mod launch;
pub mod occupancy;
pub mod params;
pub mod enqueue;
pub mod memory;

pub use context::{current, Context};
pub use device::{ComputeCapability, Device};
pub use enqueue::{enqueue_launch, launch, LaunchTarget, RawKernel};
pub use event::{Event, EventFlags};
pub use handle::{Handle, Ownership, ResourceKind};
pub use kernel::{CachePreference, Kernel, KernelAttribute, KernelAttributes, SharedMemoryBankSize};
pub use launch::{Dim3, GridParams, LaunchConfig};
pub use memory::DeviceBuffer;
pub use module::Module;
pub use occupancy::{min_grid_params_for_max_occupancy, min_grid_params_for_max_occupancy_with};
pub use params::{ByValue, KernelArgs, KernelParameter, KernelParams};
pub use runtime::{DeviceId, Runtime};
pub use stream::Stream;

pub use cuwrap_core::{CuwrapConfig, Error, Result};
pub use cuwrap_driver as driver;
