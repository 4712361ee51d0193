//! The loaded driver plus the per-process state every proxy shares.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use cuwrap_core::{check, CuwrapConfig, Error, Result};
use cuwrap_driver::sys::{CUcontext, CUdevice};
use cuwrap_driver::{cuda_error_name, Capability, CudaDriver, Driver};

/// Device ordinal as seen by the driver.
pub type DeviceId = i32;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

pub struct Runtime {
    /// Unique for the life of the process, never reused.
    id: u64,
    driver: Arc<dyn Driver>,
    driver_version: i32,
    /// Primary contexts retained by this runtime, released on drop.
    primary_contexts: DashMap<DeviceId, CUcontext>,
    config: CuwrapConfig,
}

// SAFETY: the cached context handles are only handed to the driver, which
// accepts them from any thread.
unsafe impl Send for Runtime {}
unsafe impl Sync for Runtime {}

impl Runtime {
    /// Load the driver library named by `config` (or the platform default) and
    /// initialize it.
    pub fn load(config: &CuwrapConfig) -> Result<Arc<Self>> {
        let driver = CudaDriver::load_from(config.driver.library.as_deref()).map_err(Error::Load)?;
        Self::with_driver(Arc::new(driver), config.clone())
    }

    /// Build a runtime over an already constructed driver.
    pub fn with_driver(driver: Arc<dyn Driver>, config: CuwrapConfig) -> Result<Arc<Self>> {
        let flags = config.driver.init_flags;
        check(driver.init(flags), || format!("initializing the driver with flags {:#x}", flags))?;
        let driver_version = driver
            .driver_get_version()
            .map_err(|code| Error::driver(code, "querying the driver version"))?;
        info!(driver_version, "driver initialized");

        Ok(Arc::new(Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            driver,
            driver_version,
            primary_contexts: DashMap::new(),
            config,
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Driver version as reported by `cuDriverGetVersion` (e.g. 12040 for 12.4).
    pub fn driver_version(&self) -> i32 {
        self.driver_version
    }

    pub fn config(&self) -> &CuwrapConfig {
        &self.config
    }

    pub fn device_count(&self) -> Result<i32> {
        self.driver
            .device_get_count()
            .map_err(|code| Error::driver(code, "counting devices"))
    }

    /// Fail with `NotYetImplemented` unless the loaded driver supports `capability`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        let required = capability.minimum_driver_version();
        if self.driver_version < required || !self.driver.provides(capability) {
            return Err(Error::NotYetImplemented {
                feature: capability.name().to_string(),
                required,
                found: self.driver_version,
            });
        }
        Ok(())
    }

    pub(crate) fn native_device(&self, device: DeviceId) -> Result<CUdevice> {
        self.driver
            .device_get(device)
            .map_err(|code| Error::driver(code, format!("looking up device {}", device)))
    }

    /// The primary context of `device`, retained on first use.
    pub(crate) fn primary_context(&self, device: DeviceId) -> Result<CUcontext> {
        match self.primary_contexts.entry(device) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let native = self.native_device(device)?;
                let ctx = self.driver.device_primary_ctx_retain(native).map_err(|code| {
                    let context = format!("retaining the primary context of device {}", device);
                    Error::driver(code, context)
                })?;
                debug!(device, "retained primary context {:p}", ctx);
                e.insert(ctx);
                Ok(ctx)
            }
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        for entry in self.primary_contexts.iter() {
            let device = *entry.key();
            let res = match self.driver.device_get(device) {
                Ok(native) => self.driver.device_primary_ctx_release(native),
                Err(code) => code,
            };
            if res != cuwrap_driver::sys::CUDA_SUCCESS {
                warn!(
                    device,
                    "failed to release primary context: {} ({})",
                    cuda_error_name(res),
                    res
                );
            }
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.id)
            .field("driver_version", &self.driver_version)
            .field("primary_contexts", &self.primary_contexts.len())
            .finish()
    }
}
