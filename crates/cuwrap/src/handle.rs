//! Proxies over raw driver handles.
//!
//! A [`Handle`] pairs a raw handle with the device it lives on and records
//! whether this proxy owns the resource. Owning proxies destroy the resource
//! when dropped; observing proxies (clones, wrapped external handles, the
//! default stream) never do. Any number of observing proxies may alias one
//! handle.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use cuwrap_core::{check, Result};
use cuwrap_driver::cuda_error_name;
use cuwrap_driver::sys::{CUresult, CUDA_SUCCESS};

use crate::runtime::{DeviceId, Runtime};

/// Whether dropping a proxy releases the underlying resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owning,
    Observing,
}

/// A kind of driver resource: how to name it and how to destroy it.
pub trait ResourceKind: 'static {
    /// Lower-case name used in messages ("stream", "event", ...).
    const KIND: &'static str;

    type Raw: Copy + PartialEq;

    /// Numeric value of the handle, used for display.
    fn address(raw: Self::Raw) -> u64;

    /// Destroy the resource. Called at most once per owned handle.
    fn destroy(runtime: &Arc<Runtime>, device: DeviceId, raw: Self::Raw) -> CUresult;

    fn identify(raw: Self::Raw, device: DeviceId) -> String {
        format!("{} {:#x} on device {}", Self::KIND, Self::address(raw), device)
    }
}

pub struct Handle<K: ResourceKind> {
    raw: K::Raw,
    device: DeviceId,
    ownership: Ownership,
    runtime: Arc<Runtime>,
}

// SAFETY: raw driver handles may be used from any thread; the driver
// serializes access internally.
unsafe impl<K: ResourceKind> Send for Handle<K> {}
unsafe impl<K: ResourceKind> Sync for Handle<K> {}

impl<K: ResourceKind> Handle<K> {
    pub fn new(runtime: Arc<Runtime>, device: DeviceId, raw: K::Raw, ownership: Ownership) -> Self {
        Self { raw, device, ownership, runtime }
    }

    pub fn owning(runtime: Arc<Runtime>, device: DeviceId, raw: K::Raw) -> Self {
        Self::new(runtime, device, raw, Ownership::Owning)
    }

    pub fn observing(runtime: Arc<Runtime>, device: DeviceId, raw: K::Raw) -> Self {
        Self::new(runtime, device, raw, Ownership::Observing)
    }

    pub fn raw(&self) -> K::Raw {
        self.raw
    }

    pub fn device_id(&self) -> DeviceId {
        self.device
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owning(&self) -> bool {
        self.ownership == Ownership::Owning
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Human-readable identifier, e.g. `stream 0x7f00 on device 2`.
    pub fn identify(&self) -> String {
        K::identify(self.raw, self.device)
    }

    /// Destroy the resource now if this proxy owns it. Later calls, and the
    /// eventual drop, do nothing.
    pub fn release(&mut self) -> Result<()> {
        if !self.is_owning() {
            return Ok(());
        }
        self.ownership = Ownership::Observing;
        let res = K::destroy(&self.runtime, self.device, self.raw);
        check(res, || format!("destroying {}", self.identify()))?;
        debug!("destroyed {}", self.identify());
        Ok(())
    }

    /// Stop owning the resource without destroying it.
    pub fn disown(&mut self) -> K::Raw {
        self.ownership = Ownership::Observing;
        self.raw
    }

    /// Consume the proxy, leaving the resource alive and returning its handle.
    pub fn into_raw(mut self) -> K::Raw {
        self.disown()
    }
}

/// Clones observe; ownership is never duplicated.
impl<K: ResourceKind> Clone for Handle<K> {
    fn clone(&self) -> Self {
        Self::observing(Arc::clone(&self.runtime), self.device, self.raw)
    }
}

impl<K: ResourceKind> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.device == other.device && self.raw == other.raw
    }
}

impl<K: ResourceKind> Eq for Handle<K> {}

impl<K: ResourceKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &K::KIND)
            .field("raw", &format_args!("{:#x}", K::address(self.raw)))
            .field("device", &self.device)
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl<K: ResourceKind> Drop for Handle<K> {
    fn drop(&mut self) {
        if !self.is_owning() {
            return;
        }
        let res = K::destroy(&self.runtime, self.device, self.raw);
        if res != CUDA_SUCCESS {
            warn!(
                "failed to destroy {}: {} ({})",
                self.identify(),
                cuda_error_name(res),
                res
            );
        }
    }
}
