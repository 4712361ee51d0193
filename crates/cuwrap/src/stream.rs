use std::sync::Arc;

use tracing::debug;

use cuwrap_core::{check, Error, Result};
use cuwrap_driver::sys::*;

use crate::context::current;
use crate::device::Device;
use crate::event::{Event, EventFlags};
use crate::handle::{Handle, ResourceKind};
use crate::runtime::{DeviceId, Runtime};

pub struct StreamKind;

impl ResourceKind for StreamKind {
    const KIND: &'static str = "stream";
    type Raw = CUstream;

    fn address(raw: CUstream) -> u64 {
        raw as usize as u64
    }

    fn destroy(runtime: &Arc<Runtime>, _device: DeviceId, raw: CUstream) -> CUresult {
        runtime.driver().stream_destroy(raw)
    }

    fn identify(raw: CUstream, device: DeviceId) -> String {
        if raw.is_null() {
            format!("the default stream on device {}", device)
        } else {
            format!("stream {:#x} on device {}", raw as usize, device)
        }
    }
}

/// A queue of work on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    handle: Handle<StreamKind>,
}

impl Stream {
    /// Create a stream on `device`. Unless `synchronizes_with_default` is set,
    /// work on it may run concurrently with the device's default stream.
    /// Lower `priority` values mean higher priority.
    pub fn create(
        device: &Device,
        synchronizes_with_default: bool,
        priority: i32,
    ) -> Result<Stream> {
        let runtime = device.runtime();
        let flags = if synchronizes_with_default {
            CU_STREAM_DEFAULT
        } else {
            CU_STREAM_NON_BLOCKING
        };
        let raw = current::with_override(runtime, device, || {
            runtime.driver().stream_create_with_priority(flags, priority).map_err(|code| {
                Error::driver(code, format!("creating a stream on device {}", device.id()))
            })
        })?;
        debug!(device = device.id(), priority, "created stream {:p}", raw);
        Ok(Stream { handle: Handle::owning(Arc::clone(runtime), device.id(), raw) })
    }

    pub(crate) fn default_of(runtime: &Arc<Runtime>, device: DeviceId) -> Stream {
        Stream { handle: Handle::observing(Arc::clone(runtime), device, DEFAULT_STREAM) }
    }

    /// Observe an existing stream without taking ownership.
    pub fn wrap(device: &Device, raw: CUstream) -> Stream {
        Stream { handle: Handle::observing(Arc::clone(device.runtime()), device.id(), raw) }
    }

    pub fn raw(&self) -> CUstream {
        self.handle.raw()
    }

    pub fn device_id(&self) -> DeviceId {
        self.handle.device_id()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        self.handle.runtime()
    }

    pub fn is_default(&self) -> bool {
        self.raw().is_null()
    }

    pub fn handle(&self) -> &Handle<StreamKind> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut Handle<StreamKind> {
        &mut self.handle
    }

    pub fn identify(&self) -> String {
        self.handle.identify()
    }

    /// Give up ownership, leaving the resource alive.
    pub fn into_raw(self) -> CUstream {
        self.handle.into_raw()
    }

    /// Block until all work queued on this stream has completed.
    pub fn synchronize(&self) -> Result<()> {
        current::with_override(self.runtime(), self.device_id(), || {
            check(self.runtime().driver().stream_synchronize(self.raw()), || {
                format!("synchronizing {}", self.identify())
            })
        })
    }

    /// Whether all queued work has completed.
    pub fn is_idle(&self) -> Result<bool> {
        current::with_override(self.runtime(), self.device_id(), || {
            match self.runtime().driver().stream_query(self.raw()) {
                CUDA_SUCCESS => Ok(true),
                CUDA_ERROR_NOT_READY => Ok(false),
                code => Err(Error::driver(code, format!("querying {}", self.identify()))),
            }
        })
    }

    /// Record `event` once the work queued so far has completed.
    pub fn enqueue_event(&self, event: &Event) -> Result<()> {
        if event.device_id() != self.device_id() {
            return Err(Error::InvalidArgument(format!(
                "cannot record {} on {}: they belong to different devices",
                event.identify(),
                self.identify()
            )));
        }
        current::with_override(self.runtime(), self.device_id(), || {
            check(self.runtime().driver().event_record(event.raw(), self.raw()), || {
                format!("recording {} on {}", event.identify(), self.identify())
            })
        })
    }

    /// Create an event and record it on this stream.
    pub fn record_new_event(&self, flags: EventFlags) -> Result<Event> {
        let device = Device::get(self.runtime(), self.device_id())?;
        let event = Event::create(&device, flags)?;
        self.enqueue_event(&event)?;
        Ok(event)
    }

    /// Make later work on this stream wait until `event` has occurred.
    /// The event may belong to another device.
    pub fn wait(&self, event: &Event) -> Result<()> {
        current::with_override(self.runtime(), self.device_id(), || {
            check(self.runtime().driver().stream_wait_event(self.raw(), event.raw(), 0), || {
                format!("making {} wait for {}", self.identify(), event.identify())
            })
        })
    }
}
