use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use tracing::debug;

use cuwrap_core::{check, Error, Result};
use cuwrap_driver::sys::*;

use crate::context::current;
use crate::device::Device;
use crate::handle::{Handle, ResourceKind};
use crate::runtime::{DeviceId, Runtime};
use crate::stream::Stream;

bitflags! {
    /// Creation flags of an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFlags: u32 {
        /// Waiting threads block instead of spinning.
        const BLOCKING_SYNC = CU_EVENT_BLOCKING_SYNC;
        /// The event records no timestamp.
        const DISABLE_TIMING = CU_EVENT_DISABLE_TIMING;
        /// The event may be shared with other processes.
        const INTERPROCESS = CU_EVENT_INTERPROCESS;
    }
}

impl EventFlags {
    pub fn new(uses_blocking_sync: bool, records_timing: bool, interprocess: bool) -> Self {
        let mut flags = EventFlags::empty();
        flags.set(EventFlags::BLOCKING_SYNC, uses_blocking_sync);
        flags.set(EventFlags::DISABLE_TIMING, !records_timing);
        flags.set(EventFlags::INTERPROCESS, interprocess);
        flags
    }
}

impl Default for EventFlags {
    /// Spinning wait, timing enabled, process-local.
    fn default() -> Self {
        EventFlags::empty()
    }
}

pub struct EventKind;

impl ResourceKind for EventKind {
    const KIND: &'static str = "event";
    type Raw = CUevent;

    fn address(raw: CUevent) -> u64 {
        raw as usize as u64
    }

    fn destroy(runtime: &Arc<Runtime>, _device: DeviceId, raw: CUevent) -> CUresult {
        runtime.driver().event_destroy(raw)
    }
}

/// A synchronization marker recorded on a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    handle: Handle<EventKind>,
}

impl Event {
    pub fn create(device: &Device, flags: EventFlags) -> Result<Event> {
        if flags.contains(EventFlags::INTERPROCESS) && !flags.contains(EventFlags::DISABLE_TIMING) {
            return Err(Error::InvalidArgument(
                "an inter-process event cannot record timing".to_string(),
            ));
        }
        let runtime = device.runtime();
        let raw = current::with_override(runtime, device, || {
            runtime.driver().event_create(flags.bits()).map_err(|code| {
                Error::driver(code, format!("creating an event on device {}", device.id()))
            })
        })?;
        debug!(device = device.id(), ?flags, "created event {:p}", raw);
        Ok(Event { handle: Handle::owning(Arc::clone(runtime), device.id(), raw) })
    }

    /// Observe an existing event without taking ownership.
    pub fn wrap(device: &Device, raw: CUevent) -> Event {
        Event { handle: Handle::observing(Arc::clone(device.runtime()), device.id(), raw) }
    }

    pub fn raw(&self) -> CUevent {
        self.handle.raw()
    }

    pub fn device_id(&self) -> DeviceId {
        self.handle.device_id()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        self.handle.runtime()
    }

    pub fn handle(&self) -> &Handle<EventKind> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut Handle<EventKind> {
        &mut self.handle
    }

    pub fn identify(&self) -> String {
        self.handle.identify()
    }

    /// Give up ownership, leaving the resource alive.
    pub fn into_raw(self) -> CUevent {
        self.handle.into_raw()
    }

    /// Record this event on `stream`, which must be on the same device.
    pub fn record(&self, stream: &Stream) -> Result<()> {
        stream.enqueue_event(self)
    }

    /// Record this event on `stream` and wait for it to occur.
    pub fn fire(&self, stream: &Stream) -> Result<()> {
        self.record(stream)?;
        stream.synchronize()
    }

    /// Block until the event has occurred.
    pub fn synchronize(&self) -> Result<()> {
        current::with_override(self.runtime(), self.device_id(), || {
            check(self.runtime().driver().event_synchronize(self.raw()), || {
                format!("synchronizing {}", self.identify())
            })
        })
    }

    /// Whether the work preceding the last recording has completed.
    pub fn has_occurred(&self) -> Result<bool> {
        current::with_override(self.runtime(), self.device_id(), || {
            match self.runtime().driver().event_query(self.raw()) {
                CUDA_SUCCESS => Ok(true),
                CUDA_ERROR_NOT_READY => Ok(false),
                code => Err(Error::driver(code, format!("querying {}", self.identify()))),
            }
        })
    }

    /// Time elapsed between two recorded events.
    pub fn elapsed_between(start: &Event, end: &Event) -> Result<Duration> {
        let ms = current::with_override(start.runtime(), start.device_id(), || {
            start
                .runtime()
                .driver()
                .event_elapsed_time(start.raw(), end.raw())
                .map_err(|code| {
                    Error::driver(
                        code,
                        format!(
                            "measuring time between {} and {}",
                            start.identify(),
                            end.identify()
                        ),
                    )
                })
        })?;
        Ok(Duration::from_secs_f64(f64::from(ms.max(0.0)) / 1000.0))
    }
}

pub mod ipc {
    //! Sharing events between processes.

    use std::sync::Arc;

    use cuwrap_core::{Error, Result};
    use cuwrap_driver::sys::CUipcEventHandle;
    use cuwrap_driver::Capability;

    use super::{Event, EventKind};
    use crate::context::current;
    use crate::device::Device;
    use crate::handle::Handle;

    pub type IpcHandle = CUipcEventHandle;

    /// Export an event created with [`EventFlags::INTERPROCESS`](super::EventFlags::INTERPROCESS).
    pub fn export(event: &Event) -> Result<IpcHandle> {
        let runtime = event.runtime();
        runtime.require(Capability::InterprocessEvents)?;
        current::with_override(runtime, event.device_id(), || {
            runtime.driver().ipc_get_event_handle(event.raw()).map_err(|code| {
                Error::driver(code, format!("exporting {}", event.identify()))
            })
        })
    }

    /// Open an event exported by another process. The returned proxy does not
    /// own the event.
    pub fn import(device: &Device, handle: IpcHandle) -> Result<Event> {
        let runtime = device.runtime();
        runtime.require(Capability::InterprocessEvents)?;
        let raw = current::with_override(runtime, device, || {
            runtime.driver().ipc_open_event_handle(handle).map_err(|code| {
                Error::driver(code, format!("importing an event on device {}", device.id()))
            })
        })?;
        Ok(Event { handle: Handle::<EventKind>::observing(Arc::clone(runtime), device.id(), raw) })
    }
}
