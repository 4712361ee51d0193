use std::fmt;
use std::sync::Arc;

use cuwrap_core::{Error, Result};
use cuwrap_driver::sys::*;

use crate::context::{current, Context};
use crate::event::{Event, EventFlags};
use crate::runtime::{DeviceId, Runtime};
use crate::stream::Stream;

/// A compute capability or virtual architecture, e.g. 8.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputeCapability {
    pub major: u32,
    pub minor: u32,
}

impl ComputeCapability {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Decode the `major * 10 + minor` form used by kernel attributes.
    pub fn from_combined(combined: u32) -> Self {
        Self { major: combined / 10, minor: combined % 10 }
    }

    pub fn as_combined(self) -> u32 {
        self.major * 10 + self.minor
    }
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A device, identified by its ordinal.
#[derive(Clone)]
pub struct Device {
    runtime: Arc<Runtime>,
    id: DeviceId,
    native: CUdevice,
}

impl Device {
    /// Look up device `id`, which must be below the device count.
    pub fn get(runtime: &Arc<Runtime>, id: DeviceId) -> Result<Device> {
        let count = runtime.device_count()?;
        if id < 0 || id >= count {
            return Err(Error::InvalidArgument(format!(
                "device {} does not exist ({} device(s) present)",
                id, count
            )));
        }
        let native = runtime.native_device(id)?;
        Ok(Device { runtime: Arc::clone(runtime), id, native })
    }

    /// The device of the calling thread's current context (or the configured
    /// default device if none is current).
    pub fn current(runtime: &Arc<Runtime>) -> Result<Device> {
        let id = current::device_id(runtime)?;
        Self::get(runtime, id)
    }

    pub fn count(runtime: &Runtime) -> Result<i32> {
        runtime.device_count()
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn name(&self) -> Result<String> {
        self.runtime
            .driver()
            .device_get_name(self.native)
            .map_err(|code| Error::driver(code, format!("reading the name of device {}", self.id)))
    }

    pub fn attribute(&self, attrib: i32) -> Result<i32> {
        self.runtime
            .driver()
            .device_get_attribute(attrib, self.native)
            .map_err(|code| {
                Error::driver(code, format!("reading attribute {} of device {}", attrib, self.id))
            })
    }

    pub fn compute_capability(&self) -> Result<ComputeCapability> {
        let major = self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?;
        let minor = self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?;
        Ok(ComputeCapability::new(major as u32, minor as u32))
    }

    pub fn primary_context(&self) -> Result<Context> {
        Context::primary(&self.runtime, self.id)
    }

    /// The default stream of this device. Never owned.
    pub fn default_stream(&self) -> Stream {
        Stream::default_of(&self.runtime, self.id)
    }

    pub fn create_stream(&self, synchronizes_with_default: bool, priority: i32) -> Result<Stream> {
        Stream::create(self, synchronizes_with_default, priority)
    }

    pub fn create_event(&self, flags: EventFlags) -> Result<Event> {
        Event::create(self, flags)
    }

    /// Block until all work on this device's primary context has completed.
    pub fn synchronize(&self) -> Result<()> {
        self.primary_context()?.synchronize()
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("id", &self.id).finish()
    }
}
