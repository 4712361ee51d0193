use std::borrow::Cow;
use std::sync::Arc;

use tracing::debug;

use cuwrap_core::{Error, Result};
use cuwrap_driver::sys::{CUmodule, CUresult};

use crate::context::{current, Context};
use crate::device::Device;
use crate::handle::{Handle, ResourceKind};
use crate::kernel::Kernel;
use crate::runtime::{DeviceId, Runtime};

pub struct ModuleKind;

impl ResourceKind for ModuleKind {
    const KIND: &'static str = "module";
    type Raw = CUmodule;

    fn address(raw: CUmodule) -> u64 {
        raw as usize as u64
    }

    fn destroy(runtime: &Arc<Runtime>, _device: DeviceId, raw: CUmodule) -> CUresult {
        runtime.driver().module_unload(raw)
    }
}

/// A loaded PTX or cubin image.
///
/// Kernels obtained from a module do not keep it loaded; drop the module
/// only once its kernels are no longer launched.
#[derive(Debug)]
pub struct Module {
    handle: Handle<ModuleKind>,
    context: Context,
}

impl Module {
    /// Load `image` into the primary context of `device`.
    pub fn load(device: &Device, image: &[u8]) -> Result<Module> {
        Self::load_in(&device.primary_context()?, image)
    }

    /// Load `image` into `context`. PTX text need not be NUL-terminated.
    pub fn load_in(context: &Context, image: &[u8]) -> Result<Module> {
        let image: Cow<'_, [u8]> = if image.last() == Some(&0) {
            Cow::Borrowed(image)
        } else {
            let mut owned = image.to_vec();
            owned.push(0);
            Cow::Owned(owned)
        };

        let runtime = context.runtime();
        let raw = current::with_override(runtime, context, || {
            runtime.driver().module_load_data(&image).map_err(|code| {
                Error::driver(
                    code,
                    format!("loading a {}-byte module into {}", image.len(), context.identify()),
                )
            })
        })?;
        debug!(device = context.device_id(), "loaded module {:p}", raw);
        Ok(Module {
            handle: Handle::owning(Arc::clone(runtime), context.device_id(), raw),
            context: context.clone(),
        })
    }

    pub fn raw(&self) -> CUmodule {
        self.handle.raw()
    }

    pub fn device_id(&self) -> DeviceId {
        self.handle.device_id()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn identify(&self) -> String {
        self.handle.identify()
    }

    /// Look up the kernel named `name`.
    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        let runtime = self.context.runtime();
        let raw = current::with_override(runtime, &self.context, || {
            runtime.driver().module_get_function(self.raw(), name).map_err(|code| {
                Error::driver(code, format!("looking up kernel `{}` in {}", name, self.identify()))
            })
        })?;
        Ok(Kernel::wrap(&self.context, raw))
    }
}
