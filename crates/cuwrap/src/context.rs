//! Contexts and the per-thread ambient "current context".
//!
//! The driver keeps one current context per thread and every call acts on
//! it. [`current`] mirrors that state in a thread-local so repeated lookups
//! and redundant switches cost nothing, and [`current::ScopedOverride`]
//! switches it for the duration of a scope, restoring the previous context on
//! every exit path.

use std::sync::Arc;

use cuwrap_core::{check, Error, Result};
use cuwrap_driver::sys::{CUcontext, CUresult, CUDA_SUCCESS};

use crate::handle::{Handle, ResourceKind};
use crate::runtime::{DeviceId, Runtime};

pub struct ContextKind;

impl ResourceKind for ContextKind {
    const KIND: &'static str = "context";
    type Raw = CUcontext;

    fn address(raw: CUcontext) -> u64 {
        raw as usize as u64
    }

    fn destroy(runtime: &Arc<Runtime>, _device: DeviceId, raw: CUcontext) -> CUresult {
        current::forget(runtime, raw);
        runtime.driver().ctx_destroy(raw)
    }
}

/// A context bound to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    handle: Handle<ContextKind>,
}

impl Context {
    /// Create a new context on `device`, owned by the returned proxy.
    /// The calling thread's current context is left unchanged.
    pub fn create(runtime: &Arc<Runtime>, device: DeviceId, flags: u32) -> Result<Context> {
        let driver = runtime.driver();
        let native = runtime.native_device(device)?;
        let raw = driver.ctx_create(flags, native).map_err(|code| {
            Error::driver(code, format!("creating a context on device {}", device))
        })?;
        // cuCtxCreate pushes the new context; undo that.
        if let Err(code) = driver.ctx_pop_current() {
            let res = driver.ctx_destroy(raw);
            if res != CUDA_SUCCESS {
                tracing::warn!(
                    device,
                    "failed to destroy context {:p}: {} ({})",
                    raw,
                    cuwrap_driver::cuda_error_name(res),
                    res
                );
            }
            return Err(Error::driver(
                code,
                format!("deactivating new context on device {}", device),
            ));
        }
        tracing::debug!(device, "created context {:p}", raw);
        Ok(Context { handle: Handle::owning(Arc::clone(runtime), device, raw) })
    }

    /// The primary context of `device`. The runtime keeps it retained.
    pub fn primary(runtime: &Arc<Runtime>, device: DeviceId) -> Result<Context> {
        let raw = runtime.primary_context(device)?;
        Ok(Context::wrap(runtime, device, raw))
    }

    /// Observe an existing context without taking ownership.
    pub fn wrap(runtime: &Arc<Runtime>, device: DeviceId, raw: CUcontext) -> Context {
        Context { handle: Handle::observing(Arc::clone(runtime), device, raw) }
    }

    pub fn raw(&self) -> CUcontext {
        self.handle.raw()
    }

    pub fn device_id(&self) -> DeviceId {
        self.handle.device_id()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        self.handle.runtime()
    }

    pub fn handle(&self) -> &Handle<ContextKind> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut Handle<ContextKind> {
        &mut self.handle
    }

    pub fn identify(&self) -> String {
        self.handle.identify()
    }

    /// Give up ownership, leaving the resource alive.
    pub fn into_raw(self) -> CUcontext {
        self.handle.into_raw()
    }

    /// Block until all work in this context has completed.
    pub fn synchronize(&self) -> Result<()> {
        let _guard = current::scoped_override(self.runtime(), self)?;
        check(self.runtime().driver().ctx_synchronize(), || {
            format!("synchronizing {}", self.identify())
        })
    }
}

pub mod current {
    //! The calling thread's current context.

    use std::cell::RefCell;
    use std::marker::PhantomData;
    use std::sync::Arc;

    use tracing::{debug, warn};

    use cuwrap_core::{check, Error, Result};
    use cuwrap_driver::cuda_error_name;
    use cuwrap_driver::sys::{CUcontext, CUDA_SUCCESS};

    use super::Context;
    use crate::device::Device;
    use crate::runtime::{DeviceId, Runtime};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Active {
        raw: CUcontext,
        device: DeviceId,
    }

    #[derive(Debug, Clone, Copy)]
    enum Ambient {
        /// Not yet read from the driver on this thread.
        Unset,
        /// Known value for the runtime with id `owner`; `None` means no context.
        Known { owner: u64, active: Option<Active> },
    }

    thread_local! {
        static AMBIENT: RefCell<Ambient> = const { RefCell::new(Ambient::Unset) };
    }

    fn store(runtime: &Runtime, active: Option<Active>) {
        let owner = runtime.id();
        AMBIENT.with(|a| *a.borrow_mut() = Ambient::Known { owner, active });
    }

    fn invalidate() {
        AMBIENT.with(|a| *a.borrow_mut() = Ambient::Unset);
    }

    /// The cached value, adopting the driver's current context on first use.
    fn resolve(runtime: &Runtime) -> Result<Option<Active>> {
        let cached = AMBIENT.with(|a| *a.borrow());
        if let Ambient::Known { owner, active } = cached {
            if owner == runtime.id() {
                return Ok(active);
            }
        }

        let driver = runtime.driver();
        let raw = driver
            .ctx_get_current()
            .map_err(|code| Error::driver(code, "reading the current context"))?;
        let active = if raw.is_null() {
            None
        } else {
            let device = driver
                .ctx_get_device()
                .map_err(|code| Error::driver(code, "reading the device of the current context"))?;
            Some(Active { raw, device })
        };
        debug!("adopted current context {:?}", active);
        store(runtime, active);
        Ok(active)
    }

    /// The current context, or `NoActiveContext` if there is none.
    pub fn get(runtime: &Arc<Runtime>) -> Result<Context> {
        match resolve(runtime)? {
            Some(active) => Ok(Context::wrap(runtime, active.device, active.raw)),
            None => Err(Error::NoActiveContext),
        }
    }

    /// Device of the current context; the configured default device when no
    /// context is current.
    pub fn device_id(runtime: &Runtime) -> Result<DeviceId> {
        Ok(match resolve(runtime)? {
            Some(active) => active.device,
            None => runtime.config().device.default,
        })
    }

    /// The current context as an override target, if any context is current.
    pub(crate) fn active(runtime: &Runtime) -> Result<Option<Target>> {
        Ok(resolve(runtime)?.map(|a| Target::Context { raw: a.raw, device: a.device }))
    }

    /// Make `raw` (a context on `device`) current, unconditionally.
    pub(crate) fn set(runtime: &Runtime, raw: CUcontext, device: DeviceId) -> Result<()> {
        if let Err(e) = check(runtime.driver().ctx_set_current(raw), || {
            format!("making context {:p} on device {} current", raw, device)
        }) {
            invalidate();
            return Err(e);
        }
        let active = if raw.is_null() { None } else { Some(Active { raw, device }) };
        store(runtime, active);
        Ok(())
    }

    /// Drop the cached value if it names `raw`, which is about to be destroyed.
    pub(crate) fn forget(runtime: &Runtime, raw: CUcontext) {
        AMBIENT.with(|a| {
            let mut a = a.borrow_mut();
            if let Ambient::Known { owner, active: Some(active) } = *a {
                if owner == runtime.id() && active.raw == raw {
                    *a = Ambient::Unset;
                }
            }
        });
    }

    /// What a scoped override switches to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Target {
        /// A specific context.
        Context { raw: CUcontext, device: DeviceId },
        /// The primary context of a device.
        Device(DeviceId),
    }

    impl From<&Context> for Target {
        fn from(ctx: &Context) -> Self {
            Target::Context { raw: ctx.raw(), device: ctx.device_id() }
        }
    }

    impl From<&Device> for Target {
        fn from(device: &Device) -> Self {
            Target::Device(device.id())
        }
    }

    impl From<DeviceId> for Target {
        fn from(device: DeviceId) -> Self {
            Target::Device(device)
        }
    }

    /// Restores the previously current context when dropped.
    ///
    /// Not `Send`: the restore must happen on the thread whose state was changed.
    #[derive(Debug)]
    #[must_use = "the previous context is restored as soon as the guard is dropped"]
    pub struct ScopedOverride {
        runtime: Arc<Runtime>,
        previous: Option<Active>,
        switched: bool,
        _not_send: PhantomData<*const ()>,
    }

    impl ScopedOverride {
        /// Whether entering the scope changed the current context.
        pub fn switched(&self) -> bool {
            self.switched
        }
    }

    impl Drop for ScopedOverride {
        fn drop(&mut self) {
            if !self.switched {
                return;
            }
            let (raw, device) = match self.previous {
                Some(p) => (p.raw, p.device),
                None => (std::ptr::null_mut(), -1),
            };
            let res = self.runtime.driver().ctx_set_current(raw);
            if res == CUDA_SUCCESS {
                store(&self.runtime, self.previous);
            } else {
                invalidate();
                warn!(
                    "failed to restore context {:p} (device {}): {} ({})",
                    raw,
                    device,
                    cuda_error_name(res),
                    res
                );
            }
        }
    }

    /// Make `target` current until the returned guard is dropped.
    /// Switching to the context that is already current skips the driver.
    pub fn scoped_override(
        runtime: &Arc<Runtime>,
        target: impl Into<Target>,
    ) -> Result<ScopedOverride> {
        let previous = resolve(runtime)?;
        let wanted = match target.into() {
            Target::Context { raw, device } => Active { raw, device },
            Target::Device(device) => Active { raw: runtime.primary_context(device)?, device },
        };

        let switched = previous.map(|p| p.raw) != Some(wanted.raw);
        if switched {
            set(runtime, wanted.raw, wanted.device)?;
        }
        Ok(ScopedOverride {
            runtime: Arc::clone(runtime),
            previous,
            switched,
            _not_send: PhantomData,
        })
    }

    /// Run `f` with `target` current.
    pub fn with_override<T>(
        runtime: &Arc<Runtime>,
        target: impl Into<Target>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let _guard = scoped_override(runtime, target)?;
        f()
    }
}
