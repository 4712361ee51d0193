//! Kernel launches.
//!
//! A launch target is either a [`Kernel`] proxy, which knows its device and
//! is checked against the stream before anything reaches the driver, or a
//! [`RawKernel`], a bare function handle launched as given in the current
//! context. Both end in the same raw enqueue.

use std::ffi::c_void;
use std::sync::Arc;

use tracing::debug;

use cuwrap_core::{check, Error, Result};
use cuwrap_driver::sys::CUfunction;
use cuwrap_driver::Capability;

use crate::context::current::{self, Target};
use crate::device::Device;
use crate::kernel::Kernel;
use crate::launch::LaunchConfig;
use crate::params::{KernelArgs, KernelParams};
use crate::runtime::Runtime;
use crate::stream::Stream;

/// A function handle with no device or context attached.
#[derive(Clone)]
pub struct RawKernel {
    runtime: Arc<Runtime>,
    raw: CUfunction,
}

// SAFETY: function handles may be used from any thread.
unsafe impl Send for RawKernel {}
unsafe impl Sync for RawKernel {}

impl RawKernel {
    pub fn new(runtime: &Arc<Runtime>, raw: CUfunction) -> Self {
        Self { runtime: Arc::clone(runtime), raw }
    }

    pub fn raw(&self) -> CUfunction {
        self.raw
    }
}

impl std::fmt::Debug for RawKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawKernel({:p})", self.raw)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for &crate::kernel::Kernel {}
    impl Sealed for &super::RawKernel {}
}

/// Something that can be launched: `&Kernel` or `&RawKernel`.
pub trait LaunchTarget: sealed::Sealed {
    /// The function to launch on `stream`, and the context to launch it in.
    #[doc(hidden)]
    fn resolve(&self, stream: &Stream) -> Result<(CUfunction, Target)>;

    /// Stream used when the caller names none.
    #[doc(hidden)]
    fn implicit_stream(&self) -> Result<Stream>;

    fn describe(&self) -> String;
}

impl LaunchTarget for &Kernel {
    fn resolve(&self, stream: &Stream) -> Result<(CUfunction, Target)> {
        if self.device_id() != stream.device_id() {
            return Err(Error::InvalidArgument(format!(
                "cannot launch {} (device {}) on {} (device {})",
                self.identify(),
                self.device_id(),
                stream.identify(),
                stream.device_id()
            )));
        }
        Ok((self.raw(), Target::from(self.context())))
    }

    fn implicit_stream(&self) -> Result<Stream> {
        Ok(self.device()?.default_stream())
    }

    fn describe(&self) -> String {
        self.identify()
    }
}

impl LaunchTarget for &RawKernel {
    /// Launched in whatever context is current; the primary context of the
    /// stream's device only when none is.
    fn resolve(&self, stream: &Stream) -> Result<(CUfunction, Target)> {
        let context = match current::active(stream.runtime())? {
            Some(target) => target,
            None => Target::Device(stream.device_id()),
        };
        Ok((self.raw, context))
    }

    fn implicit_stream(&self) -> Result<Stream> {
        Ok(Device::current(&self.runtime)?.default_stream())
    }

    fn describe(&self) -> String {
        format!("raw kernel {:p}", self.raw)
    }
}

/// Enqueue a launch of `target` on `stream`.
///
/// # Safety
/// `args` must match the kernel's parameter list in number, order and
/// layout, and any pointers among them must be valid for the kernel's use.
pub unsafe fn enqueue_launch<T, A>(
    target: T,
    stream: &Stream,
    config: LaunchConfig,
    args: A,
) -> Result<()>
where
    T: LaunchTarget,
    A: KernelArgs,
{
    let (func, context) = target.resolve(stream)?;
    debug!("enqueueing {} on {}", target.describe(), stream.identify());
    unsafe { enqueue_raw(stream, func, context, &config, args.marshal()) }
}

/// Launch `target` on its implicit stream: the default stream of the
/// kernel's device, or of the current device for a raw kernel.
///
/// # Safety
/// Same requirements as [`enqueue_launch`].
pub unsafe fn launch<T, A>(target: T, config: LaunchConfig, args: A) -> Result<()>
where
    T: LaunchTarget,
    A: KernelArgs,
{
    let stream = target.implicit_stream()?;
    unsafe { enqueue_launch(target, &stream, config, args) }
}

unsafe fn enqueue_raw(
    stream: &Stream,
    func: CUfunction,
    context: Target,
    config: &LaunchConfig,
    mut params: KernelParams,
) -> Result<()> {
    let runtime = stream.runtime();
    if runtime.config().launch.check_limits {
        config.validate_for(&Device::get(runtime, stream.device_id())?)?;
    } else {
        config.validate()?;
    }
    if config.cooperative {
        runtime.require(Capability::CooperativeLaunch)?;
    }

    let _guard = current::scoped_override(runtime, context)?;
    let mut pointers: Vec<*mut c_void> = params.pointers();
    debug!(
        "launch(grid=[{}], block=[{}], shared={}, params={}, cooperative={})",
        config.grid,
        config.block,
        config.dynamic_shared_mem,
        pointers.len(),
        config.cooperative
    );

    let driver = runtime.driver();
    let res = if config.cooperative {
        unsafe {
            driver.launch_cooperative_kernel(
                func,
                config.grid.as_array(),
                config.block.as_array(),
                config.dynamic_shared_mem,
                stream.raw(),
                &mut pointers,
            )
        }
    } else {
        unsafe {
            driver.launch_kernel(
                func,
                config.grid.as_array(),
                config.block.as_array(),
                config.dynamic_shared_mem,
                stream.raw(),
                &mut pointers,
            )
        }
    };
    check(res, || {
        format!(
            "launching kernel {:p} with grid {} and blocks of {} on {}",
            func,
            config.grid,
            config.block,
            stream.identify()
        )
    })
}
