//! Device memory, as far as launches need it: allocation, copies and fills.

use std::ffi::c_void;
use std::sync::Arc;

use bytemuck::Pod;
use tracing::debug;

use cuwrap_core::{check, Error, Result};
use cuwrap_driver::sys::*;
use cuwrap_driver::Capability;

use crate::context::current;
use crate::device::Device;
use crate::handle::{Handle, ResourceKind};
use crate::params::{KernelParameter, KernelParams};
use crate::runtime::{DeviceId, Runtime};
use crate::stream::Stream;

pub struct MemoryKind;

impl ResourceKind for MemoryKind {
    const KIND: &'static str = "device allocation";
    type Raw = CUdeviceptr;

    fn address(raw: CUdeviceptr) -> u64 {
        raw
    }

    fn destroy(runtime: &Arc<Runtime>, device: DeviceId, raw: CUdeviceptr) -> CUresult {
        match current::scoped_override(runtime, device) {
            Ok(_guard) => runtime.driver().mem_free(raw),
            Err(e) => e.code().unwrap_or(CUDA_ERROR_UNKNOWN),
        }
    }
}

/// An owned region of device memory.
#[derive(Debug)]
pub struct DeviceBuffer {
    handle: Handle<MemoryKind>,
    len: usize,
}

impl DeviceBuffer {
    pub fn alloc(device: &Device, len: usize) -> Result<DeviceBuffer> {
        let runtime = device.runtime();
        let raw = current::with_override(runtime, device, || {
            runtime.driver().mem_alloc(len).map_err(|code| {
                Error::driver(code, format!("allocating {} bytes on device {}", len, device.id()))
            })
        })?;
        debug!(device = device.id(), len, "allocated {:#x}", raw);
        Ok(DeviceBuffer { handle: Handle::owning(Arc::clone(runtime), device.id(), raw), len })
    }

    /// Allocate in stream order: the memory is usable by work queued on
    /// `stream` after this call.
    pub fn alloc_async(stream: &Stream, len: usize) -> Result<DeviceBuffer> {
        let runtime = stream.runtime();
        runtime.require(Capability::StreamOrderedAllocation)?;
        let raw = current::with_override(runtime, stream.device_id(), || {
            runtime.driver().mem_alloc_async(len, stream.raw()).map_err(|code| {
                Error::driver(code, format!("allocating {} bytes on {}", len, stream.identify()))
            })
        })?;
        Ok(DeviceBuffer {
            handle: Handle::owning(Arc::clone(runtime), stream.device_id(), raw),
            len,
        })
    }

    /// Free in stream order, after the work already queued on `stream`.
    /// If the driver refuses, the buffer is freed synchronously on return.
    pub fn free_async(mut self, stream: &Stream) -> Result<()> {
        let runtime = Arc::clone(stream.runtime());
        runtime.require(Capability::StreamOrderedAllocation)?;
        let raw = self.device_ptr();
        current::with_override(&runtime, stream.device_id(), || {
            check(runtime.driver().mem_free_async(raw, stream.raw()), || {
                format!("freeing {:#x} on {}", raw, stream.identify())
            })
        })?;
        self.handle.disown();
        Ok(())
    }

    pub fn device_ptr(&self) -> CUdeviceptr {
        self.handle.raw()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn device_id(&self) -> DeviceId {
        self.handle.device_id()
    }

    pub fn handle(&self) -> &Handle<MemoryKind> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut Handle<MemoryKind> {
        &mut self.handle
    }

    pub fn identify(&self) -> String {
        self.handle.identify()
    }

    fn runtime(&self) -> &Arc<Runtime> {
        self.handle.runtime()
    }

    fn check_len(&self, len: usize, what: &str) -> Result<()> {
        if len > self.len {
            return Err(Error::InvalidArgument(format!(
                "{} of {} bytes does not fit {} ({} bytes)",
                what,
                len,
                self.identify(),
                self.len
            )));
        }
        Ok(())
    }

    pub fn copy_from_host(&self, src: &[u8]) -> Result<()> {
        self.check_len(src.len(), "host-to-device copy")?;
        current::with_override(self.runtime(), self.device_id(), || {
            check(self.runtime().driver().memcpy_htod(self.device_ptr(), src), || {
                format!("copying {} bytes to {}", src.len(), self.identify())
            })
        })
    }

    pub fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        self.check_len(dst.len(), "device-to-host copy")?;
        let len = dst.len();
        current::with_override(self.runtime(), self.device_id(), || {
            check(self.runtime().driver().memcpy_dtoh(dst, self.device_ptr()), || {
                format!("copying {} bytes from {}", len, self.identify())
            })
        })
    }

    pub fn copy_from_slice<T: Pod>(&self, src: &[T]) -> Result<()> {
        self.copy_from_host(bytemuck::cast_slice(src))
    }

    pub fn copy_to_slice<T: Pod>(&self, dst: &mut [T]) -> Result<()> {
        self.copy_to_host(bytemuck::cast_slice_mut(dst))
    }

    /// Queue a host-to-device copy on `stream`.
    ///
    /// # Safety
    /// `src` must not be modified or freed until the copy has completed.
    pub unsafe fn copy_from_host_async(&self, src: &[u8], stream: &Stream) -> Result<()> {
        self.check_len(src.len(), "host-to-device copy")?;
        current::with_override(self.runtime(), stream.device_id(), || {
            let res = unsafe {
                self.runtime().driver().memcpy_htod_async(
                    self.device_ptr(),
                    src.as_ptr() as *const c_void,
                    src.len(),
                    stream.raw(),
                )
            };
            check(res, || {
                format!(
                    "queueing a copy of {} bytes to {} on {}",
                    src.len(),
                    self.identify(),
                    stream.identify()
                )
            })
        })
    }

    /// Queue a device-to-host copy on `stream`.
    ///
    /// # Safety
    /// `dst` must not be accessed or freed until the copy has completed.
    pub unsafe fn copy_to_host_async(&self, dst: &mut [u8], stream: &Stream) -> Result<()> {
        self.check_len(dst.len(), "device-to-host copy")?;
        let (ptr, len) = (dst.as_mut_ptr() as *mut c_void, dst.len());
        current::with_override(self.runtime(), stream.device_id(), || {
            let res = unsafe {
                self.runtime()
                    .driver()
                    .memcpy_dtoh_async(ptr, self.device_ptr(), len, stream.raw())
            };
            check(res, || {
                format!(
                    "queueing a copy of {} bytes from {} on {}",
                    len,
                    self.identify(),
                    stream.identify()
                )
            })
        })
    }

    /// Set every byte of the buffer to `value`.
    pub fn memset(&self, value: u8) -> Result<()> {
        current::with_override(self.runtime(), self.device_id(), || {
            check(self.runtime().driver().memset_d8(self.device_ptr(), value, self.len), || {
                format!("filling {} with {:#04x}", self.identify(), value)
            })
        })
    }
}

/// A buffer passes its device address.
impl KernelParameter for DeviceBuffer {
    fn write_param(&self, params: &mut KernelParams) {
        params.push_bytes(&self.device_ptr().to_ne_bytes());
    }
}
