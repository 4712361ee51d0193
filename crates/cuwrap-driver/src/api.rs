//! The driver boundary consumed by the wrapper layer.
//!
//! Every native entry point the wrappers need is a method here. `CudaDriver`
//! implements it over the dynamically loaded driver library; other
//! implementations (remoting layers, recording fakes) plug in the same way.
//!
//! Methods mirror the native calls one to one: fallible calls that produce a
//! value return `Result<T, CUresult>`, the rest return the raw `CUresult`.

use std::ffi::c_void;

use crate::capability::Capability;
use crate::sys::*;

pub trait Driver: Send + Sync {
    // ── Initialization ────────────────────────────────────────────

    fn init(&self, flags: u32) -> CUresult;

    fn driver_get_version(&self) -> Result<i32, CUresult>;

    /// Whether the entry points behind `capability` could be resolved.
    /// The driver version check is done separately by the caller.
    fn provides(&self, _capability: Capability) -> bool {
        true
    }

    // ── Device Management ─────────────────────────────────────────

    fn device_get_count(&self) -> Result<i32, CUresult>;

    fn device_get(&self, ordinal: i32) -> Result<CUdevice, CUresult>;

    fn device_get_name(&self, device: CUdevice) -> Result<String, CUresult>;

    fn device_get_attribute(&self, attrib: i32, device: CUdevice) -> Result<i32, CUresult>;

    fn device_primary_ctx_retain(&self, device: CUdevice) -> Result<CUcontext, CUresult>;

    fn device_primary_ctx_release(&self, device: CUdevice) -> CUresult;

    // ── Context Management ────────────────────────────────────────

    fn ctx_create(&self, flags: u32, device: CUdevice) -> Result<CUcontext, CUresult>;

    fn ctx_destroy(&self, ctx: CUcontext) -> CUresult;

    /// Pop the calling thread's current context, returning it.
    fn ctx_pop_current(&self) -> Result<CUcontext, CUresult>;

    fn ctx_set_current(&self, ctx: CUcontext) -> CUresult;

    fn ctx_get_current(&self) -> Result<CUcontext, CUresult>;

    fn ctx_get_device(&self) -> Result<CUdevice, CUresult>;

    fn ctx_synchronize(&self) -> CUresult;

    // ── Module Management ─────────────────────────────────────────

    fn module_load_data(&self, image: &[u8]) -> Result<CUmodule, CUresult>;

    fn module_unload(&self, module: CUmodule) -> CUresult;

    fn module_get_function(&self, module: CUmodule, name: &str) -> Result<CUfunction, CUresult>;

    // ── Memory Management ─────────────────────────────────────────

    fn mem_alloc(&self, byte_size: usize) -> Result<CUdeviceptr, CUresult>;

    fn mem_free(&self, dptr: CUdeviceptr) -> CUresult;

    fn mem_alloc_async(&self, byte_size: usize, stream: CUstream) -> Result<CUdeviceptr, CUresult>;

    fn mem_free_async(&self, dptr: CUdeviceptr, stream: CUstream) -> CUresult;

    fn memcpy_htod(&self, dst: CUdeviceptr, src: &[u8]) -> CUresult;

    fn memcpy_dtoh(&self, dst: &mut [u8], src: CUdeviceptr) -> CUresult;

    /// # Safety
    /// `src` must stay valid for `byte_count` bytes until the copy has completed on `stream`.
    unsafe fn memcpy_htod_async(
        &self,
        dst: CUdeviceptr,
        src: *const c_void,
        byte_count: usize,
        stream: CUstream,
    ) -> CUresult;

    /// # Safety
    /// `dst` must stay valid for `byte_count` bytes until the copy has completed on `stream`.
    unsafe fn memcpy_dtoh_async(
        &self,
        dst: *mut c_void,
        src: CUdeviceptr,
        byte_count: usize,
        stream: CUstream,
    ) -> CUresult;

    fn memset_d8(&self, dst: CUdeviceptr, value: u8, count: usize) -> CUresult;

    // ── Execution ─────────────────────────────────────────────────

    /// # Safety
    /// Each entry of `kernel_params` must point at a value matching the
    /// kernel's corresponding parameter, valid for the duration of the call.
    unsafe fn launch_kernel(
        &self,
        func: CUfunction,
        grid_dim: [u32; 3],
        block_dim: [u32; 3],
        shared_mem_bytes: u32,
        stream: CUstream,
        kernel_params: &mut [*mut c_void],
    ) -> CUresult;

    /// # Safety
    /// Same requirements as [`Driver::launch_kernel`].
    unsafe fn launch_cooperative_kernel(
        &self,
        func: CUfunction,
        grid_dim: [u32; 3],
        block_dim: [u32; 3],
        shared_mem_bytes: u32,
        stream: CUstream,
        kernel_params: &mut [*mut c_void],
    ) -> CUresult;

    fn func_get_attribute(&self, attrib: i32, func: CUfunction) -> Result<i32, CUresult>;

    fn func_set_attribute(&self, func: CUfunction, attrib: i32, value: i32) -> CUresult;

    fn func_set_cache_config(&self, func: CUfunction, config: i32) -> CUresult;

    fn func_set_shared_mem_config(&self, func: CUfunction, config: i32) -> CUresult;

    fn occupancy_max_active_blocks_with_flags(
        &self,
        func: CUfunction,
        block_size: i32,
        dynamic_smem_size: usize,
        flags: u32,
    ) -> Result<i32, CUresult>;

    // ── Stream Management ─────────────────────────────────────────

    fn stream_create_with_priority(&self, flags: u32, priority: i32) -> Result<CUstream, CUresult>;

    fn stream_destroy(&self, stream: CUstream) -> CUresult;

    fn stream_synchronize(&self, stream: CUstream) -> CUresult;

    fn stream_query(&self, stream: CUstream) -> CUresult;

    fn stream_wait_event(&self, stream: CUstream, event: CUevent, flags: u32) -> CUresult;

    // ── Event Management ──────────────────────────────────────────

    fn event_create(&self, flags: u32) -> Result<CUevent, CUresult>;

    fn event_destroy(&self, event: CUevent) -> CUresult;

    fn event_record(&self, event: CUevent, stream: CUstream) -> CUresult;

    fn event_synchronize(&self, event: CUevent) -> CUresult;

    fn event_query(&self, event: CUevent) -> CUresult;

    fn event_elapsed_time(&self, start: CUevent, end: CUevent) -> Result<f32, CUresult>;

    fn ipc_get_event_handle(&self, event: CUevent) -> Result<CUipcEventHandle, CUresult>;

    fn ipc_open_event_handle(&self, handle: CUipcEventHandle) -> Result<CUevent, CUresult>;
}
