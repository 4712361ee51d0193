//! Dynamic loading of the real CUDA driver library.
//!
//! Uses `libloading` to load `nvcuda.dll` (Windows) or `libcuda.so.1` (Linux)
//! and implements [`Driver`] over the resolved entry points. Entry points
//! introduced by later driver revisions are optional; calling one that could
//! not be resolved yields `CUDA_ERROR_NOT_SUPPORTED`.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};

use libloading::{Library, Symbol};
use tracing::{debug, info};

use crate::api::Driver;
use crate::capability::Capability;
use crate::sys::*;

/// Function pointer type definitions for the CUDA driver API.
type FnCuInit = unsafe extern "C" fn(flags: c_uint) -> CUresult;
type FnCuDriverGetVersion = unsafe extern "C" fn(version: *mut c_int) -> CUresult;
type FnCuDeviceGetCount = unsafe extern "C" fn(count: *mut c_int) -> CUresult;
type FnCuDeviceGet = unsafe extern "C" fn(device: *mut CUdevice, ordinal: c_int) -> CUresult;
type FnCuDeviceGetName =
    unsafe extern "C" fn(name: *mut c_char, len: c_int, dev: CUdevice) -> CUresult;
type FnCuDeviceGetAttribute =
    unsafe extern "C" fn(pi: *mut c_int, attrib: c_int, dev: CUdevice) -> CUresult;

// Primary context
type FnCuDevicePrimaryCtxRetain = unsafe extern "C" fn(pctx: *mut CUcontext, dev: CUdevice) -> CUresult;
type FnCuDevicePrimaryCtxRelease = unsafe extern "C" fn(dev: CUdevice) -> CUresult;

// Context management
type FnCuCtxCreate =
    unsafe extern "C" fn(pctx: *mut CUcontext, flags: c_uint, dev: CUdevice) -> CUresult;
type FnCuCtxDestroy = unsafe extern "C" fn(ctx: CUcontext) -> CUresult;
type FnCuCtxPopCurrent = unsafe extern "C" fn(pctx: *mut CUcontext) -> CUresult;
type FnCuCtxSetCurrent = unsafe extern "C" fn(ctx: CUcontext) -> CUresult;
type FnCuCtxGetCurrent = unsafe extern "C" fn(pctx: *mut CUcontext) -> CUresult;
type FnCuCtxGetDevice = unsafe extern "C" fn(device: *mut CUdevice) -> CUresult;
type FnCuCtxSynchronize = unsafe extern "C" fn() -> CUresult;

// Module management
type FnCuModuleLoadData =
    unsafe extern "C" fn(module: *mut CUmodule, image: *const c_void) -> CUresult;
type FnCuModuleUnload = unsafe extern "C" fn(hmod: CUmodule) -> CUresult;
type FnCuModuleGetFunction = unsafe extern "C" fn(
    hfunc: *mut CUfunction,
    hmod: CUmodule,
    name: *const c_char,
) -> CUresult;

// Memory management
type FnCuMemAlloc = unsafe extern "C" fn(dptr: *mut CUdeviceptr, bytesize: usize) -> CUresult;
type FnCuMemFree = unsafe extern "C" fn(dptr: CUdeviceptr) -> CUresult;
type FnCuMemAllocAsync = unsafe extern "C" fn(dptr: *mut CUdeviceptr, bytesize: usize, hstream: CUstream) -> CUresult;
type FnCuMemFreeAsync = unsafe extern "C" fn(dptr: CUdeviceptr, hstream: CUstream) -> CUresult;
type FnCuMemcpyHtoD = unsafe extern "C" fn(
    dst: CUdeviceptr,
    src: *const c_void,
    byte_count: usize,
) -> CUresult;
type FnCuMemcpyDtoH = unsafe extern "C" fn(
    dst: *mut c_void,
    src: CUdeviceptr,
    byte_count: usize,
) -> CUresult;
type FnCuMemcpyHtoDAsync = unsafe extern "C" fn(dst: CUdeviceptr, src: *const c_void, byte_count: usize, hstream: CUstream) -> CUresult;
type FnCuMemcpyDtoHAsync = unsafe extern "C" fn(dst: *mut c_void, src: CUdeviceptr, byte_count: usize, hstream: CUstream) -> CUresult;
type FnCuMemsetD8 =
    unsafe extern "C" fn(dst: CUdeviceptr, value: u8, count: usize) -> CUresult;

// Execution
type FnCuLaunchKernel = unsafe extern "C" fn(
    f: CUfunction,
    grid_dim_x: c_uint,
    grid_dim_y: c_uint,
    grid_dim_z: c_uint,
    block_dim_x: c_uint,
    block_dim_y: c_uint,
    block_dim_z: c_uint,
    shared_mem_bytes: c_uint,
    hstream: CUstream,
    kernel_params: *mut *mut c_void,
    extra: *mut *mut c_void,
) -> CUresult;
type FnCuLaunchCooperativeKernel = unsafe extern "C" fn(
    f: CUfunction,
    grid_dim_x: c_uint,
    grid_dim_y: c_uint,
    grid_dim_z: c_uint,
    block_dim_x: c_uint,
    block_dim_y: c_uint,
    block_dim_z: c_uint,
    shared_mem_bytes: c_uint,
    hstream: CUstream,
    kernel_params: *mut *mut c_void,
) -> CUresult;
type FnCuFuncGetAttribute = unsafe extern "C" fn(pi: *mut c_int, attrib: c_int, hfunc: CUfunction) -> CUresult;
type FnCuFuncSetAttribute = unsafe extern "C" fn(hfunc: CUfunction, attrib: c_int, value: c_int) -> CUresult;
type FnCuFuncSetCacheConfig = unsafe extern "C" fn(hfunc: CUfunction, config: c_int) -> CUresult;
type FnCuFuncSetSharedMemConfig = unsafe extern "C" fn(hfunc: CUfunction, config: c_int) -> CUresult;
type FnCuOccupancyMaxActiveBlocksPerMultiprocessorWithFlags = unsafe extern "C" fn(num_blocks: *mut c_int, func: CUfunction, block_size: c_int, dynamic_smem_size: usize, flags: c_uint) -> CUresult;

// Stream management
type FnCuStreamCreate = unsafe extern "C" fn(phstream: *mut CUstream, flags: c_uint) -> CUresult;
type FnCuStreamCreateWithPriority = unsafe extern "C" fn(phstream: *mut CUstream, flags: c_uint, priority: c_int) -> CUresult;
type FnCuStreamDestroy = unsafe extern "C" fn(hstream: CUstream) -> CUresult;
type FnCuStreamSynchronize = unsafe extern "C" fn(hstream: CUstream) -> CUresult;
type FnCuStreamQuery = unsafe extern "C" fn(hstream: CUstream) -> CUresult;
type FnCuStreamWaitEvent = unsafe extern "C" fn(hstream: CUstream, hevent: CUevent, flags: c_uint) -> CUresult;

// Event management
type FnCuEventCreate = unsafe extern "C" fn(phevent: *mut CUevent, flags: c_uint) -> CUresult;
type FnCuEventDestroy = unsafe extern "C" fn(hevent: CUevent) -> CUresult;
type FnCuEventRecord = unsafe extern "C" fn(hevent: CUevent, hstream: CUstream) -> CUresult;
type FnCuEventSynchronize = unsafe extern "C" fn(hevent: CUevent) -> CUresult;
type FnCuEventQuery = unsafe extern "C" fn(hevent: CUevent) -> CUresult;
type FnCuEventElapsedTime =
    unsafe extern "C" fn(ms: *mut f32, start: CUevent, end: CUevent) -> CUresult;
type FnCuIpcGetEventHandle = unsafe extern "C" fn(handle: *mut CUipcEventHandle, event: CUevent) -> CUresult;
type FnCuIpcOpenEventHandle = unsafe extern "C" fn(phevent: *mut CUevent, handle: CUipcEventHandle) -> CUresult;

/// Dynamically loaded CUDA driver library with function pointers.
pub struct CudaDriver {
    _lib: Library,
    // Initialization
    cu_init: FnCuInit,
    cu_driver_get_version: FnCuDriverGetVersion,
    // Device management
    cu_device_get_count: FnCuDeviceGetCount,
    cu_device_get: FnCuDeviceGet,
    cu_device_get_name: FnCuDeviceGetName,
    cu_device_get_attribute: FnCuDeviceGetAttribute,
    cu_device_primary_ctx_retain: Option<FnCuDevicePrimaryCtxRetain>,
    cu_device_primary_ctx_release: Option<FnCuDevicePrimaryCtxRelease>,
    // Context management
    cu_ctx_create: FnCuCtxCreate,
    cu_ctx_destroy: FnCuCtxDestroy,
    cu_ctx_pop_current: FnCuCtxPopCurrent,
    cu_ctx_set_current: FnCuCtxSetCurrent,
    cu_ctx_get_current: FnCuCtxGetCurrent,
    cu_ctx_get_device: Option<FnCuCtxGetDevice>,
    cu_ctx_synchronize: FnCuCtxSynchronize,
    // Module management
    cu_module_load_data: FnCuModuleLoadData,
    cu_module_unload: FnCuModuleUnload,
    cu_module_get_function: FnCuModuleGetFunction,
    // Memory management
    cu_mem_alloc: FnCuMemAlloc,
    cu_mem_free: FnCuMemFree,
    cu_mem_alloc_async: Option<FnCuMemAllocAsync>,
    cu_mem_free_async: Option<FnCuMemFreeAsync>,
    cu_memcpy_htod: FnCuMemcpyHtoD,
    cu_memcpy_dtoh: FnCuMemcpyDtoH,
    cu_memcpy_htod_async: Option<FnCuMemcpyHtoDAsync>,
    cu_memcpy_dtoh_async: Option<FnCuMemcpyDtoHAsync>,
    cu_memset_d8: FnCuMemsetD8,
    // Execution
    cu_launch_kernel: FnCuLaunchKernel,
    cu_launch_cooperative_kernel: Option<FnCuLaunchCooperativeKernel>,
    cu_func_get_attribute: Option<FnCuFuncGetAttribute>,
    cu_func_set_attribute: Option<FnCuFuncSetAttribute>,
    cu_func_set_cache_config: Option<FnCuFuncSetCacheConfig>,
    cu_func_set_shared_mem_config: Option<FnCuFuncSetSharedMemConfig>,
    cu_occupancy_max_active_blocks_with_flags: Option<FnCuOccupancyMaxActiveBlocksPerMultiprocessorWithFlags>,
    // Stream management
    cu_stream_create: FnCuStreamCreate,
    cu_stream_create_with_priority: Option<FnCuStreamCreateWithPriority>,
    cu_stream_destroy: FnCuStreamDestroy,
    cu_stream_synchronize: FnCuStreamSynchronize,
    cu_stream_query: FnCuStreamQuery,
    cu_stream_wait_event: Option<FnCuStreamWaitEvent>,
    // Event management
    cu_event_create: FnCuEventCreate,
    cu_event_destroy: FnCuEventDestroy,
    cu_event_record: FnCuEventRecord,
    cu_event_synchronize: FnCuEventSynchronize,
    cu_event_query: FnCuEventQuery,
    cu_event_elapsed_time: FnCuEventElapsedTime,
    cu_ipc_get_event_handle: Option<FnCuIpcGetEventHandle>,
    cu_ipc_open_event_handle: Option<FnCuIpcOpenEventHandle>,
}

// SAFETY: The CUDA driver library handles are valid from any thread.
// The CUDA driver API itself handles thread safety via context management.
unsafe impl Send for CudaDriver {}
unsafe impl Sync for CudaDriver {}

impl CudaDriver {
    /// Load the CUDA driver library from the platform's default locations.
    pub fn load() -> Result<Self, String> {
        Self::load_from(None)
    }

    /// Load the CUDA driver library, preferring `path` when given, and resolve all
    /// function pointers.
    pub fn load_from(path: Option<&str>) -> Result<Self, String> {
        let lib = Self::load_library(path)?;

        unsafe {
            let driver = Self {
                cu_init: Self::load_fn(&lib, "cuInit")?,
                cu_driver_get_version: Self::load_fn(&lib, "cuDriverGetVersion")?,
                cu_device_get_count: Self::load_fn(&lib, "cuDeviceGetCount")?,
                cu_device_get: Self::load_fn(&lib, "cuDeviceGet")?,
                cu_device_get_name: Self::load_fn(&lib, "cuDeviceGetName")?,
                cu_device_get_attribute: Self::load_fn(&lib, "cuDeviceGetAttribute")?,
                // Primary context
                cu_device_primary_ctx_retain: Self::load_fn_opt(&lib, "cuDevicePrimaryCtxRetain"),
                cu_device_primary_ctx_release: Self::load_fn_opt::<FnCuDevicePrimaryCtxRelease>(&lib, "cuDevicePrimaryCtxRelease_v2")
                    .or(Self::load_fn_opt(&lib, "cuDevicePrimaryCtxRelease")),
                // Context
                cu_ctx_create: Self::load_fn(&lib, "cuCtxCreate_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuCtxCreate"))?,
                cu_ctx_destroy: Self::load_fn(&lib, "cuCtxDestroy_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuCtxDestroy"))?,
                cu_ctx_pop_current: Self::load_fn(&lib, "cuCtxPopCurrent_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuCtxPopCurrent"))?,
                cu_ctx_set_current: Self::load_fn(&lib, "cuCtxSetCurrent")?,
                cu_ctx_get_current: Self::load_fn(&lib, "cuCtxGetCurrent")?,
                cu_ctx_get_device: Self::load_fn_opt(&lib, "cuCtxGetDevice"),
                cu_ctx_synchronize: Self::load_fn(&lib, "cuCtxSynchronize")?,
                // Module
                cu_module_load_data: Self::load_fn(&lib, "cuModuleLoadData")?,
                cu_module_unload: Self::load_fn(&lib, "cuModuleUnload")?,
                cu_module_get_function: Self::load_fn(&lib, "cuModuleGetFunction")?,
                // Memory
                cu_mem_alloc: Self::load_fn(&lib, "cuMemAlloc_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuMemAlloc"))?,
                cu_mem_free: Self::load_fn(&lib, "cuMemFree_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuMemFree"))?,
                cu_mem_alloc_async: Self::load_fn_opt(&lib, "cuMemAllocAsync"),
                cu_mem_free_async: Self::load_fn_opt(&lib, "cuMemFreeAsync"),
                cu_memcpy_htod: Self::load_fn(&lib, "cuMemcpyHtoD_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuMemcpyHtoD"))?,
                cu_memcpy_dtoh: Self::load_fn(&lib, "cuMemcpyDtoH_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuMemcpyDtoH"))?,
                cu_memcpy_htod_async: Self::load_fn_opt::<FnCuMemcpyHtoDAsync>(&lib, "cuMemcpyHtoDAsync_v2")
                    .or(Self::load_fn_opt(&lib, "cuMemcpyHtoDAsync")),
                cu_memcpy_dtoh_async: Self::load_fn_opt::<FnCuMemcpyDtoHAsync>(&lib, "cuMemcpyDtoHAsync_v2")
                    .or(Self::load_fn_opt(&lib, "cuMemcpyDtoHAsync")),
                cu_memset_d8: Self::load_fn(&lib, "cuMemsetD8_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuMemsetD8"))?,
                // Execution
                cu_launch_kernel: Self::load_fn(&lib, "cuLaunchKernel")?,
                cu_launch_cooperative_kernel: Self::load_fn_opt(&lib, "cuLaunchCooperativeKernel"),
                cu_func_get_attribute: Self::load_fn_opt(&lib, "cuFuncGetAttribute"),
                cu_func_set_attribute: Self::load_fn_opt(&lib, "cuFuncSetAttribute"),
                cu_func_set_cache_config: Self::load_fn_opt(&lib, "cuFuncSetCacheConfig"),
                cu_func_set_shared_mem_config: Self::load_fn_opt(&lib, "cuFuncSetSharedMemConfig"),
                cu_occupancy_max_active_blocks_with_flags: Self::load_fn_opt(&lib, "cuOccupancyMaxActiveBlocksPerMultiprocessorWithFlags"),
                // Stream
                cu_stream_create: Self::load_fn(&lib, "cuStreamCreate")?,
                cu_stream_create_with_priority: Self::load_fn_opt(&lib, "cuStreamCreateWithPriority"),
                cu_stream_destroy: Self::load_fn(&lib, "cuStreamDestroy_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuStreamDestroy"))?,
                cu_stream_synchronize: Self::load_fn(&lib, "cuStreamSynchronize")?,
                cu_stream_query: Self::load_fn(&lib, "cuStreamQuery")?,
                cu_stream_wait_event: Self::load_fn_opt(&lib, "cuStreamWaitEvent"),
                // Event
                cu_event_create: Self::load_fn(&lib, "cuEventCreate")?,
                cu_event_destroy: Self::load_fn(&lib, "cuEventDestroy_v2")
                    .or_else(|_| Self::load_fn(&lib, "cuEventDestroy"))?,
                cu_event_record: Self::load_fn(&lib, "cuEventRecord")?,
                cu_event_synchronize: Self::load_fn(&lib, "cuEventSynchronize")?,
                cu_event_query: Self::load_fn(&lib, "cuEventQuery")?,
                cu_event_elapsed_time: Self::load_fn(&lib, "cuEventElapsedTime")?,
                cu_ipc_get_event_handle: Self::load_fn_opt(&lib, "cuIpcGetEventHandle"),
                cu_ipc_open_event_handle: Self::load_fn_opt(&lib, "cuIpcOpenEventHandle"),
                _lib: lib,
            };

            info!("CUDA driver loaded successfully");
            Ok(driver)
        }
    }

    fn load_library(path: Option<&str>) -> Result<Library, String> {
        #[cfg(target_os = "windows")]
        let default_names: &[&str] = &["nvcuda.dll"];

        #[cfg(target_os = "linux")]
        let default_names: &[&str] = &["libcuda.so.1", "libcuda.so"];

        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        let default_names: &[&str] = &["libcuda.dylib"];

        let lib_names: Vec<&str> = match path {
            Some(p) => vec![p],
            None => default_names.to_vec(),
        };

        let mut last_err = String::new();
        for name in lib_names {
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    info!("loaded CUDA driver from: {}", name);
                    return Ok(lib);
                }
                Err(e) => {
                    last_err = format!("{}: {}", name, e);
                    debug!("failed to load {}: {}", name, e);
                }
            }
        }

        Err(format!("failed to load CUDA driver library: {}", last_err))
    }

    unsafe fn load_fn<F: Copy>(lib: &Library, name: &str) -> Result<F, String> {
        let sym: Symbol<F> = unsafe { lib.get(name.as_bytes()) }
            .map_err(|e| format!("failed to load {}: {}", name, e))?;
        Ok(*sym)
    }

    unsafe fn load_fn_opt<F: Copy>(lib: &Library, name: &str) -> Option<F> {
        unsafe { lib.get(name.as_bytes()) }.ok().map(|s: Symbol<F>| *s)
    }
}

impl Driver for CudaDriver {
    // ── Initialization ────────────────────────────────────────────

    fn init(&self, flags: u32) -> CUresult {
        unsafe { (self.cu_init)(flags as c_uint) }
    }

    fn driver_get_version(&self) -> Result<i32, CUresult> {
        let mut version: c_int = 0;
        let res = unsafe { (self.cu_driver_get_version)(&mut version) };
        if res == CUDA_SUCCESS { Ok(version) } else { Err(res) }
    }

    fn provides(&self, capability: Capability) -> bool {
        match capability {
            Capability::FunctionAttributeSetting => self.cu_func_set_attribute.is_some(),
            Capability::OccupancyCalculation => self.cu_occupancy_max_active_blocks_with_flags.is_some(),
            Capability::CooperativeLaunch => self.cu_launch_cooperative_kernel.is_some(),
            Capability::InterprocessEvents => {
                self.cu_ipc_get_event_handle.is_some() && self.cu_ipc_open_event_handle.is_some()
            }
            Capability::StreamOrderedAllocation => {
                self.cu_mem_alloc_async.is_some() && self.cu_mem_free_async.is_some()
            }
        }
    }

    // ── Device Management ─────────────────────────────────────────

    fn device_get_count(&self) -> Result<i32, CUresult> {
        let mut count: c_int = 0;
        let res = unsafe { (self.cu_device_get_count)(&mut count) };
        if res == CUDA_SUCCESS { Ok(count) } else { Err(res) }
    }

    fn device_get(&self, ordinal: i32) -> Result<CUdevice, CUresult> {
        let mut device: CUdevice = 0;
        let res = unsafe { (self.cu_device_get)(&mut device, ordinal) };
        if res == CUDA_SUCCESS { Ok(device) } else { Err(res) }
    }

    fn device_get_name(&self, device: CUdevice) -> Result<String, CUresult> {
        let mut buf = [0 as c_char; 256];
        let res = unsafe { (self.cu_device_get_name)(buf.as_mut_ptr(), buf.len() as c_int, device) };
        if res != CUDA_SUCCESS {
            return Err(res);
        }
        let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Ok(name.to_string_lossy().into_owned())
    }

    fn device_get_attribute(&self, attrib: i32, device: CUdevice) -> Result<i32, CUresult> {
        let mut val: c_int = 0;
        let res = unsafe { (self.cu_device_get_attribute)(&mut val, attrib, device) };
        if res == CUDA_SUCCESS { Ok(val) } else { Err(res) }
    }

    fn device_primary_ctx_retain(&self, device: CUdevice) -> Result<CUcontext, CUresult> {
        if let Some(func) = self.cu_device_primary_ctx_retain {
            let mut ctx: CUcontext = std::ptr::null_mut();
            let res = unsafe { func(&mut ctx, device) };
            if res == CUDA_SUCCESS { Ok(ctx) } else { Err(res) }
        } else {
            Err(CUDA_ERROR_NOT_SUPPORTED)
        }
    }

    fn device_primary_ctx_release(&self, device: CUdevice) -> CUresult {
        if let Some(func) = self.cu_device_primary_ctx_release {
            unsafe { func(device) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    // ── Context Management ────────────────────────────────────────

    fn ctx_create(&self, flags: u32, device: CUdevice) -> Result<CUcontext, CUresult> {
        let mut ctx: CUcontext = std::ptr::null_mut();
        let res = unsafe { (self.cu_ctx_create)(&mut ctx, flags as c_uint, device) };
        if res == CUDA_SUCCESS { Ok(ctx) } else { Err(res) }
    }

    fn ctx_destroy(&self, ctx: CUcontext) -> CUresult {
        unsafe { (self.cu_ctx_destroy)(ctx) }
    }

    fn ctx_pop_current(&self) -> Result<CUcontext, CUresult> {
        let mut ctx: CUcontext = std::ptr::null_mut();
        let res = unsafe { (self.cu_ctx_pop_current)(&mut ctx) };
        if res == CUDA_SUCCESS { Ok(ctx) } else { Err(res) }
    }

    fn ctx_set_current(&self, ctx: CUcontext) -> CUresult {
        unsafe { (self.cu_ctx_set_current)(ctx) }
    }

    fn ctx_get_current(&self) -> Result<CUcontext, CUresult> {
        let mut ctx: CUcontext = std::ptr::null_mut();
        let res = unsafe { (self.cu_ctx_get_current)(&mut ctx) };
        if res == CUDA_SUCCESS { Ok(ctx) } else { Err(res) }
    }

    fn ctx_get_device(&self) -> Result<CUdevice, CUresult> {
        if let Some(func) = self.cu_ctx_get_device {
            let mut dev: CUdevice = 0;
            let res = unsafe { func(&mut dev) };
            if res == CUDA_SUCCESS { Ok(dev) } else { Err(res) }
        } else {
            Err(CUDA_ERROR_NOT_SUPPORTED)
        }
    }

    fn ctx_synchronize(&self) -> CUresult {
        unsafe { (self.cu_ctx_synchronize)() }
    }

    // ── Module Management ─────────────────────────────────────────

    fn module_load_data(&self, image: &[u8]) -> Result<CUmodule, CUresult> {
        let mut module: CUmodule = std::ptr::null_mut();
        let res = unsafe {
            (self.cu_module_load_data)(&mut module, image.as_ptr() as *const c_void)
        };
        if res == CUDA_SUCCESS { Ok(module) } else { Err(res) }
    }

    fn module_unload(&self, module: CUmodule) -> CUresult {
        unsafe { (self.cu_module_unload)(module) }
    }

    fn module_get_function(&self, module: CUmodule, name: &str) -> Result<CUfunction, CUresult> {
        let c_name = std::ffi::CString::new(name).map_err(|_| CUDA_ERROR_INVALID_VALUE)?;
        let mut func: CUfunction = std::ptr::null_mut();
        let res = unsafe { (self.cu_module_get_function)(&mut func, module, c_name.as_ptr()) };
        if res == CUDA_SUCCESS { Ok(func) } else { Err(res) }
    }

    // ── Memory Management ─────────────────────────────────────────

    fn mem_alloc(&self, byte_size: usize) -> Result<CUdeviceptr, CUresult> {
        let mut dptr: CUdeviceptr = 0;
        let res = unsafe { (self.cu_mem_alloc)(&mut dptr, byte_size) };
        if res == CUDA_SUCCESS { Ok(dptr) } else { Err(res) }
    }

    fn mem_free(&self, dptr: CUdeviceptr) -> CUresult {
        unsafe { (self.cu_mem_free)(dptr) }
    }

    fn mem_alloc_async(&self, byte_size: usize, stream: CUstream) -> Result<CUdeviceptr, CUresult> {
        if let Some(func) = self.cu_mem_alloc_async {
            let mut dptr: CUdeviceptr = 0;
            let res = unsafe { func(&mut dptr, byte_size, stream) };
            if res == CUDA_SUCCESS { Ok(dptr) } else { Err(res) }
        } else {
            Err(CUDA_ERROR_NOT_SUPPORTED)
        }
    }

    fn mem_free_async(&self, dptr: CUdeviceptr, stream: CUstream) -> CUresult {
        if let Some(func) = self.cu_mem_free_async {
            unsafe { func(dptr, stream) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    fn memcpy_htod(&self, dst: CUdeviceptr, src: &[u8]) -> CUresult {
        unsafe { (self.cu_memcpy_htod)(dst, src.as_ptr() as *const c_void, src.len()) }
    }

    fn memcpy_dtoh(&self, dst: &mut [u8], src: CUdeviceptr) -> CUresult {
        unsafe { (self.cu_memcpy_dtoh)(dst.as_mut_ptr() as *mut c_void, src, dst.len()) }
    }

    unsafe fn memcpy_htod_async(
        &self,
        dst: CUdeviceptr,
        src: *const c_void,
        byte_count: usize,
        stream: CUstream,
    ) -> CUresult {
        if let Some(func) = self.cu_memcpy_htod_async {
            unsafe { func(dst, src, byte_count, stream) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    unsafe fn memcpy_dtoh_async(
        &self,
        dst: *mut c_void,
        src: CUdeviceptr,
        byte_count: usize,
        stream: CUstream,
    ) -> CUresult {
        if let Some(func) = self.cu_memcpy_dtoh_async {
            unsafe { func(dst, src, byte_count, stream) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    fn memset_d8(&self, dst: CUdeviceptr, value: u8, count: usize) -> CUresult {
        unsafe { (self.cu_memset_d8)(dst, value, count) }
    }

    // ── Execution ─────────────────────────────────────────────────

    unsafe fn launch_kernel(
        &self,
        func: CUfunction,
        grid_dim: [u32; 3],
        block_dim: [u32; 3],
        shared_mem_bytes: u32,
        stream: CUstream,
        kernel_params: &mut [*mut c_void],
    ) -> CUresult {
        unsafe {
            (self.cu_launch_kernel)(
                func,
                grid_dim[0] as c_uint, grid_dim[1] as c_uint, grid_dim[2] as c_uint,
                block_dim[0] as c_uint, block_dim[1] as c_uint, block_dim[2] as c_uint,
                shared_mem_bytes as c_uint,
                stream,
                kernel_params.as_mut_ptr(),
                std::ptr::null_mut(),
            )
        }
    }

    unsafe fn launch_cooperative_kernel(
        &self,
        func: CUfunction,
        grid_dim: [u32; 3],
        block_dim: [u32; 3],
        shared_mem_bytes: u32,
        stream: CUstream,
        kernel_params: &mut [*mut c_void],
    ) -> CUresult {
        if let Some(f) = self.cu_launch_cooperative_kernel {
            unsafe {
                f(
                    func,
                    grid_dim[0] as c_uint, grid_dim[1] as c_uint, grid_dim[2] as c_uint,
                    block_dim[0] as c_uint, block_dim[1] as c_uint, block_dim[2] as c_uint,
                    shared_mem_bytes as c_uint,
                    stream,
                    kernel_params.as_mut_ptr(),
                )
            }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    fn func_get_attribute(&self, attrib: i32, func: CUfunction) -> Result<i32, CUresult> {
        if let Some(f) = self.cu_func_get_attribute {
            let mut val: c_int = 0;
            let res = unsafe { f(&mut val, attrib, func) };
            if res == CUDA_SUCCESS { Ok(val) } else { Err(res) }
        } else {
            Err(CUDA_ERROR_NOT_SUPPORTED)
        }
    }

    fn func_set_attribute(&self, func: CUfunction, attrib: i32, value: i32) -> CUresult {
        if let Some(f) = self.cu_func_set_attribute {
            unsafe { f(func, attrib, value) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    fn func_set_cache_config(&self, func: CUfunction, config: i32) -> CUresult {
        if let Some(f) = self.cu_func_set_cache_config {
            unsafe { f(func, config) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    fn func_set_shared_mem_config(&self, func: CUfunction, config: i32) -> CUresult {
        if let Some(f) = self.cu_func_set_shared_mem_config {
            unsafe { f(func, config) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    fn occupancy_max_active_blocks_with_flags(
        &self,
        func: CUfunction,
        block_size: i32,
        dynamic_smem_size: usize,
        flags: u32,
    ) -> Result<i32, CUresult> {
        if let Some(f) = self.cu_occupancy_max_active_blocks_with_flags {
            let mut num_blocks: c_int = 0;
            let res = unsafe { f(&mut num_blocks, func, block_size, dynamic_smem_size, flags as c_uint) };
            if res == CUDA_SUCCESS { Ok(num_blocks) } else { Err(res) }
        } else {
            Err(CUDA_ERROR_NOT_SUPPORTED)
        }
    }

    // ── Stream Management ─────────────────────────────────────────

    fn stream_create_with_priority(&self, flags: u32, priority: i32) -> Result<CUstream, CUresult> {
        let mut stream: CUstream = std::ptr::null_mut();
        let res = match self.cu_stream_create_with_priority {
            Some(func) => unsafe { func(&mut stream, flags as c_uint, priority) },
            None => unsafe { (self.cu_stream_create)(&mut stream, flags as c_uint) },
        };
        if res == CUDA_SUCCESS { Ok(stream) } else { Err(res) }
    }

    fn stream_destroy(&self, stream: CUstream) -> CUresult {
        unsafe { (self.cu_stream_destroy)(stream) }
    }

    fn stream_synchronize(&self, stream: CUstream) -> CUresult {
        unsafe { (self.cu_stream_synchronize)(stream) }
    }

    fn stream_query(&self, stream: CUstream) -> CUresult {
        unsafe { (self.cu_stream_query)(stream) }
    }

    fn stream_wait_event(&self, stream: CUstream, event: CUevent, flags: u32) -> CUresult {
        if let Some(func) = self.cu_stream_wait_event {
            unsafe { func(stream, event, flags as c_uint) }
        } else {
            CUDA_ERROR_NOT_SUPPORTED
        }
    }

    // ── Event Management ──────────────────────────────────────────

    fn event_create(&self, flags: u32) -> Result<CUevent, CUresult> {
        let mut event: CUevent = std::ptr::null_mut();
        let res = unsafe { (self.cu_event_create)(&mut event, flags as c_uint) };
        if res == CUDA_SUCCESS { Ok(event) } else { Err(res) }
    }

    fn event_destroy(&self, event: CUevent) -> CUresult {
        unsafe { (self.cu_event_destroy)(event) }
    }

    fn event_record(&self, event: CUevent, stream: CUstream) -> CUresult {
        unsafe { (self.cu_event_record)(event, stream) }
    }

    fn event_synchronize(&self, event: CUevent) -> CUresult {
        unsafe { (self.cu_event_synchronize)(event) }
    }

    fn event_query(&self, event: CUevent) -> CUresult {
        unsafe { (self.cu_event_query)(event) }
    }

    fn event_elapsed_time(&self, start: CUevent, end: CUevent) -> Result<f32, CUresult> {
        let mut ms: f32 = 0.0;
        let res = unsafe { (self.cu_event_elapsed_time)(&mut ms, start, end) };
        if res == CUDA_SUCCESS { Ok(ms) } else { Err(res) }
    }

    fn ipc_get_event_handle(&self, event: CUevent) -> Result<CUipcEventHandle, CUresult> {
        if let Some(func) = self.cu_ipc_get_event_handle {
            let mut handle = CUipcEventHandle { reserved: [0; 64] };
            let res = unsafe { func(&mut handle, event) };
            if res == CUDA_SUCCESS { Ok(handle) } else { Err(res) }
        } else {
            Err(CUDA_ERROR_NOT_SUPPORTED)
        }
    }

    fn ipc_open_event_handle(&self, handle: CUipcEventHandle) -> Result<CUevent, CUresult> {
        if let Some(func) = self.cu_ipc_open_event_handle {
            let mut event: CUevent = std::ptr::null_mut();
            let res = unsafe { func(&mut event, handle) };
            if res == CUDA_SUCCESS { Ok(event) } else { Err(res) }
        } else {
            Err(CUDA_ERROR_NOT_SUPPORTED)
        }
    }
}
