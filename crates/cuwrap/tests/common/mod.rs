//! In-process driver used by the integration tests.
//!
//! Keeps a per-thread context stack like the real driver, records every call
//! of interest and counts destroys per handle. Streams accumulate pending
//! work on launch and drain it on synchronize, so completion queries behave
//! realistically.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};

use cuwrap::driver::sys::*;
use cuwrap::driver::{Capability, Driver};
use cuwrap::{CuwrapConfig, Device, Kernel, Module, Runtime};

pub const DEVICE_COUNT: i32 = 2;
pub const MULTIPROCESSOR_COUNT: i32 = 10;
pub const MAX_THREADS_PER_MULTIPROCESSOR: i32 = 2048;
pub const SHARED_MEMORY_PER_MULTIPROCESSOR: usize = 100 * 1024;
pub const MAX_BLOCKS_PER_MULTIPROCESSOR: i32 = 16;

pub const VECTOR_ADD_PTX: &str = r#"
.version 7.0
.target sm_50
.address_size 64
.visible .entry vector_add(.param .u64 a, .param .u64 b, .param .u64 c, .param .u32 n)
{
    ret;
}
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRecord {
    pub func: usize,
    pub stream: usize,
    pub grid: [u32; 3],
    pub block: [u32; 3],
    pub shared_mem: u32,
    pub cooperative: bool,
    /// Context current on the launching thread.
    pub context: usize,
    /// Each parameter slot read as a little-endian u64.
    pub params: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetCurrent(usize),
    CtxCreate { device: i32 },
    Launch(LaunchRecord),
    FuncGetAttribute { func: usize, attrib: i32, context: usize },
    FuncSetAttribute { func: usize, attrib: i32, value: i32, context: usize },
    FuncSetCacheConfig { func: usize, config: i32 },
    FuncSetSharedMemConfig { func: usize, config: i32 },
    Occupancy { func: usize, block_size: i32, dynamic_smem: usize, flags: u32 },
    EventRecord { event: usize, stream: usize },
    StreamSynchronize(usize),
    StreamWaitEvent { stream: usize, event: usize },
    MemFreeAsync { dptr: u64, stream: usize },
}

pub struct MockState {
    pub version: i32,
    pub device_attributes: HashMap<i32, i32>,
    pub function_attributes: HashMap<(usize, i32), i32>,
    pub attribute_failures: HashMap<i32, CUresult>,
    pub launch_failure: Option<CUresult>,
    pub destroy_failure: Option<CUresult>,
    pub pop_failure: Option<CUresult>,
    pub free_async_failure: Option<CUresult>,
    pub missing: Vec<Capability>,
    pub calls: Vec<Call>,
    pub destroyed: HashMap<(&'static str, u64), u32>,
    stacks: HashMap<ThreadId, Vec<usize>>,
    contexts: HashMap<usize, i32>,
    primary: HashMap<i32, usize>,
    pub primary_retains: HashMap<i32, i32>,
    pending: HashMap<usize, u32>,
    events: HashMap<usize, usize>,
    memory: HashMap<u64, Vec<u8>>,
    next_handle: usize,
}

impl MockState {
    fn new_handle(&mut self) -> usize {
        self.next_handle += 0x10;
        self.next_handle
    }

    fn top(&self) -> usize {
        self.stacks
            .get(&thread::current().id())
            .and_then(|s| s.last().copied())
            .unwrap_or(0)
    }

    fn stack(&mut self) -> &mut Vec<usize> {
        self.stacks.entry(thread::current().id()).or_default()
    }

    fn destroy(&mut self, kind: &'static str, handle: u64) -> CUresult {
        *self.destroyed.entry((kind, handle)).or_insert(0) += 1;
        self.destroy_failure.unwrap_or(CUDA_SUCCESS)
    }

    fn function_attribute(&self, func: usize, attrib: i32) -> i32 {
        if let Some(v) = self.function_attributes.get(&(func, attrib)) {
            return *v;
        }
        match attrib {
            CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK => 1024,
            CU_FUNC_ATTRIBUTE_NUM_REGS => 32,
            CU_FUNC_ATTRIBUTE_PTX_VERSION => 86,
            CU_FUNC_ATTRIBUTE_BINARY_VERSION => 86,
            CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES => 48 * 1024,
            CU_FUNC_ATTRIBUTE_PREFERRED_SHARED_MEMORY_CARVEOUT => -1,
            _ => 0,
        }
    }

    fn memory_at(&mut self, dptr: u64) -> Option<&mut Vec<u8>> {
        self.memory.get_mut(&dptr)
    }
}

pub struct MockDriver {
    state: Mutex<MockState>,
}

fn as_handle(h: usize) -> *mut c_void {
    h as *mut c_void
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Self::with_version(12040)
    }

    pub fn with_version(version: i32) -> Arc<Self> {
        let device_attributes = HashMap::from([
            (CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK, 1024),
            (CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_X, 1024),
            (CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Y, 1024),
            (CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Z, 64),
            (CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_X, i32::MAX),
            (CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Y, 65535),
            (CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Z, 65535),
            (CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK, 48 * 1024),
            (CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK_OPTIN, 99 * 1024),
            (CU_DEVICE_ATTRIBUTE_WARP_SIZE, 32),
            (CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT, MULTIPROCESSOR_COUNT),
            (CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_MULTIPROCESSOR, MAX_THREADS_PER_MULTIPROCESSOR),
            (CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR, 8),
            (CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR, 6),
            (CU_DEVICE_ATTRIBUTE_COOPERATIVE_LAUNCH, 1),
        ]);
        Arc::new(Self {
            state: Mutex::new(MockState {
                version,
                device_attributes,
                function_attributes: HashMap::new(),
                attribute_failures: HashMap::new(),
                launch_failure: None,
                destroy_failure: None,
                pop_failure: None,
                free_async_failure: None,
                missing: Vec::new(),
                calls: Vec::new(),
                destroyed: HashMap::new(),
                stacks: HashMap::new(),
                contexts: HashMap::new(),
                primary: HashMap::new(),
                primary_retains: HashMap::new(),
                pending: HashMap::new(),
                events: HashMap::new(),
                memory: HashMap::new(),
                next_handle: 0x1000,
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Launch(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn set_current_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::SetCurrent(_))).count()
    }

    pub fn destroy_count(&self, kind: &'static str, handle: u64) -> u32 {
        self.state.lock().destroyed.get(&(kind, handle)).copied().unwrap_or(0)
    }

    pub fn destroys_of(&self, kind: &'static str) -> u32 {
        self.state
            .lock()
            .destroyed
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Context on top of the calling thread's stack, 0 if none.
    pub fn current_on_this_thread(&self) -> usize {
        self.state.lock().top()
    }

    /// Push a fresh context for `device` onto this thread's stack without
    /// going through the wrapper, as foreign code would.
    pub fn push_foreign_context(&self, device: i32) -> usize {
        let mut s = self.state.lock();
        let ctx = s.new_handle();
        s.contexts.insert(ctx, device);
        s.stack().push(ctx);
        ctx
    }

    pub fn primary_context_of(&self, device: i32) -> usize {
        self.state.lock().primary.get(&device).copied().unwrap_or(0)
    }

    pub fn pending_work(&self, stream: usize) -> u32 {
        self.state.lock().pending.get(&stream).copied().unwrap_or(0)
    }
}

impl Driver for MockDriver {
    fn init(&self, _flags: u32) -> CUresult {
        CUDA_SUCCESS
    }

    fn driver_get_version(&self) -> Result<i32, CUresult> {
        Ok(self.state.lock().version)
    }

    fn provides(&self, capability: Capability) -> bool {
        !self.state.lock().missing.contains(&capability)
    }

    fn device_get_count(&self) -> Result<i32, CUresult> {
        Ok(DEVICE_COUNT)
    }

    fn device_get(&self, ordinal: i32) -> Result<CUdevice, CUresult> {
        if (0..DEVICE_COUNT).contains(&ordinal) {
            Ok(ordinal)
        } else {
            Err(CUDA_ERROR_INVALID_DEVICE)
        }
    }

    fn device_get_name(&self, device: CUdevice) -> Result<String, CUresult> {
        Ok(format!("Mock Device {}", device))
    }

    fn device_get_attribute(&self, attrib: i32, device: CUdevice) -> Result<i32, CUresult> {
        self.device_get(device)?;
        Ok(self.state.lock().device_attributes.get(&attrib).copied().unwrap_or(0))
    }

    fn device_primary_ctx_retain(&self, device: CUdevice) -> Result<CUcontext, CUresult> {
        let mut s = self.state.lock();
        let ctx = match s.primary.get(&device).copied() {
            Some(ctx) => ctx,
            None => {
                let ctx = s.new_handle();
                s.primary.insert(device, ctx);
                s.contexts.insert(ctx, device);
                ctx
            }
        };
        *s.primary_retains.entry(device).or_insert(0) += 1;
        Ok(as_handle(ctx))
    }

    fn device_primary_ctx_release(&self, device: CUdevice) -> CUresult {
        *self.state.lock().primary_retains.entry(device).or_insert(0) -= 1;
        CUDA_SUCCESS
    }

    fn ctx_create(&self, _flags: u32, device: CUdevice) -> Result<CUcontext, CUresult> {
        let mut s = self.state.lock();
        let ctx = s.new_handle();
        s.contexts.insert(ctx, device);
        s.stack().push(ctx);
        s.calls.push(Call::CtxCreate { device });
        Ok(as_handle(ctx))
    }

    fn ctx_destroy(&self, ctx: CUcontext) -> CUresult {
        let mut s = self.state.lock();
        s.contexts.remove(&(ctx as usize));
        for stack in s.stacks.values_mut() {
            stack.retain(|c| *c != ctx as usize);
        }
        s.destroy("context", ctx as u64)
    }

    fn ctx_pop_current(&self) -> Result<CUcontext, CUresult> {
        let mut s = self.state.lock();
        if let Some(code) = s.pop_failure {
            return Err(code);
        }
        match s.stack().pop() {
            Some(ctx) => Ok(as_handle(ctx)),
            None => Err(CUDA_ERROR_INVALID_CONTEXT),
        }
    }

    fn ctx_set_current(&self, ctx: CUcontext) -> CUresult {
        let mut s = self.state.lock();
        let ctx = ctx as usize;
        s.calls.push(Call::SetCurrent(ctx));
        if ctx == 0 {
            s.stack().pop();
            return CUDA_SUCCESS;
        }
        if !s.contexts.contains_key(&ctx) {
            return CUDA_ERROR_INVALID_CONTEXT;
        }
        let stack = s.stack();
        match stack.last_mut() {
            Some(top) => *top = ctx,
            None => stack.push(ctx),
        }
        CUDA_SUCCESS
    }

    fn ctx_get_current(&self) -> Result<CUcontext, CUresult> {
        Ok(as_handle(self.state.lock().top()))
    }

    fn ctx_get_device(&self) -> Result<CUdevice, CUresult> {
        let s = self.state.lock();
        s.contexts.get(&s.top()).copied().ok_or(CUDA_ERROR_INVALID_CONTEXT)
    }

    fn ctx_synchronize(&self) -> CUresult {
        let mut s = self.state.lock();
        if s.top() == 0 {
            return CUDA_ERROR_INVALID_CONTEXT;
        }
        s.pending.values_mut().for_each(|p| *p = 0);
        CUDA_SUCCESS
    }

    fn module_load_data(&self, image: &[u8]) -> Result<CUmodule, CUresult> {
        let mut s = self.state.lock();
        if s.top() == 0 {
            return Err(CUDA_ERROR_INVALID_CONTEXT);
        }
        if image.last() != Some(&0) {
            return Err(CUDA_ERROR_INVALID_VALUE);
        }
        Ok(as_handle(s.new_handle()))
    }

    fn module_unload(&self, module: CUmodule) -> CUresult {
        self.state.lock().destroy("module", module as u64)
    }

    fn module_get_function(&self, _module: CUmodule, name: &str) -> Result<CUfunction, CUresult> {
        if name == "missing_kernel" {
            return Err(500);
        }
        Ok(as_handle(self.state.lock().new_handle()))
    }

    fn mem_alloc(&self, byte_size: usize) -> Result<CUdeviceptr, CUresult> {
        let mut s = self.state.lock();
        if s.top() == 0 {
            return Err(CUDA_ERROR_INVALID_CONTEXT);
        }
        let dptr = 0x7000_0000 + s.new_handle() as u64 * 0x100;
        s.memory.insert(dptr, vec![0; byte_size]);
        Ok(dptr)
    }

    fn mem_free(&self, dptr: CUdeviceptr) -> CUresult {
        let mut s = self.state.lock();
        if s.top() == 0 {
            return CUDA_ERROR_INVALID_CONTEXT;
        }
        s.memory.remove(&dptr);
        s.destroy("memory", dptr)
    }

    fn mem_alloc_async(&self, byte_size: usize, _stream: CUstream) -> Result<CUdeviceptr, CUresult> {
        self.mem_alloc(byte_size)
    }

    fn mem_free_async(&self, dptr: CUdeviceptr, stream: CUstream) -> CUresult {
        let mut s = self.state.lock();
        s.calls.push(Call::MemFreeAsync { dptr, stream: stream as usize });
        if let Some(code) = s.free_async_failure {
            return code;
        }
        s.memory.remove(&dptr);
        CUDA_SUCCESS
    }

    fn memcpy_htod(&self, dst: CUdeviceptr, src: &[u8]) -> CUresult {
        let mut s = self.state.lock();
        match s.memory_at(dst) {
            Some(mem) if mem.len() >= src.len() => {
                mem[..src.len()].copy_from_slice(src);
                CUDA_SUCCESS
            }
            _ => CUDA_ERROR_INVALID_VALUE,
        }
    }

    fn memcpy_dtoh(&self, dst: &mut [u8], src: CUdeviceptr) -> CUresult {
        let mut s = self.state.lock();
        match s.memory_at(src) {
            Some(mem) if mem.len() >= dst.len() => {
                let len = dst.len();
                dst.copy_from_slice(&mem[..len]);
                CUDA_SUCCESS
            }
            _ => CUDA_ERROR_INVALID_VALUE,
        }
    }

    unsafe fn memcpy_htod_async(
        &self,
        dst: CUdeviceptr,
        src: *const c_void,
        byte_count: usize,
        _stream: CUstream,
    ) -> CUresult {
        let src = unsafe { std::slice::from_raw_parts(src as *const u8, byte_count) };
        self.memcpy_htod(dst, src)
    }

    unsafe fn memcpy_dtoh_async(
        &self,
        dst: *mut c_void,
        src: CUdeviceptr,
        byte_count: usize,
        _stream: CUstream,
    ) -> CUresult {
        let dst = unsafe { std::slice::from_raw_parts_mut(dst as *mut u8, byte_count) };
        self.memcpy_dtoh(dst, src)
    }

    fn memset_d8(&self, dst: CUdeviceptr, value: u8, count: usize) -> CUresult {
        let mut s = self.state.lock();
        match s.memory_at(dst) {
            Some(mem) if mem.len() >= count => {
                mem[..count].fill(value);
                CUDA_SUCCESS
            }
            _ => CUDA_ERROR_INVALID_VALUE,
        }
    }

    unsafe fn launch_kernel(
        &self,
        func: CUfunction,
        grid_dim: [u32; 3],
        block_dim: [u32; 3],
        shared_mem_bytes: u32,
        stream: CUstream,
        kernel_params: &mut [*mut c_void],
    ) -> CUresult {
        unsafe { self.record_launch(func, grid_dim, block_dim, shared_mem_bytes, stream, kernel_params, false) }
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
        unsafe { self.record_launch(func, grid_dim, block_dim, shared_mem_bytes, stream, kernel_params, true) }
    }

    fn func_get_attribute(&self, attrib: i32, func: CUfunction) -> Result<i32, CUresult> {
        let mut s = self.state.lock();
        let context = s.top();
        s.calls.push(Call::FuncGetAttribute { func: func as usize, attrib, context });
        if let Some(code) = s.attribute_failures.get(&attrib) {
            return Err(*code);
        }
        Ok(s.function_attribute(func as usize, attrib))
    }

    fn func_set_attribute(&self, func: CUfunction, attrib: i32, value: i32) -> CUresult {
        let mut s = self.state.lock();
        let context = s.top();
        s.calls.push(Call::FuncSetAttribute { func: func as usize, attrib, value, context });
        s.function_attributes.insert((func as usize, attrib), value);
        CUDA_SUCCESS
    }

    fn func_set_cache_config(&self, func: CUfunction, config: i32) -> CUresult {
        self.state.lock().calls.push(Call::FuncSetCacheConfig { func: func as usize, config });
        CUDA_SUCCESS
    }

    fn func_set_shared_mem_config(&self, func: CUfunction, config: i32) -> CUresult {
        self.state.lock().calls.push(Call::FuncSetSharedMemConfig { func: func as usize, config });
        CUDA_SUCCESS
    }

    fn occupancy_max_active_blocks_with_flags(
        &self,
        func: CUfunction,
        block_size: i32,
        dynamic_smem_size: usize,
        flags: u32,
    ) -> Result<i32, CUresult> {
        let mut s = self.state.lock();
        s.calls.push(Call::Occupancy {
            func: func as usize,
            block_size,
            dynamic_smem: dynamic_smem_size,
            flags,
        });
        let func_max = s.function_attribute(func as usize, CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK);
        if block_size <= 0 || block_size > func_max {
            return Ok(0);
        }
        let by_threads = MAX_THREADS_PER_MULTIPROCESSOR / block_size;
        let by_shared = if dynamic_smem_size == 0 {
            i32::MAX
        } else {
            (SHARED_MEMORY_PER_MULTIPROCESSOR / dynamic_smem_size) as i32
        };
        Ok(by_threads.min(MAX_BLOCKS_PER_MULTIPROCESSOR).min(by_shared))
    }

    fn stream_create_with_priority(&self, _flags: u32, _priority: i32) -> Result<CUstream, CUresult> {
        let mut s = self.state.lock();
        if s.top() == 0 {
            return Err(CUDA_ERROR_INVALID_CONTEXT);
        }
        let stream = s.new_handle();
        s.pending.insert(stream, 0);
        Ok(as_handle(stream))
    }

    fn stream_destroy(&self, stream: CUstream) -> CUresult {
        self.state.lock().destroy("stream", stream as u64)
    }

    fn stream_synchronize(&self, stream: CUstream) -> CUresult {
        let mut s = self.state.lock();
        s.calls.push(Call::StreamSynchronize(stream as usize));
        s.pending.insert(stream as usize, 0);
        CUDA_SUCCESS
    }

    fn stream_query(&self, stream: CUstream) -> CUresult {
        if self.pending_work(stream as usize) == 0 {
            CUDA_SUCCESS
        } else {
            CUDA_ERROR_NOT_READY
        }
    }

    fn stream_wait_event(&self, stream: CUstream, event: CUevent, _flags: u32) -> CUresult {
        self.state.lock().calls.push(Call::StreamWaitEvent {
            stream: stream as usize,
            event: event as usize,
        });
        CUDA_SUCCESS
    }

    fn event_create(&self, _flags: u32) -> Result<CUevent, CUresult> {
        Ok(as_handle(self.state.lock().new_handle()))
    }

    fn event_destroy(&self, event: CUevent) -> CUresult {
        self.state.lock().destroy("event", event as u64)
    }

    fn event_record(&self, event: CUevent, stream: CUstream) -> CUresult {
        let mut s = self.state.lock();
        s.calls.push(Call::EventRecord { event: event as usize, stream: stream as usize });
        s.events.insert(event as usize, stream as usize);
        CUDA_SUCCESS
    }

    fn event_synchronize(&self, event: CUevent) -> CUresult {
        let mut s = self.state.lock();
        if let Some(stream) = s.events.get(&(event as usize)).copied() {
            s.pending.insert(stream, 0);
        }
        CUDA_SUCCESS
    }

    fn event_query(&self, event: CUevent) -> CUresult {
        let s = self.state.lock();
        let pending = s
            .events
            .get(&(event as usize))
            .and_then(|stream| s.pending.get(stream))
            .copied()
            .unwrap_or(0);
        if pending == 0 {
            CUDA_SUCCESS
        } else {
            CUDA_ERROR_NOT_READY
        }
    }

    fn event_elapsed_time(&self, _start: CUevent, _end: CUevent) -> Result<f32, CUresult> {
        Ok(1.5)
    }

    fn ipc_get_event_handle(&self, event: CUevent) -> Result<CUipcEventHandle, CUresult> {
        let mut handle = CUipcEventHandle { reserved: [0; 64] };
        handle.reserved[..8].copy_from_slice(&(event as u64).to_le_bytes());
        Ok(handle)
    }

    fn ipc_open_event_handle(&self, _handle: CUipcEventHandle) -> Result<CUevent, CUresult> {
        Ok(as_handle(self.state.lock().new_handle()))
    }
}

impl MockDriver {
    #[allow(clippy::too_many_arguments)]
    unsafe fn record_launch(
        &self,
        func: CUfunction,
        grid: [u32; 3],
        block: [u32; 3],
        shared_mem: u32,
        stream: CUstream,
        kernel_params: &mut [*mut c_void],
        cooperative: bool,
    ) -> CUresult {
        let params = kernel_params
            .iter()
            .map(|p| unsafe { std::ptr::read(*p as *const u64) })
            .collect();
        let mut s = self.state.lock();
        let context = s.top();
        s.calls.push(Call::Launch(LaunchRecord {
            func: func as usize,
            stream: stream as usize,
            grid,
            block,
            shared_mem,
            cooperative,
            context,
            params,
        }));
        if let Some(code) = s.launch_failure {
            return code;
        }
        *s.pending.entry(stream as usize).or_insert(0) += 1;
        CUDA_SUCCESS
    }
}

pub fn runtime(mock: &Arc<MockDriver>) -> Arc<Runtime> {
    runtime_with(mock, CuwrapConfig::default())
}

pub fn runtime_with(mock: &Arc<MockDriver>, config: CuwrapConfig) -> Arc<Runtime> {
    let _ = cuwrap_common::try_init_logging();
    Runtime::with_driver(mock.clone(), config).expect("runtime over mock driver")
}

pub fn device(rt: &Arc<Runtime>, id: i32) -> Device {
    Device::get(rt, id).expect("mock device")
}

/// Load the test module on `device` and look up its kernel.
pub fn load_kernel(rt: &Arc<Runtime>, id: i32) -> (Module, Kernel) {
    let module = Module::load(&device(rt, id), VECTOR_ADD_PTX.as_bytes()).expect("module load");
    let kernel = module.kernel("vector_add").expect("kernel lookup");
    (module, kernel)
}
