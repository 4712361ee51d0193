//! Kernels and their attributes.
//!
//! A [`Kernel`] is a function handle together with the device and context it
//! was obtained in. Every operation first makes that context current for its
//! own duration. Attribute values are always read from the driver, never
//! cached, since other code may change them at any time.

use std::sync::Arc;

use tracing::debug;

use cuwrap_core::{check, Error, Result};
use cuwrap_driver::sys::*;
use cuwrap_driver::Capability;

use crate::context::{current, Context};
use crate::device::{ComputeCapability, Device};
use crate::handle::{Handle, ResourceKind};
use crate::runtime::{DeviceId, Runtime};

pub struct FunctionKind;

impl ResourceKind for FunctionKind {
    const KIND: &'static str = "kernel";
    type Raw = CUfunction;

    fn address(raw: CUfunction) -> u64 {
        raw as usize as u64
    }

    /// Functions belong to their module and are never destroyed on their own.
    fn destroy(_runtime: &Arc<Runtime>, _device: DeviceId, _raw: CUfunction) -> CUresult {
        CUDA_SUCCESS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelAttribute {
    MaxThreadsPerBlock,
    SharedSizeBytes,
    ConstSizeBytes,
    LocalSizeBytes,
    NumRegs,
    PtxVersion,
    BinaryVersion,
    CacheModeCa,
    MaxDynamicSharedSizeBytes,
    PreferredSharedMemoryCarveout,
}

impl KernelAttribute {
    pub const ALL: [KernelAttribute; 10] = [
        KernelAttribute::MaxThreadsPerBlock,
        KernelAttribute::SharedSizeBytes,
        KernelAttribute::ConstSizeBytes,
        KernelAttribute::LocalSizeBytes,
        KernelAttribute::NumRegs,
        KernelAttribute::PtxVersion,
        KernelAttribute::BinaryVersion,
        KernelAttribute::CacheModeCa,
        KernelAttribute::MaxDynamicSharedSizeBytes,
        KernelAttribute::PreferredSharedMemoryCarveout,
    ];

    pub fn raw(self) -> i32 {
        match self {
            KernelAttribute::MaxThreadsPerBlock => CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK,
            KernelAttribute::SharedSizeBytes => CU_FUNC_ATTRIBUTE_SHARED_SIZE_BYTES,
            KernelAttribute::ConstSizeBytes => CU_FUNC_ATTRIBUTE_CONST_SIZE_BYTES,
            KernelAttribute::LocalSizeBytes => CU_FUNC_ATTRIBUTE_LOCAL_SIZE_BYTES,
            KernelAttribute::NumRegs => CU_FUNC_ATTRIBUTE_NUM_REGS,
            KernelAttribute::PtxVersion => CU_FUNC_ATTRIBUTE_PTX_VERSION,
            KernelAttribute::BinaryVersion => CU_FUNC_ATTRIBUTE_BINARY_VERSION,
            KernelAttribute::CacheModeCa => CU_FUNC_ATTRIBUTE_CACHE_MODE_CA,
            KernelAttribute::MaxDynamicSharedSizeBytes => {
                CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES
            }
            KernelAttribute::PreferredSharedMemoryCarveout => {
                CU_FUNC_ATTRIBUTE_PREFERRED_SHARED_MEMORY_CARVEOUT
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KernelAttribute::MaxThreadsPerBlock => "maximum number of threads per block",
            KernelAttribute::SharedSizeBytes => "statically-allocated shared memory size in bytes",
            KernelAttribute::ConstSizeBytes => "required constant memory size in bytes",
            KernelAttribute::LocalSizeBytes => "required local memory size in bytes",
            KernelAttribute::NumRegs => "number of registers used by each thread",
            KernelAttribute::PtxVersion => "PTX virtual architecture version",
            KernelAttribute::BinaryVersion => "binary architecture version",
            KernelAttribute::CacheModeCa => "cache mode CA indicator",
            KernelAttribute::MaxDynamicSharedSizeBytes => {
                "maximum dynamically-allocated shared memory size in bytes"
            }
            KernelAttribute::PreferredSharedMemoryCarveout => "preferred shared memory carve-out",
        }
    }

    /// Only these two attributes can be changed; the rest describe the compiled code.
    pub fn is_settable(self) -> bool {
        matches!(
            self,
            KernelAttribute::MaxDynamicSharedSizeBytes
                | KernelAttribute::PreferredSharedMemoryCarveout
        )
    }

    fn validate(self, value: i32) -> Result<()> {
        if !self.is_settable() {
            return Err(Error::InvalidArgument(format!("the {} is read-only", self.name())));
        }
        match self {
            // -1 selects the driver's default carve-out.
            KernelAttribute::PreferredSharedMemoryCarveout if !(-1..=100).contains(&value) => {
                Err(Error::InvalidArgument(format!(
                    "shared memory carve-out must be a percentage between 0 and 100 (got {})",
                    value
                )))
            }
            KernelAttribute::MaxDynamicSharedSizeBytes if value < 0 => Err(Error::InvalidArgument(
                format!("the {} cannot be negative (got {})", self.name(), value),
            )),
            _ => Ok(()),
        }
    }
}

/// Split of on-chip memory between L1 cache and shared memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePreference {
    #[default]
    NoPreference,
    PreferShared,
    PreferL1,
    Equal,
}

impl CachePreference {
    fn raw(self) -> i32 {
        match self {
            CachePreference::NoPreference => CU_FUNC_CACHE_PREFER_NONE,
            CachePreference::PreferShared => CU_FUNC_CACHE_PREFER_SHARED,
            CachePreference::PreferL1 => CU_FUNC_CACHE_PREFER_L1,
            CachePreference::Equal => CU_FUNC_CACHE_PREFER_EQUAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharedMemoryBankSize {
    #[default]
    DeviceDefault,
    FourBytes,
    EightBytes,
}

impl SharedMemoryBankSize {
    fn raw(self) -> i32 {
        match self {
            SharedMemoryBankSize::DeviceDefault => CU_SHARED_MEM_CONFIG_DEFAULT_BANK_SIZE,
            SharedMemoryBankSize::FourBytes => CU_SHARED_MEM_CONFIG_FOUR_BYTE_BANK_SIZE,
            SharedMemoryBankSize::EightBytes => CU_SHARED_MEM_CONFIG_EIGHT_BYTE_BANK_SIZE,
        }
    }
}

/// All attribute values of a kernel, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelAttributes {
    pub max_threads_per_block: u32,
    pub shared_size_bytes: usize,
    pub const_size_bytes: usize,
    pub local_size_bytes: usize,
    pub num_regs: u32,
    pub ptx_version: ComputeCapability,
    pub binary_version: ComputeCapability,
    pub cache_mode_ca: bool,
    pub max_dynamic_shared_size_bytes: usize,
    pub preferred_shared_memory_carveout: i32,
}

/// A kernel in a loaded module. Never owns the compiled code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    handle: Handle<FunctionKind>,
    context: Context,
}

impl Kernel {
    /// Observe a function handle obtained in `context`.
    pub fn wrap(context: &Context, raw: CUfunction) -> Kernel {
        Kernel {
            handle: Handle::observing(Arc::clone(context.runtime()), context.device_id(), raw),
            context: context.clone(),
        }
    }

    pub fn raw(&self) -> CUfunction {
        self.handle.raw()
    }

    pub fn device_id(&self) -> DeviceId {
        self.handle.device_id()
    }

    pub fn device(&self) -> Result<Device> {
        Device::get(self.runtime(), self.device_id())
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        self.handle.runtime()
    }

    pub fn identify(&self) -> String {
        self.handle.identify()
    }

    pub fn get_attribute(&self, attribute: KernelAttribute) -> Result<i32> {
        current::with_override(self.runtime(), &self.context, || {
            self.runtime()
                .driver()
                .func_get_attribute(attribute.raw(), self.raw())
                .map_err(|code| {
                    Error::driver(
                        code,
                        format!("reading the {} of {}", attribute.name(), self.identify()),
                    )
                })
        })
    }

    /// Change a settable attribute. Invalid values are rejected before the
    /// driver is involved.
    pub fn set_attribute(&self, attribute: KernelAttribute, value: i32) -> Result<()> {
        attribute.validate(value)?;
        self.runtime().require(Capability::FunctionAttributeSetting)?;
        current::with_override(self.runtime(), &self.context, || {
            let res =
                self.runtime().driver().func_set_attribute(self.raw(), attribute.raw(), value);
            check(res, || {
                format!("setting the {} of {} to {}", attribute.name(), self.identify(), value)
            })
        })?;
        debug!(kernel = %self.identify(), "{} set to {}", attribute.name(), value);
        Ok(())
    }

    /// Allow launches to request up to `bytes` of dynamic shared memory.
    pub fn set_maximum_dynamic_shared_memory_per_block(&self, bytes: usize) -> Result<()> {
        let value = i32::try_from(bytes).map_err(|_| {
            Error::InvalidArgument(format!(
                "{} bytes of dynamic shared memory exceeds the attribute's range",
                bytes
            ))
        })?;
        self.set_attribute(KernelAttribute::MaxDynamicSharedSizeBytes, value)
    }

    pub fn get_maximum_dynamic_shared_memory_per_block(&self) -> Result<usize> {
        let value = self.get_attribute(KernelAttribute::MaxDynamicSharedSizeBytes)?;
        Ok(value.max(0) as usize)
    }

    /// Percentage of the unified L1/shared storage to carve out as shared memory.
    pub fn set_preferred_shared_mem_fraction(&self, percent: u32) -> Result<()> {
        if percent > 100 {
            return Err(Error::InvalidArgument(format!(
                "shared memory carve-out can't exceed 100% (got {})",
                percent
            )));
        }
        self.set_attribute(KernelAttribute::PreferredSharedMemoryCarveout, percent as i32)
    }

    pub fn set_cache_preference(&self, preference: CachePreference) -> Result<()> {
        current::with_override(self.runtime(), &self.context, || {
            let res = self.runtime().driver().func_set_cache_config(self.raw(), preference.raw());
            check(res, || {
                format!("setting the cache preference of {} to {:?}", self.identify(), preference)
            })
        })
    }

    pub fn set_shared_memory_bank_size(&self, size: SharedMemoryBankSize) -> Result<()> {
        current::with_override(self.runtime(), &self.context, || {
            let res = self.runtime().driver().func_set_shared_mem_config(self.raw(), size.raw());
            check(res, || {
                format!(
                    "setting the shared memory bank size of {} to {:?}",
                    self.identify(),
                    size
                )
            })
        })
    }

    pub fn maximum_threads_per_block(&self) -> Result<u32> {
        Ok(self.get_attribute(KernelAttribute::MaxThreadsPerBlock)?.max(0) as u32)
    }

    /// Virtual architecture the kernel's PTX was compiled for.
    pub fn ptx_version(&self) -> Result<ComputeCapability> {
        let combined = self.get_attribute(KernelAttribute::PtxVersion)?;
        Ok(ComputeCapability::from_combined(combined.max(0) as u32))
    }

    /// Architecture of the binary code the kernel runs as.
    pub fn binary_compilation_target_architecture(&self) -> Result<ComputeCapability> {
        let combined = self.get_attribute(KernelAttribute::BinaryVersion)?;
        Ok(ComputeCapability::from_combined(combined.max(0) as u32))
    }

    pub fn attributes(&self) -> Result<KernelAttributes> {
        let bytes = |attribute: KernelAttribute| -> Result<usize> {
            Ok(self.get_attribute(attribute)?.max(0) as usize)
        };
        Ok(KernelAttributes {
            max_threads_per_block: self.maximum_threads_per_block()?,
            shared_size_bytes: bytes(KernelAttribute::SharedSizeBytes)?,
            const_size_bytes: bytes(KernelAttribute::ConstSizeBytes)?,
            local_size_bytes: bytes(KernelAttribute::LocalSizeBytes)?,
            num_regs: self.get_attribute(KernelAttribute::NumRegs)?.max(0) as u32,
            ptx_version: self.ptx_version()?,
            binary_version: self.binary_compilation_target_architecture()?,
            cache_mode_ca: self.get_attribute(KernelAttribute::CacheModeCa)? != 0,
            max_dynamic_shared_size_bytes: bytes(KernelAttribute::MaxDynamicSharedSizeBytes)?,
            preferred_shared_memory_carveout: self
                .get_attribute(KernelAttribute::PreferredSharedMemoryCarveout)?,
        })
    }

    /// How many blocks of `num_threads_per_block` threads, each using
    /// `dynamic_shared_memory_per_block` bytes, fit on one multiprocessor at once.
    pub fn maximum_active_blocks_per_multiprocessor(
        &self,
        num_threads_per_block: u32,
        dynamic_shared_memory_per_block: usize,
        disable_caching_override: bool,
    ) -> Result<u32> {
        self.runtime().require(Capability::OccupancyCalculation)?;
        current::with_override(self.runtime(), &self.context, || {
            self.active_blocks_in_current_context(
                num_threads_per_block,
                dynamic_shared_memory_per_block,
                disable_caching_override,
            )
        })
    }

    /// Occupancy query for callers that already made the kernel's context current.
    pub(crate) fn active_blocks_in_current_context(
        &self,
        num_threads_per_block: u32,
        dynamic_shared_memory_per_block: usize,
        disable_caching_override: bool,
    ) -> Result<u32> {
        let flags = if disable_caching_override {
            CU_OCCUPANCY_DISABLE_CACHING_OVERRIDE
        } else {
            CU_OCCUPANCY_DEFAULT
        };
        let block_size = i32::try_from(num_threads_per_block).map_err(|_| {
            Error::InvalidArgument(format!("block size {} is out of range", num_threads_per_block))
        })?;
        let blocks = self
            .runtime()
            .driver()
            .occupancy_max_active_blocks_with_flags(
                self.raw(),
                block_size,
                dynamic_shared_memory_per_block,
                flags,
            )
            .map_err(|code| {
                Error::driver(
                    code,
                    format!(
                        "computing occupancy of {} for blocks of {} threads with {} bytes of dynamic shared memory",
                        self.identify(),
                        num_threads_per_block,
                        dynamic_shared_memory_per_block
                    ),
                )
            })?;
        Ok(blocks.max(0) as u32)
    }

    /// Handle usable as a raw launch target.
    pub fn as_raw(&self) -> crate::enqueue::RawKernel {
        crate::enqueue::RawKernel::new(self.runtime(), self.raw())
    }
}
