/// Driver features whose availability depends on the installed driver revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `cuFuncSetAttribute` (dynamic shared memory opt-in, carve-out).
    FunctionAttributeSetting,
    /// `cuOccupancyMaxActiveBlocksPerMultiprocessorWithFlags`.
    OccupancyCalculation,
    /// `cuLaunchCooperativeKernel`.
    CooperativeLaunch,
    /// `cuIpcGetEventHandle` / `cuIpcOpenEventHandle`.
    InterprocessEvents,
    /// `cuMemAllocAsync` / `cuMemFreeAsync`.
    StreamOrderedAllocation,
}

impl Capability {
    /// Lowest driver version (as reported by `cuDriverGetVersion`) providing the feature.
    pub fn minimum_driver_version(self) -> i32 {
        match self {
            Capability::FunctionAttributeSetting => 9000,
            Capability::OccupancyCalculation => 10010,
            Capability::CooperativeLaunch => 9000,
            Capability::InterprocessEvents => 4010,
            Capability::StreamOrderedAllocation => 11020,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::FunctionAttributeSetting => "kernel attribute setting",
            Capability::OccupancyCalculation => "occupancy calculation",
            Capability::CooperativeLaunch => "cooperative kernel launch",
            Capability::InterprocessEvents => "inter-process events",
            Capability::StreamOrderedAllocation => "stream-ordered memory allocation",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
