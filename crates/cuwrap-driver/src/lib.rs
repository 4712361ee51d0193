//! Native boundary of the wrapper layer: raw types, status codes and the
//! `Driver` trait, plus `CudaDriver`, which loads the real driver library.

pub mod sys;
pub mod status;
pub mod capability;
pub mod api;
pub mod loader;

pub use api::Driver;
pub use capability::Capability;
pub use loader::CudaDriver;
pub use status::cuda_error_name;
