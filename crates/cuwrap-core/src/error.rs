use cuwrap_driver::sys::CUresult;
use cuwrap_driver::cuda_error_name;

/// Errors raised by the wrapper layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The driver rejected a call.
    #[error("{context}: {name} ({code})")]
    Driver {
        code: CUresult,
        name: &'static str,
        context: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{feature} requires driver version {required} or later (found {found})")]
    NotYetImplemented {
        feature: String,
        required: i32,
        found: i32,
    },

    #[error("no context is current on this thread")]
    NoActiveContext,

    #[error("failed to load driver: {0}")]
    Load(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn driver(code: CUresult, context: impl Into<String>) -> Self {
        Error::Driver {
            code,
            name: cuda_error_name(code),
            context: context.into(),
        }
    }

    /// The native status code, if the driver produced this error.
    pub fn code(&self) -> Option<CUresult> {
        match self {
            Error::Driver { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Convert a raw status into `Ok(())` or a driver error described by `context`.
pub fn check(code: CUresult, context: impl FnOnce() -> String) -> Result<()> {
    if code == cuwrap_driver::sys::CUDA_SUCCESS {
        Ok(())
    } else {
        Err(Error::driver(code, context()))
    }
}
