pub mod config;
pub mod error;

pub use config::{default_config_path, CuwrapConfig};
pub use error::{check, Error, Result};
