//! YAML configuration parsing for the Zeus CI pipeline engine.
//!
//! This crate handles parsing of:
//! - Pipeline definitions (`.zeusci/config.yml`)
//! - System configuration (`/etc/zeus-ci/config.yml`)

pub mod error;
pub mod pipeline;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use pipeline::parse_pipeline;
pub use system::{load_system_config, parse_system_config, SystemConfig};
