//! Shared data model, configuration and storage for confcheck.
//!
//! - [`document`]: parsed documents, issues and per-file outcomes
//! - [`validation_config`]: rule thresholds loaded from YAML
//! - [`config`]: runtime settings read from the environment
//! - [`storage`]: the file listing/reading collaborator

pub mod config;
pub mod document;
pub mod error;
pub mod storage;
pub mod validation_config;

pub use config::Settings;
pub use document::*;
pub use error::*;
pub use storage::{load_storage, LocalStorage, Storage, StorageConfig};
pub use validation_config::{load_validation_config, CustomRule, EnvKeyCase, ValidationConfig};
