use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid image pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid validation config: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
