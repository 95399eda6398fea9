//! Storage collaborator: lists candidate files and reads their bytes.
//!
//! Strategies are picked by name from a storage config file
//! (`{type: local, config: {base_path: ...}}`). Only the local filesystem
//! strategy exists today.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Directories never descended into, by the walker or the watcher.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    ".idea",
    ".venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
];

const EXCLUDED_EXTS: &[&str] = &["zip", "tar", "gz", "rar"];

/// Source of candidate files and their contents.
///
/// Implementations are called from blocking worker threads, many at once.
pub trait Storage: Send + Sync {
    /// Lazily list candidate document paths under `root`.
    fn list_candidate_files(&self, root: &Path) -> Box<dyn Iterator<Item = PathBuf> + Send + '_>;

    /// Read the raw bytes of one file.
    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// True for `.yml` / `.yaml` paths (case-insensitive).
pub fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

/// True when any component of `path` is an excluded directory name.
pub fn in_excluded_dir(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|name| EXCLUDED_DIRS.contains(&name))
            .unwrap_or(false)
    })
}

fn has_excluded_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXCLUDED_EXTS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

// ── Local filesystem ──────────────────────────────────────────

/// Local filesystem strategy.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create the strategy, creating `base_path` (and parents) if missing.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn from_config(config: &serde_yaml::Mapping) -> Result<Arc<dyn Storage>> {
        let base_path = config
            .get("base_path")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CoreError::Storage("local strategy requires 'base_path' in configuration".into())
            })?;
        Ok(Arc::new(Self::new(base_path)?))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    fn list_candidate_files(&self, root: &Path) -> Box<dyn Iterator<Item = PathBuf> + Send + '_> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                !(e.depth() > 0
                    && e.file_type().is_dir()
                    && e.file_name()
                        .to_str()
                        .map(|n| EXCLUDED_DIRS.contains(&n))
                        .unwrap_or(false))
            })
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| !has_excluded_ext(p) && is_yaml_path(p))
            .map(|p| fs::canonicalize(&p).unwrap_or(p));
        Box::new(walker)
    }

    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        fs::read(path)
    }
}

// ── Strategy loading ──────────────────────────────────────────

type StrategyFactory = fn(&serde_yaml::Mapping) -> Result<Arc<dyn Storage>>;

const STRATEGIES: &[(&str, StrategyFactory)] = &[("local", LocalStorage::from_config)];

/// Storage strategy selection as written in a storage config file.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

impl StorageConfig {
    /// Local strategy rooted at `base_path`.
    pub fn local(base_path: &Path) -> Self {
        let mut config = serde_yaml::Mapping::new();
        config.insert(
            "base_path".into(),
            base_path.to_string_lossy().into_owned().into(),
        );
        Self {
            kind: "local".to_string(),
            config: serde_yaml::Value::Mapping(config),
        }
    }

    /// Read a storage config file. A missing file is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// Instantiate the strategy named by `config.kind`.
pub fn load_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let kind = config.kind.trim().to_lowercase();
    let options = match &config.config {
        serde_yaml::Value::Mapping(m) => m.clone(),
        serde_yaml::Value::Null => serde_yaml::Mapping::new(),
        _ => {
            return Err(CoreError::Storage(
                "storage 'config' must be a mapping".to_string(),
            ))
        }
    };

    let Some((_, factory)) = STRATEGIES.iter().find(|(name, _)| *name == kind) else {
        let available: Vec<&str> = STRATEGIES.iter().map(|(name, _)| *name).collect();
        return Err(CoreError::Storage(format!(
            "unknown storage strategy '{}', available: {}",
            kind,
            available.join(", ")
        )));
    };

    let storage = factory(&options)?;
    info!(strategy = %kind, "storage strategy loaded");
    Ok(storage)
}
