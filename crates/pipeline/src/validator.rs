//! Single-file validation and the sequential validator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use confcheck_core::{parse_document, Document, Issue, Outcome, Storage, ValidationConfig};
use confcheck_rules::RuleEngine;
use tracing::{debug, warn};

/// Validates one file: read, parse, run every rule, collect issues.
///
/// Never fails; read and parse problems become single-issue outcomes.
/// Cheap to clone, so it can be moved into blocking worker threads.
#[derive(Clone)]
pub struct FileValidator {
    storage: Arc<dyn Storage>,
    engine: RuleEngine,
    config: Arc<ValidationConfig>,
}

impl FileValidator {
    pub fn new(storage: Arc<dyn Storage>, engine: RuleEngine, config: Arc<ValidationConfig>) -> Self {
        Self {
            storage,
            engine,
            config,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate(&self, path: &Path) -> Outcome {
        let shown = path.display().to_string();

        let bytes = match self.storage.read_file(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %shown, error = %e, "failed to read file");
                return Outcome::failed(
                    shown.clone(),
                    Issue::new(
                        "file.parse_error",
                        format!("Failed to read file {shown}: {e}"),
                        &["parse", "error"],
                    ),
                );
            }
        };

        let data = match parse_document(&bytes) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %shown, error = %e, "failed to parse file");
                return Outcome::failed(
                    shown.clone(),
                    Issue::new(
                        "file.parse_error",
                        format!("parse error in {shown}: {e}"),
                        &["parse", "error"],
                    ),
                );
            }
        };

        let (issues, registry) = match data.as_object() {
            Some(doc) => (self.engine.run(doc, &self.config), self.registry_of(doc)),
            None => (Vec::new(), None),
        };
        debug!(path = %shown, issues = issues.len(), "file validated");

        Outcome::new(shown, issues, registry, Some(data))
    }

    fn registry_of(&self, doc: &Document) -> Option<String> {
        doc.get("image")
            .and_then(|v| v.as_str())
            .and_then(|image| self.config.extract_registry(image))
    }
}

/// Validates a list of paths, returning one outcome per path in input order.
#[async_trait]
pub trait Validate: Send + Sync {
    async fn validate(&self, paths: Vec<PathBuf>) -> Vec<Outcome>;
}

/// One file at a time on a single blocking thread.
#[derive(Clone)]
pub struct SequentialValidator {
    validator: FileValidator,
}

impl SequentialValidator {
    pub fn new(validator: FileValidator) -> Self {
        Self { validator }
    }

    pub fn validate_blocking(&self, paths: &[PathBuf]) -> Vec<Outcome> {
        paths.iter().map(|p| self.validator.validate(p)).collect()
    }
}

#[async_trait]
impl Validate for SequentialValidator {
    async fn validate(&self, paths: Vec<PathBuf>) -> Vec<Outcome> {
        let this = self.clone();
        let fallback = paths.clone();
        match tokio::task::spawn_blocking(move || this.validate_blocking(&paths)).await {
            Ok(outcomes) => outcomes,
            Err(e) => fallback
                .iter()
                .map(|p| Outcome::crashed(p.display().to_string(), e.to_string()))
                .collect(),
        }
    }
}
