//! Bounded-parallel validation with per-file timeouts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confcheck_core::{Outcome, Settings};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::validator::{FileValidator, Validate};

/// Above this many discovered files, each batch logs progress.
const PROGRESS_LOG_THRESHOLD: usize = 1000;

/// Runs [`FileValidator`] on blocking threads, at most `max_concurrency`
/// at a time.
///
/// The permit pool is shared by every call on the same engine, so
/// overlapping runs (e.g. from the watcher) respect one global bound.
/// A file's timeout starts once it holds a permit. A timed-out validation
/// is abandoned and its permit released; the blocking thread finishes in
/// the background and its result is discarded.
#[derive(Clone)]
pub struct ConcurrentValidationEngine {
    validator: FileValidator,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Duration,
    batch_size: usize,
}

impl ConcurrentValidationEngine {
    pub fn new(validator: FileValidator, settings: &Settings) -> Self {
        let max_concurrency = settings.max_concurrency.max(1);
        Self {
            validator,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            timeout: settings.file_timeout,
            batch_size: settings.batch_size.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate every path, returning outcomes in input order.
    ///
    /// Paths are pulled from `paths` lazily, `batch_size` at a time.
    pub async fn validate_all<I>(&self, paths: I) -> Vec<Outcome>
    where
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: Send,
    {
        let mut paths = paths.into_iter();
        let mut outcomes = Vec::new();
        let mut seen = 0usize;

        loop {
            let batch: Vec<PathBuf> = paths.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            seen += batch.len();
            outcomes.extend(self.validate_batch(batch).await);

            if seen > PROGRESS_LOG_THRESHOLD {
                info!(processed = outcomes.len(), discovered = seen, "validation progress");
            }
        }
        outcomes
    }

    async fn validate_batch(&self, batch: Vec<PathBuf>) -> Vec<Outcome> {
        let handles: Vec<_> = batch
            .iter()
            .cloned()
            .map(|path| {
                tokio::spawn(validate_one(
                    self.validator.clone(),
                    Arc::clone(&self.permits),
                    self.timeout,
                    path,
                ))
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(batch)
            .map(|(joined, path)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "validation task failed");
                    Outcome::crashed(path.display().to_string(), e.to_string())
                }
            })
            .collect()
    }
}

async fn validate_one(
    validator: FileValidator,
    permits: Arc<Semaphore>,
    timeout: Duration,
    path: PathBuf,
) -> Outcome {
    let shown = path.display().to_string();
    let Ok(_permit) = permits.acquire_owned().await else {
        return Outcome::crashed(shown, "validation pool closed");
    };

    let worker = tokio::task::spawn_blocking(move || validator.validate(&path));
    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(path = %shown, error = %e, "validator panicked");
            Outcome::crashed(shown, format!("{e:?}"))
        }
        Err(_) => {
            error!(path = %shown, timeout = ?timeout, "timed out validating file");
            Outcome::timed_out(shown)
        }
    }
}

#[async_trait]
impl Validate for ConcurrentValidationEngine {
    async fn validate(&self, paths: Vec<PathBuf>) -> Vec<Outcome> {
        self.validate_all(paths).await
    }
}
