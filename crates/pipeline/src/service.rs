//! Orchestration of one validation pass: discover, validate, persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use confcheck_core::{Outcome, Settings, Storage};
use tracing::{info, warn};

use crate::concurrent::ConcurrentValidationEngine;
use crate::error::Result;
use crate::event::{FileSummary, RunStamp};
use crate::report::{generate_report, ReportWriter, Summary};
use crate::stream::{MergeStats, ResultStreamMerger, EVENT_LOG_FILE};
use crate::validator::FileValidator;
use crate::watcher::{BatchHandler, ChangeBatch, Revalidation};

/// Everything a finished pass produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<Outcome>,
    pub entries: Vec<FileSummary>,
    pub summary: Summary,
    pub report_path: PathBuf,
    pub event_log: PathBuf,
    pub merge: MergeStats,
}

/// Validates a tree (or a subset of it), merges the outcomes into the
/// event log and writes a report.
pub struct ValidationService {
    root: PathBuf,
    report_dir: PathBuf,
    storage: Arc<dyn Storage>,
    engine: ConcurrentValidationEngine,
    merger: ResultStreamMerger,
    report_writer: ReportWriter,
}

impl ValidationService {
    pub fn new(
        root: impl Into<PathBuf>,
        report_dir: impl Into<PathBuf>,
        validator: FileValidator,
        settings: &Settings,
    ) -> Self {
        let report_dir = report_dir.into();
        Self {
            root: root.into(),
            storage: Arc::clone(validator.storage()),
            engine: ConcurrentValidationEngine::new(validator, settings),
            merger: ResultStreamMerger::new(),
            report_writer: ReportWriter::new(&report_dir),
            report_dir,
        }
    }

    /// Replace the report writer (e.g. to change fallback locations).
    pub fn with_report_writer(mut self, writer: ReportWriter) -> Self {
        self.report_writer = writer;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.report_dir.join(EVENT_LOG_FILE)
    }

    /// Lazily list candidate files under the root.
    pub fn discover_files(&self) -> impl Iterator<Item = PathBuf> + Send + '_ {
        self.storage.list_candidate_files(&self.root)
    }

    /// Validate `files` with bounded parallelism; outcomes in input order.
    pub async fn validate_files<I>(&self, files: I) -> Vec<Outcome>
    where
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: Send,
    {
        self.engine.validate_all(files).await
    }

    /// Merge `outcomes` into the event log.
    pub async fn stream_to_event_log(&self, outcomes: Vec<Outcome>) -> Result<MergeStats> {
        let merger = self.merger.clone();
        let log_path = self.event_log_path();
        tokio::task::spawn_blocking(move || merger.merge(&log_path, &outcomes)).await?
    }

    /// Validate every candidate file under the root.
    pub async fn run_validation(&self) -> Result<RunReport> {
        info!(root = %self.root.display(), "starting validation");
        let outcomes = self.validate_files(self.discover_files()).await;
        if outcomes.is_empty() {
            warn!(root = %self.root.display(), "no files to validate");
        }
        self.persist(outcomes).await
    }

    /// Validate only `paths`.
    pub async fn validate_specific_files(&self, paths: Vec<PathBuf>) -> Result<RunReport> {
        info!(files = paths.len(), "validating specific files");
        let outcomes = self.validate_files(paths).await;
        self.persist(outcomes).await
    }

    async fn persist(&self, outcomes: Vec<Outcome>) -> Result<RunReport> {
        let merger = self.merger.clone();
        let writer = self.report_writer.clone();
        let event_log = self.event_log_path();

        let report = tokio::task::spawn_blocking(move || -> Result<RunReport> {
            let merge = merger.merge_with_stamp(&event_log, &outcomes, &RunStamp::now())?;
            let entries = generate_report(&outcomes);
            let report_path = writer.save(&entries)?;
            Ok(RunReport {
                summary: Summary::from_entries(&entries),
                outcomes,
                entries,
                report_path,
                event_log,
                merge,
            })
        })
        .await??;

        info!(
            valid = report.summary.valid,
            invalid = report.summary.invalid,
            total_errors = report.summary.total_errors,
            report = %report.report_path.display(),
            "validation pass complete"
        );
        Ok(report)
    }
}

/// Watch-mode policy: changed files are revalidated individually; a batch
/// of deletions alone triggers a full pass.
#[async_trait]
impl BatchHandler for ValidationService {
    async fn handle(&self, batch: ChangeBatch) -> anyhow::Result<()> {
        match batch.plan() {
            Revalidation::Files(paths) => {
                let report = self.validate_specific_files(paths).await?;
                info!("{}", report.summary);
            }
            Revalidation::Full => {
                info!(deleted = batch.deleted.len(), "files deleted, running full validation");
                let report = self.run_validation().await?;
                info!("{}", report.summary);
            }
            Revalidation::Nothing => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confcheck_core::{LocalStorage, ValidationConfig};
    use confcheck_rules::RuleEngine;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    const VALID: &str = "\
service: user-api
replicas: 3
image: myregistry.com/user-api:v1.0
env:
  DATABASE_URL: postgres://db
";

    fn service(root: &Path, reports: &Path) -> ValidationService {
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(root).unwrap());
        let validator = FileValidator::new(storage, RuleEngine::builtin(), Arc::new(ValidationConfig::default()));
        ValidationService::new(root, reports, validator, &Settings::default())
            .with_report_writer(ReportWriter::new(reports).with_fallbacks(None, None))
    }

    fn logged_paths(log: &Path) -> BTreeSet<String> {
        fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["path"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn full_run_writes_event_log_and_report() {
        let tree = TempDir::new().unwrap();
        let reports = TempDir::new().unwrap();
        fs::write(tree.path().join("good.yaml"), VALID).unwrap();
        fs::write(tree.path().join("bad.yaml"), "service: ''\nreplicas: 0\n").unwrap();
        fs::write(tree.path().join("notes.txt"), "ignored").unwrap();

        let svc = service(tree.path(), reports.path());
        let report = svc.run_validation().await.unwrap();

        assert_eq!(report.summary.files, 2);
        assert_eq!(report.summary.valid, 1);
        assert_eq!(report.summary.invalid, 1);
        assert!(report.report_path.starts_with(reports.path()));
        assert!(report.report_path.exists());
        assert_eq!(report.event_log, reports.path().join("stream.ndjson"));
        assert_eq!(logged_paths(&report.event_log).len(), 2);
    }

    #[tokio::test]
    async fn specific_files_update_only_their_records() {
        let tree = TempDir::new().unwrap();
        let reports = TempDir::new().unwrap();
        let a = tree.path().join("a.yaml");
        let b = tree.path().join("b.yaml");
        fs::write(&a, VALID).unwrap();
        fs::write(&b, VALID).unwrap();

        let svc = service(tree.path(), reports.path());
        svc.run_validation().await.unwrap();

        fs::write(&a, "replicas: 0\n").unwrap();
        let report = svc.validate_specific_files(vec![a.clone()]).await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(!report.outcomes[0].is_valid());
        assert_eq!(report.merge.total, 2);
    }

    #[tokio::test]
    async fn empty_tree_still_writes_a_report() {
        let tree = TempDir::new().unwrap();
        let reports = TempDir::new().unwrap();

        let report = service(tree.path(), reports.path()).run_validation().await.unwrap();
        assert_eq!(report.summary.files, 0);
        assert_eq!(report.summary.to_string(), "No files validated");
        assert_eq!(fs::read_to_string(&report.report_path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn stream_to_event_log_merges_outcomes() {
        let tree = TempDir::new().unwrap();
        let reports = TempDir::new().unwrap();
        let svc = service(tree.path(), reports.path());

        let stats = svc
            .stream_to_event_log(vec![Outcome::timed_out("slow.yaml")])
            .await
            .unwrap();
        assert_eq!(stats.total, 1);
        assert!(logged_paths(&svc.event_log_path()).contains("slow.yaml"));
    }

    #[tokio::test]
    async fn deletion_batch_triggers_full_run() {
        let tree = TempDir::new().unwrap();
        let reports = TempDir::new().unwrap();
        fs::write(tree.path().join("a.yaml"), VALID).unwrap();
        let svc = service(tree.path(), reports.path());

        let mut batch = ChangeBatch::default();
        batch.deleted.insert(tree.path().join("gone.yaml"));
        svc.handle(batch).await.unwrap();

        assert_eq!(logged_paths(&svc.event_log_path()).len(), 1);
    }
}
