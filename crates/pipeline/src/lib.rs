//! Validation pipeline: per-file validation, bounded-parallel batches,
//! the persisted event log, reports and the change watcher.
//!
//! Data flow: [`ChangeWatcher`] / CLI → [`ValidationService`] →
//! [`ConcurrentValidationEngine`] → ([`FileValidator`] × N) → outcomes →
//! [`ResultStreamMerger`] (event log) and [`ReportWriter`] (report file).

pub mod concurrent;
pub mod error;
pub mod event;
pub mod report;
pub mod service;
pub mod stream;
pub mod validator;
pub mod watcher;

pub use concurrent::ConcurrentValidationEngine;
pub use error::{PipelineError, Result};
pub use event::{Event, FileSummary, RunStamp};
pub use report::{generate_report, ReportWriter, Summary};
pub use service::{RunReport, ValidationService};
pub use stream::{MergeStats, ResultStreamMerger, EVENT_LOG_FILE};
pub use validator::{FileValidator, SequentialValidator, Validate};
pub use watcher::{BatchHandler, ChangeBatch, ChangeWatcher, FsSignal, Revalidation, WatchOptions};
