//! Report generation, persistence with fallback locations, and the
//! human-readable summary.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use confcheck_core::Outcome;
use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::event::FileSummary;

/// One report entry per outcome, in outcome order.
pub fn generate_report(outcomes: &[Outcome]) -> Vec<FileSummary> {
    outcomes.iter().map(FileSummary::from_outcome).collect()
}

/// Writes report files as a compact JSON array.
///
/// Tries `<report_dir>/Report<stamp>.json`, then the same name in the
/// working directory, then `confcheck-report-<stamp>.json` in the temp
/// directory. Each failure is logged and the next location tried.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    report_dir: PathBuf,
    cwd_fallback: Option<PathBuf>,
    temp_fallback: Option<PathBuf>,
}

impl ReportWriter {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            cwd_fallback: std::env::current_dir().ok(),
            temp_fallback: Some(std::env::temp_dir()),
        }
    }

    /// Replace the fallback directories; `None` disables a fallback.
    pub fn with_fallbacks(mut self, cwd: Option<PathBuf>, temp: Option<PathBuf>) -> Self {
        self.cwd_fallback = cwd;
        self.temp_fallback = temp;
        self
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    fn candidates(&self, stamp: &str) -> Vec<PathBuf> {
        let name = format!("Report{stamp}.json");
        let mut paths = vec![self.report_dir.join(&name)];
        if let Some(cwd) = &self.cwd_fallback {
            paths.push(cwd.join(&name));
        }
        if let Some(temp) = &self.temp_fallback {
            paths.push(temp.join(format!("confcheck-report-{stamp}.json")));
        }
        paths
    }

    /// Persist `entries`, returning the path actually written.
    pub fn save(&self, entries: &[FileSummary]) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        self.save_as(entries, &stamp)
    }

    pub fn save_as(&self, entries: &[FileSummary], stamp: &str) -> Result<PathBuf> {
        let body = serde_json::to_string(entries)?;
        let candidates = self.candidates(stamp);

        for (i, path) in candidates.iter().enumerate() {
            let attempt = if i == 0 {
                fs::create_dir_all(&self.report_dir).and_then(|_| fs::write(path, &body))
            } else {
                fs::write(path, &body)
            };
            match attempt {
                Ok(()) => {
                    info!(path = %path.display(), entries = entries.len(), "report saved");
                    return Ok(path.clone());
                }
                Err(e) => error!(path = %path.display(), error = %e, "failed to save report"),
            }
        }
        Err(PipelineError::ReportExhausted { tried: candidates })
    }
}

/// Valid/invalid counts over a set of report entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub valid: usize,
    pub invalid: usize,
    pub total_errors: usize,
    pub files: usize,
}

impl Summary {
    pub fn from_entries(entries: &[FileSummary]) -> Self {
        let valid = entries.iter().filter(|e| e.valid).count();
        Self {
            valid,
            invalid: entries.len() - valid,
            total_errors: entries.iter().map(|e| e.error_count).sum(),
            files: entries.len(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.files == 0 {
            return write!(f, "No files validated");
        }
        writeln!(f, "Validation Summary:")?;
        writeln!(f, "  Valid: {}", self.valid)?;
        writeln!(f, "  Invalid: {}", self.invalid)?;
        writeln!(f, "  Total errors: {}", self.total_errors)?;
        write!(f, "  Files: {}", self.files)
    }
}
