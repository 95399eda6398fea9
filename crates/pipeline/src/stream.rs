//! The persisted event log: newline-delimited JSON, at most one record per
//! file path, merged in place after every run.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use confcheck_core::Outcome;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::event::{Event, RunStamp};

/// File name of the event log inside the report directory.
pub const EVENT_LOG_FILE: &str = "stream.ndjson";

/// Counts from one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Records written from the current batch.
    pub updated: usize,
    /// Records in the log after the merge.
    pub total: usize,
    /// Existing lines dropped because they were not valid records.
    pub skipped: usize,
}

#[derive(Deserialize)]
struct RecordKey {
    #[serde(default)]
    path: String,
}

/// Per-log write locks, shared by every merger in the process.
fn log_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .expect("event log lock registry poisoned");
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// Upserts outcomes into an event log.
///
/// Existing records keep their position; records for new paths are appended
/// in batch order. Merges into the same log are serialized across the whole
/// process, and the log is replaced atomically (temp file, fsync, rename).
#[derive(Debug, Clone, Default)]
pub struct ResultStreamMerger;

impl ResultStreamMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, log_path: &Path, batch: &[Outcome]) -> Result<MergeStats> {
        self.merge_with_stamp(log_path, batch, &RunStamp::now())
    }

    pub fn merge_with_stamp(&self, log_path: &Path, batch: &[Outcome], stamp: &RunStamp) -> Result<MergeStats> {
        let log_path = resolve(log_path)?;
        let lock = log_lock(&log_path);
        let _guard = lock.lock().expect("event log lock poisoned");

        let (mut records, skipped) = read_records(&log_path)?;
        for outcome in batch {
            let event = Event::from_outcome(outcome, stamp);
            records.insert(event.path().to_string(), serde_json::to_string(&event)?);
        }
        write_records(&log_path, &records)?;

        let stats = MergeStats {
            updated: batch.len(),
            total: records.len(),
            skipped,
        };
        info!(
            path = %log_path.display(),
            updated = stats.updated,
            total = stats.total,
            "event log updated"
        );
        Ok(stats)
    }
}

/// Create the parent directory and return an absolute lock key for the log.
fn resolve(log_path: &Path) -> Result<PathBuf> {
    let parent = match log_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let file_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| EVENT_LOG_FILE.into());
    Ok(fs::canonicalize(&parent)?.join(file_name))
}

/// Existing records keyed by path, raw lines preserved.
fn read_records(log_path: &Path) -> Result<(IndexMap<String, String>, usize)> {
    let mut records = IndexMap::new();
    let file = match File::open(log_path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((records, 0)),
        Err(e) => return Err(e.into()),
    };

    let mut skipped = 0;
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RecordKey>(line) {
            Ok(key) if !key.path.is_empty() => {
                records.insert(key.path, line.to_string());
            }
            _ => {
                debug!(line = %line, "dropping malformed event log line");
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

fn write_records(log_path: &Path, records: &IndexMap<String, String>) -> Result<()> {
    let tmp_path = log_path.with_extension("ndjson.tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    for line in records.values() {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp_path, log_path)?;
    Ok(())
}
