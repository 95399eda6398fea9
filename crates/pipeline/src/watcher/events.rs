//! Translation of raw filesystem notifications into watcher signals.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use confcheck_core::storage::{in_excluded_dir, is_yaml_path};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use sha2::{Digest, Sha256};

/// Content fingerprint taken when a change is observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// SHA-256 of the file bytes.
    Digest(String),
    /// The file no longer exists.
    Vanished,
    /// The file exists but could not be read; always treated as changed.
    Unreadable,
}

impl Fingerprint {
    pub fn of(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => Self::Digest(format!("{:x}", Sha256::digest(&bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Self::Vanished,
            Err(_) => Self::Unreadable,
        }
    }
}

/// A filesystem observation relevant to validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsSignal {
    Changed { path: PathBuf, fingerprint: Fingerprint },
    Removed { path: PathBuf },
    Moved { from: PathBuf, to: PathBuf, fingerprint: Fingerprint },
}

impl FsSignal {
    /// A created or modified file, fingerprinted now.
    pub fn changed(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let fingerprint = Fingerprint::of(&path);
        Self::Changed { path, fingerprint }
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::Removed { path: path.into() }
    }

    /// A rename; the destination is fingerprinted now.
    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        let to = to.into();
        let fingerprint = Fingerprint::of(&to);
        Self::Moved {
            from: from.into(),
            to,
            fingerprint,
        }
    }
}

/// YAML files outside excluded directories.
pub fn is_watched(path: &Path) -> bool {
    is_yaml_path(path) && !in_excluded_dir(path)
}

/// Map one notify event to zero or more signals. Directory events and
/// paths that are not watched produce nothing.
pub fn translate(event: &Event) -> Vec<FsSignal> {
    let watched = || event.paths.iter().filter(|p| is_watched(p) && !p.is_dir());

    match &event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Other) => watched().map(FsSignal::changed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let (from, to) = (&event.paths[0], &event.paths[1]);
            match (is_watched(from), is_watched(to) && !to.is_dir()) {
                (true, true) => vec![FsSignal::moved(from, to)],
                (true, false) => vec![FsSignal::removed(from)],
                (false, true) => vec![FsSignal::changed(to)],
                (false, false) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .filter(|p| is_watched(p))
            .map(FsSignal::removed)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => watched().map(FsSignal::changed).collect(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|p| is_watched(p))
            .map(|p| {
                if p.exists() {
                    FsSignal::changed(p)
                } else {
                    FsSignal::removed(p)
                }
            })
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter(|p| is_watched(p))
            .map(FsSignal::removed)
            .collect(),
        _ => Vec::new(),
    }
}
