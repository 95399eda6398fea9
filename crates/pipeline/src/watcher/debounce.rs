//! Pending-change accumulation between debounce firings.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use super::events::{Fingerprint, FsSignal};

/// Paths collected during one quiet interval. A path is never in both sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub changed: BTreeSet<PathBuf>,
    pub deleted: BTreeSet<PathBuf>,
}

/// What a batch asks the validation service to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// Validate exactly these files.
    Files(Vec<PathBuf>),
    /// Only deletions: validate the whole tree.
    Full,
    Nothing,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    pub fn plan(&self) -> Revalidation {
        if !self.changed.is_empty() {
            Revalidation::Files(self.changed.iter().cloned().collect())
        } else if !self.deleted.is_empty() {
            Revalidation::Full
        } else {
            Revalidation::Nothing
        }
    }
}

/// Content-hash cache plus the pending sets. Owned by the debounce task.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    hashes: HashMap<PathBuf, Fingerprint>,
    batch: ChangeBatch,
}

impl PendingChanges {
    /// Record a signal. Returns true when pending state changed, i.e. the
    /// debounce timer should be (re)armed.
    pub(crate) fn apply(&mut self, signal: FsSignal) -> bool {
        match signal {
            FsSignal::Changed { path, fingerprint } => self.observe_change(path, fingerprint),
            FsSignal::Removed { path } => {
                self.observe_removal(path);
                true
            }
            FsSignal::Moved { from, to, fingerprint } => {
                self.observe_removal(from);
                self.observe_change(to, fingerprint);
                true
            }
        }
    }

    fn observe_change(&mut self, path: PathBuf, fingerprint: Fingerprint) -> bool {
        if fingerprint != Fingerprint::Unreadable && self.hashes.get(&path) == Some(&fingerprint) {
            return false;
        }
        self.hashes.insert(path.clone(), fingerprint);
        self.batch.deleted.remove(&path);
        self.batch.changed.insert(path);
        true
    }

    fn observe_removal(&mut self, path: PathBuf) {
        self.hashes.remove(&path);
        self.batch.changed.remove(&path);
        self.batch.deleted.insert(path);
    }

    /// Take the accumulated batch, leaving both sets empty.
    pub(crate) fn take(&mut self) -> Option<ChangeBatch> {
        let batch = std::mem::take(&mut self.batch);
        (!batch.is_empty()).then_some(batch)
    }

    /// Drop pending paths without dispatching them. The hash cache is kept.
    pub(crate) fn discard(&mut self) -> usize {
        let batch = std::mem::take(&mut self.batch);
        batch.changed.len() + batch.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(path: &str, digest: &str) -> FsSignal {
        FsSignal::Changed {
            path: PathBuf::from(path),
            fingerprint: Fingerprint::Digest(digest.to_string()),
        }
    }

    #[test]
    fn identical_content_is_ignored_after_first_sighting() {
        let mut pending = PendingChanges::default();
        assert!(pending.apply(changed("a.yaml", "h1")));
        assert!(pending.take().is_some());

        assert!(!pending.apply(changed("a.yaml", "h1")));
        assert!(pending.take().is_none());

        assert!(pending.apply(changed("a.yaml", "h2")));
        assert_eq!(pending.take().unwrap().changed.len(), 1);
    }

    #[test]
    fn unreadable_files_always_count_as_changed() {
        let mut pending = PendingChanges::default();
        let signal = FsSignal::Changed {
            path: PathBuf::from("a.yaml"),
            fingerprint: Fingerprint::Unreadable,
        };
        assert!(pending.apply(signal.clone()));
        assert!(pending.apply(signal));
    }

    #[test]
    fn change_and_delete_are_mutually_exclusive() {
        let mut pending = PendingChanges::default();
        pending.apply(changed("a.yaml", "h1"));
        pending.apply(FsSignal::removed("a.yaml"));
        let batch = pending.take().unwrap();
        assert!(batch.changed.is_empty());
        assert_eq!(batch.deleted.len(), 1);

        pending.apply(FsSignal::removed("b.yaml"));
        pending.apply(changed("b.yaml", "h1"));
        let batch = pending.take().unwrap();
        assert_eq!(batch.changed.len(), 1);
        assert!(batch.deleted.is_empty());
    }

    #[test]
    fn deletion_forgets_the_hash() {
        let mut pending = PendingChanges::default();
        pending.apply(changed("a.yaml", "h1"));
        pending.apply(FsSignal::removed("a.yaml"));
        pending.take();

        assert!(pending.apply(changed("a.yaml", "h1")));
    }

    #[test]
    fn move_deletes_source_and_changes_destination() {
        let mut pending = PendingChanges::default();
        let moved = FsSignal::Moved {
            from: PathBuf::from("old.yaml"),
            to: PathBuf::from("new.yaml"),
            fingerprint: Fingerprint::Digest("h1".into()),
        };
        assert!(pending.apply(moved));
        let batch = pending.take().unwrap();
        assert!(batch.deleted.contains(&PathBuf::from("old.yaml")));
        assert!(batch.changed.contains(&PathBuf::from("new.yaml")));
    }

    #[test]
    fn plan_follows_batch_contents() {
        let mut batch = ChangeBatch::default();
        assert_eq!(batch.plan(), Revalidation::Nothing);

        batch.deleted.insert(PathBuf::from("gone.yaml"));
        assert_eq!(batch.plan(), Revalidation::Full);

        batch.changed.insert(PathBuf::from("b.yaml"));
        batch.changed.insert(PathBuf::from("a.yaml"));
        assert_eq!(
            batch.plan(),
            Revalidation::Files(vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")])
        );
    }
}
