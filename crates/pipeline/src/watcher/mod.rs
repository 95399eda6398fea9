//! Filesystem change watching with debounce and content-hash dedup.

mod core;
mod debounce;
mod events;


pub use self::core::{BatchHandler, ChangeWatcher, SignalSender, WatchOptions};
pub use debounce::{ChangeBatch, Revalidation};
pub use events::{is_watched, translate, Fingerprint, FsSignal};
