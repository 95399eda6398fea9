//! The change watcher: OS notifications in, debounced batches out, handled
//! by a bounded pool of revalidation tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confcheck_core::Settings;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::debounce::{ChangeBatch, PendingChanges};
use super::events::{translate, FsSignal};
use crate::error::Result;

/// Receives debounced change batches.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    async fn handle(&self, batch: ChangeBatch) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Quiet interval before pending changes are dispatched.
    pub debounce: Duration,
    /// Batches handled at the same time.
    pub workers: usize,
}

impl From<&Settings> for WatchOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            debounce: settings.debounce,
            workers: settings.watch_workers.max(1),
        }
    }
}

/// Sender half used to feed signals into a running watcher.
pub type SignalSender = mpsc::UnboundedSender<FsSignal>;

/// Watches a directory tree and dispatches debounced batches to a
/// [`BatchHandler`].
///
/// Signals flow through an unbounded channel into a single debounce task
/// that owns all pending state. Fired batches go to a dispatcher that runs
/// at most `workers` handlers at once, so slow revalidations never block
/// change detection.
pub struct ChangeWatcher {
    observer: Option<RecommendedWatcher>,
    root: Option<PathBuf>,
    shutdown: Arc<Notify>,
    debouncer: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start watching `root` recursively.
    pub fn start(root: &Path, options: WatchOptions, handler: Arc<dyn BatchHandler>) -> Result<Self> {
        let (mut watcher, signals) = Self::spawn(options, handler);

        let mut observer = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for signal in translate(&event) {
                    if signals.send(signal).is_err() {
                        debug!("watcher stopped, dropping filesystem signal");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "filesystem watch error"),
        })?;
        observer.watch(root, RecursiveMode::Recursive)?;

        info!(
            path = %root.display(),
            debounce = ?options.debounce,
            workers = options.workers,
            "watching for changes"
        );
        watcher.observer = Some(observer);
        watcher.root = Some(root.to_path_buf());
        Ok(watcher)
    }

    /// Start the debounce and dispatch tasks without an OS observer.
    /// Signals are fed through the returned sender.
    pub fn spawn(options: WatchOptions, handler: Arc<dyn BatchHandler>) -> (Self, SignalSender) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        let debouncer = tokio::spawn(run_debouncer(
            signal_rx,
            batch_tx,
            options.debounce,
            Arc::clone(&shutdown),
        ));
        let dispatcher = tokio::spawn(run_dispatcher(batch_rx, handler, options.workers.max(1)));

        let watcher = Self {
            observer: None,
            root: None,
            shutdown,
            debouncer,
            dispatcher,
        };
        (watcher, signal_tx)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Stop observing, cancel any armed debounce, and wait for batches
    /// already dispatched to finish. Pending undispatched changes are dropped.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(mut observer) = self.observer.take() {
            if let Some(root) = &self.root {
                if let Err(e) = observer.unwatch(root) {
                    debug!(error = %e, "unwatch failed");
                }
            }
        }
        self.shutdown.notify_one();

        self.debouncer.await?;
        self.dispatcher.await?;
        info!("watcher stopped");
        Ok(())
    }
}

async fn run_debouncer(
    mut signals: mpsc::UnboundedReceiver<FsSignal>,
    batches: mpsc::UnboundedSender<ChangeBatch>,
    debounce: Duration,
    shutdown: Arc<Notify>,
) {
    let mut pending = PendingChanges::default();
    let mut deadline: Option<Instant> = None;

    loop {
        let fire_at = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                let dropped = pending.discard();
                if dropped > 0 {
                    debug!(dropped, "discarding undispatched changes on stop");
                }
                break;
            }
            signal = signals.recv() => match signal {
                Some(signal) => {
                    if pending.apply(signal) {
                        deadline = Some(Instant::now() + debounce);
                    }
                }
                None => break,
            },
            _ = sleep_until(fire_at), if deadline.is_some() => {
                deadline = None;
                if let Some(batch) = pending.take() {
                    info!(
                        changed = batch.changed.len(),
                        deleted = batch.deleted.len(),
                        "file changes detected"
                    );
                    if batches.send(batch).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

async fn run_dispatcher(
    mut batches: mpsc::UnboundedReceiver<ChangeBatch>,
    handler: Arc<dyn BatchHandler>,
    workers: usize,
) {
    let slots = Arc::new(Semaphore::new(workers));
    let mut in_flight = JoinSet::new();

    while let Some(batch) = batches.recv().await {
        while let Some(done) = in_flight.try_join_next() {
            log_panic(done);
        }
        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        let handler = Arc::clone(&handler);
        in_flight.spawn(async move {
            let _permit = permit;
            let (changed, deleted) = (batch.changed.len(), batch.deleted.len());
            if let Err(e) = handler.handle(batch).await {
                error!(error = %e, changed, deleted, "revalidation failed");
            }
        });
    }

    while let Some(done) = in_flight.join_next().await {
        log_panic(done);
    }
}

fn log_panic(done: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        error!(error = %e, "revalidation task panicked");
    }
}
