use std::env;
use std::time::Duration;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Default concurrency cap: `min(32, 2 × available parallelism)`.
pub fn default_max_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus * 2).min(32)
}

pub const DEFAULT_FILE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
pub const DEFAULT_WATCH_WORKERS: usize = 8;

// ── Runtime settings ──────────────────────────────────────────

/// Runtime knobs for a validation run and the watcher.
///
/// Every field can be set through a `CONFCHECK_*` environment variable;
/// the CLI applies its own flags on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Maximum number of files validated at the same time.
    pub max_concurrency: usize,
    /// Wall-clock budget for one file.
    pub file_timeout: Duration,
    /// Number of paths staged per validation batch.
    pub batch_size: usize,
    /// Quiet interval before a burst of filesystem events is dispatched.
    pub debounce: Duration,
    /// Number of watch-triggered revalidations allowed to run at once.
    pub watch_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            file_timeout: Duration::from_secs(DEFAULT_FILE_TIMEOUT_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            watch_workers: DEFAULT_WATCH_WORKERS,
        }
    }
}

impl Settings {
    /// Build settings from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            max_concurrency: env_usize("CONFCHECK_MAX_CONCURRENCY", default_max_concurrency()).max(1),
            file_timeout: Duration::from_secs(env_u64(
                "CONFCHECK_FILE_TIMEOUT_SECS",
                DEFAULT_FILE_TIMEOUT_SECS,
            )),
            batch_size: env_usize("CONFCHECK_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            debounce: Duration::from_millis(env_u64("CONFCHECK_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)),
            watch_workers: env_usize("CONFCHECK_WATCH_WORKERS", DEFAULT_WATCH_WORKERS).max(1),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Settings loaded:");
        tracing::info!("  validation:  max_concurrency={}, file_timeout={:?}, batch_size={}",
            self.max_concurrency, self.file_timeout, self.batch_size);
        tracing::info!("  watch:       debounce={:?}, workers={}", self.debounce, self.watch_workers);
    }
}
