use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use confcheck_core::Settings;

/// Validate YAML service manifests against a rule set, once or on every change.
#[derive(Parser, Debug)]
#[command(name = "confcheck", version, about)]
pub struct CliArgs {
    /// Root directory to validate.
    #[arg(long, env = "CONFCHECK_PATH", default_value = ".")]
    pub path: PathBuf,

    /// Directory for reports and the event log.
    #[arg(long, env = "CONFCHECK_REPORT_DIR", default_value = "reports")]
    pub report_dir: PathBuf,

    /// Validation config file (YAML).
    #[arg(long, env = "CONFCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage strategy config file (YAML).
    #[arg(long, env = "CONFCHECK_STORAGE_CONFIG")]
    pub storage_config: Option<PathBuf>,

    /// Minimum allowed replicas (overrides the config file).
    #[arg(long)]
    pub replicas_min: Option<i64>,

    /// Maximum allowed replicas (overrides the config file).
    #[arg(long)]
    pub replicas_max: Option<i64>,

    /// Files validated at the same time.
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Per-file validation timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Paths staged per validation batch.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Keep running and revalidate on file changes.
    #[arg(long)]
    pub watch: bool,

    /// Quiet interval before a burst of changes is revalidated.
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Revalidations allowed to run at the same time in watch mode.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Debug logging (RUST_LOG still wins when set).
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Apply flag overrides on top of environment-derived settings.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(n) = self.max_concurrency {
            settings.max_concurrency = n.max(1);
        }
        if let Some(secs) = self.timeout_secs {
            settings.file_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.batch_size {
            settings.batch_size = n.max(1);
        }
        if let Some(ms) = self.debounce_ms {
            settings.debounce = Duration::from_millis(ms);
        }
        if let Some(n) = self.workers {
            settings.watch_workers = n.max(1);
        }
        settings
    }
}

/// Canonical scan root. A missing path or a regular file is an error, so a
/// mistyped `--path` is never created as an empty tree.
pub fn resolve_root(path: &Path) -> Result<PathBuf> {
    let root = std::fs::canonicalize(path)
        .with_context(|| format!("scan root {} does not exist", path.display()))?;
    if !root.is_dir() {
        bail!("scan root {} is not a directory", path.display());
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_root_is_rejected_and_not_created() {
        let dir = TempDir::new().unwrap();
        let typo = dir.path().join("typo_dir");

        let err = resolve_root(&typo).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!typo.exists());
    }

    #[test]
    fn file_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("svc.yaml");
        std::fs::write(&file, "service: a\n").unwrap();
        assert!(resolve_root(&file).is_err());
    }

    #[test]
    fn existing_root_is_canonicalized() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("manifests");
        std::fs::create_dir(&nested).unwrap();

        let root = resolve_root(&nested.join("..").join("manifests")).unwrap();
        assert_eq!(root, std::fs::canonicalize(&nested).unwrap());
    }

    #[test]
    fn flags_override_settings() {
        let args = CliArgs::parse_from([
            "confcheck",
            "--path",
            "manifests",
            "--max-concurrency",
            "0",
            "--timeout-secs",
            "5",
            "--debounce-ms",
            "40",
            "--workers",
            "3",
        ]);
        let settings = args.apply(Settings::default());

        assert_eq!(args.path, PathBuf::from("manifests"));
        assert_eq!(settings.max_concurrency, 1);
        assert_eq!(settings.file_timeout, Duration::from_secs(5));
        assert_eq!(settings.debounce, Duration::from_millis(40));
        assert_eq!(settings.watch_workers, 3);
        assert_eq!(settings.batch_size, Settings::default().batch_size);
    }

    #[test]
    fn replica_bounds_are_optional() {
        let args = CliArgs::parse_from(["confcheck", "--replicas-min", "2", "--watch"]);
        assert_eq!(args.replicas_min, Some(2));
        assert_eq!(args.replicas_max, None);
        assert!(args.watch);
    }
}
