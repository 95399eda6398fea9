mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use confcheck_core::config::load_dotenv;
use confcheck_core::{load_storage, load_validation_config, Settings, StorageConfig};
use confcheck_pipeline::{ChangeWatcher, FileValidator, ValidationService, WatchOptions};
use confcheck_rules::RuleEngine;

use crate::cli::{resolve_root, CliArgs};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let settings = args.apply(Settings::from_env());
    settings.log_summary();

    let config = load_validation_config(args.config.as_deref())
        .context("failed to load validation config")?
        .with_replica_bounds(args.replicas_min, args.replicas_max)
        .context("invalid replica bounds")?;

    let root = resolve_root(&args.path)?;
    let storage_config = match &args.storage_config {
        Some(path) => StorageConfig::from_file(path)
            .with_context(|| format!("failed to load storage config {}", path.display()))?,
        None => StorageConfig::local(&root),
    };
    let storage = load_storage(&storage_config).context("failed to initialize storage")?;

    let validator = FileValidator::new(storage, RuleEngine::builtin(), Arc::new(config));
    let service = Arc::new(ValidationService::new(&root, &args.report_dir, validator, &settings));

    let report = service
        .run_validation()
        .await
        .context("validation run failed")?;
    println!("{}", report.summary);

    if !args.watch {
        return Ok(());
    }

    let watcher = ChangeWatcher::start(&root, WatchOptions::from(&settings), service.clone())
        .context("failed to start watcher")?;
    info!("press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");
    watcher.stop().await.context("failed to stop watcher")?;
    Ok(())
}
