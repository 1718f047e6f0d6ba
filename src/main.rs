//! Custody Ledger service
//!
//! Opens the store and runs the reconciliation worker until Ctrl-C.
//! Transfers and withdrawals are driven by the front-end through the library.
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌────────────────┐
//! │  Config  │───▶│  SQLite  │───▶│ Reconciliation │
//! │  (YAML)  │    │ (schema) │    │    worker      │
//! └──────────┘    └──────────┘    └────────────────┘
//! ```

use anyhow::Context;
use std::sync::Arc;

use custody_ledger::clock::{Clock, SystemClock};
use custody_ledger::config::AppConfig;
use custody_ledger::db::Database;
use custody_ledger::logging::init_logging;
use custody_ledger::settlement::MockSettlement;
use custody_ledger::transfer::{ReconciliationWorker, TransferCoordinator};

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn load_config() -> anyhow::Result<(String, AppConfig)> {
    if let Some(path) = get_arg(&["--config", "-c"]) {
        let config = AppConfig::load_from_path(&path)
            .with_context(|| format!("loading config from {}", path))?;
        return Ok((path, config));
    }
    let env = get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string());
    let config = AppConfig::load(&env).with_context(|| format!("loading config for env {}", env))?;
    Ok((env, config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (source, config) = load_config()?;
    let _log_guard = init_logging(&config.logging);

    tracing::info!(config = %source, "Starting custody ledger");

    if let Some(path) = config.database.url.strip_prefix("sqlite://")
        && let Some(dir) = std::path::Path::new(path).parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let db = Database::connect(&config.database)
        .await
        .with_context(|| format!("opening database {}", config.database.url))?;
    db.health_check().await.context("database health check")?;
    tracing::info!(url = %config.database.url, "Database ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::with_offset_minutes(
        config.ledger.reference_utc_offset_minutes,
    ));
    // In-process settlement client; real networks plug in through `SettlementClient`
    let settlement = Arc::new(MockSettlement::new());
    let coordinator = Arc::new(TransferCoordinator::new(
        db.clone(),
        settlement,
        clock.clone(),
        config.ledger.clone(),
    ));

    if config.reconciliation.enabled {
        let worker = ReconciliationWorker::new(coordinator, clock, config.reconciliation.clone());
        tokio::select! {
            _ = worker.run() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
            }
        }
    } else {
        tracing::info!("Reconciliation disabled, waiting for Ctrl-C");
        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    }

    tracing::info!("Shutting down");
    db.close().await;
    Ok(())
}
