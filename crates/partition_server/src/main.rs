//! Partition server entry point.
//!
//! Loads the partition layout, runs the engine on its own task against a
//! headless in-memory host, and keeps it consistent with periodic full
//! sweeps until a shutdown signal arrives.
//!
//! The binary is a standalone harness: no game runtime feeds it player
//! events, so the population stays empty unless a host embedding the engine
//! drives [`PartitionHandle`]. It exercises configuration loading, world
//! loading, borders, reloads and the timers. Use `--check` to validate a
//! configuration file without starting the loop.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{anyhow, Result};
use cli::CliArgs;
use config::AppConfig;
use partition_engine::{
    EngineRuntime, EngineStatus, HostBindings, InMemoryHost, PartitionEngine, PartitionEvent, PartitionHandle,
};
use signals::{ServerSignal, SignalListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// ============================================================================
// Application
// ============================================================================

pub struct Application {
    config: AppConfig,
    config_path: PathBuf,
    check_only: bool,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Configuration first, logging depends on it
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(interval) = args.reconcile_interval {
            config.server.reconcile_interval_secs = interval;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        logging::setup_logging(&config.logging, args.json_logs)?;

        info!("🚀 Partition Server v{}", env!("CARGO_PKG_VERSION"));
        info!("📂 Config: {}", args.config_path.display());

        Ok(Self {
            config,
            config_path: args.config_path,
            check_only: args.check,
        })
    }

    fn log_summary(&self) {
        info!("📋 Configuration Summary:");
        info!(
            "  🧱 Partitions: {} ({} enabled)",
            self.config.partitions.len(),
            self.config.partitions.iter().filter(|p| p.enabled).count()
        );
        for partition in &self.config.partitions {
            info!(
                "    • {} - worlds: [{}]",
                partition.id,
                partition
                    .worlds
                    .iter()
                    .map(|w| w.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        let isolation = &self.config.isolation;
        info!(
            "  🛡️ Isolation: chat={} tablist={} commands={} world_border={}",
            isolation.chat, isolation.tablist, isolation.commands, isolation.world_border
        );
        info!(
            "  ⏱️ Full sweep every {}s, status every {}s",
            self.config.server.reconcile_interval_secs, self.config.server.monitor_interval_secs
        );
    }

    pub async fn run(self) -> Result<()> {
        self.log_summary();
        if self.check_only {
            info!("✅ Configuration is valid");
            return Ok(());
        }

        let host = Arc::new(InMemoryHost::new().without_call_log());
        let engine = PartitionEngine::new(
            HostBindings::from_host(host.clone()),
            &self.config.to_partition_config(),
        )?;
        warn!("🧪 No game runtime attached, running against the headless host");
        let (handle, engine_task) = EngineRuntime::spawn(engine);

        let event_log = spawn_event_log(&handle);
        let reconciler = spawn_reconciler(&handle, self.config.server.reconcile_interval_secs);
        let monitor = spawn_monitor(&handle, self.config.server.monitor_interval_secs);

        info!("✅ Partition engine is now running");
        info!("🔄 Send SIGHUP to reload {}", self.config_path.display());
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let mut signals = SignalListener::new()?;
        loop {
            match signals.next().await? {
                ServerSignal::Reload => self.reload(&handle).await,
                ServerSignal::Shutdown => break,
            }
        }

        info!("🛑 Shutdown signal received, initiating graceful shutdown...");
        for task in [reconciler, monitor].into_iter().flatten() {
            task.abort();
        }

        let report = handle.shutdown().await?;
        engine_task.await?;
        event_log.abort();

        info!("✅ Partition server shutdown complete ({} pairs revealed)", report.shown);
        Ok(())
    }

    async fn reload(&self, handle: &PartitionHandle) {
        let config = match AppConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!("❌ Reload failed, keeping current configuration: {:#}", e);
                return;
            }
        };

        match handle.reload(config.to_partition_config()).await {
            Ok(report) if report.changed => info!(
                "🔄 Reloaded {} ({} players moved)",
                self.config_path.display(),
                report.moved_players
            ),
            Ok(_) => info!("🔄 {} unchanged", self.config_path.display()),
            Err(e) => error!("❌ Reload failed, keeping current configuration: {}", e),
        }
    }
}

// ============================================================================
// Background tasks
// ============================================================================

fn spawn_event_log(handle: &PartitionHandle) -> JoinHandle<()> {
    use partition_engine::PartitionService;
    use tokio::sync::broadcast::error::RecvError;

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PartitionEvent::ShutdownComplete) | Err(RecvError::Closed) => break,
                Ok(event) => debug!(?event, "Partition event"),
                Err(RecvError::Lagged(missed)) => warn!("Event log lagged, {} events missed", missed),
            }
        }
    })
}

/// Periodic full sweep. Any primitive call it makes means the incremental
/// path drifted from the host.
fn spawn_reconciler(handle: &PartitionHandle, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    let handle = handle.clone();
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            match handle.reconcile_all().await {
                Ok(report) if report.calls() > 0 => warn!(
                    "🩹 Full sweep repaired drift: {} shown, {} hidden, {} failed",
                    report.shown, report.hidden, report.failures
                ),
                Ok(_) => debug!("Full sweep found nothing to repair"),
                Err(_) => break,
            }
        }
    }))
}

fn spawn_monitor(handle: &PartitionHandle, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    let handle = handle.clone();
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match handle.status().await {
                Ok(status) => log_status(&status),
                Err(_) => break,
            }
        }
    }))
}

fn log_status(status: &EngineStatus) {
    info!(
        "📊 {} players online ({} unpartitioned) | {} hidden pairs | {} open sessions",
        status.online_players, status.unpartitioned_players, status.hidden_pairs, status.open_sessions
    );
    for partition in status.partitions.iter().filter(|p| p.enabled) {
        debug!(partition = %partition.id, online = partition.online, "Partition status");
    }
    if !status.pending_restarts.is_empty() {
        warn!("♻️ Restarts awaiting restore: {:?}", status.pending_restarts);
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to start partition server: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Partition server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
