//! Daemon orchestration -- monitor assembly and lifecycle management.
//!
//! The [`Orchestrator`] turns a validated [`U2RelayConfig`] into a running
//! [`LogMonitor`], waits for a shutdown signal and stops it.
//!
//! # Lifecycle
//!
//! 1. Install the metrics recorder (if enabled)
//! 2. Build the monitor (`LogMonitorConfig::from_core`, `CommandDecoder`)
//! 3. Start: verify the watch directory, subscribe, startup sweep
//! 4. Wait for `SIGINT` or `SIGTERM`
//! 5. Stop: drop the subscription, drain the dispatcher
//!
//! A signal that arrives during the startup sweep cuts the sweep short
//! after the file in progress.

use std::future::Future;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::broadcast;

use u2relay_core::config::U2RelayConfig;
use u2relay_core::metrics as m;
use u2relay_core::pipeline::{HealthStatus, Pipeline};
use u2relay_log_monitor::sweep::SweepSummary;
use u2relay_log_monitor::{CommandDecoder, LogMonitor, LogMonitorBuilder, LogMonitorConfig};

use crate::metrics_server;

/// The daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: U2RelayConfig,
    /// The log monitor.
    monitor: LogMonitor<CommandDecoder>,
    /// Shutdown broadcast sender for background tasks.
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: U2RelayConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
        }

        let monitor_config = LogMonitorConfig::from_core(&config.monitor)
            .map_err(|e| anyhow::anyhow!("invalid monitor config: {}", e))?;
        let decoder = CommandDecoder::from_config(&monitor_config);

        tracing::info!(
            watch_dir = %monitor_config.watch_dir.display(),
            output = %monitor_config.output_path.display(),
            decoder = decoder.binary(),
            grace_period_ms = monitor_config.grace_period.as_millis() as u64,
            "orchestrator initialized"
        );

        let monitor = LogMonitorBuilder::new()
            .config(monitor_config)
            .decoder(decoder)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log monitor: {}", e))?;

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            monitor,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the monitor and run until `SIGINT` or `SIGTERM`.
    ///
    /// Returns `Ok(())` after a clean shutdown.
    pub async fn run(&mut self) -> Result<()> {
        let signal = shutdown_signal()?;
        self.run_until(async move {
            let name = signal.await;
            tracing::info!(signal = name, "shutdown signal received");
        })
        .await
    }

    /// Start the monitor and run until `shutdown` completes.
    ///
    /// `shutdown` is polled while the startup sweep runs as well; if it
    /// completes first the sweep stops after the current file.
    ///
    /// # Errors
    ///
    /// Returns an error if the monitor fails to start (for example the
    /// watch directory does not exist) or fails to stop.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.monitor.shutdown_handle();
        tokio::pin!(shutdown);

        let mut shutdown_seen = false;
        let started = {
            let start = self.monitor.start();
            tokio::pin!(start);
            tokio::select! {
                result = &mut start => result,
                () = &mut shutdown => {
                    tracing::info!("shutdown requested during startup sweep");
                    shutdown_seen = true;
                    handle.trigger();
                    start.await
                }
            }
        };
        started.map_err(|e| anyhow::anyhow!("failed to start log monitor: {}", e))?;

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        if !shutdown_seen {
            tracing::info!("u2relay running");
            shutdown.await;
        }

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        self.monitor
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop log monitor: {}", e))?;

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "u2relay shut down"
        );
        Ok(())
    }

    /// Process the existing files once without watching.
    pub async fn run_once(&mut self) -> Result<SweepSummary> {
        self.monitor
            .run_once()
            .await
            .map_err(|e| anyhow::anyhow!("startup sweep failed: {}", e))
    }

    /// Current health of the monitor.
    pub async fn health(&self) -> HealthStatus {
        self.monitor.health_check().await
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &U2RelayConfig {
        &self.config
    }

    /// Get a reference to the monitor.
    pub fn monitor(&self) -> &LogMonitor<CommandDecoder> {
        &self.monitor
    }
}

/// Install `SIGTERM` and `SIGINT` handlers.
///
/// The returned future resolves with the name of the first signal received.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Record the build info gauge (always 1, labelled with the version).
fn record_build_info() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Spawn a background task that refreshes the uptime gauge every 10 seconds.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
