use anyhow::Result;
use clap::Parser;

use u2relay_daemon::cli::DaemonCli;
use u2relay_daemon::logging;
use u2relay_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = cli.load_config().await?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    if cli.uses_default_config() && !cli.config.exists() {
        tracing::warn!(
            path = %cli.config.display(),
            "config file not found, using defaults"
        );
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "u2relay starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;

    if cli.once {
        let summary = orchestrator.run_once().await?;
        tracing::info!(
            scanned = summary.scanned,
            merged = summary.merged,
            failed = summary.failed,
            "single pass finished"
        );
        return Ok(());
    }

    orchestrator.run().await
}
