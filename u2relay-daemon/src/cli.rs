//! CLI argument definitions for the u2relay daemon.
//!
//! Uses `clap` v4 derive macros. Flags override the config file and the
//! `U2RELAY_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use u2relay_core::config::U2RelayConfig;
use u2relay_core::error::{ConfigError, U2RelayError};

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/u2relay/u2relay.toml";

/// Incremental unified2 log converter.
///
/// Watches a directory for `snort.log.*` files, decodes new or grown files
/// with `u2spewfoo` and appends the text to one aggregated log.
#[derive(Parser, Debug)]
#[command(name = "u2relay")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to u2relay.toml configuration file.
    ///
    /// If the default path does not exist, built-in defaults are used.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the watched directory.
    #[arg(short, long)]
    pub watch_dir: Option<PathBuf>,

    /// Override the aggregated output file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Validate configuration and exit without starting the monitor.
    #[arg(long)]
    pub validate: bool,

    /// Process existing log files once and exit without watching.
    #[arg(long, conflicts_with = "validate")]
    pub once: bool,
}

impl DaemonCli {
    /// Whether `--config` was left at its default value.
    pub fn uses_default_config(&self) -> bool {
        self.config == Path::new(DEFAULT_CONFIG_PATH)
    }

    /// Apply flag overrides on top of an already loaded config.
    pub fn apply_overrides(&self, config: &mut U2RelayConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(dir) = &self.watch_dir {
            config.monitor.watch_dir = dir.display().to_string();
        }
        if let Some(output) = &self.output {
            config.monitor.output_path = output.display().to_string();
        }
    }

    /// Load the effective configuration.
    ///
    /// Order: defaults, config file, environment variables, CLI flags.
    /// The result is validated.
    ///
    /// # Errors
    ///
    /// - The config file is missing and was named explicitly
    /// - The config file cannot be read or parsed
    /// - The merged configuration fails validation
    pub async fn load_config(&self) -> Result<U2RelayConfig> {
        let mut config = match U2RelayConfig::from_file(&self.config).await {
            Ok(config) => config,
            Err(U2RelayError::Config(ConfigError::FileNotFound { .. }))
                if self.uses_default_config() =>
            {
                U2RelayConfig::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to load config {}: {}",
                    self.config.display(),
                    e
                ));
            }
        };

        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Ok(config)
    }
}
