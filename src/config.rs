use crate::error::ViewerError;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(name = "console-viewer", version, about)]
pub struct Cli {
    /// Path to configuration file
    #[clap(long, default_value = "./config.toml")]
    pub config: PathBuf,

    /// Override log endpoint URL
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Override refresh interval in milliseconds (0 or less disables auto refresh)
    #[clap(long, allow_hyphen_values = true)]
    pub refresh_interval_ms: Option<i64>,

    /// Serve the built-in sample logs instead of contacting the endpoint
    #[clap(long)]
    pub fallback: bool,

    /// Disable severity colours
    #[clap(long)]
    pub no_color: bool,

    /// Override log level (error, warn, info, debug, trace)
    #[clap(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Live,
    Fallback,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub refresh_interval_ms: i64,
    pub request_timeout_ms: u64,
    pub mode: SourceMode,
    pub fallback_delay_ms: u64,
    pub color: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/logs".to_string(),
            refresh_interval_ms: 5000,
            request_timeout_ms: 10_000,
            mode: SourceMode::Live,
            fallback_delay_ms: 800,
            color: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// `None` means manual refresh only.
    pub fn refresh_interval(&self) -> Option<Duration> {
        u64::try_from(self.refresh_interval_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        if self.mode == SourceMode::Live
            && !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://"))
        {
            return Err(ViewerError::Config(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ViewerError::Config(format!(
                "unknown log level {:?}",
                self.log_level
            )));
        }
        Ok(())
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config: Config = if cli.config.exists() {
        let config_content = fs::read_to_string(&cli.config)
            .with_context(|| format!("Failed to read config file: {:?}", cli.config))?;

        toml::from_str(&config_content).context("Failed to parse config file")?
    } else {
        info!("No config file at {:?}, using defaults", cli.config);
        Config::default()
    };

    // Apply CLI overrides
    if let Some(ref endpoint) = cli.endpoint {
        config.endpoint = endpoint.clone();
    }

    if let Some(interval) = cli.refresh_interval_ms {
        config.refresh_interval_ms = interval;
    }

    if cli.fallback {
        config.mode = SourceMode::Fallback;
    }

    if cli.no_color {
        config.color = false;
    }

    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
    }

    config.validate().context("Invalid configuration")?;

    Ok(config)
}
