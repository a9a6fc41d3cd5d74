//! ---
//! codeloc_section: "01-core-functionality"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared primitives and utilities for the location control plane."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_heartbeat_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_watch_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_watch_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_connect_attempts() -> u32 {
    1
}

fn default_connect_retry_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_rpc_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_worker_startup_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_worker_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Runtime tuning for location handles and their supervision loops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub connect: ConnectConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`LocationConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedLocationConfig {
    pub config: LocationConfig,
    pub source: PathBuf,
}

impl LocationConfig {
    pub const ENV_CONFIG_PATH: &'static str = "CODELOC_CONFIG";

    /// Load configuration from disk, respecting the `CODELOC_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedLocationConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedLocationConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedLocationConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<LocationConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat.interval.is_zero() {
            return Err(anyhow!("heartbeat.interval must be greater than zero"));
        }
        if self.watch.interval.is_zero() {
            return Err(anyhow!("watch.interval must be greater than zero"));
        }
        if self.watch.timeout.is_zero() {
            return Err(anyhow!("watch.timeout must be greater than zero"));
        }
        if self.watch.max_reconnect_attempts == 0 {
            return Err(anyhow!("watch.max_reconnect_attempts must be at least 1"));
        }
        if self.connect.attempts == 0 {
            return Err(anyhow!("connect.attempts must be at least 1"));
        }
        Ok(())
    }
}

impl std::str::FromStr for LocationConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: LocationConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
    /// Deadline applied to each heartbeat request.
    #[serde(default = "default_heartbeat_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: default_heartbeat_interval(),
            timeout: default_heartbeat_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_watch_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
    /// Deadline applied to each identity check; an overrun counts as a failed check.
    #[serde(default = "default_watch_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
    /// Failed identity checks tolerated before the location is reported as errored.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub reconnect_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: default_watch_interval(),
            timeout: default_watch_timeout(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval: default_reconnect_interval(),
        }
    }
}

/// Initial connection policy. `attempts = 1` fails on the first unavailable response.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectConfig {
    #[serde(default = "default_connect_attempts")]
    pub attempts: u32,
    #[serde(default = "default_connect_retry_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_interval: Duration,
    #[serde(default = "default_rpc_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub rpc_timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            attempts: default_connect_attempts(),
            retry_interval: default_connect_retry_interval(),
            rpc_timeout: default_rpc_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Program launched for managed workers. Falls back to the target's executable path.
    #[serde(default)]
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_worker_startup_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub startup_timeout: Duration,
    #[serde(default = "default_worker_shutdown_grace")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            startup_timeout: default_worker_startup_timeout(),
            shutdown_grace: default_worker_shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
