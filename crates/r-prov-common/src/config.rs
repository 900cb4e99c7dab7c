//! ---
//! prov_section: "01-core-functionality"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Shared primitives and utilities for the provisioning runtime."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_network_create_retries() -> u32 {
    3
}

fn default_retryable_statuses() -> Vec<u16> {
    (500..600).collect()
}

fn default_network_driver() -> String {
    "bridge".to_owned()
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(250)
}

fn default_predefined_networks() -> Vec<String> {
    ["none", "host", "bridge", "docker_gwbridge"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_command_buffer() -> usize {
    32
}

fn default_public_uri() -> Url {
    Url::parse("http://127.0.0.1:8282").expect("valid default public uri")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for the R-PROV runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub closures: ClosureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "R_PROV_CONFIG";

    /// Load configuration from disk, respecting the `R_PROV_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
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

    /// Read and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.adapter.validate()?;
        self.trust.validate()?;
        self.closures.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Settings consumed by the adapter orchestration pipeline.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Maximum number of create retries after the initial attempt.
    #[serde(default = "default_network_create_retries")]
    pub network_create_retries: u32,
    /// Backend status codes that make a failed create eligible for retry.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
    /// Driver used when a record does not declare one.
    #[serde(default = "default_network_driver")]
    pub default_network_driver: String,
    /// Base delay before a retry; doubles per attempt.
    #[serde(default = "default_retry_backoff", rename = "retry_backoff_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_backoff: Duration,
    /// Engine-owned networks that exist on every host.
    #[serde(default = "default_predefined_networks")]
    pub predefined_networks: Vec<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            network_create_retries: default_network_create_retries(),
            retryable_statuses: default_retryable_statuses(),
            default_network_driver: default_network_driver(),
            retry_backoff: default_retry_backoff(),
            predefined_networks: default_predefined_networks(),
        }
    }
}

impl AdapterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_network_driver.trim().is_empty() {
            return Err(anyhow!("adapter.default_network_driver cannot be empty"));
        }
        if let Some(status) = self
            .retryable_statuses
            .iter()
            .find(|status| !(100..600).contains(*status))
        {
            return Err(anyhow!(
                "adapter.retryable_statuses contains invalid status code {}",
                status
            ));
        }
        Ok(())
    }
}

/// Settings for the trust certificate cache.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Period of the "changed since" reconciliation query.
    #[serde(default = "default_reconcile_interval", rename = "reconcile_interval_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub reconcile_interval: Duration,
    /// Capacity of the refresh command queue.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: default_reconcile_interval(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl TrustConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reconcile_interval.is_zero() {
            return Err(anyhow!("trust.reconcile_interval_secs must be positive"));
        }
        if self.command_buffer == 0 {
            return Err(anyhow!("trust.command_buffer must be positive"));
        }
        Ok(())
    }
}

/// Image coordinates for a single closure runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeImageConfig {
    pub image: String,
    pub version: String,
    pub base_version: String,
    #[serde(default)]
    pub registry: Option<String>,
}

/// Settings for the closure execution drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureConfig {
    /// Base URI launched containers use to report back. Falls back to `public_uri`.
    #[serde(default)]
    pub callback_uri: Option<String>,
    /// Public address of this orchestrator.
    #[serde(default = "default_public_uri")]
    pub public_uri: Url,
    #[serde(default)]
    pub runtimes: IndexMap<String, RuntimeImageConfig>,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        Self {
            callback_uri: None,
            public_uri: default_public_uri(),
            runtimes: IndexMap::new(),
        }
    }
}

impl ClosureConfig {
    pub fn validate(&self) -> Result<()> {
        for (runtime, image) in &self.runtimes {
            if image.image.trim().is_empty() {
                return Err(anyhow!("closure runtime '{}' must declare an image", runtime));
            }
            if image.version.trim().is_empty() {
                return Err(anyhow!(
                    "closure runtime '{}' must declare an image version",
                    runtime
                ));
            }
        }
        Ok(())
    }

    /// Look up the image coordinates for a runtime.
    pub fn runtime(&self, runtime: &str) -> Option<&RuntimeImageConfig> {
        self.runtimes.get(runtime)
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
