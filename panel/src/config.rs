//! Configuration for the panel agent.

use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigLoader, Environment, File};
use panel_common::Details;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::heartbeat::BeaconTarget;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// API gateway connection and account.
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Public gateway endpoint, e.g. `https://gateway.example.com`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Transport timeout for every request, login included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How long a login token is reused. Kept below the gateway's one hour
    /// so a cached token never races its real expiry.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

// Hand-written so the password never ends up in logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

/// Kill-switch heartbeat settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `software` or `hardware`.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Entry name; must already exist under /settings/software or /settings/hardware.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    /// Time the host gets to shut down cleanly after a kill before the
    /// process is terminated.
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,
    /// Device configuration sent with hardware heartbeats.
    #[serde(default)]
    pub config: Option<Details>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            kind: default_kind(),
            name: default_name(),
            interval_secs: default_heartbeat_interval(),
            grace_period_ms: default_grace_period(),
            config: None,
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Resolve `kind`/`name` into the entry this process reports as.
    pub fn target(&self) -> Result<BeaconTarget> {
        BeaconTarget::from_kind(&self.kind, &self.name, self.config.clone())
    }
}

/// Host main loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// How often the main loop checks the kill latch. Must not exceed the
    /// heartbeat grace period.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl HostConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_minutes: default_refresh_minutes(),
        }
    }
}

impl DashboardConfig {
    /// Data refresh cadence, never faster than every 10 seconds.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes.saturating_mul(60).max(10))
    }
}

// Default values
fn default_request_timeout() -> u64 {
    10
}
fn default_token_ttl() -> u64 {
    55 * 60
}
fn default_true() -> bool {
    true
}
fn default_kind() -> String {
    "software".to_string()
}
fn default_name() -> String {
    "python-panel".to_string()
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_grace_period() -> u64 {
    1000
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_refresh_minutes() -> u64 {
    15
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (PANEL__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        Self::build(File::with_name("config").required(false))
    }

    /// Same as [`Config::load`] but reads an explicit file, which must exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let loaded = ConfigLoader::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("PANEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = loaded.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.url.trim().is_empty() {
            return Err(Error::Config("gateway.url must not be empty".to_string()));
        }
        if self.gateway.token_ttl_secs == 0 {
            return Err(Error::Config("gateway.token_ttl_secs must be positive".to_string()));
        }
        if self.heartbeat.enabled {
            if self.heartbeat.interval_secs == 0 {
                return Err(Error::Config("heartbeat.interval_secs must be positive".to_string()));
            }
            self.heartbeat.target()?;
            if self.host.poll_interval_ms == 0
                || self.host.poll_interval_ms > self.heartbeat.grace_period_ms
            {
                return Err(Error::Config(format!(
                    "host.poll_interval_ms must be between 1 and heartbeat.grace_period_ms ({})",
                    self.heartbeat.grace_period_ms
                )));
            }
        }
        Ok(())
    }
}
