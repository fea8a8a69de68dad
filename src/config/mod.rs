//! Configuration management
//!
//! A static configuration object built once at startup: defaults, then an
//! optional config file in the platform config directory, then `AAD_`
//! environment overrides (`AAD_PORT`, `AAD_DEVICE__HOST`, ...). The core
//! never re-reads configuration mid-run.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub artwork: ArtworkConfig,
}

fn default_port() -> u16 {
    5174
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Seconds between device queries.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: f64,
    /// Consecutive failed polls tolerated before publishing "nothing
    /// playing".
    #[serde(default = "default_grace_cycles")]
    pub grace_cycles: u32,
    /// Keepalive interval; must stay below client read timeouts.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            grace_cycles: default_grace_cycles(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_secs)
    }
}

fn default_poll_interval() -> f64 {
    3.0
}

fn default_grace_cycles() -> u32 {
    2
}

fn default_heartbeat_secs() -> f64 {
    25.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Speaker IP or hostname. Required; there is no discovery fallback.
    #[serde(default)]
    pub host: String,
    /// Per-query timeout in seconds.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Upcoming-queue entries to enrich per cycle.
    #[serde(default = "default_queue_lookahead")]
    pub queue_lookahead: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            query_timeout_secs: default_query_timeout_secs(),
            queue_lookahead: default_queue_lookahead(),
        }
    }
}

impl DeviceConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_queue_lookahead() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtworkConfig {
    /// Prefer the external high-resolution lookup over native device art.
    #[serde(default = "default_true")]
    pub prefer_external: bool,
    /// Square pixel size requested from the lookup (iTunes serves up to
    /// 3000).
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    /// Cooldown after an upstream rate-limit rejection.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Per-lookup timeout in seconds.
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            prefer_external: default_true(),
            image_size: default_image_size(),
            cooldown_secs: default_cooldown_secs(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

impl ArtworkConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_image_size() -> u32 {
    1200
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

/// Get config directory (AAD_CONFIG_DIR, XDG, or platform default)
pub fn get_config_dir() -> std::path::PathBuf {
    if let Ok(dir) = std::env::var("AAD_CONFIG_DIR") {
        return std::path::PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home)
                .join("Library/Application Support/album-art-display");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return std::path::PathBuf::from(xdg).join("album-art-display");
        }
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home).join(".config/album-art-display");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return std::path::PathBuf::from(appdata).join("album-art-display");
        }
    }

    std::path::PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let builder = ::config::Config::builder()
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (AAD_PORT, AAD_DEVICE__HOST, ...)
        .add_source(
            ::config::Environment::with_prefix("AAD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}
