//! Configuration for Netwatch
//!
//! Configuration is stored as JSON at `~/.netwatch/config.json`. Every field
//! has a default, so a missing file or a partial file is valid. Environment
//! variables (optionally loaded from a `.env` file) override file values:
//!
//! - `NETWATCH_SERVER_URL` - WebSocket URL of the platform server
//! - `NETWATCH_HEARTBEAT_INTERVAL_MS` - initial heartbeat interval
//! - `NETWATCH_BACKGROUND_CLOCK` - `thread`, `task` or `disabled`
//! - `NETWATCH_PROBE_TARGET` - `host:port` checked for connectivity

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WatchdogError};

/// Default heartbeat period in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 2_000;

/// Smallest interval a server directive may set.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

/// Largest interval a server directive may set (one hour).
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 3_600_000;

// ---------------------------------------------------------------------------
// Background clock mode
// ---------------------------------------------------------------------------

/// Where the independent background clock runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundClockMode {
    /// Dedicated OS thread with its own single-threaded runtime.
    #[default]
    Thread,
    /// Separate task on the caller's tokio runtime.
    Task,
    /// No background clock; foreground-only heartbeats.
    Disabled,
}

impl FromStr for BackgroundClockMode {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "thread" => Ok(Self::Thread),
            "task" => Ok(Self::Task),
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            other => Err(WatchdogError::Config(format!(
                "Unknown background clock mode '{}'. Use thread, task or disabled",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Heartbeat timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Initial period between heartbeats.
    pub heartbeat_interval_ms: u64,
    /// Lower clamp applied to server-provided intervals.
    pub min_interval_ms: u64,
    /// Upper clamp applied to server-provided intervals.
    pub max_interval_ms: u64,
    /// Where the background clock runs.
    pub background_clock: BackgroundClockMode,
    /// Whether tick-to-tick drift is logged.
    pub log_drift: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            background_clock: BackgroundClockMode::default(),
            log_drift: true,
        }
    }
}

impl WatchdogConfig {
    /// Initial heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Clamp an interval into the configured bounds.
    ///
    /// Never panics; with inverted bounds `max_interval_ms` wins. The result
    /// is always at least 1 ms.
    pub fn clamp_interval_ms(&self, interval_ms: u64) -> u64 {
        interval_ms
            .max(self.min_interval_ms)
            .min(self.max_interval_ms)
            .max(1)
    }

    /// Check that bounds and the initial interval are consistent.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(WatchdogError::Config(
                "heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.min_interval_ms == 0 {
            return Err(WatchdogError::Config(
                "min_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(WatchdogError::Config(format!(
                "min_interval_ms ({}) exceeds max_interval_ms ({})",
                self.min_interval_ms, self.max_interval_ms
            )));
        }
        if self.clamp_interval_ms(self.heartbeat_interval_ms) != self.heartbeat_interval_ms {
            return Err(WatchdogError::Config(format!(
                "heartbeat_interval_ms ({}) is outside [{}, {}]",
                self.heartbeat_interval_ms, self.min_interval_ms, self.max_interval_ms
            )));
        }
        Ok(())
    }
}

/// Settings for the TCP reachability probe that produces the online signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// `host:port` to connect to. `None` means the host is assumed online.
    pub target: Option<String>,
    /// Period between probes.
    pub poll_interval_ms: u64,
    /// Connect timeout for a single probe.
    pub timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            target: None,
            poll_interval_ms: 5_000,
            timeout_ms: 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebSocket URL of the platform server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    /// Heartbeat timing.
    pub watchdog: WatchdogConfig,
    /// Reachability probe.
    pub connectivity: ConnectivityConfig,
}

impl Config {
    /// Configuration directory (`~/.netwatch`).
    pub fn dir() -> PathBuf {
        dirs::home_dir().unwrap_or_default().join(".netwatch")
    }

    /// Default configuration file path.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path, then apply `.env` and environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.watchdog.validate()?;
        Ok(config)
    }

    /// Load from a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            WatchdogError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply overrides read through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("NETWATCH_SERVER_URL") {
            self.server_url = Some(url);
        }
        if let Some(raw) = lookup("NETWATCH_HEARTBEAT_INTERVAL_MS") {
            self.watchdog.heartbeat_interval_ms = raw.trim().parse().map_err(|_| {
                WatchdogError::Config(format!(
                    "NETWATCH_HEARTBEAT_INTERVAL_MS is not an integer: '{}'",
                    raw
                ))
            })?;
        }
        if let Some(raw) = lookup("NETWATCH_BACKGROUND_CLOCK") {
            self.watchdog.background_clock = raw.parse()?;
        }
        if let Some(target) = lookup("NETWATCH_PROBE_TARGET") {
            self.connectivity.target = Some(target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.watchdog.heartbeat_interval_ms, 2000);
        assert_eq!(config.watchdog.background_clock, BackgroundClockMode::Thread);
        assert!(config.server_url.is_none());
        assert!(config.watchdog.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"watchdog": {"heartbeat_interval_ms": 500}}"#).unwrap();
        assert_eq!(config.watchdog.heartbeat_interval_ms, 500);
        assert_eq!(config.watchdog.max_interval_ms, DEFAULT_MAX_INTERVAL_MS);
        assert_eq!(config.connectivity.poll_interval_ms, 5000);
    }

    #[test]
    fn test_clock_mode_serde() {
        let config: WatchdogConfig =
            serde_json::from_str(r#"{"background_clock": "disabled"}"#).unwrap();
        assert_eq!(config.background_clock, BackgroundClockMode::Disabled);
    }

    #[test]
    fn test_clock_mode_from_str() {
        assert_eq!("Task".parse::<BackgroundClockMode>().unwrap(), BackgroundClockMode::Task);
        assert_eq!("off".parse::<BackgroundClockMode>().unwrap(), BackgroundClockMode::Disabled);
        assert!("worker".parse::<BackgroundClockMode>().is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.server_url = Some("ws://localhost:9081/ws".to_string());
        config.watchdog.heartbeat_interval_ms = 3000;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, WatchdogError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("NETWATCH_SERVER_URL", "ws://example.org/socket"),
            ("NETWATCH_HEARTBEAT_INTERVAL_MS", "750"),
            ("NETWATCH_BACKGROUND_CLOCK", "task"),
            ("NETWATCH_PROBE_TARGET", "example.org:443"),
        ]);
        let mut config = Config::default();
        config
            .apply_env_overrides(|key| vars.get(key).cloned())
            .unwrap();

        assert_eq!(config.server_url.as_deref(), Some("ws://example.org/socket"));
        assert_eq!(config.watchdog.heartbeat_interval_ms, 750);
        assert_eq!(config.watchdog.background_clock, BackgroundClockMode::Task);
        assert_eq!(config.connectivity.target.as_deref(), Some("example.org:443"));
    }

    #[test]
    fn test_env_override_rejects_garbage_interval() {
        let vars = env(&[("NETWATCH_HEARTBEAT_INTERVAL_MS", "soon")]);
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(|key| vars.get(key).cloned())
            .unwrap_err();
        assert!(err.to_string().contains("NETWATCH_HEARTBEAT_INTERVAL_MS"));
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut config = WatchdogConfig::default();
        config.heartbeat_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = WatchdogConfig::default();
        config.min_interval_ms = 10_000;
        config.max_interval_ms = 1_000;
        assert!(config.validate().is_err());

        let mut config = WatchdogConfig::default();
        config.heartbeat_interval_ms = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_interval() {
        let config = WatchdogConfig::default();
        assert_eq!(config.clamp_interval_ms(1), DEFAULT_MIN_INTERVAL_MS);
        assert_eq!(config.clamp_interval_ms(5000), 5000);
        assert_eq!(config.clamp_interval_ms(u64::MAX), DEFAULT_MAX_INTERVAL_MS);
    }

    #[test]
    fn test_clamp_interval_with_inverted_bounds() {
        let config = WatchdogConfig {
            min_interval_ms: 10_000,
            max_interval_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(config.clamp_interval_ms(5_000), 1_000);

        let config = WatchdogConfig {
            min_interval_ms: 0,
            max_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.clamp_interval_ms(0), 1);
    }
}
