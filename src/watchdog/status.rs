//! Observable watchdog state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two states of the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Offline,
    Online,
}

impl From<bool> for LinkState {
    fn from(online: bool) -> Self {
        if online {
            LinkState::Online
        } else {
            LinkState::Offline
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Offline => write!(f, "offline"),
            LinkState::Online => write!(f, "online"),
        }
    }
}

/// Snapshot of the watchdog, published on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogStatus {
    /// Whether the platform reports network connectivity.
    pub on_line: bool,
    /// Current heartbeat period.
    pub heartbeat_interval_ms: u64,
    /// Whether the foreground timer is running.
    pub foreground_running: bool,
    /// Whether a background clock is attached.
    pub worker_available: bool,
    /// Wall-clock time of the last foreground tick.
    pub last_foreground_ping_at: Option<DateTime<Utc>>,
    /// Wall-clock time of the last background tick.
    pub last_background_ping_at: Option<DateTime<Utc>>,
    /// Last measured foreground offset from the expected period.
    pub foreground_drift_ms: Option<i64>,
    /// Last measured background offset from the expected period.
    pub background_drift_ms: Option<i64>,
    /// Heartbeats handed to the channel successfully.
    pub heartbeats_sent: u64,
    /// Heartbeats the channel refused.
    pub emit_failures: u64,
    /// Ticks received from the background clock.
    pub background_ticks: u64,
    /// Interval directives rejected as malformed.
    pub rejected_directives: u64,
}

impl WatchdogStatus {
    /// Initial, offline snapshot.
    pub fn new(heartbeat_interval_ms: u64, worker_available: bool) -> Self {
        Self {
            on_line: false,
            heartbeat_interval_ms,
            foreground_running: false,
            worker_available,
            last_foreground_ping_at: None,
            last_background_ping_at: None,
            foreground_drift_ms: None,
            background_drift_ms: None,
            heartbeats_sent: 0,
            emit_failures: 0,
            background_ticks: 0,
            rejected_directives: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        LinkState::from(self.on_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_offline() {
        let status = WatchdogStatus::new(2000, true);
        assert_eq!(status.state(), LinkState::Offline);
        assert!(!status.foreground_running);
        assert_eq!(status.heartbeats_sent, 0);
    }

    #[test]
    fn test_link_state_display() {
        assert_eq!(LinkState::from(true).to_string(), "online");
        assert_eq!(LinkState::from(false).to_string(), "offline");
    }

    #[test]
    fn test_status_serializes() {
        let status = WatchdogStatus::new(2000, false);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["heartbeat_interval_ms"], 2000);
        assert_eq!(json["on_line"], false);
        assert!(json["last_foreground_ping_at"].is_null());
    }
}
