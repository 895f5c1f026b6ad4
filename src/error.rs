//! Error types for Netwatch
//!
//! This module defines all error types used throughout the crate.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Note that the running watchdog never surfaces these to its callers: emit
//! failures and rejected directives are logged and swallowed inside the event
//! loop. Errors are returned from construction-time and configuration APIs.

use thiserror::Error;

/// The primary error type for Netwatch operations.
#[derive(Error, Debug)]
pub enum WatchdogError {
    /// Configuration-related errors (invalid bounds, unknown clock mode, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Messaging channel errors (send failures, malformed frames, etc.)
    #[error("Channel error: {0}")]
    Channel(String),

    /// The messaging channel is not connected
    #[error("Channel disconnected: {0}")]
    ChannelDisconnected(String),

    /// A heartbeat interval that is not a finite positive number
    #[error("Invalid heartbeat interval: {0}")]
    InvalidInterval(String),

    /// Background clock failures (spawn errors, closed command channel)
    #[error("Worker error: {0}")]
    Worker(String),

    /// The watchdog event loop is no longer running
    #[error("Watchdog stopped")]
    Stopped,

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A specialized `Result` type for Netwatch operations.
pub type Result<T> = std::result::Result<T, WatchdogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchdogError::InvalidInterval("\"abc\"".to_string());
        assert_eq!(err.to_string(), "Invalid heartbeat interval: \"abc\"");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WatchdogError = io_err.into();
        assert!(matches!(err, WatchdogError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: WatchdogError = json_err.into();
        assert!(matches!(err, WatchdogError::Json(_)));
    }

    #[test]
    fn test_disconnected_display() {
        let err = WatchdogError::ChannelDisconnected("loopback".to_string());
        assert_eq!(err.to_string(), "Channel disconnected: loopback");
    }
}
