//! Server directives that change heartbeat behaviour.

use serde_json::Value;

use crate::channels::{InboundEvent, SET_HEARTBEAT_EMIT_INTERVAL};
use crate::error::{Result, WatchdogError};

/// A directive the watchdog acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerDirective {
    /// Use a new heartbeat interval.
    SetHeartbeatInterval { interval_ms: u64 },
}

impl ServerDirective {
    /// Interpret an inbound event.
    ///
    /// Returns `None` for events that are not directives, and
    /// `Some(Err(..))` for a directive with a malformed payload.
    pub fn from_event(event: &InboundEvent) -> Option<Result<Self>> {
        match event.name.as_str() {
            SET_HEARTBEAT_EMIT_INTERVAL => Some(
                interval_ms_from_payload(&event.payload)
                    .map(|interval_ms| Self::SetHeartbeatInterval { interval_ms }),
            ),
            _ => None,
        }
    }
}

/// Read an interval in seconds (number or numeric string) and return
/// milliseconds.
///
/// Fractional seconds are accepted and rounded to the nearest millisecond.
/// Anything that is not a finite number of at least one millisecond is
/// rejected.
pub fn interval_ms_from_payload(payload: &Value) -> Result<u64> {
    let seconds = match payload {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| WatchdogError::InvalidInterval(payload.to_string()))?;

    if !seconds.is_finite() {
        return Err(WatchdogError::InvalidInterval(payload.to_string()));
    }

    let millis = (seconds * 1000.0).round();
    if millis < 1.0 {
        return Err(WatchdogError::InvalidInterval(payload.to_string()));
    }
    // Float-to-int casts saturate, so huge values land on u64::MAX.
    Ok(millis as u64)
}
