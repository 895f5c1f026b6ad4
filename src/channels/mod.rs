//! Messaging channels between the client and the platform server.
//!
//! The watchdog only needs three things from a channel: emit a named event,
//! receive named events pushed by the server, and report whether it is
//! connected. [`SocketChannel`] captures that contract; implementations:
//!
//! - [`LoopbackChannel`] - in-memory, for tests and the demo command
//! - [`WebSocketChannel`] - `tokio-tungstenite` client
//!
//! On the wire an event is a JSON array: `["event_name"]` or
//! `["event_name", payload]`, one per text frame, in both directions. There
//! is no socket.io/engine.io packet layer (no `40` handshake, no `2`/`3`
//! ping/pong, no `42` prefix); a server speaking that protocol needs a
//! bridge in front of it.

mod loopback;
mod websocket;

pub use loopback::{EmittedEvent, LoopbackChannel};
pub use websocket::WebSocketChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{Result, WatchdogError};

/// Outbound liveness event, emitted once per foreground tick while online.
pub const CLIENT_HEARTBEAT: &str = "client_heartbeat";

/// Inbound server directive carrying a new heartbeat interval in seconds.
pub const SET_HEARTBEAT_EMIT_INTERVAL: &str = "set_heartbeat_emit_interval";

/// Capacity of the broadcast buffer for inbound events.
pub(crate) const INBOUND_BUFFER: usize = 64;

/// An event pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Event name.
    pub name: String,
    /// Event payload, `Value::Null` when the server sent none.
    pub payload: Value,
}

impl InboundEvent {
    /// Create a new inbound event.
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }
}

/// Duplex messaging channel used by the watchdog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocketChannel: Send + Sync {
    /// Channel name, used in log lines.
    fn name(&self) -> &str;

    /// Send a named event with an optional payload.
    async fn emit(&self, event: &str, payload: Option<Value>) -> Result<()>;

    /// Subscribe to events pushed by the server.
    fn subscribe(&self) -> broadcast::Receiver<InboundEvent>;

    /// Whether the underlying connection is currently up.
    fn is_connected(&self) -> bool;
}

/// Encode an event as a JSON array frame.
pub fn encode_frame(event: &str, payload: Option<&Value>) -> Result<String> {
    let frame = match payload {
        Some(payload) => Value::Array(vec![Value::String(event.to_string()), payload.clone()]),
        None => Value::Array(vec![Value::String(event.to_string())]),
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Decode a JSON array frame into an [`InboundEvent`].
pub fn decode_frame(text: &str) -> Result<InboundEvent> {
    let value: Value = serde_json::from_str(text.trim())?;

    let mut items = match value {
        Value::Array(items) => items.into_iter(),
        other => {
            return Err(WatchdogError::Channel(format!(
                "Expected an event array, got {}",
                other
            )))
        }
    };

    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => {
            return Err(WatchdogError::Channel(
                "Event frame does not start with an event name".to_string(),
            ))
        }
    };

    Ok(InboundEvent {
        name,
        payload: items.next().unwrap_or(Value::Null),
    })
}
