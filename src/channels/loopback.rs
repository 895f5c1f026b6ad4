//! In-memory channel that records emitted events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::{InboundEvent, SocketChannel, INBOUND_BUFFER};
use crate::error::{Result, WatchdogError};

/// An event recorded by [`LoopbackChannel::emit`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Option<Value>,
    pub at: DateTime<Utc>,
}

/// Channel that keeps everything in memory.
///
/// Emits are recorded instead of sent, and [`inject`](Self::inject) plays the
/// server's role by pushing inbound events to subscribers.
///
/// ```
/// use netwatch::channels::{LoopbackChannel, SocketChannel, CLIENT_HEARTBEAT};
///
/// # tokio_test::block_on(async {
/// let channel = LoopbackChannel::new();
/// channel.emit(CLIENT_HEARTBEAT, None).await.unwrap();
/// assert_eq!(channel.emitted_count(CLIENT_HEARTBEAT), 1);
///
/// channel.set_connected(false);
/// assert!(channel.emit(CLIENT_HEARTBEAT, None).await.is_err());
/// # })
/// ```
pub struct LoopbackChannel {
    connected: AtomicBool,
    emitted: Mutex<Vec<EmittedEvent>>,
    inbound: broadcast::Sender<InboundEvent>,
}

impl LoopbackChannel {
    /// Create a connected loopback channel.
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_BUFFER);
        Self {
            connected: AtomicBool::new(true),
            emitted: Mutex::new(Vec::new()),
            inbound,
        }
    }

    /// Simulate the connection going up or down.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Push an event to every subscriber. Returns how many received it.
    pub fn inject(&self, event: InboundEvent) -> usize {
        self.inbound.send(event).unwrap_or(0)
    }

    /// Snapshot of everything emitted so far.
    pub fn emitted(&self) -> Vec<EmittedEvent> {
        self.emitted
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of emitted events with the given name.
    pub fn emitted_count(&self, name: &str) -> usize {
        self.emitted
            .lock()
            .map(|events| events.iter().filter(|e| e.name == name).count())
            .unwrap_or(0)
    }

    /// Forget all recorded events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.emitted.lock() {
            events.clear();
        }
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocketChannel for LoopbackChannel {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn emit(&self, event: &str, payload: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(WatchdogError::ChannelDisconnected(self.name().to_string()));
        }
        debug!("loopback emit: {}", event);
        let mut events = self
            .emitted
            .lock()
            .map_err(|_| WatchdogError::Channel("loopback event log poisoned".to_string()))?;
        events.push(EmittedEvent {
            name: event.to_string(),
            payload,
            at: Utc::now(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.inbound.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_records_event() {
        let channel = LoopbackChannel::new();
        channel.emit("a", Some(json!(1))).await.unwrap();
        channel.emit("b", None).await.unwrap();

        let events = channel.emitted();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "a");
        assert_eq!(events[0].payload, Some(json!(1)));
        assert_eq!(channel.emitted_count("b"), 1);
    }

    #[tokio::test]
    async fn test_emit_fails_when_disconnected() {
        let channel = LoopbackChannel::new();
        channel.set_connected(false);
        let err = channel.emit("a", None).await.unwrap_err();
        assert!(matches!(err, WatchdogError::ChannelDisconnected(_)));
        assert!(channel.emitted().is_empty());
    }

    #[tokio::test]
    async fn test_inject_reaches_subscribers() {
        let channel = LoopbackChannel::new();
        let mut rx = channel.subscribe();
        let delivered = channel.inject(InboundEvent::new("hello", json!("world")));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "hello");
    }

    #[test]
    fn test_inject_without_subscribers() {
        let channel = LoopbackChannel::new();
        assert_eq!(channel.inject(InboundEvent::new("x", Value::Null)), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let channel = LoopbackChannel::new();
        channel.emit("a", None).await.unwrap();
        channel.clear();
        assert!(channel.emitted().is_empty());
    }
}
