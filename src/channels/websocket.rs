//! WebSocket client channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{decode_frame, encode_frame, InboundEvent, SocketChannel, INBOUND_BUFFER};
use crate::error::{Result, WatchdogError};

/// [`SocketChannel`] over a single WebSocket connection.
///
/// The connection is split into a writer task fed by an unbounded queue and a
/// reader task that decodes text frames and broadcasts them. Once either side
/// ends the channel reports itself disconnected and every later emit fails
/// with [`WatchdogError::ChannelDisconnected`]. Reconnecting means building a
/// new channel.
pub struct WebSocketChannel {
    url: String,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Message>,
    inbound: broadcast::Sender<InboundEvent>,
}

impl WebSocketChannel {
    /// Connect to `url` and start the reader and writer tasks.
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url = %url, "Connecting to server WebSocket");
        let (ws_stream, _response) = connect_async(url).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let connected = Arc::new(AtomicBool::new(true));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound, _) = broadcast::channel(INBOUND_BUFFER);

        let writer_connected = Arc::clone(&connected);
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "WebSocket send failed");
                    break;
                }
            }
            writer_connected.store(false, Ordering::SeqCst);
            let _ = sink.close().await;
            debug!("WebSocket writer finished");
        });

        let reader_connected = Arc::clone(&connected);
        let reader_inbound = inbound.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match decode_frame(&text) {
                        Ok(event) => {
                            debug!(event = %event.name, "Inbound event");
                            let _ = reader_inbound.send(event);
                        }
                        Err(e) => debug!(error = %e, "Ignoring undecodable frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "Server closed WebSocket");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
            debug!("WebSocket reader finished");
        });

        Ok(Self {
            url: url.to_string(),
            connected,
            outbound,
            inbound,
        })
    }

    /// The URL this channel connected to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SocketChannel for WebSocketChannel {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn emit(&self, event: &str, payload: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(WatchdogError::ChannelDisconnected(self.url.clone()));
        }
        let frame = encode_frame(event, payload.as_ref())?;
        self.outbound
            .send(Message::Text(frame))
            .map_err(|_| WatchdogError::ChannelDisconnected(self.url.clone()))
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.inbound.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
