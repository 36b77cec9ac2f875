//! WebSocket connection handler
//!
//! Drives one subscriber connection: registers it with the hub, forwards
//! queued snapshots to the socket and answers keep-alive pings. The
//! subscription is released however the connection ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thv_core::{ClientMessage, ServerMessage};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use super::hub::{BroadcastHub, SubscriberId};

/// Longest a single frame may take to reach the client
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for WebSocket handlers
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Arc<BroadcastHub>,
}

/// Unsubscribes when the connection task ends, including on panic
struct SubscriptionGuard {
    hub: Arc<BroadcastHub>,
    id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

enum Flow {
    Continue,
    Stop,
}

impl WebSocketState {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }

    /// Handle a new WebSocket connection
    ///
    /// Returns once the client disconnects, a send fails or the hub shuts
    /// down.
    pub async fn handle_connection<S>(&self, socket: S)
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + 'static,
    {
        // Register with the hub; the initial snapshot is already queued
        let subscription = match self.hub.subscribe() {
            Ok(sub) => sub,
            Err(e) => {
                warn!("Rejecting WebSocket connection: {}", e);
                return;
            }
        };
        let id = subscription.id;
        let mut outbound = subscription.receiver;
        let _guard = SubscriptionGuard {
            hub: Arc::clone(&self.hub),
            id,
        };
        info!("New WebSocket connection: {}", id);

        let (mut ws_sender, mut ws_receiver) = socket.split();

        // Forward pushes and answer client frames until either side ends
        loop {
            tokio::select! {
                queued = outbound.recv() => {
                    // Hub dropped our sender: service is shutting down
                    let Some(message) = queued else {
                        debug!("Hub released {}, closing socket", id);
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    };
                    if let Flow::Stop = send_json(&mut ws_sender, id, &message).await {
                        break;
                    }
                }
                incoming = ws_receiver.next() => {
                    let flow = match incoming {
                        Some(Ok(msg)) => handle_message(&mut ws_sender, id, msg).await,
                        Some(Err(e)) => {
                            debug!("WebSocket error for {}: {}", id, e);
                            Flow::Stop
                        }
                        None => Flow::Stop,
                    };
                    if let Flow::Stop = flow {
                        break;
                    }
                }
            }
        }

        // Guard drop unsubscribes
        info!("WebSocket connection closed: {}", id);
    }
}

async fn send_json<W>(sender: &mut W, id: SubscriberId, message: &ServerMessage) -> Flow
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize message for {}: {}", id, e);
            return Flow::Continue;
        }
    };
    send_frame(sender, id, Message::Text(json.into())).await
}

async fn send_frame<W>(sender: &mut W, id: SubscriberId, frame: Message) -> Flow
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    match tokio::time::timeout(SEND_TIMEOUT, sender.send(frame)).await {
        Ok(Ok(())) => Flow::Continue,
        Ok(Err(e)) => {
            debug!("Send to {} failed: {}", id, e);
            Flow::Stop
        }
        Err(_) => {
            warn!("Send to {} timed out", id);
            Flow::Stop
        }
    }
}

/// Handle one inbound frame; unknown messages are ignored
async fn handle_message<W>(sender: &mut W, id: SubscriberId, msg: Message) -> Flow
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    match msg {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Ping { timestamp }) => {
                let pong = ServerMessage::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: Utc::now().timestamp_millis(),
                };
                send_json(sender, id, &pong).await
            }
            Err(e) => {
                debug!("Ignoring message from {}: {}", id, e);
                Flow::Continue
            }
        },
        Message::Ping(payload) => send_frame(sender, id, Message::Pong(payload)).await,
        Message::Close(_) => Flow::Stop,
        _ => Flow::Continue,
    }
}
