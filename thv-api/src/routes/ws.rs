//! WebSocket route handler
//!
//! Upgrades the connection and bridges axum's socket onto the
//! tungstenite-typed stream the connection handler expects.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::PollSender;
use tracing::{debug, warn};

use crate::AppState;

const BRIDGE_CAPACITY: usize = 64;

/// Longest the socket gets to flush queued frames once the handler is done
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    debug!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();

    // Create channels for bridging between axum and the connection handler
    let (inbound_tx, inbound_rx) = mpsc::channel::<WsMessage>(BRIDGE_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel::<WsMessage>(BRIDGE_CAPACITY);

    // Task: Forward frames from the client into the handler
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let closing = matches!(msg, Message::Close(_));
            if inbound_tx.send(to_tungstenite(msg)).await.is_err() || closing {
                break;
            }
        }
    });

    // Task: Forward handler output to the client
    let send_task = spawn_forwarder(sender, outbound_rx);

    let bridge = BridgeStream {
        rx: inbound_rx,
        tx: PollSender::new(outbound_tx),
    };
    state.ws_state.handle_connection(bridge).await;

    // Clean up tasks
    recv_task.abort();
    finish_forwarder(send_task, CLOSE_FLUSH_TIMEOUT).await;
}

/// Write bridged frames to the client until the bridge closes, a write
/// fails or a close frame has gone out
fn spawn_forwarder<W>(mut sender: W, mut outbound_rx: mpsc::Receiver<WsMessage>) -> JoinHandle<()>
where
    W: Sink<Message> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let closing = matches!(msg, WsMessage::Close(_));
            let Some(msg) = to_axum(msg) else { continue };
            if sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    })
}

/// Give the forwarder `limit` to flush what is queued, then abort it
///
/// A client that stopped reading keeps the write pending forever.
async fn finish_forwarder(mut task: JoinHandle<()>, limit: Duration) {
    match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("WebSocket send task failed: {}", e),
        Err(_) => {
            debug!("Client stopped reading, dropping connection");
            task.abort();
        }
    }
}

fn to_tungstenite(msg: Message) -> WsMessage {
    match msg {
        Message::Text(text) => WsMessage::Text(text.as_str().into()),
        Message::Binary(data) => WsMessage::Binary(data),
        Message::Ping(data) => WsMessage::Ping(data),
        Message::Pong(data) => WsMessage::Pong(data),
        Message::Close(_) => WsMessage::Close(None),
    }
}

fn to_axum(msg: WsMessage) -> Option<Message> {
    match msg {
        WsMessage::Text(text) => Some(Message::Text(text.as_str().into())),
        WsMessage::Binary(data) => Some(Message::Binary(data)),
        WsMessage::Ping(data) => Some(Message::Ping(data)),
        WsMessage::Pong(data) => Some(Message::Pong(data)),
        WsMessage::Close(_) => Some(Message::Close(None)),
        WsMessage::Frame(_) => None,
    }
}

/// Channel pair presented to the connection handler as one socket
struct BridgeStream {
    rx: mpsc::Receiver<WsMessage>,
    tx: PollSender<WsMessage>,
}

impl Stream for BridgeStream {
    type Item = Result<WsMessage, WsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|msg| msg.map(Ok))
    }
}

impl Sink<WsMessage> for BridgeStream {
    type Error = WsError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        self.tx
            .poll_reserve(cx)
            .map_err(|_| WsError::ConnectionClosed)
    }

    fn start_send(mut self: Pin<&mut Self>, item: WsMessage) -> Result<(), WsError> {
        self.tx
            .send_item(item)
            .map_err(|_| WsError::ConnectionClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        self.tx.close();
        Poll::Ready(Ok(()))
    }
}
