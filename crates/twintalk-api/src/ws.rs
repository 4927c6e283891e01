//! Lifecycle-notification WebSocket stream.
//!
//! `BroadcastingBroker` is a decorator in the same chain as the core's own
//! `TimeoutIdentity` (§9 "decorator, not inheritance"): it delegates every
//! operation to an inner broker unchanged, additionally mirroring each
//! publish onto a local `tokio::sync::broadcast` channel so any number of
//! WebSocket clients can observe it without the in-memory broker's
//! single-handler-per-subscribe limitation.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::broadcast;
use twintalk_core::{Broker, BusMessage, Error, MessageHandler};

pub struct BroadcastingBroker<B> {
    inner: B,
    tx: broadcast::Sender<BusMessage>,
}

impl<B: Broker> BroadcastingBroker<B> {
    pub fn new(inner: B, capacity: usize) -> (Self, broadcast::Sender<BusMessage>) {
        let (tx, _rx) = broadcast::channel(capacity);
        (
            Self {
                inner,
                tx: tx.clone(),
            },
            tx,
        )
    }
}

#[async_trait]
impl<B: Broker> Broker for BroadcastingBroker<B> {
    async fn publish(&self, channel: &str, subtopic: &str, payload: serde_json::Value) -> Result<(), Error> {
        // Best-effort: no WebSocket clients subscribed is not an error.
        let _ = self.tx.send(BusMessage {
            channel: channel.to_string(),
            subtopic: subtopic.to_string(),
            publisher: "system".to_string(),
            payload: payload.clone(),
        });
        self.inner.publish(channel, subtopic, payload).await
    }

    async fn subscribe(&self, queue_group: &str, handler: Arc<dyn MessageHandler>) -> Result<(), Error> {
        self.inner.subscribe(queue_group, handler).await
    }
}

pub async fn lifecycle_notifications(
    State(state): State<crate::state::AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_notifications(socket, state.notifications.subscribe()))
}

async fn stream_notifications(mut socket: WebSocket, mut rx: broadcast::Receiver<BusMessage>) {
    loop {
        match rx.recv().await {
            Ok(message) => {
                let Ok(text) = serde_json::to_string(&message) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "websocket client lagged behind lifecycle notifications");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
