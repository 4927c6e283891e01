//! Message broker capability: delivering telemetry and accepting lifecycle
//! notification publishes. The core depends only on this trait — the wire
//! protocol (NATS, MQTT, ...) is a re-implementer's choice.

use crate::error::Error;
use crate::model::senml::BusMessage;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: BusMessage) -> Result<(), Error>;
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, channel: &str, subtopic: &str, payload: serde_json::Value) -> Result<(), Error>;

    /// Register the single handler for a queue group. The broker guarantees
    /// exactly one invocation per message within the group; this trait
    /// does not model that guarantee, only the registration.
    async fn subscribe(&self, queue_group: &str, handler: Arc<dyn MessageHandler>) -> Result<(), Error>;
}

/// In-process broker for tests and standalone deployments. Uses the same
/// hot-swappable-pointer pattern the crate already uses for twin
/// definitions (`arc-swap`) to let `subscribe` replace the active handler
/// without a lock on the publish path.
pub struct InMemoryBroker {
    handler: ArcSwapOption<dyn MessageHandler>,
    publisher: String,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            handler: ArcSwapOption::empty(),
            publisher: "system".to_string(),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, channel: &str, subtopic: &str, payload: serde_json::Value) -> Result<(), Error> {
        let Some(handler) = self.handler.load_full() else {
            return Ok(());
        };
        let message = BusMessage {
            channel: channel.to_string(),
            subtopic: subtopic.to_string(),
            publisher: self.publisher.clone(),
            payload,
        };
        handler.handle(message).await
    }

    async fn subscribe(&self, _queue_group: &str, handler: Arc<dyn MessageHandler>) -> Result<(), Error> {
        self.handler.store(Some(handler));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, _message: BusMessage) -> Result<(), Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_a_noop() {
        let broker = InMemoryBroker::new();
        broker.publish("a", "x", serde_json::json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn publish_invokes_subscribed_handler() {
        let broker = InMemoryBroker::new();
        let count = Arc::new(AtomicUsize::new(0));
        broker
            .subscribe("twins", Arc::new(CountingHandler(count.clone())))
            .await
            .unwrap();
        broker.publish("a", "x", serde_json::json!({})).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
