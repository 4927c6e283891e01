//! Lifecycle Notifier: publishes operation outcomes onto the bus. Invoked
//! by every mutating CRUD operation and by the state evaluator.

use crate::broker::Broker;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Get,
    Remove,
    Save,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Get => "get",
            Operation::Remove => "remove",
            Operation::Save => "save",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

pub struct LifecycleNotifier {
    broker: Arc<dyn Broker>,
    /// Channel notifications publish to. `None` disables them entirely.
    channel: Option<String>,
}

impl LifecycleNotifier {
    pub fn new(broker: Arc<dyn Broker>, channel: Option<String>) -> Self {
        Self { broker, channel }
    }

    /// Publish at `Subtopic = "<op>.<success|failure>"`. A publish failure
    /// is logged but never propagated — the caller's store commit already
    /// happened and must not be rolled back for this.
    pub async fn notify(&self, op: Operation, outcome: Outcome, payload: serde_json::Value) {
        let Some(channel) = &self.channel else {
            return;
        };
        let subtopic = format!("{}.{}", op.as_str(), outcome.as_str());
        if let Err(err) = self.broker.publish(channel, &subtopic, payload).await {
            tracing::warn!(error = %err, channel, subtopic, "failed to publish lifecycle notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, MessageHandler};
    use crate::model::senml::BusMessage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingHandler(Mutex<Vec<BusMessage>>);

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle(&self, message: BusMessage) -> Result<(), crate::error::Error> {
            self.0.lock().unwrap().push(message);
            Ok(())
        }
    }

    #[tokio::test]
    async fn disabled_when_channel_unset() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Arc::new(RecordingHandler(Mutex::new(Vec::new())));
        broker.subscribe("twins", recorder.clone()).await.unwrap();

        let notifier = LifecycleNotifier::new(broker, None);
        notifier
            .notify(Operation::Create, Outcome::Success, serde_json::json!({}))
            .await;

        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publishes_operation_and_outcome_as_subtopic() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Arc::new(RecordingHandler(Mutex::new(Vec::new())));
        broker.subscribe("twins", recorder.clone()).await.unwrap();

        let notifier = LifecycleNotifier::new(broker, Some("N".to_string()));
        notifier
            .notify(Operation::Save, Outcome::Failure, serde_json::json!({"error": "x"}))
            .await;

        let messages = recorder.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, "N");
        assert_eq!(messages[0].subtopic, "save.failure");
    }
}
