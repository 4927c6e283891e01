//! Ingestion Dispatcher (C4): the broker message handler. Resolves a bus
//! message to its target twins via the fan-out cache, falling back to the
//! registry on a miss, then evaluates each twin sequentially.

use crate::broker::MessageHandler;
use crate::cache::FanoutCache;
use crate::error::Error;
use crate::evaluator::StateEvaluator;
use crate::model::senml::BusMessage;
use crate::model::twin::TwinId;
use async_trait::async_trait;
use std::sync::Arc;

pub struct IngestionDispatcher {
    cache: Arc<dyn FanoutCache>,
    registry: Arc<dyn crate::registry::TwinRegistry>,
    evaluator: Arc<StateEvaluator>,
    /// Messages on this channel are the service's own lifecycle
    /// notifications; ingesting them would loop back on itself.
    notification_channel: Option<String>,
}

impl IngestionDispatcher {
    pub fn new(
        cache: Arc<dyn FanoutCache>,
        registry: Arc<dyn crate::registry::TwinRegistry>,
        evaluator: Arc<StateEvaluator>,
        notification_channel: Option<String>,
    ) -> Self {
        Self {
            cache,
            registry,
            evaluator,
            notification_channel,
        }
    }

    async fn resolve_targets(&self, channel: &str, subtopic: &str) -> Result<Vec<TwinId>, Error> {
        let ids = self.cache.ids(channel, subtopic).await?;
        if !ids.is_empty() {
            return Ok(ids);
        }
        let ids = self.registry.retrieve_by_attribute(channel, subtopic).await?;
        if ids.is_empty() {
            return Ok(ids);
        }
        self.cache.save_ids(channel, subtopic, &ids).await?;
        Ok(ids)
    }

    pub async fn dispatch(&self, message: BusMessage) -> Result<(), Error> {
        if self
            .notification_channel
            .as_deref()
            .is_some_and(|ch| ch == message.channel)
        {
            return Ok(());
        }

        let ids = self.resolve_targets(&message.channel, &message.subtopic).await?;

        // Fail-fast: the first per-twin error is surfaced to the broker so
        // it can redeliver the whole message; remaining twins are not
        // attempted.
        for id in ids {
            self.evaluator.evaluate(&id, &message).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for IngestionDispatcher {
    async fn handle(&self, message: BusMessage) -> Result<(), Error> {
        self.dispatch(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::cache::MemoryFanoutCache;
    use crate::model::twin::{Attribute, Definition, Twin};
    use crate::notifier::LifecycleNotifier;
    use crate::registry::MemoryTwinRegistry;
    use crate::state_log::MemoryStateLog;

    fn attr(name: &str, channel: &str, subtopic: &str) -> Attribute {
        Attribute {
            name: name.to_string(),
            channel: channel.to_string(),
            subtopic: subtopic.to_string(),
            persist_state: true,
        }
    }

    async fn harness() -> (
        IngestionDispatcher,
        Arc<MemoryTwinRegistry>,
        Arc<MemoryFanoutCache>,
        Arc<MemoryStateLog>,
    ) {
        let registry = Arc::new(MemoryTwinRegistry::new());
        let cache = Arc::new(MemoryFanoutCache::new());
        let state_log = Arc::new(MemoryStateLog::new());
        let broker = Arc::new(InMemoryBroker::new());
        let notifier = Arc::new(LifecycleNotifier::new(broker, None));
        let evaluator = Arc::new(StateEvaluator::new(
            registry.clone(),
            state_log.clone(),
            notifier,
        ));
        let dispatcher = IngestionDispatcher::new(
            cache.clone(),
            registry.clone(),
            evaluator,
            Some("N".to_string()),
        );
        (dispatcher, registry, cache, state_log)
    }

    #[tokio::test]
    async fn notification_channel_messages_are_skipped() {
        let (dispatcher, registry, _cache, _state_log) = harness().await;
        let twin = Twin::new(
            "owner",
            "t",
            serde_json::json!({}),
            Definition::new(0, vec![attr("t", "N", crate::model::twin::SUBTOPIC_WILDCARD)]),
        )
        .unwrap();
        registry.save(twin.clone()).await.unwrap();

        let msg = BusMessage {
            channel: "N".to_string(),
            subtopic: "create.success".to_string(),
            publisher: "self".to_string(),
            payload: serde_json::json!({}),
        };
        // Malformed payload would normally error; the self-loop guard must
        // short-circuit before the payload is ever parsed.
        dispatcher.dispatch(msg).await.unwrap();
    }

    #[tokio::test]
    async fn registry_fallback_warms_cache_and_evaluates() {
        let (dispatcher, registry, cache, state_log) = harness().await;
        let twin = Twin::new(
            "owner",
            "t",
            serde_json::json!({}),
            Definition::new(0, vec![attr("t", "a", "x")]),
        )
        .unwrap();
        registry.save(twin.clone()).await.unwrap();
        // Not pre-warmed in the cache: dispatcher must fall back to the registry.
        assert!(cache.ids("a", "x").await.unwrap().is_empty());

        let msg = BusMessage {
            channel: "a".to_string(),
            subtopic: "x".to_string(),
            publisher: "sensor".to_string(),
            payload: serde_json::json!([{"bn":"t","bt":0,"t":0,"v":1.0}]),
        };
        dispatcher.dispatch(msg).await.unwrap();

        assert_eq!(cache.ids("a", "x").await.unwrap(), vec![twin.id.clone()]);
        let last = state_log.retrieve_last(&twin.id).await.unwrap();
        assert_eq!(last.id, 0);
    }

    #[tokio::test]
    async fn wildcard_attribute_resolves_via_cache() {
        let (dispatcher, registry, cache, state_log) = harness().await;
        let twin = Twin::new(
            "owner",
            "t",
            serde_json::json!({}),
            Definition::new(0, vec![attr("t", "a", crate::model::twin::SUBTOPIC_WILDCARD)]),
        )
        .unwrap();
        registry.save(twin.clone()).await.unwrap();
        cache.save(&twin).await.unwrap();

        let msg = BusMessage {
            channel: "a".to_string(),
            subtopic: "engine/temp".to_string(),
            publisher: "sensor".to_string(),
            payload: serde_json::json!([{"bn":"t","bt":0,"t":0,"v":9.0}]),
        };
        dispatcher.dispatch(msg).await.unwrap();

        let last = state_log.retrieve_last(&twin.id).await.unwrap();
        assert_eq!(last.id, 0);
    }

    #[tokio::test]
    async fn no_matching_twin_is_not_an_error() {
        let (dispatcher, _registry, _cache, _state_log) = harness().await;
        let msg = BusMessage {
            channel: "nowhere".to_string(),
            subtopic: "nobody".to_string(),
            publisher: "sensor".to_string(),
            payload: serde_json::json!([]),
        };
        dispatcher.dispatch(msg).await.unwrap();
    }
}
