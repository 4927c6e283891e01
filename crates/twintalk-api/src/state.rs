//! Shared application state: the façade and dispatcher the handlers call
//! into, plus the broadcast channel WebSocket clients subscribe to.

use crate::ws::BroadcastingBroker;
use std::sync::Arc;
use twintalk_core::{
    Config, IdentityClient, IngestionDispatcher, LifecycleNotifier, MemoryFanoutCache,
    MemoryStateLog, MemoryTwinRegistry, StandaloneIdentity, StateEvaluator, TwinsService,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TwinsService>,
    pub dispatcher: Arc<IngestionDispatcher>,
    pub notifications: tokio::sync::broadcast::Sender<twintalk_core::BusMessage>,
}

impl AppState {
    /// Wires the façade, dispatcher, and a broadcasting decorator around an
    /// in-memory broker so lifecycle notifications both take the normal
    /// publish path and fan out to any number of WebSocket clients.
    pub fn standalone(config: &Config) -> Self {
        let identity: Arc<dyn IdentityClient> = Arc::new(StandaloneIdentity::new(
            config.standalone_email.clone().unwrap_or_default(),
            config.standalone_token.clone().unwrap_or_default(),
        ));

        let registry = Arc::new(MemoryTwinRegistry::new());
        let cache = Arc::new(MemoryFanoutCache::new());
        let state_log = Arc::new(MemoryStateLog::new());

        let (broker, notifications) =
            BroadcastingBroker::new(twintalk_core::InMemoryBroker::new(), 256);
        let broker: Arc<dyn twintalk_core::Broker> = Arc::new(broker);

        let notifier = Arc::new(LifecycleNotifier::new(
            broker,
            config.notification_channel.clone(),
        ));

        let service = Arc::new(TwinsService::new(
            identity,
            registry.clone() as Arc<dyn twintalk_core::TwinRegistry>,
            cache.clone() as Arc<dyn twintalk_core::FanoutCache>,
            state_log.clone() as Arc<dyn twintalk_core::StateLog>,
            notifier.clone(),
        ));

        let evaluator = Arc::new(StateEvaluator::new(
            registry.clone() as Arc<dyn twintalk_core::TwinRegistry>,
            state_log as Arc<dyn twintalk_core::StateLog>,
            notifier,
        ));
        let dispatcher = Arc::new(IngestionDispatcher::new(
            cache as Arc<dyn twintalk_core::FanoutCache>,
            registry as Arc<dyn twintalk_core::TwinRegistry>,
            evaluator,
            config.notification_channel.clone(),
        ));

        Self {
            service,
            dispatcher,
            notifications,
        }
    }
}
