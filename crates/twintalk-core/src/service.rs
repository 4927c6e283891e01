//! CRUD façade (§6): the abstract operation set the core exposes to
//! whatever transport a re-implementer bolts on (`twintalk-api`, here).
//!
//! Every operation resolves the caller's identity first, then performs its
//! registry/cache work in write-through order (registry before cache), and
//! finally emits a lifecycle notification — success or failure — without
//! letting a notifier failure affect the result.

use crate::cache::FanoutCache;
use crate::config::{Config, DEFAULT_LIMIT, DEFAULT_OFFSET, MAX_LIMIT};
use crate::error::Error;
use crate::identity::IdentityClient;
use crate::model::state::State;
use crate::model::twin::{Definition, Twin, TwinId};
use crate::notifier::{LifecycleNotifier, Operation, Outcome};
use crate::paging::{Page, TwinFilter};
use crate::registry::TwinRegistry;
use crate::state_log::StateLog;
use std::sync::Arc;

pub struct TwinsService {
    identity: Arc<dyn IdentityClient>,
    registry: Arc<dyn TwinRegistry>,
    cache: Arc<dyn FanoutCache>,
    state_log: Arc<dyn StateLog>,
    notifier: Arc<LifecycleNotifier>,
}

impl TwinsService {
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        registry: Arc<dyn TwinRegistry>,
        cache: Arc<dyn FanoutCache>,
        state_log: Arc<dyn StateLog>,
        notifier: Arc<LifecycleNotifier>,
    ) -> Self {
        Self {
            identity,
            registry,
            cache,
            state_log,
            notifier,
        }
    }

    pub async fn add_twin(
        &self,
        token: &str,
        owner_override: Option<String>,
        name: String,
        metadata: serde_json::Value,
        definition: Definition,
    ) -> Result<Twin, Error> {
        let identity = self.identity.identify(token).await?;
        let owner = owner_override.unwrap_or(identity.user_id);

        let result = async {
            let twin = Twin::new(owner, name, metadata, definition)?;
            let twin = self.registry.save(twin).await?;
            self.cache.save(&twin).await?;
            Ok::<Twin, Error>(twin)
        }
        .await;

        self.notify_result(Operation::Create, &result, |t| serde_json::to_value(t).unwrap_or_default())
            .await;
        result
    }

    /// `changes` is the set of fields to update; at least one must be
    /// `Some`, otherwise `Malformed` ("update with no changed field").
    pub async fn update_twin(
        &self,
        token: &str,
        id: &TwinId,
        name: Option<String>,
        metadata: Option<serde_json::Value>,
        new_definition: Option<Definition>,
    ) -> Result<(), Error> {
        self.identity.identify(token).await?;

        if name.is_none() && metadata.is_none() && new_definition.is_none() {
            let err = Error::Malformed("update with no changed field".to_string());
            self.notifier
                .notify(Operation::Update, Outcome::Failure, serde_json::json!({ "error": err.to_string() }))
                .await;
            return Err(err);
        }

        let result = async {
            let mut twin = self.registry.retrieve_by_id(id).await?;
            if let Some(name) = name {
                twin.set_name(name)?;
            }
            if let Some(metadata) = metadata {
                twin.metadata = metadata;
                twin.touch();
            }
            if let Some(definition) = new_definition {
                twin.append_definition(definition);
            }
            self.registry.update(twin.clone()).await?;
            self.cache.update(&twin).await?;
            Ok::<Twin, Error>(twin)
        }
        .await;

        self.notify_result(Operation::Update, &result, |t| serde_json::to_value(t).unwrap_or_default())
            .await;
        result.map(|_| ())
    }

    pub async fn view_twin(&self, token: &str, id: &TwinId) -> Result<Twin, Error> {
        self.identity.identify(token).await?;
        let result = self.registry.retrieve_by_id(id).await;
        self.notify_result(Operation::Get, &result, |t| serde_json::to_value(t).unwrap_or_default())
            .await;
        result
    }

    pub async fn list_twins(
        &self,
        token: &str,
        offset: Option<u64>,
        limit: Option<u64>,
        filter: TwinFilter,
    ) -> Result<Page<Twin>, Error> {
        self.identity.identify(token).await?;
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let offset = offset.unwrap_or(DEFAULT_OFFSET);
        if limit < 1 || limit > MAX_LIMIT {
            return Err(Error::Malformed(format!("limit must be in 1..={MAX_LIMIT}")));
        }
        if let Some(name) = &filter.name {
            crate::model::twin::validate_name(name)?;
        }
        self.registry.retrieve_all(offset, limit, filter).await
    }

    pub async fn remove_twin(&self, token: &str, id: &TwinId) -> Result<(), Error> {
        self.identity.identify(token).await?;
        let result = async {
            self.registry.remove(id).await?;
            self.cache.remove(id).await?;
            Ok::<(), Error>(())
        }
        .await;
        self.notify_result(Operation::Remove, &result, |_| serde_json::json!({ "id": id.0 }))
            .await;
        result
    }

    pub async fn list_states(
        &self,
        token: &str,
        offset: Option<u64>,
        limit: Option<u64>,
        twin_id: &TwinId,
    ) -> Result<Page<State>, Error> {
        self.identity.identify(token).await?;
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let offset = offset.unwrap_or(DEFAULT_OFFSET);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(Error::Malformed(format!("limit must be in 1..={MAX_LIMIT}")));
        }
        self.state_log.retrieve_all(offset, limit, twin_id).await
    }

    async fn notify_result<T>(
        &self,
        op: Operation,
        result: &Result<T, Error>,
        success_payload: impl FnOnce(&T) -> serde_json::Value,
    ) {
        match result {
            Ok(value) => {
                self.notifier
                    .notify(op, Outcome::Success, success_payload(value))
                    .await
            }
            Err(err) => {
                self.notifier
                    .notify(op, Outcome::Failure, serde_json::json!({ "error": err.to_string() }))
                    .await
            }
        }
    }
}

/// Builds a [`TwinsService`] and [`crate::dispatcher::IngestionDispatcher`]
/// sharing the same registry/cache, matching the construction shape a host
/// binary (out of scope here) would assemble at startup from [`Config`].
pub struct ServiceHandles {
    pub service: Arc<TwinsService>,
    pub dispatcher: Arc<crate::dispatcher::IngestionDispatcher>,
}

pub fn build_in_memory(config: &Config, identity: Arc<dyn IdentityClient>) -> ServiceHandles {
    let registry: Arc<dyn TwinRegistry> = Arc::new(crate::registry::MemoryTwinRegistry::new());
    let cache: Arc<dyn FanoutCache> = Arc::new(crate::cache::MemoryFanoutCache::new());
    let state_log: Arc<dyn StateLog> = Arc::new(crate::state_log::MemoryStateLog::new());
    let broker: Arc<dyn crate::broker::Broker> = Arc::new(crate::broker::InMemoryBroker::new());
    let notifier = Arc::new(LifecycleNotifier::new(broker, config.notification_channel.clone()));

    let service = Arc::new(TwinsService::new(
        identity,
        registry.clone(),
        cache.clone(),
        state_log.clone(),
        notifier.clone(),
    ));

    let evaluator = Arc::new(crate::evaluator::StateEvaluator::new(
        registry.clone(),
        state_log,
        notifier,
    ));
    let dispatcher = Arc::new(crate::dispatcher::IngestionDispatcher::new(
        cache,
        registry,
        evaluator,
        config.notification_channel.clone(),
    ));

    ServiceHandles { service, dispatcher }
}
