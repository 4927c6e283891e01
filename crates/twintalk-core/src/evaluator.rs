//! State Evaluator (C5): the central per-twin, per-record state machine.
//!
//! For each SenML record bound to an attribute of the twin's current
//! definition, decides whether the record is a noop, an in-place update of
//! the latest state, or the start of a new saved state.

use crate::config::DEFAULT_DELTA_NS;
use crate::error::Error;
use crate::model::senml::{BusMessage, SenmlRecord};
use crate::model::state::State;
use crate::model::twin::{Definition, Twin};
use crate::notifier::{LifecycleNotifier, Operation, Outcome};
use crate::registry::TwinRegistry;
use crate::state_log::StateLog;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct StateEvaluator {
    registry: Arc<dyn TwinRegistry>,
    state_log: Arc<dyn StateLog>,
    notifier: Arc<LifecycleNotifier>,
}

enum Action {
    Noop,
    Update,
    Save,
}

impl StateEvaluator {
    pub fn new(
        registry: Arc<dyn TwinRegistry>,
        state_log: Arc<dyn StateLog>,
        notifier: Arc<LifecycleNotifier>,
    ) -> Self {
        Self {
            registry,
            state_log,
            notifier,
        }
    }

    /// Evaluate `message` against twin `twin_id`. Publishes `save.success` or
    /// `save.failure` before returning either outcome.
    pub async fn evaluate(&self, twin_id: &crate::model::twin::TwinId, message: &BusMessage) -> Result<(), Error> {
        match self.evaluate_inner(twin_id, message).await {
            Ok(()) => {
                self.notifier
                    .notify(
                        Operation::Save,
                        Outcome::Success,
                        serde_json::json!({
                            "publisher": message.publisher,
                            "payload": message.payload,
                        }),
                    )
                    .await;
                Ok(())
            }
            Err(err) => {
                self.notifier
                    .notify(
                        Operation::Save,
                        Outcome::Failure,
                        serde_json::json!({ "error": err.to_string() }),
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn evaluate_inner(&self, twin_id: &crate::model::twin::TwinId, message: &BusMessage) -> Result<(), Error> {
        let twin: Twin = self.registry.retrieve_by_id(twin_id).await?;
        let records = message.records()?;

        let definition = twin.current_definition().clone();
        let mut state = self.state_log.retrieve_last(&twin.id).await?;
        state.twin_id = twin.id.clone();
        state.definition = definition.id;

        if state.payload.is_empty() {
            state.id = -1;
        } else {
            prune_payload(&mut state, &definition);
        }

        for record in &records {
            let action = self.apply_record(&mut state, &definition, message, record);
            match action {
                Action::Noop => {
                    // Early-return on the first non-matching record: the rest of
                    // the batch is not evaluated. See DESIGN.md for why this
                    // reading was chosen over "skip and continue".
                    return Ok(());
                }
                Action::Update => self.state_log.update(state.clone()).await?,
                Action::Save => self.state_log.save(state.clone()).await?,
            }
        }

        Ok(())
    }

    /// Binds `record` to the first matching persisted attribute in
    /// `definition`, mutating `state` in place and returning which store
    /// call the caller must make.
    fn apply_record(
        &self,
        state: &mut State,
        definition: &Definition,
        message: &BusMessage,
        record: &SenmlRecord,
    ) -> Action {
        let Some(attr) = definition
            .attributes
            .iter()
            .find(|a| a.persist_state && a.matches(&message.channel, &message.subtopic))
        else {
            return Action::Noop;
        };

        let delta_ns = if definition.delta_ns > 0 {
            definition.delta_ns
        } else {
            DEFAULT_DELTA_NS
        };

        let record_ns = record.timestamp_ns();
        let effective_ns = if record_ns == 0 { now_ns() } else { record_ns };
        let delta = (state.created.timestamp_nanos_opt().unwrap_or(0) - effective_ns).abs();

        let action = if delta > delta_ns {
            state.id += 1;
            state.created = if record_ns == 0 {
                Utc::now()
            } else {
                DateTime::from_timestamp_nanos(record_ns)
            };
            Action::Save
        } else {
            Action::Update
        };

        state.payload.insert(attr.name.clone(), record.value());
        action
    }
}

fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

/// Drops payload keys that no longer correspond to a currently-persisted
/// attribute, enforcing I4 across definition changes.
fn prune_payload(state: &mut State, definition: &Definition) {
    let persisted: std::collections::HashSet<&str> = definition
        .attributes
        .iter()
        .filter(|a| a.persist_state)
        .map(|a| a.name.as_str())
        .collect();
    state.payload.retain(|key, _| persisted.contains(key.as_str()));
}
