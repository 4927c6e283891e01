//! Broker-subscription supervisor: registers the ingestion dispatcher under
//! the service's queue group, retrying the initial subscribe with backoff
//! if the broker isn't reachable yet, and tearing down on shutdown.

use backoff::ExponentialBackoffBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use twintalk_core::{Broker, Error, ErrorKind, IngestionDispatcher, MessageHandler};

/// The queue group every dispatcher subscribes under, so the broker
/// delivers exactly one invocation per message across however many
/// processes are running.
pub const QUEUE_GROUP: &str = "twins";

pub struct BrokerSupervisor {
    broker: Arc<dyn Broker>,
    dispatcher: Arc<IngestionDispatcher>,
    shutdown: CancellationToken,
}

impl BrokerSupervisor {
    pub fn new(broker: Arc<dyn Broker>, dispatcher: Arc<IngestionDispatcher>, shutdown: CancellationToken) -> Self {
        Self {
            broker,
            dispatcher,
            shutdown,
        }
    }

    /// Subscribe the dispatcher, retrying `Transient` failures with
    /// exponential backoff. `Auth`/`Malformed`/`Conflict`/`Fatal` failures
    /// are not retried — they won't resolve themselves on a timer.
    /// Returns early if cancelled before the subscribe succeeds.
    pub async fn run(self: Arc<Self>) {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(None)
            .build();

        let handler: Arc<dyn MessageHandler> = self.dispatcher.clone();
        let subscribe = || {
            let broker = self.broker.clone();
            let handler = handler.clone();
            async move {
                broker
                    .subscribe(QUEUE_GROUP, handler)
                    .await
                    .map_err(classify)
            }
        };

        tokio::select! {
            result = backoff::future::retry(backoff, subscribe) => {
                match result {
                    Ok(()) => tracing::info!(queue_group = QUEUE_GROUP, "subscribed to broker"),
                    Err(err) => tracing::error!(error = %err, "giving up subscribing to broker"),
                }
            }
            _ = self.shutdown.cancelled() => {
                tracing::debug!("shutdown requested before subscribe completed");
            }
        }
    }
}

fn classify(err: Error) -> backoff::Error<Error> {
    match err.kind() {
        ErrorKind::Transient => backoff::Error::transient(err),
        _ => backoff::Error::permanent(err),
    }
}
