//! Concurrency scaffolding around the ingestion core (§5): the per-twin
//! lock table that gives state-ID allocation and definition updates their
//! linearizability guarantee, and the broker-subscription supervisor that
//! retries/backs off around the dispatcher and owns shutdown cancellation.

pub mod broker_supervisor;
pub mod lock_table;

pub use broker_supervisor::{BrokerSupervisor, QUEUE_GROUP};
pub use lock_table::TwinLockTable;
