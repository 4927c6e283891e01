//! Per-twin state snapshots — the append-only time series ingestion produces.

use super::twin::TwinId;
use super::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub twin_id: TwinId,
    /// Monotone per-twin, starting at 0. `-1` is the evaluator's internal
    /// sentinel for "no state saved yet" (the next save lands on 0).
    pub id: i64,
    /// The definition ID this state was produced under.
    pub definition: u64,
    pub created: DateTime<Utc>,
    pub payload: BTreeMap<String, Value>,
}

impl State {
    /// The zero-valued state returned by `StateLog::retrieve_last` when a
    /// twin has never saved a state. Callers must not treat its absence as
    /// an error.
    pub fn zero(twin_id: TwinId) -> Self {
        Self {
            twin_id,
            id: -1,
            definition: 0,
            created: DateTime::<Utc>::UNIX_EPOCH,
            payload: BTreeMap::new(),
        }
    }
}
