//! State Log (C3): durable, ordered per-twin state history.

use crate::error::Error;
use crate::model::state::State;
use crate::model::twin::TwinId;
use crate::paging::Page;
use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait StateLog: Send + Sync {
    async fn save(&self, state: State) -> Result<(), Error>;

    /// Keyed by `(TwinId, ID)`.
    async fn update(&self, state: State) -> Result<(), Error>;

    async fn count(&self, twin_id: &TwinId) -> Result<i64, Error>;

    /// Sliced by `ID` ascending.
    async fn retrieve_all(&self, offset: u64, limit: u64, twin_id: &TwinId) -> Result<Page<State>, Error>;

    /// Returns a zero-valued state (never an error) if the twin has no states.
    async fn retrieve_last(&self, twin_id: &TwinId) -> Result<State, Error>;
}

#[derive(Default)]
pub struct MemoryStateLog {
    states: DashMap<TwinId, Vec<State>>,
}

impl MemoryStateLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateLog for MemoryStateLog {
    async fn save(&self, state: State) -> Result<(), Error> {
        let mut entry = self.states.entry(state.twin_id.clone()).or_default();
        if entry.iter().any(|s| s.id == state.id) {
            return Err(Error::Conflict(format!(
                "state {} already exists for twin {}",
                state.id, state.twin_id
            )));
        }
        entry.push(state);
        Ok(())
    }

    async fn update(&self, state: State) -> Result<(), Error> {
        let mut entry = self
            .states
            .get_mut(&state.twin_id)
            .ok_or_else(|| Error::NotFound(format!("no states for twin {}", state.twin_id)))?;
        let slot = entry
            .iter_mut()
            .find(|s| s.id == state.id)
            .ok_or_else(|| Error::NotFound(format!("state {} not found", state.id)))?;
        *slot = state;
        Ok(())
    }

    async fn count(&self, twin_id: &TwinId) -> Result<i64, Error> {
        Ok(self.states.get(twin_id).map(|v| v.len() as i64).unwrap_or(0))
    }

    async fn retrieve_all(&self, offset: u64, limit: u64, twin_id: &TwinId) -> Result<Page<State>, Error> {
        if limit == 0 {
            return Ok(Page::empty(offset, limit));
        }
        let all = self.states.get(twin_id).map(|v| v.clone()).unwrap_or_default();
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(Page {
            total,
            offset,
            limit,
            items,
        })
    }

    async fn retrieve_last(&self, twin_id: &TwinId) -> Result<State, Error> {
        Ok(self
            .states
            .get(twin_id)
            .and_then(|v| v.last().cloned())
            .unwrap_or_else(|| State::zero(twin_id.clone())))
    }
}
