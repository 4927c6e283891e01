//! Sled-backed State Log (C3). States are keyed `twin_id ++ 0x00 ++
//! id.to_be_bytes()` so a prefix scan over one twin's states naturally
//! yields them in ascending `ID` order.

use crate::error::Error;
use crate::model::state::State;
use crate::model::twin::TwinId;
use crate::paging::Page;
use crate::state_log::StateLog;
use async_trait::async_trait;
use bincode::config::standard;
use sled::{Db, Tree};

pub struct SledStateLog {
    db: Db,
    states: Tree,
}

impl SledStateLog {
    pub fn new(path: &str) -> Result<Self, Error> {
        let db = sled::open(path)?;
        let states = db.open_tree("states")?;
        Ok(Self { db, states })
    }

    fn key(twin_id: &TwinId, id: i64) -> Vec<u8> {
        let mut key = twin_id.0.as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn prefix(twin_id: &TwinId) -> Vec<u8> {
        let mut key = twin_id.0.as_bytes().to_vec();
        key.push(0);
        key
    }

    fn encode(state: &State) -> Result<Vec<u8>, Error> {
        Ok(bincode::serde::encode_to_vec(state, standard())?)
    }

    fn decode(bytes: &[u8]) -> Result<State, Error> {
        let (state, _) = bincode::serde::decode_from_slice(bytes, standard())?;
        Ok(state)
    }
}

#[async_trait]
impl StateLog for SledStateLog {
    async fn save(&self, state: State) -> Result<(), Error> {
        let key = Self::key(&state.twin_id, state.id);
        if self.states.contains_key(&key)? {
            return Err(Error::Conflict(format!(
                "state {} already exists for twin {}",
                state.id, state.twin_id
            )));
        }
        self.states.insert(key, Self::encode(&state)?)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn update(&self, state: State) -> Result<(), Error> {
        let key = Self::key(&state.twin_id, state.id);
        if !self.states.contains_key(&key)? {
            return Err(Error::NotFound(format!("state {} not found", state.id)));
        }
        self.states.insert(key, Self::encode(&state)?)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn count(&self, twin_id: &TwinId) -> Result<i64, Error> {
        Ok(self.states.scan_prefix(Self::prefix(twin_id)).count() as i64)
    }

    async fn retrieve_all(&self, offset: u64, limit: u64, twin_id: &TwinId) -> Result<Page<State>, Error> {
        if limit == 0 {
            return Ok(Page::empty(offset, limit));
        }
        let all: Vec<State> = self
            .states
            .scan_prefix(Self::prefix(twin_id))
            .values()
            .map(|v| Self::decode(&v?))
            .collect::<Result<Vec<_>, Error>>()?;
        let total = all.len() as u64;
        let items = all.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok(Page { total, offset, limit, items })
    }

    async fn retrieve_last(&self, twin_id: &TwinId) -> Result<State, Error> {
        match self.states.scan_prefix(Self::prefix(twin_id)).values().next_back() {
            Some(bytes) => Self::decode(&bytes?),
            None => Ok(State::zero(twin_id.clone())),
        }
    }
}
