//! Twin Registry (C2): the durable source of truth for twin documents.

use crate::error::Error;
use crate::model::twin::{Twin, TwinId};
use crate::paging::{Page, TwinFilter};
use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait TwinRegistry: Send + Sync {
    /// Fails `Conflict` if a twin with the same ID already exists,
    /// `Malformed` if `Name` exceeds the length limit (enforced by
    /// `Twin::new` before this is ever called, but re-checked here since a
    /// caller could mutate `name` directly).
    async fn save(&self, twin: Twin) -> Result<Twin, Error>;

    /// Fails `NotFound` if no such ID exists; must replace atomically.
    async fn update(&self, twin: Twin) -> Result<(), Error>;

    async fn retrieve_by_id(&self, id: &TwinId) -> Result<Twin, Error>;

    /// The definitive (non-advisory) answer: every twin whose *current*
    /// definition contains an attribute matching `(channel, subtopic)`,
    /// honoring the subtopic wildcard.
    async fn retrieve_by_attribute(
        &self,
        channel: &str,
        subtopic: &str,
    ) -> Result<Vec<TwinId>, Error>;

    /// `limit == 0` returns an empty page without touching storage.
    async fn retrieve_all(
        &self,
        offset: u64,
        limit: u64,
        filter: TwinFilter,
    ) -> Result<Page<Twin>, Error>;

    /// Fails `NotFound` if absent. Transparent to the fan-out cache — the
    /// caller is responsible for invalidating C1.
    async fn remove(&self, id: &TwinId) -> Result<(), Error>;
}

#[derive(Default)]
pub struct MemoryTwinRegistry {
    twins: DashMap<TwinId, Twin>,
}

impl MemoryTwinRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TwinRegistry for MemoryTwinRegistry {
    async fn save(&self, twin: Twin) -> Result<Twin, Error> {
        crate::model::twin::validate_name(&twin.name)?;
        if self.twins.contains_key(&twin.id) {
            return Err(Error::Conflict(format!("twin {} already exists", twin.id)));
        }
        self.twins.insert(twin.id.clone(), twin.clone());
        Ok(twin)
    }

    async fn update(&self, twin: Twin) -> Result<(), Error> {
        crate::model::twin::validate_name(&twin.name)?;
        let mut entry = self
            .twins
            .get_mut(&twin.id)
            .ok_or_else(|| Error::NotFound(format!("twin {} not found", twin.id)))?;
        *entry = twin;
        Ok(())
    }

    async fn retrieve_by_id(&self, id: &TwinId) -> Result<Twin, Error> {
        self.twins
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| Error::NotFound(format!("twin {id} not found")))
    }

    async fn retrieve_by_attribute(
        &self,
        channel: &str,
        subtopic: &str,
    ) -> Result<Vec<TwinId>, Error> {
        let mut ids = Vec::new();
        for entry in self.twins.iter() {
            let twin = entry.value();
            if twin
                .current_definition()
                .attributes
                .iter()
                .any(|attr| attr.matches(channel, subtopic))
            {
                ids.push(twin.id.clone());
            }
        }
        Ok(ids)
    }

    async fn retrieve_all(
        &self,
        offset: u64,
        limit: u64,
        filter: TwinFilter,
    ) -> Result<Page<Twin>, Error> {
        if limit == 0 {
            return Ok(Page::empty(offset, limit));
        }

        let mut matching: Vec<Twin> = self
            .twins
            .iter()
            .map(|e| e.value().clone())
            .filter(|t| filter.matches(t))
            .collect();
        matching.sort_by(|a, b| a.created.cmp(&b.created));

        let total = matching.len() as u64;
        let items = matching
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

    async fn remove(&self, id: &TwinId) -> Result<(), Error> {
        self.twins
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("twin {id} not found")))
    }
}
