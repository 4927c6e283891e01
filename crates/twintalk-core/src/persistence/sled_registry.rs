//! Sled-backed Twin Registry (C2).

use crate::error::Error;
use crate::model::twin::{validate_name, Twin, TwinId};
use crate::paging::{Page, TwinFilter};
use crate::registry::TwinRegistry;
use async_trait::async_trait;
use bincode::config::standard;
use sled::{Db, Tree};

pub struct SledTwinRegistry {
    db: Db,
    twins: Tree,
}

impl SledTwinRegistry {
    pub fn new(path: &str) -> Result<Self, Error> {
        let db = sled::open(path)?;
        let twins = db.open_tree("twins")?;
        Ok(Self { db, twins })
    }

    fn encode(twin: &Twin) -> Result<Vec<u8>, Error> {
        Ok(bincode::serde::encode_to_vec(twin, standard())?)
    }

    fn decode(bytes: &[u8]) -> Result<Twin, Error> {
        let (twin, _) = bincode::serde::decode_from_slice(bytes, standard())?;
        Ok(twin)
    }

    fn all(&self) -> Result<Vec<Twin>, Error> {
        self.twins
            .iter()
            .values()
            .map(|v| Self::decode(&v?))
            .collect()
    }
}

#[async_trait]
impl TwinRegistry for SledTwinRegistry {
    async fn save(&self, twin: Twin) -> Result<Twin, Error> {
        validate_name(&twin.name)?;
        let key = twin.id.0.as_bytes();
        if self.twins.contains_key(key)? {
            return Err(Error::Conflict(format!("twin {} already exists", twin.id)));
        }
        self.twins.insert(key, Self::encode(&twin)?)?;
        self.db.flush_async().await?;
        Ok(twin)
    }

    async fn update(&self, twin: Twin) -> Result<(), Error> {
        validate_name(&twin.name)?;
        let key = twin.id.0.as_bytes();
        if !self.twins.contains_key(key)? {
            return Err(Error::NotFound(format!("twin {} not found", twin.id)));
        }
        self.twins.insert(key, Self::encode(&twin)?)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn retrieve_by_id(&self, id: &TwinId) -> Result<Twin, Error> {
        match self.twins.get(id.0.as_bytes())? {
            Some(bytes) => Self::decode(&bytes),
            None => Err(Error::NotFound(format!("twin {id} not found"))),
        }
    }

    async fn retrieve_by_attribute(&self, channel: &str, subtopic: &str) -> Result<Vec<TwinId>, Error> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|twin| {
                twin.current_definition()
                    .attributes
                    .iter()
                    .any(|attr| attr.matches(channel, subtopic))
            })
            .map(|twin| twin.id)
            .collect())
    }

    async fn retrieve_all(&self, offset: u64, limit: u64, filter: TwinFilter) -> Result<Page<Twin>, Error> {
        if limit == 0 {
            return Ok(Page::empty(offset, limit));
        }
        let mut matching: Vec<Twin> = self.all()?.into_iter().filter(|t| filter.matches(t)).collect();
        matching.sort_by(|a, b| a.created.cmp(&b.created));

        let total = matching.len() as u64;
        let items = matching.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok(Page { total, offset, limit, items })
    }

    async fn remove(&self, id: &TwinId) -> Result<(), Error> {
        let removed = self.twins.remove(id.0.as_bytes())?;
        self.db.flush_async().await?;
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("twin {id} not found"))),
        }
    }
}
