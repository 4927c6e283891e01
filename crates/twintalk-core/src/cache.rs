//! Fan-out cache (C1): a warm, advisory shortcut answering "which twins
//! claim (channel, subtopic)?" without touching the registry.

use crate::error::Error;
use crate::model::twin::{Twin, TwinId, SUBTOPIC_WILDCARD};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

type AttributeKey = (String, String);

#[async_trait]
pub trait FanoutCache: Send + Sync {
    /// Index every attribute in `twin`'s current definition. No-op if the
    /// twin has no definitions.
    async fn save(&self, twin: &Twin) -> Result<(), Error>;

    /// Bulk-insert `ids` under one attribute key (used by the dispatcher to
    /// warm the cache from a registry fallback).
    async fn save_ids(&self, channel: &str, subtopic: &str, ids: &[TwinId]) -> Result<(), Error>;

    /// Re-point `twin.id`'s attribute keys at its current definition. The
    /// transition must never be observable as "twin has no attributes".
    async fn update(&self, twin: &Twin) -> Result<(), Error>;

    /// Union of the exact `(channel, subtopic)` set and the
    /// `(channel, ">")` wildcard set, deduplicated.
    async fn ids(&self, channel: &str, subtopic: &str) -> Result<Vec<TwinId>, Error>;

    /// Drop `twin_id` from every attribute set that lists it.
    async fn remove(&self, twin_id: &TwinId) -> Result<(), Error>;
}

/// DashMap-backed fan-out index: a forward map `(channel, subtopic) -> twin
/// IDs` and its inverse `twin ID -> attribute keys`, so `remove`/`update`
/// don't need to scan the whole forward map.
#[derive(Default)]
pub struct MemoryFanoutCache {
    forward: DashMap<AttributeKey, HashSet<TwinId>>,
    inverse: DashMap<TwinId, HashSet<AttributeKey>>,
}

impl MemoryFanoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys_for(twin: &Twin) -> HashSet<AttributeKey> {
        twin.definitions
            .last()
            .map(|def| {
                def.attributes
                    .iter()
                    .map(|attr| (attr.channel.clone(), attr.subtopic.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl FanoutCache for MemoryFanoutCache {
    async fn save(&self, twin: &Twin) -> Result<(), Error> {
        let keys = Self::keys_for(twin);
        if keys.is_empty() {
            return Ok(());
        }
        for key in &keys {
            self.forward.entry(key.clone()).or_default().insert(twin.id.clone());
        }
        self.inverse.entry(twin.id.clone()).or_default().extend(keys);
        Ok(())
    }

    async fn save_ids(&self, channel: &str, subtopic: &str, ids: &[TwinId]) -> Result<(), Error> {
        let key = (channel.to_string(), subtopic.to_string());
        {
            let mut set = self.forward.entry(key.clone()).or_default();
            for id in ids {
                set.insert(id.clone());
            }
        }
        for id in ids {
            self.inverse.entry(id.clone()).or_default().insert(key.clone());
        }
        Ok(())
    }

    async fn update(&self, twin: &Twin) -> Result<(), Error> {
        let new_keys = Self::keys_for(twin);

        // Add new keys before removing stale ones, so a concurrent reader
        // never observes the twin with zero attribute keys — only ever the
        // pre-update set, the post-update set, or their (harmless) union.
        for key in &new_keys {
            self.forward.entry(key.clone()).or_default().insert(twin.id.clone());
        }

        let old_keys = self
            .inverse
            .insert(twin.id.clone(), new_keys.clone())
            .unwrap_or_default();

        for key in old_keys.difference(&new_keys) {
            if let Some(mut set) = self.forward.get_mut(key) {
                set.remove(&twin.id);
            }
        }

        Ok(())
    }

    async fn ids(&self, channel: &str, subtopic: &str) -> Result<Vec<TwinId>, Error> {
        let mut out: HashSet<TwinId> = HashSet::new();
        if let Some(set) = self.forward.get(&(channel.to_string(), subtopic.to_string())) {
            out.extend(set.iter().cloned());
        }
        if subtopic != SUBTOPIC_WILDCARD {
            if let Some(set) = self
                .forward
                .get(&(channel.to_string(), SUBTOPIC_WILDCARD.to_string()))
            {
                out.extend(set.iter().cloned());
            }
        }
        Ok(out.into_iter().collect())
    }

    async fn remove(&self, twin_id: &TwinId) -> Result<(), Error> {
        if let Some((_, keys)) = self.inverse.remove(twin_id) {
            for key in keys {
                if let Some(mut set) = self.forward.get_mut(&key) {
                    set.remove(twin_id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::twin::{Attribute, Definition};

    fn twin_with(channel: &str, subtopic: &str) -> Twin {
        Twin::new(
            "owner",
            "t",
            serde_json::json!({}),
            Definition::new(
                0,
                vec![Attribute {
                    name: "t".to_string(),
                    channel: channel.to_string(),
                    subtopic: subtopic.to_string(),
                    persist_state: true,
                }],
            ),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn save_then_ids_roundtrip() {
        let cache = MemoryFanoutCache::new();
        let twin = twin_with("a", "x");
        cache.save(&twin).await.unwrap();
        let ids = cache.ids("a", "x").await.unwrap();
        assert_eq!(ids, vec![twin.id.clone()]);
    }

    #[tokio::test]
    async fn wildcard_subtopic_is_included_in_union() {
        let cache = MemoryFanoutCache::new();
        let twin = twin_with("a", SUBTOPIC_WILDCARD);
        cache.save(&twin).await.unwrap();
        let ids = cache.ids("a", "engine/temp").await.unwrap();
        assert_eq!(ids, vec![twin.id.clone()]);
    }

    #[tokio::test]
    async fn update_moves_attribute_key() {
        let cache = MemoryFanoutCache::new();
        let mut twin = twin_with("a", "x");
        cache.save(&twin).await.unwrap();

        twin.append_definition(Definition::new(
            0,
            vec![Attribute {
                name: "u".to_string(),
                channel: "a".to_string(),
                subtopic: "y".to_string(),
                persist_state: true,
            }],
        ));
        cache.update(&twin).await.unwrap();

        assert!(cache.ids("a", "x").await.unwrap().is_empty());
        assert_eq!(cache.ids("a", "y").await.unwrap(), vec![twin.id.clone()]);
    }

    #[tokio::test]
    async fn remove_drops_from_every_set() {
        let cache = MemoryFanoutCache::new();
        let twin = twin_with("a", "x");
        cache.save(&twin).await.unwrap();
        cache.remove(&twin.id).await.unwrap();
        assert!(cache.ids("a", "x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_has_no_duplicates_when_exact_and_wildcard_both_match() {
        let cache = MemoryFanoutCache::new();
        let twin = Twin::new(
            "owner",
            "t",
            serde_json::json!({}),
            Definition::new(
                0,
                vec![
                    Attribute {
                        name: "t1".to_string(),
                        channel: "a".to_string(),
                        subtopic: "x".to_string(),
                        persist_state: true,
                    },
                    Attribute {
                        name: "t2".to_string(),
                        channel: "a".to_string(),
                        subtopic: SUBTOPIC_WILDCARD.to_string(),
                        persist_state: true,
                    },
                ],
            ),
        )
        .unwrap();
        cache.save(&twin).await.unwrap();
        let ids = cache.ids("a", "x").await.unwrap();
        assert_eq!(ids.len(), 1);
    }
}
