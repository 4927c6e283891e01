//! Shared paging types for the registry and state log.

#[derive(Debug, Clone, Default)]
pub struct TwinFilter {
    pub owner: Option<String>,
    pub name: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl TwinFilter {
    /// Conjunctive match: every set field must match; unset fields match anything.
    pub fn matches(&self, twin: &crate::model::twin::Twin) -> bool {
        if let Some(owner) = &self.owner {
            if &twin.owner != owner {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if &twin.name != name {
                return false;
            }
        }
        if let Some(metadata) = &self.metadata {
            if &twin.metadata != metadata {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty(offset: u64, limit: u64) -> Self {
        Self {
            total: 0,
            offset,
            limit,
            items: Vec::new(),
        }
    }
}
