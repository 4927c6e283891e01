//! Request/response bodies for the CRUD surface (§6). Kept separate from
//! the core's domain types so the wire shape can evolve independently.

use serde::{Deserialize, Serialize};
use twintalk_core::{Attribute, Definition, Page, State, Twin};

#[derive(Debug, Deserialize)]
pub struct CreateTwinRequest {
    pub owner: Option<String>,
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub attributes: Vec<Attribute>,
    pub delta_ns: Option<i64>,
}

impl CreateTwinRequest {
    pub fn into_definition(self) -> (String, Option<String>, serde_json::Value, Definition) {
        let mut definition = Definition::new(0, self.attributes);
        if let Some(delta_ns) = self.delta_ns {
            definition = definition.with_delta_ns(delta_ns);
        }
        (self.name, self.owner, self.metadata, definition)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateTwinRequest {
    pub name: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub attributes: Option<Vec<Attribute>>,
    pub delta_ns: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub owner: Option<String>,
    pub name: Option<String>,
    /// JSON-encoded metadata filter, e.g. `?metadata={"site":"hq"}`.
    pub metadata: Option<String>,
}

impl ListQuery {
    /// Parses `metadata` as JSON, if present.
    pub fn metadata_filter(&self) -> Result<Option<serde_json::Value>, twintalk_core::Error> {
        self.metadata
            .as_deref()
            .map(|raw| {
                serde_json::from_str(raw)
                    .map_err(|e| twintalk_core::Error::Malformed(format!("invalid metadata filter: {e}")))
            })
            .transpose()
    }
}

#[derive(Debug, Serialize)]
pub struct TwinResponse {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub metadata: serde_json::Value,
    pub revision: u64,
    pub created: chrono::DateTime<chrono::Utc>,
    pub updated: chrono::DateTime<chrono::Utc>,
    pub definitions: Vec<Definition>,
}

impl From<Twin> for TwinResponse {
    fn from(twin: Twin) -> Self {
        Self {
            id: twin.id.0,
            owner: twin.owner,
            name: twin.name,
            metadata: twin.metadata,
            revision: twin.revision,
            created: twin.created,
            updated: twin.updated,
            definitions: twin.definitions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub twin_id: String,
    pub id: i64,
    pub definition: u64,
    pub created: chrono::DateTime<chrono::Utc>,
    pub payload: std::collections::BTreeMap<String, twintalk_core::Value>,
}

impl From<State> for StateResponse {
    fn from(state: State) -> Self {
        Self {
            twin_id: state.twin_id.0,
            id: state.id,
            definition: state.definition,
            created: state.created,
            payload: state.payload,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub items: Vec<T>,
}

impl<T, U: From<T>> From<Page<T>> for PageResponse<U> {
    fn from(page: Page<T>) -> Self {
        Self {
            total: page.total,
            offset: page.offset,
            limit: page.limit,
            items: page.items.into_iter().map(U::from).collect(),
        }
    }
}
