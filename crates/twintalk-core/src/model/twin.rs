//! Twin, Definition, and Attribute — the versioned subscription chain a
//! twin carries alongside its identity.

use crate::config::{DEFAULT_DELTA_NS, MAX_NAME_LEN};
use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The literal subtopic that matches any subtopic on the same channel.
pub const SUBTOPIC_WILDCARD: &str = ">";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TwinId(pub String);

impl TwinId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TwinId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TwinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TwinId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TwinId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One subscription tuple within a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub channel: String,
    pub subtopic: String,
    #[serde(default)]
    pub persist_state: bool,
}

impl Attribute {
    /// Whether this attribute claims `(channel, subtopic)`, honoring the
    /// subtopic wildcard.
    pub fn matches(&self, channel: &str, subtopic: &str) -> bool {
        self.channel == channel
            && (self.subtopic == SUBTOPIC_WILDCARD || self.subtopic == subtopic)
    }
}

/// A versioned bundle of attribute subscriptions and a minimum
/// inter-sample interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub id: u64,
    pub created: DateTime<Utc>,
    /// Minimum inter-sample interval, in nanoseconds.
    pub delta_ns: i64,
    pub attributes: Vec<Attribute>,
}

impl Definition {
    pub fn new(id: u64, attributes: Vec<Attribute>) -> Self {
        Self {
            id,
            created: Utc::now(),
            delta_ns: DEFAULT_DELTA_NS,
            attributes,
        }
    }

    pub fn with_delta_ns(mut self, delta_ns: i64) -> Self {
        self.delta_ns = delta_ns;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Twin {
    pub id: TwinId,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub revision: u64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Append-only; never empty after construction. The last element is
    /// the current definition.
    pub definitions: Vec<Definition>,
}

impl Twin {
    /// Construct a new twin with its ID freshly generated and `revision = 0`.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        metadata: serde_json::Value,
        initial_definition: Definition,
    ) -> Result<Self, Error> {
        let name = name.into();
        validate_name(&name)?;
        let now = Utc::now();
        Ok(Self {
            id: TwinId::new(),
            owner: owner.into(),
            name,
            metadata,
            revision: 0,
            created: now,
            updated: now,
            definitions: vec![initial_definition],
        })
    }

    /// The current (last) definition. Twins always have at least one.
    pub fn current_definition(&self) -> &Definition {
        self.definitions
            .last()
            .expect("twin invariant: definitions is never empty")
    }

    /// Append a new definition, assigning it `previous.id + 1` and bumping
    /// the revision.
    pub fn append_definition(&mut self, mut definition: Definition) {
        definition.id = self.current_definition().id + 1;
        self.definitions.push(definition);
        self.touch();
    }

    /// Bump revision/updated without changing the definition chain (plain
    /// name/metadata edits).
    pub fn touch(&mut self) {
        self.revision += 1;
        self.updated = Utc::now();
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), Error> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        self.touch();
        Ok(())
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), Error> {
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::Malformed(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}
