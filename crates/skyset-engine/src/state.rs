//! Remote state representations and snapshots
//!
//! A [`StateSnapshot`] maps every node of a graph to either a materialized
//! remote representation or a confirmed absence. Two snapshots exist per
//! run (*current* and *target*); the executor additionally maintains an
//! evolving view that starts as a copy of *current*.

use crate::node::ResourceIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Materialized remote representation of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remote resource id
    pub id: String,

    /// Deployment location, where the control plane reports one
    pub location: Option<String>,

    /// Type-specific fields (address prefixes, SKUs, port lists, ...)
    pub attributes: HashMap<String, serde_json::Value>,

    /// When this representation was observed or produced
    pub observed_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: None,
            attributes: HashMap::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Mapping from resource identity to observed state.
///
/// An entry of `None` records that the resource was looked up and is
/// confirmed absent; no entry at all means the resource was never read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    entries: HashMap<String, Option<ResourceState>>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_present(&mut self, identity: &ResourceIdentity, state: ResourceState) {
        self.entries.insert(identity.key(), Some(state));
    }

    pub fn set_absent(&mut self, identity: &ResourceIdentity) {
        self.entries.insert(identity.key(), None);
    }

    /// The live representation, if the resource exists
    pub fn get(&self, identity: &ResourceIdentity) -> Option<&ResourceState> {
        self.get_by_key(&identity.key())
    }

    pub fn get_by_key(&self, key: &str) -> Option<&ResourceState> {
        self.entries.get(key).and_then(|e| e.as_ref())
    }

    /// Whether the snapshot holds any entry (present or absent) for the key
    pub fn contains(&self, identity: &ResourceIdentity) -> bool {
        self.entries.contains_key(&identity.key())
    }

    pub fn is_absent(&self, identity: &ResourceIdentity) -> bool {
        matches!(self.entries.get(&identity.key()), Some(None))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, Option<&ResourceState>)> {
        self.entries.iter().map(|(k, v)| (k, v.as_ref()))
    }
}
