//! Per-resource-kind capabilities
//!
//! Each resource type implements a small capability set — drift detection
//! and spec rendering — selected by the type tag in a node's identity. The
//! defaults cover the common case; kinds override only what differs.
//!
//! Attribute convention: desired/target keys ending in `_ref` hold the key
//! of a dependency node, keys ending in `_refs` hold a list of them. Those
//! keys are ignored by drift comparison and are materialized into
//! `_id`/`_ids` attributes from the run's evolving state view when a spec
//! is rendered, so dependents always embed the freshly observed remote id.

use crate::error::{EngineError, Result};
use crate::node::{ResourceIdentity, ResourceNode};
use crate::plan::ConvergenceAction;
use crate::state::{ResourceState, StateSnapshot};
use serde_json::Value;
use std::collections::HashMap;

/// Whether any controlled (non-reference) target attribute differs from the
/// current representation. Keys in `ignore` are treated as outside the
/// engine's control.
pub fn attributes_differ(current: &ResourceState, target: &ResourceState, ignore: &[&str]) -> bool {
    target.attributes.iter().any(|(key, value)| {
        if is_reference_key(key) || ignore.contains(&key.as_str()) {
            return false;
        }
        current.attributes.get(key) != Some(value)
    })
}

fn is_reference_key(key: &str) -> bool {
    key.ends_with("_ref") || key.ends_with("_refs")
}

fn reference_id(view: &StateSnapshot, key: &str) -> Result<String> {
    view.get_by_key(key)
        .map(|state| state.id.clone())
        .ok_or_else(|| {
            EngineError::Configuration(format!("dependency {key} has no live state to reference"))
        })
}

/// Capability set for one resource type
pub trait ResourceKind: Send + Sync {
    /// Type tag this kind serves, matching `ResourceIdentity::resource_type`
    fn type_name(&self) -> &str;

    /// Compare current vs target over the fields under this engine's
    /// control. Reference keys are never compared.
    fn needs_update(&self, current: &ResourceState, target: &ResourceState) -> bool {
        attributes_differ(current, target, &[])
    }

    /// Render the create payload, materializing `_ref`/`_refs` attributes
    /// into remote ids read from the evolving state view.
    fn create_spec(
        &self,
        node: &ResourceNode,
        target: &ResourceState,
        view: &StateSnapshot,
    ) -> Result<Value> {
        let mut spec = serde_json::Map::new();
        if let Some(location) = &target.location {
            spec.insert("location".into(), Value::String(location.clone()));
        }
        for (key, value) in &target.attributes {
            if let Some(stem) = key.strip_suffix("_refs") {
                let keys: Vec<String> = serde_json::from_value(value.clone()).map_err(|_| {
                    EngineError::Configuration(format!(
                        "{}: attribute {key} must be a list of dependency keys",
                        node.identity
                    ))
                })?;
                let ids = keys
                    .iter()
                    .map(|k| reference_id(view, k))
                    .collect::<Result<Vec<_>>>()?;
                spec.insert(format!("{stem}_ids"), serde_json::json!(ids));
            } else if let Some(stem) = key.strip_suffix("_ref") {
                let dep_key: String = serde_json::from_value(value.clone()).map_err(|_| {
                    EngineError::Configuration(format!(
                        "{}: attribute {key} must be a dependency key",
                        node.identity
                    ))
                })?;
                let id = reference_id(view, &dep_key)?;
                spec.insert(format!("{stem}_id"), Value::String(id));
            } else {
                spec.insert(key.clone(), value.clone());
            }
        }
        Ok(Value::Object(spec))
    }

    /// Render the update payload. Defaults to the create payload.
    fn update_spec(
        &self,
        node: &ResourceNode,
        target: &ResourceState,
        view: &StateSnapshot,
    ) -> Result<Value> {
        self.create_spec(node, target, view)
    }

    /// Human-readable description of a pending change, shown to the
    /// confirmation gate.
    fn describe_change(&self, identity: &ResourceIdentity, action: ConvergenceAction) -> String {
        format!("{} {} '{}'", action, identity.resource_type, identity.name)
    }
}

/// Kinds registered by type tag
#[derive(Default)]
pub struct KindRegistry {
    kinds: HashMap<String, Box<dyn ResourceKind>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: Box<dyn ResourceKind>) {
        self.kinds.insert(kind.type_name().to_string(), kind);
    }

    pub fn get(&self, type_name: &str) -> Option<&dyn ResourceKind> {
        self.kinds.get(type_name).map(|k| k.as_ref())
    }

    pub fn require(&self, type_name: &str) -> Result<&dyn ResourceKind> {
        self.get(type_name).ok_or_else(|| {
            EngineError::Configuration(format!("no kind registered for type '{type_name}'"))
        })
    }
}
