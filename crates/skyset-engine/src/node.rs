//! Resource nodes and the dependency graph
//!
//! A [`ResourceNode`] is one typed unit of desired configuration; a
//! [`Graph`] composes nodes into a validated DAG reflecting real
//! provisioning order. The graph is built fresh per run and owned by that
//! run; nothing here touches the network.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Addresses one remote resource: type tag, name, and (for sub-resources)
/// the key of the owning resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Resource type tag (e.g. "virtual-network", "backend-pool")
    pub resource_type: String,

    /// Resource name within its parent scope
    pub name: String,

    /// Key of the parent resource, if this is a sub-resource
    pub parent: Option<String>,
}

impl ResourceIdentity {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            parent: None,
        }
    }

    /// Identity of a sub-resource owned by `parent`
    pub fn child_of(
        parent: &ResourceIdentity,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            parent: Some(parent.key()),
        }
    }

    /// Full key, unique across the topology (type:name, prefixed with the
    /// parent key for sub-resources)
    pub fn key(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}/{}:{}", parent, self.resource_type, self.name),
            None => format!("{}:{}", self.resource_type, self.name),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A typed unit of desired configuration plus the resources its creation
/// requires to already exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub identity: ResourceIdentity,

    /// Type-specific desired payload. Keys ending `_ref`/`_refs` hold
    /// dependency keys and are materialized into remote ids when specs are
    /// rendered; see [`crate::kind::ResourceKind`].
    pub desired: serde_json::Value,

    /// Resources that must have confirmed state before this node's creation
    pub depends_on: Vec<ResourceIdentity>,
}

impl ResourceNode {
    pub fn new(identity: ResourceIdentity, desired: serde_json::Value) -> Self {
        Self {
            identity,
            desired,
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: &ResourceIdentity) -> Self {
        self.depends_on.push(dependency.clone());
        self
    }

    pub fn with_dependencies<'a>(
        mut self,
        dependencies: impl IntoIterator<Item = &'a ResourceIdentity>,
    ) -> Self {
        self.depends_on.extend(dependencies.into_iter().cloned());
        self
    }
}

/// Validated, insertion-ordered dependency graph.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<ResourceNode>,
    index: HashMap<String, usize>,
}

impl Graph {
    /// Build a graph, rejecting duplicate identities, dependencies on
    /// nodes that do not exist, and cycles.
    pub fn from_nodes(nodes: Vec<ResourceNode>) -> Result<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.identity.key(), i).is_some() {
                return Err(EngineError::Configuration(format!(
                    "duplicate resource identity: {}",
                    node.identity
                )));
            }
        }

        for node in &nodes {
            for dep in &node.depends_on {
                if !index.contains_key(&dep.key()) {
                    return Err(EngineError::Configuration(format!(
                        "{} depends on {}, which is not part of the topology",
                        node.identity, dep
                    )));
                }
            }
        }

        let graph = Self { nodes, index };
        graph.topological_order()?;
        Ok(graph)
    }

    pub fn get(&self, identity: &ResourceIdentity) -> Option<&ResourceNode> {
        self.index.get(&identity.key()).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deterministic topological ordering (repeated sweeps in insertion
    /// order). Fails with a configuration error on cycles.
    pub fn topological_order(&self) -> Result<Vec<&ResourceNode>> {
        let mut emitted = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        while order.len() < self.nodes.len() {
            let mut progressed = false;
            for (i, node) in self.nodes.iter().enumerate() {
                if emitted[i] {
                    continue;
                }
                let ready = node
                    .depends_on
                    .iter()
                    .all(|dep| self.index.get(&dep.key()).is_some_and(|&j| emitted[j]));
                if ready {
                    emitted[i] = true;
                    order.push(node);
                    progressed = true;
                }
            }
            if !progressed {
                let stuck: Vec<String> = self
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !emitted[*i])
                    .map(|(_, n)| n.identity.key())
                    .collect();
                return Err(EngineError::Configuration(format!(
                    "dependency cycle involving: {}",
                    stuck.join(", ")
                )));
            }
        }
        Ok(order)
    }
}
