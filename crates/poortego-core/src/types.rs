//! Core types for the Poortego graph.
//!
//! Nodes and relationships are owned by the graph database; these types are
//! the thin views of them that cross the accessor boundary.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form node or relationship properties. No fixed schema.
pub type Properties = serde_json::Map<String, Value>;

// ── Well-known names ──────────────────────────────────────────────

/// Name of the singleton anchor node.
pub const ROOT_NAME: &str = "Poortego Root";

/// `type` property of the anchor node, and the label of every node→root link.
pub const ROOT_TYPE: &str = "ROOT";

/// Unique index that named nodes are registered under.
pub const NAME_INDEX: &str = "Name";

pub const NAME_KEY: &str = "name";
pub const TYPE_KEY: &str = "type";

/// Properties the root node is created with.
pub fn root_properties() -> Properties {
    let mut props = Properties::new();
    props.insert(NAME_KEY.to_string(), Value::String(ROOT_NAME.to_string()));
    props.insert(TYPE_KEY.to_string(), Value::String(ROOT_TYPE.to_string()));
    props
}

// ── Identifiers ───────────────────────────────────────────────────

/// Database-assigned node id. Opaque to the accessor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database-assigned relationship id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(pub i64);

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Projections ───────────────────────────────────────────────────

/// A neighbor as shown in listings: `id: name [type]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: String,
    pub node_type: String,
}

impl NodeSummary {
    /// Build a summary if the node carries both `name` and `type`.
    pub fn from_properties(id: NodeId, props: &Properties) -> Option<Self> {
        let name = props.get(NAME_KEY)?;
        let node_type = props.get(TYPE_KEY)?;
        Some(Self {
            id,
            name: display_value(name),
            node_type: display_value(node_type),
        })
    }
}

impl fmt::Display for NodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.id, self.name, self.node_type)
    }
}

/// Minimal projection returned by single-node lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeName {
    pub id: NodeId,
    pub name: Option<String>,
}

/// Render a property value for console output.
///
/// Strings print bare; everything else prints as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
