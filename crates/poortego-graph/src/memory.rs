//! In-process graph store.
//!
//! Mirrors the Neo4j semantics the accessor relies on: ids handed out
//! sequentially from zero, MERGE-style indexed nodes and paths, CREATE-style
//! relationships, and constraints that survive a clear. Property values follow
//! Neo4j's storage rules: nulls are dropped and maps are rejected.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use poortego_core::{NodeId, Properties, RelationshipId};

use crate::client::GraphError;
use crate::queries::{GraphInfo, NodeRecord, RelationshipMatch, RelationshipRecord};
use crate::store::{check_identifier, GraphStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryGraph>,
}

#[derive(Debug, Default)]
struct MemoryGraph {
    next_node_id: i64,
    next_relationship_id: i64,
    nodes: BTreeMap<NodeId, Properties>,
    relationships: BTreeMap<RelationshipId, RelationshipRecord>,
    unique_indexes: BTreeSet<(String, String)>,
    /// (label, key, value) → node
    index_entries: BTreeMap<(String, String, String), NodeId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels/keys registered through [`GraphStore::ensure_unique_index`].
    pub fn unique_indexes(&self) -> Vec<(String, String)> {
        self.inner.lock().unique_indexes.iter().cloned().collect()
    }
}

impl MemoryGraph {
    fn insert_node(&mut self, properties: &Properties) -> Result<NodeRecord, GraphError> {
        let properties = storable(properties)?;
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(id, properties.clone());
        Ok(NodeRecord { id, properties })
    }

    fn insert_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<RelationshipRecord, GraphError> {
        check_identifier(rel_type)?;
        let properties = storable(properties)?;
        if !self.nodes.contains_key(&start) || !self.nodes.contains_key(&end) {
            return Err(GraphError::EndpointNotFound { start, end });
        }

        let id = RelationshipId(self.next_relationship_id);
        self.next_relationship_id += 1;
        let record = RelationshipRecord {
            id,
            rel_type: rel_type.to_string(),
            start_id: start,
            end_id: end,
            properties,
        };
        self.relationships.insert(id, record.clone());
        Ok(record)
    }

    fn node(&self, id: NodeId) -> Option<NodeRecord> {
        self.nodes.get(&id).map(|properties| NodeRecord {
            id,
            properties: properties.clone(),
        })
    }
}

/// Apply `SET n += map` rules: null entries are removed, and maps (also
/// inside lists) are not valid property values.
fn storable(properties: &Properties) -> Result<Properties, GraphError> {
    let mut stored = Properties::new();
    for (key, value) in properties {
        match value {
            Value::Null => continue,
            Value::Object(_) => return Err(map_property(key)),
            Value::Array(items) if items.iter().any(Value::is_object) => {
                return Err(map_property(key))
            }
            _ => {
                stored.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(stored)
}

fn map_property(key: &str) -> GraphError {
    GraphError::Serialization(format!("Property {key:?} holds a map, which cannot be stored"))
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn ensure_unique_index(&self, label: &str, key: &str) -> Result<(), GraphError> {
        check_identifier(label)?;
        check_identifier(key)?;
        self.inner
            .lock()
            .unique_indexes
            .insert((label.to_string(), key.to_string()));
        Ok(())
    }

    async fn get_or_create_indexed_node(
        &self,
        label: &str,
        key: &str,
        value: &str,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        check_identifier(label)?;
        check_identifier(key)?;

        let mut graph = self.inner.lock();
        let entry = (label.to_string(), key.to_string(), value.to_string());
        if let Some(existing) = graph.index_entries.get(&entry).and_then(|id| graph.node(*id)) {
            return Ok(existing);
        }

        let mut props = properties.clone();
        props.insert(key.to_string(), Value::String(value.to_string()));
        let node = graph.insert_node(&props)?;
        graph.index_entries.insert(entry, node.id);
        Ok(node)
    }

    async fn create_node(&self, properties: &Properties) -> Result<NodeRecord, GraphError> {
        self.inner.lock().insert_node(properties)
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError> {
        Ok(self.inner.lock().node(id))
    }

    async fn match_relationships(
        &self,
        start: Option<NodeId>,
        end: Option<NodeId>,
    ) -> Result<Vec<RelationshipMatch>, GraphError> {
        let graph = self.inner.lock();
        let matches = graph
            .relationships
            .values()
            .filter(|r| start.map_or(true, |s| r.start_id == s))
            .filter(|r| end.map_or(true, |e| r.end_id == e))
            .filter_map(|r| {
                Some(RelationshipMatch {
                    relationship: r.clone(),
                    start: graph.node(r.start_id)?,
                    end: graph.node(r.end_id)?,
                })
            })
            .collect();
        Ok(matches)
    }

    async fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<RelationshipRecord, GraphError> {
        self.inner
            .lock()
            .insert_relationship(start, end, rel_type, properties)
    }

    async fn get_or_create_path(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
    ) -> Result<RelationshipRecord, GraphError> {
        let mut graph = self.inner.lock();
        let existing = graph
            .relationships
            .values()
            .find(|r| r.start_id == start && r.end_id == end && r.rel_type == rel_type)
            .cloned();

        match existing {
            Some(record) => Ok(record),
            None => graph.insert_relationship(start, end, rel_type, &Properties::new()),
        }
    }

    async fn clear(&self) -> Result<(), GraphError> {
        let mut graph = self.inner.lock();
        graph.nodes.clear();
        graph.relationships.clear();
        graph.index_entries.clear();
        Ok(())
    }

    async fn info(&self) -> Result<GraphInfo, GraphError> {
        let graph = self.inner.lock();
        Ok(GraphInfo {
            version: format!("memory-{}", env!("CARGO_PKG_VERSION")),
            node_count: graph.nodes.len() as i64,
            relationship_count: graph.relationships.len() as i64,
            supports_index_uniqueness_modes: true,
            supports_node_labels: true,
            supports_schema_indexes: true,
        })
    }
}
