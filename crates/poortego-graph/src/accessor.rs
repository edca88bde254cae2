//! The Poortego graph accessor.
//!
//! Holds one store handle and the root node every named node hangs off.
//! Each operation is a direct pass-through to the store, or a short loop over
//! one relationship scan.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use serde_json::Value;

use poortego_core::types::{
    display_value, root_properties, NAME_INDEX, NAME_KEY, ROOT_NAME, ROOT_TYPE, TYPE_KEY,
};
use poortego_core::{NodeId, NodeName, NodeSummary, Properties, RelationshipId};

use crate::client::{GraphClient, GraphConfig, GraphError};
use crate::queries::{GraphInfo, NodeRecord, RelationshipRecord};
use crate::store::GraphStore;

pub struct GraphAccessor<S = GraphClient> {
    store: S,
    root: NodeRecord,
}

impl GraphAccessor<GraphClient> {
    /// Connect to Neo4j and make sure the root node exists.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let client = GraphClient::connect(config).await?;
        Self::with_store(client).await
    }
}

impl<S: GraphStore> GraphAccessor<S> {
    /// Wrap an existing store, running [`Self::set_defaults`] once.
    pub async fn with_store(store: S) -> Result<Self, GraphError> {
        let root = ensure_defaults(&store).await?;
        tracing::info!(root_id = %root.id, "Root node ready");
        Ok(Self { store, root })
    }

    /// The root node as it was when the accessor was built.
    pub fn root(&self) -> &NodeRecord {
        &self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Setup ────────────────────────────────────────────────────

    /// Ensure the name index and the root node exist. Idempotent; the stored
    /// root reference is never replaced.
    pub async fn set_defaults(&self) -> Result<NodeRecord, GraphError> {
        ensure_defaults(&self.store).await
    }

    /// Delete every node and relationship in the database, root included.
    ///
    /// There is no confirmation and no undo.
    pub async fn purge_all(&self) -> Result<(), GraphError> {
        tracing::warn!("Purging all nodes and relationships");
        self.store.clear().await
    }

    // ── Reads ────────────────────────────────────────────────────

    pub async fn get_info(&self) -> Result<GraphInfo, GraphError> {
        self.store.info().await
    }

    /// Distinct `type` values of nodes the root links to, sorted.
    pub async fn list_types(&self) -> Result<Vec<String>, GraphError> {
        let matches = self.store.match_relationships(Some(self.root.id), None).await?;
        let types: BTreeSet<String> = matches
            .iter()
            .filter_map(|m| m.end.get(TYPE_KEY).map(display_value))
            .collect();
        Ok(types.into_iter().collect())
    }

    /// Write [`Self::list_types`] one per line.
    pub async fn show_types<W: Write>(&self, out: &mut W) -> Result<Vec<String>, GraphError> {
        let types = self.list_types().await?;
        for t in &types {
            writeln!(out, "{t}")?;
        }
        Ok(types)
    }

    /// Start nodes of every relationship ending at `end`.
    ///
    /// Nodes without both `name` and `type` are skipped.
    pub async fn nodes_into(&self, end: NodeId) -> Result<Vec<NodeSummary>, GraphError> {
        self.require_node(end).await?;
        let matches = self.store.match_relationships(None, Some(end)).await?;
        Ok(matches.iter().filter_map(|m| m.start.summary()).collect())
    }

    /// End nodes of every relationship starting at `start`.
    ///
    /// Nodes without both `name` and `type` are skipped.
    pub async fn nodes_from(&self, start: NodeId) -> Result<Vec<NodeSummary>, GraphError> {
        self.require_node(start).await?;
        let matches = self.store.match_relationships(Some(start), None).await?;
        Ok(matches.iter().filter_map(|m| m.end.summary()).collect())
    }

    pub async fn show_nodes_into<W: Write>(
        &self,
        end: NodeId,
        out: &mut W,
    ) -> Result<Vec<NodeSummary>, GraphError> {
        let nodes = self.nodes_into(end).await?;
        write_summaries(out, &nodes)?;
        Ok(nodes)
    }

    pub async fn show_nodes_from<W: Write>(
        &self,
        start: NodeId,
        out: &mut W,
    ) -> Result<Vec<NodeSummary>, GraphError> {
        let nodes = self.nodes_from(start).await?;
        write_summaries(out, &nodes)?;
        Ok(nodes)
    }

    /// `id → value` for every node carrying `key` that takes part in at
    /// least one relationship. Isolated nodes are never reported.
    pub async fn get_nodes_by_property(
        &self,
        key: &str,
    ) -> Result<BTreeMap<NodeId, Value>, GraphError> {
        let matches = self.store.match_relationships(None, None).await?;
        let mut nodes = BTreeMap::new();
        for m in &matches {
            for node in [&m.start, &m.end] {
                if let Some(value) = node.get(key) {
                    nodes.insert(node.id, value.clone());
                }
            }
        }
        Ok(nodes)
    }

    /// [`Self::get_nodes_by_property`] on `name`.
    pub async fn get_node_names(&self) -> Result<BTreeMap<NodeId, Value>, GraphError> {
        self.get_nodes_by_property(NAME_KEY).await
    }

    /// Every relationship rendered as `TYPE(start->end) {props}`.
    pub async fn get_all_relationships(
        &self,
    ) -> Result<BTreeMap<RelationshipId, String>, GraphError> {
        let matches = self.store.match_relationships(None, None).await?;
        Ok(matches
            .iter()
            .map(|m| (m.relationship.id, m.relationship.to_string()))
            .collect())
    }

    pub async fn get_node_by_id(&self, id: NodeId) -> Result<NodeName, GraphError> {
        let node = self.require_node(id).await?;
        Ok(NodeName {
            id,
            name: node.get(NAME_KEY).map(display_value),
        })
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Get-or-create the node named `properties["name"]` and link it to the
    /// root in both directions: `root -[type]-> node` and `node -[ROOT]-> root`.
    ///
    /// `name` and `type` must be present as strings. On a name collision the
    /// existing node is returned unchanged (and still linked). The two links
    /// are separate writes: if the second fails the first stays, and the
    /// error is returned with no rollback.
    pub async fn create_node_from_dict(
        &self,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        let name = required_str(properties, NAME_KEY)?;
        let node_type = required_str(properties, TYPE_KEY)?;

        let node = self
            .store
            .get_or_create_indexed_node(NAME_INDEX, NAME_KEY, name, properties)
            .await?;

        self.store
            .get_or_create_path(self.root.id, node_type, node.id)
            .await?;
        self.store
            .get_or_create_path(node.id, ROOT_TYPE, self.root.id)
            .await?;

        tracing::debug!(node_id = %node.id, name, node_type, "Node linked to root");
        Ok(node)
    }

    /// Create a node with no index entry and no root links.
    pub async fn create_detached_node(
        &self,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        let node = self.store.create_node(properties).await?;
        tracing::debug!(node_id = %node.id, "Detached node created");
        Ok(node)
    }

    /// Create a new relationship. Identical calls create parallel relationships.
    pub async fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<RelationshipRecord, GraphError> {
        let rel = self
            .store
            .create_relationship(start, end, rel_type, properties)
            .await?;
        tracing::debug!(rel_id = %rel.id, %start, %end, rel_type, "Relationship created");
        Ok(rel)
    }

    async fn require_node(&self, id: NodeId) -> Result<NodeRecord, GraphError> {
        self.store
            .get_node(id)
            .await?
            .ok_or(GraphError::NodeNotFound { id })
    }
}

async fn ensure_defaults<S: GraphStore>(store: &S) -> Result<NodeRecord, GraphError> {
    store.ensure_unique_index(NAME_INDEX, NAME_KEY).await?;
    store
        .get_or_create_indexed_node(NAME_INDEX, NAME_KEY, ROOT_NAME, &root_properties())
        .await
}

fn required_str<'a>(properties: &'a Properties, key: &str) -> Result<&'a str, GraphError> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GraphError::MissingProperty {
            key: key.to_string(),
        })
}

fn write_summaries<W: Write>(out: &mut W, nodes: &[NodeSummary]) -> Result<(), GraphError> {
    for node in nodes {
        writeln!(out, "{node}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::MockGraphStore;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn accessor() -> GraphAccessor<MemoryStore> {
        GraphAccessor::with_store(MemoryStore::new()).await.unwrap()
    }

    // ── Root ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn root_is_created_on_construction() {
        let graph = accessor().await;
        assert_eq!(graph.root().name(), Some(ROOT_NAME));
        assert_eq!(graph.root().node_type(), Some(ROOT_TYPE));
        assert_eq!(
            graph.store().unique_indexes(),
            vec![("Name".to_string(), "name".to_string())]
        );
    }

    #[tokio::test]
    async fn set_defaults_is_idempotent() {
        let graph = accessor().await;
        let first = graph.set_defaults().await.unwrap();
        let second = graph.set_defaults().await.unwrap();
        assert_eq!(first.id, graph.root().id);
        assert_eq!(second.id, graph.root().id);
        assert_eq!(graph.get_info().await.unwrap().node_count, 1);
    }

    #[tokio::test]
    async fn reconnecting_reuses_existing_root() {
        let store = MemoryStore::new();
        let existing = store
            .get_or_create_indexed_node(NAME_INDEX, NAME_KEY, ROOT_NAME, &root_properties())
            .await
            .unwrap();

        let graph = GraphAccessor::with_store(store).await.unwrap();
        assert_eq!(graph.root().id, existing.id);
    }

    // ── Node creation ────────────────────────────────────────────

    #[tokio::test]
    async fn created_node_is_found_by_id() {
        let graph = accessor().await;
        let node = graph
            .create_node_from_dict(&props(json!({"name": "A", "type": "Foo"})))
            .await
            .unwrap();

        let found = graph.get_node_by_id(node.id).await.unwrap();
        assert_eq!(
            found,
            NodeName {
                id: node.id,
                name: Some("A".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn created_node_is_linked_both_ways() {
        let graph = accessor().await;
        let root = graph.root().id;
        let node = graph
            .create_node_from_dict(&props(json!({"name": "10.0.0.1", "type": "IP Address"})))
            .await
            .unwrap();

        let rels = graph.store().match_relationships(None, None).await.unwrap();
        let edges: Vec<_> = rels
            .iter()
            .map(|m| {
                (
                    m.relationship.start_id,
                    m.relationship.rel_type.as_str(),
                    m.relationship.end_id,
                )
            })
            .collect();
        assert_eq!(
            edges,
            vec![(root, "IP Address", node.id), (node.id, "ROOT", root)]
        );
    }

    #[tokio::test]
    async fn name_collision_returns_existing_node() {
        let graph = accessor().await;
        let first = graph
            .create_node_from_dict(&props(json!({"name": "dup", "type": "Foo", "rank": 1})))
            .await
            .unwrap();
        let second = graph
            .create_node_from_dict(&props(json!({"name": "dup", "type": "Foo", "rank": 2})))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.get("rank"), Some(&json!(1)));
        // Root plus one node; links were merged, not duplicated.
        let info = graph.get_info().await.unwrap();
        assert_eq!(info.node_count, 2);
        assert_eq!(info.relationship_count, 2);
    }

    #[tokio::test]
    async fn node_creation_requires_name_and_type() {
        let graph = accessor().await;

        let err = graph
            .create_node_from_dict(&props(json!({"type": "Foo"})))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingProperty { ref key } if key == "name"));

        let err = graph
            .create_node_from_dict(&props(json!({"name": "A", "type": 7})))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingProperty { ref key } if key == "type"));

        assert_eq!(graph.get_info().await.unwrap().node_count, 1);
    }

    // ── Types and neighbors ──────────────────────────────────────

    #[tokio::test]
    async fn list_types_is_sorted_and_distinct() {
        let graph = accessor().await;
        for (name, kind) in [("a", "Foo"), ("b", "Bar"), ("c", "Foo"), ("d", "Foo")] {
            graph
                .create_node_from_dict(&props(json!({"name": name, "type": kind})))
                .await
                .unwrap();
        }

        let mut out = Vec::new();
        let types = graph.show_types(&mut out).await.unwrap();
        assert_eq!(types, vec!["Bar".to_string(), "Foo".to_string()]);
        assert_eq!(String::from_utf8(out).unwrap(), "Bar\nFoo\n");
    }

    #[tokio::test]
    async fn neighbors_skip_nodes_missing_name_or_type() {
        let graph = accessor().await;
        let hub = graph
            .create_node_from_dict(&props(json!({"name": "hub", "type": "Host"})))
            .await
            .unwrap();
        let named = graph
            .create_node_from_dict(&props(json!({"name": "svc", "type": "Service"})))
            .await
            .unwrap();
        let anonymous = graph
            .create_detached_node(&props(json!({"name": "no-type"})))
            .await
            .unwrap();

        graph
            .create_relationship(named.id, hub.id, "RUNS_ON", &Properties::new())
            .await
            .unwrap();
        graph
            .create_relationship(anonymous.id, hub.id, "RUNS_ON", &Properties::new())
            .await
            .unwrap();

        let mut out = Vec::new();
        let into = graph.show_nodes_into(hub.id, &mut out).await.unwrap();
        let root_line = format!("{}: {} [{}]", graph.root().id, ROOT_NAME, ROOT_TYPE);
        let svc_line = format!("{}: svc [Service]", named.id);
        assert_eq!(into.len(), 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{root_line}\n{svc_line}\n")
        );

        let from = graph.nodes_from(named.id).await.unwrap();
        let from_ids: Vec<_> = from.iter().map(|n| n.id).collect();
        assert_eq!(from_ids, vec![graph.root().id, hub.id]);
    }

    #[tokio::test]
    async fn neighbors_of_root_cover_every_linked_node() {
        let graph = accessor().await;
        let a = graph
            .create_node_from_dict(&props(json!({"name": "a", "type": "Foo"})))
            .await
            .unwrap();

        let mut out = Vec::new();
        let from_root = graph
            .show_nodes_from(graph.root().id, &mut out)
            .await
            .unwrap();
        assert_eq!(from_root.len(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}: a [Foo]\n", a.id));
    }

    #[tokio::test]
    async fn missing_node_is_not_found() {
        let graph = accessor().await;
        for result in [
            graph.nodes_into(NodeId(404)).await.map(|_| ()),
            graph.nodes_from(NodeId(404)).await.map(|_| ()),
            graph.get_node_by_id(NodeId(404)).await.map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(GraphError::NodeNotFound { id: NodeId(404) })
            ));
        }
    }

    // ── Bulk dumps ───────────────────────────────────────────────

    #[tokio::test]
    async fn nodes_by_property_omits_isolated_nodes() {
        let graph = accessor().await;
        let linked = graph
            .create_node_from_dict(&props(json!({"name": "linked", "type": "Foo"})))
            .await
            .unwrap();
        let isolated = graph
            .create_detached_node(&props(json!({"name": "isolated", "type": "Foo"})))
            .await
            .unwrap();

        let names = graph.get_node_names().await.unwrap();
        assert_eq!(names.get(&linked.id), Some(&json!("linked")));
        assert_eq!(names.get(&graph.root().id), Some(&json!(ROOT_NAME)));
        assert!(!names.contains_key(&isolated.id));
        assert_eq!(names.len(), 2);
    }

    #[tokio::test]
    async fn null_property_is_not_reported() {
        let graph = accessor().await;
        let node = graph
            .create_node_from_dict(&props(json!({"name": "a", "type": "Foo", "k": null})))
            .await
            .unwrap();

        assert!(node.get("k").is_none());
        assert!(graph.get_nodes_by_property("k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nodes_by_custom_property() {
        let graph = accessor().await;
        let with_port = graph
            .create_node_from_dict(&props(json!({"name": "web", "type": "Service", "port": 443})))
            .await
            .unwrap();
        graph
            .create_node_from_dict(&props(json!({"name": "db", "type": "Service"})))
            .await
            .unwrap();

        let ports = graph.get_nodes_by_property("port").await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[&with_port.id], json!(443));
    }

    #[tokio::test]
    async fn identical_relationships_are_not_deduplicated() {
        let graph = accessor().await;
        let a = graph
            .create_node_from_dict(&props(json!({"name": "a", "type": "Foo"})))
            .await
            .unwrap();
        let b = graph
            .create_node_from_dict(&props(json!({"name": "b", "type": "Foo"})))
            .await
            .unwrap();
        let weight = props(json!({"weight": 3}));

        let r1 = graph.create_relationship(a.id, b.id, "KNOWS", &weight).await.unwrap();
        let r2 = graph.create_relationship(a.id, b.id, "KNOWS", &weight).await.unwrap();
        assert_ne!(r1.id, r2.id);

        let rels = graph.get_all_relationships().await.unwrap();
        let expected = format!(r#"KNOWS({}->{}) {{"weight":3}}"#, a.id, b.id);
        assert_eq!(rels[&r1.id], expected);
        assert_eq!(rels[&r2.id], expected);
        // Four root links plus the two parallel relationships.
        assert_eq!(rels.len(), 6);
    }

    #[tokio::test]
    async fn self_relationship_is_allowed() {
        let graph = accessor().await;
        let a = graph
            .create_node_from_dict(&props(json!({"name": "a", "type": "Foo"})))
            .await
            .unwrap();
        let rel = graph
            .create_relationship(a.id, a.id, "SELF", &Properties::new())
            .await
            .unwrap();
        assert_eq!(rel.start_id, rel.end_id);
    }

    #[tokio::test]
    async fn purge_empties_the_graph() {
        let graph = accessor().await;
        graph
            .create_node_from_dict(&props(json!({"name": "a", "type": "Foo"})))
            .await
            .unwrap();

        graph.purge_all().await.unwrap();

        let info = graph.get_info().await.unwrap();
        assert_eq!(info.node_count, 0);
        assert_eq!(info.relationship_count, 0);
        assert!(graph.list_types().await.unwrap().is_empty());
    }

    // ── Store failures ───────────────────────────────────────────

    fn mock_with_root() -> MockGraphStore {
        let mut store = MockGraphStore::new();
        store.expect_ensure_unique_index().returning(|_, _| Ok(()));
        store
            .expect_get_or_create_indexed_node()
            .returning(|_, _, value, properties| {
                let id = if value == ROOT_NAME { 0 } else { 5 };
                Ok(NodeRecord {
                    id: NodeId(id),
                    properties: properties.clone(),
                })
            });
        store
    }

    #[tokio::test]
    async fn setup_failure_propagates() {
        let mut store = MockGraphStore::new();
        store
            .expect_ensure_unique_index()
            .returning(|_, _| Err(GraphError::Connection("refused".to_string())));

        let result = GraphAccessor::with_store(store).await;
        assert!(matches!(result, Err(GraphError::Connection(_))));
    }

    #[tokio::test]
    async fn second_root_link_failure_keeps_first_link() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        let mut store = mock_with_root();
        store
            .expect_get_or_create_path()
            .times(2)
            .returning(move |start, rel_type, end| {
                recorded.lock().push(rel_type.to_string());
                if rel_type == ROOT_TYPE {
                    return Err(GraphError::Connection("link dropped".to_string()));
                }
                Ok(RelationshipRecord {
                    id: RelationshipId(1),
                    rel_type: rel_type.to_string(),
                    start_id: start,
                    end_id: end,
                    properties: Properties::new(),
                })
            });

        let graph = GraphAccessor::with_store(store).await.unwrap();
        let err = graph
            .create_node_from_dict(&props(json!({"name": "A", "type": "Foo"})))
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::Connection(_)));
        assert_eq!(*calls.lock(), vec!["Foo".to_string(), "ROOT".to_string()]);
    }

    #[tokio::test]
    async fn first_root_link_failure_skips_second() {
        let mut store = mock_with_root();
        store
            .expect_get_or_create_path()
            .times(1)
            .returning(|start, _, end| Err(GraphError::EndpointNotFound { start, end }));

        let graph = GraphAccessor::with_store(store).await.unwrap();
        let err = graph
            .create_node_from_dict(&props(json!({"name": "A", "type": "Foo"})))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GraphError::EndpointNotFound {
                start: NodeId(0),
                end: NodeId(5)
            }
        ));
    }
}
