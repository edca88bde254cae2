//! Read operations and the records they return.
//!
//! Property maps cross the wire as JSON strings (`apoc.convert.toJson`), so
//! every record can carry arbitrary, schema-less properties.

use std::collections::BTreeMap;
use std::fmt;

use neo4rs::{query, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use poortego_core::types::{NAME_KEY, TYPE_KEY};
use poortego_core::{NodeId, NodeSummary, Properties, RelationshipId};

use crate::client::{GraphClient, GraphError};

/// `RETURN` columns for a node bound to `n`.
pub(crate) const NODE_COLUMNS: &str = "id(n) AS id, apoc.convert.toJson(properties(n)) AS props";

/// `RETURN` columns for a relationship `r` between `a` and `b`.
pub(crate) const RELATIONSHIP_COLUMNS: &str = "id(r) AS rid, type(r) AS rtype, \
     apoc.convert.toJson(properties(r)) AS rprops, id(a) AS aid, id(b) AS bid";

/// A node and its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub properties: Properties,
}

impl NodeRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_KEY).and_then(Value::as_str)
    }

    pub fn node_type(&self) -> Option<&str> {
        self.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// `id: name [type]` view, if the node has both properties.
    pub fn summary(&self) -> Option<NodeSummary> {
        NodeSummary::from_properties(self.id, &self.properties)
    }
}

/// A directed, typed relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: RelationshipId,
    pub rel_type: String,
    pub start_id: NodeId,
    pub end_id: NodeId,
    pub properties: Properties,
}

/// Renders as `TYPE(start->end)`, followed by the JSON properties when there are any.
impl fmt::Display for RelationshipRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}->{})", self.rel_type, self.start_id, self.end_id)?;
        if !self.properties.is_empty() {
            write!(f, " {}", Value::Object(self.properties.clone()))?;
        }
        Ok(())
    }
}

/// A relationship together with both of its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipMatch {
    pub relationship: RelationshipRecord,
    pub start: NodeRecord,
    pub end: NodeRecord,
}

/// Diagnostic facts about the backing database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphInfo {
    pub version: String,
    pub node_count: i64,
    pub relationship_count: i64,
    pub supports_index_uniqueness_modes: bool,
    pub supports_node_labels: bool,
    pub supports_schema_indexes: bool,
}

impl GraphInfo {
    /// Build info for a Neo4j server, deriving capability flags from its version.
    pub fn for_version(version: &str, node_count: i64, relationship_count: i64) -> Self {
        let release = parse_release(version);
        Self {
            version: version.to_string(),
            node_count,
            relationship_count,
            supports_index_uniqueness_modes: release.is_some_and(|r| r >= (1, 9)),
            supports_node_labels: release.is_some_and(|r| r >= (2, 0)),
            supports_schema_indexes: release.is_some_and(|r| r >= (2, 0)),
        }
    }

    /// Flatten to the human-readable key/value listing.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("neo4j version".to_string(), self.version.clone()),
            ("Node count".to_string(), self.node_count.to_string()),
            (
                "Relationship count".to_string(),
                self.relationship_count.to_string(),
            ),
            (
                "Supports Index Uniqueness Modes".to_string(),
                self.supports_index_uniqueness_modes.to_string(),
            ),
            (
                "Supports Node Labels".to_string(),
                self.supports_node_labels.to_string(),
            ),
            (
                "Supports Schema Indexes".to_string(),
                self.supports_schema_indexes.to_string(),
            ),
        ])
    }
}

impl GraphClient {
    // ── Single Node Lookups ──────────────────────────────────────

    /// Get a node by its database id.
    pub async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError> {
        let cypher = format!("MATCH (n) WHERE id(n) = $id RETURN {NODE_COLUMNS}");
        let q = query(&cypher).param("id", id.0);

        match self.query_one(q).await? {
            Some(row) => Ok(Some(node_from_row(&row, "id", "props")?)),
            None => Ok(None),
        }
    }

    // ── Relationship Scans ───────────────────────────────────────

    /// Match relationships, optionally constrained by start and/or end node.
    pub async fn match_relationships(
        &self,
        start: Option<NodeId>,
        end: Option<NodeId>,
    ) -> Result<Vec<RelationshipMatch>, GraphError> {
        let mut conditions = Vec::new();
        if start.is_some() {
            conditions.push("id(a) = $start");
        }
        if end.is_some() {
            conditions.push("id(b) = $end");
        }
        let filter = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let cypher = format!(
            "MATCH (a)-[r]->(b)
             {filter}
             RETURN {RELATIONSHIP_COLUMNS},
                    apoc.convert.toJson(properties(a)) AS aprops,
                    apoc.convert.toJson(properties(b)) AS bprops
             ORDER BY rid"
        );

        let mut q = query(&cypher);
        if let Some(start) = start {
            q = q.param("start", start.0);
        }
        if let Some(end) = end {
            q = q.param("end", end.0);
        }

        let rows = self.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(RelationshipMatch {
                relationship: relationship_from_row(&row)?,
                start: node_from_row(&row, "aid", "aprops")?,
                end: node_from_row(&row, "bid", "bprops")?,
            });
        }
        Ok(results)
    }

    // ── Server Info ──────────────────────────────────────────────

    /// Server version, node/relationship counts, and capability flags.
    pub async fn graph_info(&self) -> Result<GraphInfo, GraphError> {
        let q = query("CALL dbms.components() YIELD versions RETURN versions[0] AS version");
        let version = match self.query_one(q).await? {
            Some(row) => row.get::<String>("version").unwrap_or_default(),
            None => String::new(),
        };

        let nodes = self.count("MATCH (n) RETURN count(n) AS cnt").await?;
        let rels = self.count("MATCH ()-[r]->() RETURN count(r) AS cnt").await?;

        Ok(GraphInfo::for_version(&version, nodes, rels))
    }

    async fn count(&self, cypher: &str) -> Result<i64, GraphError> {
        match self.query_one(query(cypher)).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }
}

// ── Row Decoding ─────────────────────────────────────────────────

pub(crate) fn node_from_row(
    row: &Row,
    id_col: &str,
    props_col: &str,
) -> Result<NodeRecord, GraphError> {
    let id: i64 = row
        .get(id_col)
        .map_err(|e| GraphError::Serialization(format!("Failed to read node id: {e}")))?;
    let props: String = row
        .get(props_col)
        .map_err(|e| GraphError::Serialization(format!("Failed to read node properties: {e}")))?;

    Ok(NodeRecord {
        id: NodeId(id),
        properties: parse_properties(&props)?,
    })
}

pub(crate) fn relationship_from_row(row: &Row) -> Result<RelationshipRecord, GraphError> {
    let id: i64 = row
        .get("rid")
        .map_err(|e| GraphError::Serialization(format!("Failed to read relationship id: {e}")))?;
    let rel_type: String = row
        .get("rtype")
        .map_err(|e| GraphError::Serialization(format!("Failed to read relationship type: {e}")))?;
    let props: String = row.get("rprops").map_err(|e| {
        GraphError::Serialization(format!("Failed to read relationship properties: {e}"))
    })?;
    let start: i64 = row
        .get("aid")
        .map_err(|e| GraphError::Serialization(format!("Failed to read start id: {e}")))?;
    let end: i64 = row
        .get("bid")
        .map_err(|e| GraphError::Serialization(format!("Failed to read end id: {e}")))?;

    Ok(RelationshipRecord {
        id: RelationshipId(id),
        rel_type,
        start_id: NodeId(start),
        end_id: NodeId(end),
        properties: parse_properties(&props)?,
    })
}

fn parse_properties(json: &str) -> Result<Properties, GraphError> {
    serde_json::from_str(json)
        .map_err(|e| GraphError::Serialization(format!("Invalid property map: {e}")))
}

/// Leading `major.minor` of a version string such as `5.18.1` or `4.4-enterprise`.
fn parse_release(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split(['.', '-']);
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    Some((major, minor))
}
