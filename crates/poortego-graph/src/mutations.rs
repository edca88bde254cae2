//! Write operations for the graph.
//!
//! Named nodes and root links use MERGE (get-or-create) semantics; plain
//! relationships use CREATE and are never deduplicated. Property maps are
//! sent as JSON and expanded server-side with `apoc.convert.fromJsonMap`.

use neo4rs::query;

use poortego_core::{NodeId, Properties};

use crate::client::{GraphClient, GraphError};
use crate::queries::{
    node_from_row, relationship_from_row, NodeRecord, RelationshipRecord, NODE_COLUMNS,
    RELATIONSHIP_COLUMNS,
};
use crate::store::check_identifier;

impl GraphClient {
    // ── Indexes ──────────────────────────────────────────────────

    /// Create a uniqueness constraint on `label.key` if it does not exist.
    pub async fn ensure_unique_index(&self, label: &str, key: &str) -> Result<(), GraphError> {
        let constraint = quote_identifier(&format!("{label}_{key}_unique"))?;
        let label_q = quote_identifier(label)?;
        let key_q = quote_identifier(key)?;

        let cypher = format!(
            "CREATE CONSTRAINT {constraint} IF NOT EXISTS
             FOR (n:{label_q}) REQUIRE n.{key_q} IS UNIQUE"
        );
        self.run(query(&cypher)).await?;

        tracing::debug!(label, key, "Unique index ensured");
        Ok(())
    }

    // ── Node Writes ──────────────────────────────────────────────

    /// MERGE a node on `label {key: value}`; properties are only applied on create.
    pub async fn get_or_create_indexed_node(
        &self,
        label: &str,
        key: &str,
        value: &str,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        let label_q = quote_identifier(label)?;
        let key_q = quote_identifier(key)?;

        let cypher = format!(
            "MERGE (n:{label_q} {{{key_q}: $value}})
             ON CREATE SET n += apoc.convert.fromJsonMap($props)
             RETURN {NODE_COLUMNS}"
        );
        let q = query(&cypher)
            .param("value", value.to_string())
            .param("props", to_json(properties)?);

        match self.query_one(q).await? {
            Some(row) => node_from_row(&row, "id", "props"),
            None => Err(GraphError::Serialization(format!(
                "MERGE on {label}.{key} returned no node"
            ))),
        }
    }

    /// CREATE a bare node with the given properties.
    pub async fn create_node(&self, properties: &Properties) -> Result<NodeRecord, GraphError> {
        let cypher = format!(
            "CREATE (n)
             SET n += apoc.convert.fromJsonMap($props)
             RETURN {NODE_COLUMNS}"
        );
        let q = query(&cypher).param("props", to_json(properties)?);

        match self.query_one(q).await? {
            Some(row) => node_from_row(&row, "id", "props"),
            None => Err(GraphError::Serialization(
                "CREATE returned no node".to_string(),
            )),
        }
    }

    // ── Relationship Writes ──────────────────────────────────────

    /// CREATE a new relationship between two existing nodes.
    pub async fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<RelationshipRecord, GraphError> {
        let type_q = quote_identifier(rel_type)?;
        let cypher = format!(
            "MATCH (a) WHERE id(a) = $start
             MATCH (b) WHERE id(b) = $end
             CREATE (a)-[r:{type_q}]->(b)
             SET r += apoc.convert.fromJsonMap($props)
             RETURN {RELATIONSHIP_COLUMNS}"
        );
        let q = query(&cypher)
            .param("start", start.0)
            .param("end", end.0)
            .param("props", to_json(properties)?);

        match self.query_one(q).await? {
            Some(row) => relationship_from_row(&row),
            None => Err(GraphError::EndpointNotFound { start, end }),
        }
    }

    /// MERGE a property-less `start -[rel_type]-> end` relationship.
    pub async fn get_or_create_path(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
    ) -> Result<RelationshipRecord, GraphError> {
        let type_q = quote_identifier(rel_type)?;
        let cypher = format!(
            "MATCH (a) WHERE id(a) = $start
             MATCH (b) WHERE id(b) = $end
             MERGE (a)-[r:{type_q}]->(b)
             RETURN {RELATIONSHIP_COLUMNS}"
        );
        let q = query(&cypher).param("start", start.0).param("end", end.0);

        match self.query_one(q).await? {
            Some(row) => relationship_from_row(&row),
            None => Err(GraphError::EndpointNotFound { start, end }),
        }
    }

    // ── Purge ────────────────────────────────────────────────────

    /// Detach-delete every node. Constraints are left in place.
    pub async fn clear(&self) -> Result<(), GraphError> {
        self.run(query("MATCH (n) DETACH DELETE n")).await
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Backtick-quote a label, key, or relationship type for interpolation into Cypher.
fn quote_identifier(name: &str) -> Result<String, GraphError> {
    check_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

fn to_json(properties: &Properties) -> Result<String, GraphError> {
    serde_json::to_string(properties).map_err(|e| GraphError::Serialization(e.to_string()))
}
