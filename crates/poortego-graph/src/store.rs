//! The backend contract the accessor is written against.
//!
//! [`GraphClient`] implements it over Neo4j; [`crate::MemoryStore`] keeps
//! everything in process.

use async_trait::async_trait;

use poortego_core::{NodeId, Properties};

use crate::client::{GraphClient, GraphError};
use crate::queries::{GraphInfo, NodeRecord, RelationshipMatch, RelationshipRecord};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Make `key` unique among nodes carrying `label`. Idempotent.
    async fn ensure_unique_index(&self, label: &str, key: &str) -> Result<(), GraphError>;

    /// Return the node indexed under `label`/`key` = `value`, creating it
    /// with `properties` if none exists. Existing nodes are returned as-is.
    async fn get_or_create_indexed_node(
        &self,
        label: &str,
        key: &str,
        value: &str,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError>;

    /// Create an unindexed, unlinked node.
    async fn create_node(&self, properties: &Properties) -> Result<NodeRecord, GraphError>;

    async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError>;

    /// All relationships, optionally restricted by start and/or end node.
    async fn match_relationships(
        &self,
        start: Option<NodeId>,
        end: Option<NodeId>,
    ) -> Result<Vec<RelationshipMatch>, GraphError>;

    /// Always creates a new relationship, even if an identical one exists.
    async fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<RelationshipRecord, GraphError>;

    /// Return the `start -[rel_type]-> end` relationship, creating it if missing.
    async fn get_or_create_path(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
    ) -> Result<RelationshipRecord, GraphError>;

    /// Delete every node and relationship.
    async fn clear(&self) -> Result<(), GraphError>;

    async fn info(&self) -> Result<GraphInfo, GraphError>;
}

/// Reject labels and relationship types the database cannot store.
pub(crate) fn check_identifier(name: &str) -> Result<(), GraphError> {
    if name.trim().is_empty() {
        return Err(GraphError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn ensure_unique_index(&self, label: &str, key: &str) -> Result<(), GraphError> {
        GraphClient::ensure_unique_index(self, label, key).await
    }

    async fn get_or_create_indexed_node(
        &self,
        label: &str,
        key: &str,
        value: &str,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        GraphClient::get_or_create_indexed_node(self, label, key, value, properties).await
    }

    async fn create_node(&self, properties: &Properties) -> Result<NodeRecord, GraphError> {
        GraphClient::create_node(self, properties).await
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError> {
        GraphClient::get_node(self, id).await
    }

    async fn match_relationships(
        &self,
        start: Option<NodeId>,
        end: Option<NodeId>,
    ) -> Result<Vec<RelationshipMatch>, GraphError> {
        GraphClient::match_relationships(self, start, end).await
    }

    async fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<RelationshipRecord, GraphError> {
        GraphClient::create_relationship(self, start, end, rel_type, properties).await
    }

    async fn get_or_create_path(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
    ) -> Result<RelationshipRecord, GraphError> {
        GraphClient::get_or_create_path(self, start, rel_type, end).await
    }

    async fn clear(&self) -> Result<(), GraphError> {
        GraphClient::clear(self).await
    }

    async fn info(&self) -> Result<GraphInfo, GraphError> {
        self.graph_info().await
    }
}
