//! Poortego Graph — accessor layer over the Neo4j graph database.
//!
//! All reads and writes go through a [`GraphStore`]; the [`GraphAccessor`]
//! keeps the root node in place and links every named node to it.

pub mod accessor;
pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use accessor::GraphAccessor;
pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryStore;
pub use queries::{GraphInfo, NodeRecord, RelationshipMatch, RelationshipRecord};
pub use store::GraphStore;
