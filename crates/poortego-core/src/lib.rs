//! poortego-core: Shared types, configuration, and error handling for the Poortego graph.
//!
//! This crate provides the foundational pieces used across Poortego components:
//! - Node and relationship identifiers
//! - Free-form property maps and the root node constants
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use crate::config::{Neo4jSettings, Settings};
pub use error::CoreError;
pub use types::{NodeId, NodeName, NodeSummary, Properties, RelationshipId};
