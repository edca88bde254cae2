//! Configuration management for Poortego.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`POORTEGO__` prefix, `__` between sections)
//! 2. Config file (`poortego.toml`, name overridable)
//! 3. Defaults

use serde::Deserialize;

use crate::error::CoreError;

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub neo4j: Neo4jSettings,
}

/// The `[neo4j]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "poortego-dev".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

impl Settings {
    /// Load settings from `<file_prefix>.{toml,json,yaml,...}` (optional) and
    /// `POORTEGO__*` environment variables.
    pub fn load(file_prefix: &str) -> Result<Self, CoreError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("POORTEGO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Parse settings from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, CoreError> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
