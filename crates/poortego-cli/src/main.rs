//! CLI entry point for the Poortego graph console.
//!
//! Listings go to stdout; logs go to stderr.

use std::io::Write;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use poortego_core::types::{display_value, NAME_KEY, TYPE_KEY};
use poortego_core::{NodeId, Properties, Settings};
use poortego_graph::{GraphAccessor, GraphConfig, GraphStore};

#[derive(Parser)]
#[command(name = "poortego")]
#[command(about = "Console for the Poortego graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: poortego).
    #[arg(short, long, default_value = "poortego", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show database version, counts, and capabilities.
    Info,
    /// List the distinct node types linked from the root.
    Types,
    /// List nodes with a relationship into the given node.
    #[command(name = "into")]
    NodesInto { id: i64 },
    /// List nodes the given node has a relationship to.
    #[command(name = "from")]
    NodesFrom { id: i64 },
    /// List `id: value` for related nodes carrying a property.
    Nodes {
        #[arg(long, default_value = NAME_KEY)]
        property: String,
    },
    /// List every relationship.
    Rels,
    /// Show a single node's id and name.
    Node { id: i64 },
    /// Create a named node and link it to the root.
    CreateNode {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        node_type: String,
        /// Extra property as key=value (value parsed as JSON when possible).
        #[arg(long = "prop", value_parser = parse_prop)]
        props: Vec<(String, Value)>,
    },
    /// Create a relationship between two nodes.
    Link {
        start: i64,
        end: i64,
        rel_type: String,
        #[arg(long = "prop", value_parser = parse_prop)]
        props: Vec<(String, Value)>,
    },
    /// Delete every node and relationship.
    Purge {
        /// Required: confirms the database should be wiped.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;
    tracing::debug!(config = %cli.config, uri = %settings.neo4j.uri, "Settings loaded");
    let graph_config = GraphConfig::from(settings.neo4j);
    let accessor = GraphAccessor::connect(&graph_config).await?;

    let mut out = std::io::stdout();
    run(&accessor, cli.command, &mut out).await
}

async fn run<S: GraphStore, W: Write>(
    graph: &GraphAccessor<S>,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Info => {
            for (key, value) in graph.get_info().await?.to_map() {
                writeln!(out, "{key}: {value}")?;
            }
        }
        Command::Types => {
            graph.show_types(out).await?;
        }
        Command::NodesInto { id } => {
            graph.show_nodes_into(NodeId(id), out).await?;
        }
        Command::NodesFrom { id } => {
            graph.show_nodes_from(NodeId(id), out).await?;
        }
        Command::Nodes { property } => {
            for (id, value) in graph.get_nodes_by_property(&property).await? {
                writeln!(out, "{id}: {}", display_value(&value))?;
            }
        }
        Command::Rels => {
            for (id, rel) in graph.get_all_relationships().await? {
                writeln!(out, "{id}: {rel}")?;
            }
        }
        Command::Node { id } => {
            let node = graph.get_node_by_id(NodeId(id)).await?;
            writeln!(out, "{}: {}", node.id, node.name.unwrap_or_default())?;
        }
        Command::CreateNode {
            name,
            node_type,
            props,
        } => {
            let mut properties: Properties = props.into_iter().collect();
            properties.insert(NAME_KEY.to_string(), Value::String(name));
            properties.insert(TYPE_KEY.to_string(), Value::String(node_type));

            let node = graph.create_node_from_dict(&properties).await?;
            writeln!(out, "{}", node.id)?;
        }
        Command::Link {
            start,
            end,
            rel_type,
            props,
        } => {
            let properties: Properties = props.into_iter().collect();
            let rel = graph
                .create_relationship(NodeId(start), NodeId(end), &rel_type, &properties)
                .await?;
            writeln!(out, "{}: {rel}", rel.id)?;
        }
        Command::Purge { yes } => {
            if !yes {
                anyhow::bail!("Refusing to purge without --yes");
            }
            graph.purge_all().await?;
        }
    }

    Ok(())
}

/// Parse `key=value`; the value is JSON if it parses as JSON, else a string.
fn parse_prop(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    if key.is_empty() {
        return Err(format!("empty property key in {raw:?}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
