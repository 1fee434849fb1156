//! CLI entry point for the ontograph ontology manager.
//!
//! Every command prints a JSON document on stdout; logs go to stderr.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use ontograph_core::config::{load_layered, load_section, DEFAULT_FILE_PREFIX};
use ontograph_core::Label;
use ontograph_engine::{OntologyConfig, OntologyService};
use ontograph_graph::{GraphClient, GraphConfig};

#[derive(Parser)]
#[command(name = "ontograph")]
#[command(about = "Ontology management over a Neo4j knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix.
    #[arg(short, long, default_value = DEFAULT_FILE_PREFIX, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Declare (or drop) uniqueness constraints on `name`.
    Constraints {
        #[arg(long)]
        drop: bool,
    },
    /// Node and relationship statistics.
    Summary,
    /// Check the whole ontology for orphans, untyped instances, and cycles.
    Validate,
    /// List the concept hierarchy.
    Hierarchy {
        /// Only concepts below this one.
        #[arg(long)]
        root: Option<String>,
    },
    /// Properties of a concept, direct and inherited.
    Properties {
        concept: String,
        /// Only required properties.
        #[arg(long)]
        required: bool,
        /// Skip inherited properties.
        #[arg(long)]
        direct_only: bool,
    },
    /// What a subclass inherits from a superclass.
    Inheritance { subclass: String, superclass: String },
    /// A node with its relationships.
    Show {
        name: String,
        #[arg(long)]
        label: Option<Label>,
    },
    /// Find nodes whose name contains a term.
    Search {
        term: String,
        #[arg(long)]
        label: Option<Label>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Delete Instance nodes by name.
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(long)]
        stop_on_error: bool,
    },
    /// Delete an Object instance and its ObjectFields.
    DeleteObject {
        name: String,
        #[arg(long)]
        ignore_missing: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let layered = load_layered(&cli.config)?;
    let graph_config: GraphConfig = load_section(&layered, "graph")?;
    let ontology_config: OntologyConfig = load_section(&layered, "ontology")?;

    let client = match GraphClient::connect(&graph_config).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(uri = %graph_config.uri, error = %e, "Cannot reach graph store");
            return Err(e.into());
        }
    };
    let service = OntologyService::new(Arc::new(client.clone()), ontology_config);

    let result = run(&service, cli.command).await;
    drop(service);
    client.close();

    if let Err(e) = result {
        tracing::error!(kind = ?e.kind(), error = %e, "Command failed");
        return Err(e.into());
    }
    Ok(())
}

async fn run(service: &OntologyService, command: Command) -> ontograph_engine::Result<()> {
    let admin = service.admin();
    let lifecycle = service.lifecycle();

    match command {
        Command::Constraints { drop } => {
            let report = if drop {
                admin.drop_uniqueness_constraints().await
            } else {
                admin.setup_uniqueness_constraints().await
            };
            print_json(&report)
        }
        Command::Summary => print_json(&admin.summary().await?),
        Command::Validate => print_json(&admin.validate_ontology().await?),
        Command::Hierarchy { root } => print_json(&admin.concept_hierarchy(root.as_deref()).await?),
        Command::Properties {
            concept,
            required,
            direct_only,
        } => {
            let resolver = service.resolver();
            let found = if required {
                resolver.required_properties(&concept, !direct_only).await?
            } else {
                resolver.available_properties(&concept, !direct_only).await?
            };
            print_json(&found)
        }
        Command::Inheritance {
            subclass,
            superclass,
        } => print_json(&service.resolver().diff_inheritance(&subclass, &superclass).await?),
        Command::Show { name, label } => print_json(&admin.node_details(&name, label.as_ref()).await?),
        Command::Search { term, label, limit } => {
            print_json(&admin.search_nodes(&term, label.as_ref(), limit).await?)
        }
        Command::Delete {
            names,
            stop_on_error,
        } => print_json(&lifecycle.delete_instances(&names, !stop_on_error).await),
        Command::DeleteObject {
            name,
            ignore_missing,
        } => print_json(&lifecycle.delete_object(&name, !ignore_missing).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> ontograph_engine::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        ontograph_engine::OntologyError::InvalidArgument(format!("unserializable output: {e}"))
    })?;
    println!("{text}");
    Ok(())
}
