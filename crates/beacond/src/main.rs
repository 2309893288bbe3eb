//! Beacon Daemon - citation-first assistant for Boston government processes.
//!
//! Loads the facts registry and process graph, connects the reasoning
//! engine, and serves the chat API.

use anyhow::{Context, Result};
use beacond::config::Config;
use beacond::conversation::ConversationAgent;
use beacond::engine::ClaudeEngine;
use beacond::facts_store::FactStore;
use beacond::graph_store::{GraphStore, SeedGraphStore};
use beacond::server::{self, AppState};
use beacond::tools::ToolDispatcher;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beacond", version, about = "Beacon assistant daemon")]
struct Args {
    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("beacond=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    info!("Beacon Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load(args.config.as_deref())?;

    let facts = Arc::new(FactStore::new(config.data.facts_dir.clone()));
    facts
        .load_registry(&config.data.registry)
        .with_context(|| format!("failed to load registry '{}'", config.data.registry))?;

    let graph: Arc<dyn GraphStore> = Arc::new(
        SeedGraphStore::open(&config.data.graph_path)
            .context("failed to open process graph seed")?,
    );

    let engine = Arc::new(ClaudeEngine::new(&config.engine)?);
    let dispatcher = ToolDispatcher::new(graph.clone(), facts.clone());
    let agent = ConversationAgent::new(engine, dispatcher, config.agent.max_iterations);

    info!("Beacon Daemon ready");
    server::run(AppState::new(agent, facts, graph), &config.server.bind).await
}
