//! HTTP server for beacond.

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::conversation::ConversationAgent;
use crate::facts_store::FactStore;
use crate::graph_store::GraphStore;
use crate::routes;

/// Application state shared across handlers.
pub struct AppState {
    pub agent: ConversationAgent,
    pub facts: Arc<FactStore>,
    pub graph: Arc<dyn GraphStore>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(agent: ConversationAgent, facts: Arc<FactStore>, graph: Arc<dyn GraphStore>) -> Self {
        Self {
            agent,
            facts,
            graph,
            start_time: Instant::now(),
        }
    }
}

/// Run the HTTP server until the process is stopped.
pub async fn run(state: AppState, bind: &str) -> Result<()> {
    let state = Arc::new(state);

    let app = Router::new()
        .merge(routes::chat_routes())
        .merge(routes::facts_routes())
        .merge(routes::registry_routes())
        .merge(routes::process_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("  Listening on http://{}", bind);

    axum::serve(listener, app).await?;
    Ok(())
}
