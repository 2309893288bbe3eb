//! API routes for beacond.
//!
//! Every error body is sanitized before it leaves the daemon: validation
//! messages are our own text, everything else collapses to a fixed phrase
//! with the detail kept in the logs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use beacon_common::{
    ChatRequest, ConversationResponse, ErrorResponse, Fact, HealthResponse, Process,
    RegistryInfo, Requirement, Step,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::conversation::AgentError;
use crate::engine::EngineError;
use crate::facts_store::FactsStoreError;
use crate::graph_store::GraphError;
use crate::server::AppState;

type AppStateArc = Arc<AppState>;
type ApiError = (StatusCode, Json<ErrorResponse>);

const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable. Please try again later.";
const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate response. Please try again or rephrase your question.";
const INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn graph_error(err: GraphError) -> ApiError {
    error!("Graph store error: {}", err);
    match err {
        GraphError::Unavailable(_) => {
            api_error(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_MESSAGE)
        }
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE),
    }
}

// ============================================================================
// Chat Routes
// ============================================================================

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/chat/message", post(send_message))
}

async fn send_message(
    State(state): State<AppStateArc>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    info!("Processing chat message (length: {})", request.message.len());
    if request.session_id.is_some() {
        // accepted but unused; the daemon keeps no session state
        warn!("Ignoring session_id on chat request");
    }

    match state.agent.ask(&request.message).await {
        Ok(response) => {
            info!(
                "Generated response with {} citations, {} tool calls",
                response.citations.len(),
                response.tool_calls_made.len()
            );
            Ok(Json(response))
        }
        Err(AgentError::Validation(message)) => {
            warn!("Validation error: {}", message);
            Err(api_error(StatusCode::BAD_REQUEST, &message))
        }
        Err(AgentError::Engine(EngineError::Unavailable(detail))) => {
            error!("Engine unavailable: {}", detail);
            Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                UNAVAILABLE_MESSAGE,
            ))
        }
        Err(err) => {
            error!("Conversation failed: {}", err);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERATION_FAILED_MESSAGE,
            ))
        }
    }
}

// ============================================================================
// Facts Routes
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListFactsParams {
    #[serde(default = "default_registry_param")]
    registry: String,
}

fn default_registry_param() -> String {
    "boston_rpp".to_string()
}

#[derive(Debug, Deserialize)]
struct SearchFactsParams {
    prefix: String,
}

pub fn facts_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/facts", get(list_facts))
        .route("/v1/facts/search", get(search_facts))
        .route("/v1/facts/:fact_id", get(get_fact))
}

async fn list_facts(
    State(state): State<AppStateArc>,
    Query(params): Query<ListFactsParams>,
) -> Result<Json<Vec<Fact>>, ApiError> {
    match state.facts.load_registry(&params.registry) {
        Ok(registry) => Ok(Json(registry.facts.clone())),
        Err(FactsStoreError::RegistryNotFound(_)) => Err(api_error(
            StatusCode::NOT_FOUND,
            &format!("Registry '{}' not found", params.registry),
        )),
        Err(err) => {
            error!("Failed to load registry '{}': {}", params.registry, err);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE))
        }
    }
}

async fn search_facts(
    State(state): State<AppStateArc>,
    Query(params): Query<SearchFactsParams>,
) -> Json<Vec<Fact>> {
    Json(state.facts.get_by_prefix(&params.prefix))
}

async fn get_fact(
    State(state): State<AppStateArc>,
    Path(fact_id): Path<String>,
) -> Result<Json<Fact>, ApiError> {
    state.facts.get_by_id(&fact_id).map(Json).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            &format!("Fact '{fact_id}' not found"),
        )
    })
}

// ============================================================================
// Registry Routes
// ============================================================================

pub fn registry_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/registries", get(list_registries))
        .route("/v1/registries/:name", get(registry_metadata))
        .route("/v1/registries/:name/load", post(load_registry))
}

async fn list_registries(State(state): State<AppStateArc>) -> Json<Vec<String>> {
    Json(state.facts.loaded_registries())
}

async fn registry_metadata(
    State(state): State<AppStateArc>,
    Path(name): Path<String>,
) -> Result<Json<RegistryInfo>, ApiError> {
    state.facts.registry_info(&name).map(Json).map_err(|err| {
        warn!("Registry metadata unavailable for '{}': {}", name, err);
        api_error(
            StatusCode::NOT_FOUND,
            &format!("Registry '{name}' is not loaded"),
        )
    })
}

async fn load_registry(
    State(state): State<AppStateArc>,
    Path(name): Path<String>,
) -> Result<Json<RegistryInfo>, ApiError> {
    match state.facts.reload_registry(&name) {
        Ok(_) => state.facts.registry_info(&name).map(Json).map_err(|err| {
            error!("Registry '{}' loaded but metadata failed: {}", name, err);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
        }),
        Err(FactsStoreError::RegistryNotFound(_)) => Err(api_error(
            StatusCode::NOT_FOUND,
            &format!("Registry '{name}' not found"),
        )),
        Err(err) => {
            error!("Failed to load registry '{}': {}", name, err);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE))
        }
    }
}

// ============================================================================
// Process Routes
// ============================================================================

pub fn process_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/processes", get(list_processes))
        .route("/v1/processes/:process_id", get(get_process))
        .route("/v1/processes/:process_id/steps", get(get_process_steps))
        .route(
            "/v1/processes/:process_id/requirements",
            get(get_process_requirements),
        )
}

async fn list_processes(
    State(state): State<AppStateArc>,
) -> Result<Json<Vec<Process>>, ApiError> {
    state.graph.list_processes().await.map(Json).map_err(graph_error)
}

async fn get_process(
    State(state): State<AppStateArc>,
    Path(process_id): Path<String>,
) -> Result<Json<Process>, ApiError> {
    match state.graph.get_process(&process_id).await {
        Ok(Some(process)) => Ok(Json(process)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            &format!("Process '{process_id}' not found"),
        )),
        Err(err) => Err(graph_error(err)),
    }
}

async fn get_process_steps(
    State(state): State<AppStateArc>,
    Path(process_id): Path<String>,
) -> Result<Json<Vec<Step>>, ApiError> {
    state
        .graph
        .get_process_steps(&process_id)
        .await
        .map(Json)
        .map_err(graph_error)
}

async fn get_process_requirements(
    State(state): State<AppStateArc>,
    Path(process_id): Path<String>,
) -> Result<Json<Vec<Requirement>>, ApiError> {
    state
        .graph
        .get_process_requirements(&process_id)
        .await
        .map(Json)
        .map_err(graph_error)
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    let (status, processes_available) = match state.graph.list_processes().await {
        Ok(processes) => ("healthy", processes.len()),
        Err(err) => {
            warn!("Health check: graph store unavailable: {}", err);
            ("degraded", 0)
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        registries_loaded: state.facts.loaded_registries(),
        processes_available,
    })
}
