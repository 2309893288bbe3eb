//! HTTP API request/response types shared by beacond and beaconctl.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Request body for `POST /v1/chat/message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question (1-10000 characters)
    pub message: String,
    /// Accepted for forward compatibility; the daemon is stateless and
    /// ignores it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Sanitized error body returned by every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Response body for `GET /v1/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Names of facts registries currently loaded
    pub registries_loaded: Vec<String>,
    /// Number of processes available in the graph store
    pub processes_available: usize,
}

/// Metadata about a loaded facts registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub registry_name: String,
    pub version: String,
    pub scope: String,
    pub last_updated: NaiveDate,
    pub fact_count: usize,
}
