//! Tool layer: definitions, input decoding, and dispatch.
//!
//! The engine sees exactly two tools. Their inputs are decoded into sum
//! types at this boundary so an invalid tool/query combination cannot reach
//! a store call. Dispatch always produces a plain JSON payload: domain data
//! on success, a structured error object otherwise. Backing-store failures
//! are logged in full here and reduced to a fixed, user-safe message in the
//! payload.

use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::engine::ToolDefinition;
use crate::facts_store::FactStore;
use crate::graph_store::GraphStore;

pub const QUERY_GRAPH: &str = "query_graph";
pub const QUERY_FACTS: &str = "query_facts";

/// Fixed message returned to the engine when a store call fails.
const INTERNAL_ERROR_MESSAGE: &str = "Tool execution failed due to an internal error. \
     Please try rephrasing your query or contact support if the issue persists.";

/// The two tool schemas handed to the reasoning engine.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: QUERY_GRAPH.to_string(),
            description: "Query the process graph for process structure, steps, requirements, \
                          offices, and document types. Use this to understand the process flow, \
                          dependencies, and what entities are involved."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query_type": {
                        "type": "string",
                        "enum": [
                            "get_process",
                            "get_process_steps",
                            "get_process_requirements",
                            "get_step_office",
                            "get_step_documents",
                            "get_requirement_documents"
                        ],
                        "description": "Type of graph query to execute"
                    },
                    "process_id": {
                        "type": "string",
                        "description": "Process identifier (e.g., 'boston_resident_parking_permit'). Required for process queries."
                    },
                    "step_id": {
                        "type": "string",
                        "description": "Step identifier. Required for step queries."
                    },
                    "requirement_id": {
                        "type": "string",
                        "description": "Requirement identifier. Required for requirement queries."
                    }
                },
                "required": ["query_type"]
            }),
        },
        ToolDefinition {
            name: QUERY_FACTS.to_string(),
            description: "Query the Facts Registry for verified regulatory facts. Use this to \
                          get cited information about eligibility, requirements, costs, timing, \
                          office info, and all regulatory details. ALL regulatory claims must \
                          come from this registry."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query_type": {
                        "type": "string",
                        "enum": ["by_id", "by_prefix", "all"],
                        "description": "Type of facts query: by_id (specific fact), by_prefix (category), or all (all loaded facts)"
                    },
                    "fact_id": {
                        "type": "string",
                        "description": "Specific fact ID to retrieve. Required when query_type is 'by_id'. Example: 'rpp.eligibility.vehicle_class'"
                    },
                    "prefix": {
                        "type": "string",
                        "description": "Fact ID prefix to match. Required when query_type is 'by_prefix'. Example: 'rpp.eligibility' to get all eligibility facts."
                    }
                },
                "required": ["query_type"]
            }),
        },
    ]
}

/// Decode failures for tool inputs. These become structured payloads, never
/// raised errors.
#[derive(Debug, Error)]
enum ToolInputError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Unknown query_type: {0}")]
    UnknownQueryType(String),
}

/// A decoded `query_graph` invocation. One variant per query type; the
/// companion id is required by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphQuery {
    GetProcess { process_id: String },
    GetProcessSteps { process_id: String },
    GetProcessRequirements { process_id: String },
    GetStepOffice { step_id: String },
    GetStepDocuments { step_id: String },
    GetRequirementDocuments { requirement_id: String },
}

/// A decoded `query_facts` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactsQuery {
    ById { fact_id: String },
    ByPrefix { prefix: String },
    All,
}

fn require_str(input: &Value, field: &'static str) -> Result<String, ToolInputError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ToolInputError::MissingParameter(field))
}

fn query_type(input: &Value) -> Result<&str, ToolInputError> {
    input
        .get("query_type")
        .and_then(Value::as_str)
        .ok_or(ToolInputError::MissingParameter("query_type"))
}

impl GraphQuery {
    fn decode(input: &Value) -> Result<Self, ToolInputError> {
        match query_type(input)? {
            "get_process" => Ok(Self::GetProcess {
                process_id: require_str(input, "process_id")?,
            }),
            "get_process_steps" => Ok(Self::GetProcessSteps {
                process_id: require_str(input, "process_id")?,
            }),
            "get_process_requirements" => Ok(Self::GetProcessRequirements {
                process_id: require_str(input, "process_id")?,
            }),
            "get_step_office" => Ok(Self::GetStepOffice {
                step_id: require_str(input, "step_id")?,
            }),
            "get_step_documents" => Ok(Self::GetStepDocuments {
                step_id: require_str(input, "step_id")?,
            }),
            "get_requirement_documents" => Ok(Self::GetRequirementDocuments {
                requirement_id: require_str(input, "requirement_id")?,
            }),
            other => Err(ToolInputError::UnknownQueryType(other.to_string())),
        }
    }
}

impl FactsQuery {
    fn decode(input: &Value) -> Result<Self, ToolInputError> {
        match query_type(input)? {
            "by_id" => Ok(Self::ById {
                fact_id: require_str(input, "fact_id")?,
            }),
            "by_prefix" => Ok(Self::ByPrefix {
                prefix: require_str(input, "prefix")?,
            }),
            "all" => Ok(Self::All),
            other => Err(ToolInputError::UnknownQueryType(other.to_string())),
        }
    }
}

fn input_error_payload(tool: &str, err: &ToolInputError) -> Value {
    let kind = match err {
        ToolInputError::MissingParameter(_) => "missing_parameter",
        ToolInputError::UnknownQueryType(_) => "unknown_query_type",
    };
    json!({
        "error": kind,
        "tool": tool,
        "message": err.to_string(),
    })
}

fn internal_error_payload(tool: &str) -> Value {
    json!({
        "error": "internal_error",
        "tool": tool,
        "message": INTERNAL_ERROR_MESSAGE,
    })
}

/// Routes one decoded tool invocation to one store call.
///
/// `dispatch` never fails: every outcome, including backend breakage, comes
/// back as a JSON payload the loop can feed to the engine.
pub struct ToolDispatcher {
    graph: Arc<dyn GraphStore>,
    facts: Arc<FactStore>,
}

impl ToolDispatcher {
    pub fn new(graph: Arc<dyn GraphStore>, facts: Arc<FactStore>) -> Self {
        Self { graph, facts }
    }

    pub async fn dispatch(&self, tool_name: &str, input: &Value) -> Value {
        debug!("Dispatching tool {} with input: {}", tool_name, input);
        match tool_name {
            QUERY_GRAPH => self.dispatch_graph(input).await,
            QUERY_FACTS => self.dispatch_facts(input),
            other => json!({
                "error": "unknown_tool",
                "tool": other,
                "message": format!("Unknown tool: {other}"),
            }),
        }
    }

    async fn dispatch_graph(&self, input: &Value) -> Value {
        let query = match GraphQuery::decode(input) {
            Ok(query) => query,
            Err(err) => return input_error_payload(QUERY_GRAPH, &err),
        };

        let result = match query {
            GraphQuery::GetProcess { process_id } => self
                .graph
                .get_process(&process_id)
                .await
                .map(|process| json!({ "process": process })),
            GraphQuery::GetProcessSteps { process_id } => self
                .graph
                .get_process_steps(&process_id)
                .await
                .map(|steps| json!({ "steps": steps })),
            GraphQuery::GetProcessRequirements { process_id } => self
                .graph
                .get_process_requirements(&process_id)
                .await
                .map(|requirements| json!({ "requirements": requirements })),
            GraphQuery::GetStepOffice { step_id } => self
                .graph
                .get_step_office(&step_id)
                .await
                .map(|office| json!({ "office": office })),
            GraphQuery::GetStepDocuments { step_id } => self
                .graph
                .get_step_documents(&step_id)
                .await
                .map(|documents| json!({ "documents": documents })),
            GraphQuery::GetRequirementDocuments { requirement_id } => self
                .graph
                .get_requirement_documents(&requirement_id)
                .await
                .map(|documents| json!({ "documents": documents })),
        };

        match result {
            Ok(payload) => payload,
            Err(err) => {
                error!("Graph query failed: {}", err);
                internal_error_payload(QUERY_GRAPH)
            }
        }
    }

    fn dispatch_facts(&self, input: &Value) -> Value {
        let query = match FactsQuery::decode(input) {
            Ok(query) => query,
            Err(err) => return input_error_payload(QUERY_FACTS, &err),
        };

        match query {
            FactsQuery::ById { fact_id } => {
                json!({ "fact": self.facts.get_by_id(&fact_id) })
            }
            FactsQuery::ByPrefix { prefix } => {
                json!({ "facts": self.facts.get_by_prefix(&prefix) })
            }
            FactsQuery::All => {
                json!({ "facts": self.facts.get_all() })
            }
        }
    }
}
