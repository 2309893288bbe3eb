//! Deterministic orchestration tests.
//!
//! These tests drive `ConversationAgent` with a scripted engine and real
//! in-memory stores, so every loop property is checked without any network
//! calls: citation soundness, dedup, iteration bounds, input validation,
//! and tool-error isolation.

use async_trait::async_trait;
use beacon_common::{DocumentType, Office, Process, Requirement, Step};
use beacond::conversation::{AgentError, ConversationAgent};
use beacond::engine::{
    ContentBlock, EngineError, EngineResponse, Message, ReasoningEngine, ToolDefinition,
};
use beacond::facts_store::FactStore;
use beacond::graph_store::{GraphError, GraphStore, SeedGraphStore};
use beacond::tools::ToolDispatcher;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Scripted engine and store fixtures
// ============================================================================

enum Script {
    /// Play responses in order; panics if called after the script runs out.
    Sequence(VecDeque<EngineResponse>),
    /// Return the same response on every call.
    Always(EngineResponse),
    /// Fail every call with the given error.
    Fail(EngineError),
}

/// Deterministic stand-in for the reasoning engine.
struct ScriptedEngine {
    script: Mutex<Script>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    fn sequence(responses: Vec<EngineResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script::Sequence(responses.into())),
            calls: AtomicUsize::new(0),
        })
    }

    fn always(response: EngineResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script::Always(response)),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(error: EngineError) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script::Fail(error)),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn complete(
        &self,
        _system_prompt: &str,
        _tools: &[ToolDefinition],
        _messages: &[Message],
    ) -> Result<EngineResponse, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        match &mut *script {
            Script::Sequence(queue) => Ok(queue
                .pop_front()
                .expect("engine called more times than scripted")),
            Script::Always(response) => Ok(response.clone()),
            Script::Fail(error) => Err(error.clone()),
        }
    }
}

fn text_response(text: &str) -> EngineResponse {
    EngineResponse {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
    }
}

fn tool_use_response(blocks: Vec<(&str, &str, Value)>) -> EngineResponse {
    EngineResponse {
        content: blocks
            .into_iter()
            .map(|(id, name, input)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            })
            .collect(),
    }
}

const FACTS_YAML: &str = r#"
version: "1.0.0"
last_updated: 2025-11-09
scope: boston_resident_parking_permit
facts:
  - id: rpp.eligibility.vehicle_class
    text: Vehicle must be a passenger vehicle or motorcycle
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    source_section: Eligibility Requirements
    last_verified: 2025-11-09
    confidence: high
  - id: rpp.eligibility.registration_state
    text: Vehicle must have valid Massachusetts registration
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
  - id: rpp.eligibility.no_unpaid_tickets
    text: No unpaid Boston parking tickets on the registration
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
  - id: rpp.proof_of_residency.recency
    text: Proof of residency must be dated within 30 days
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
"#;

const GRAPH_YAML: &str = r#"
processes:
  - process_id: boston_resident_parking_permit
    name: Boston Resident Parking Permit
    description: Process for obtaining a Boston Resident Parking Permit
    category: permits
    jurisdiction: City of Boston
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
steps:
  - step_id: rpp_step_1_check_eligibility
    process_id: boston_resident_parking_permit
    name: Check Eligibility
    description: Verify you meet the basic requirements
    order: 1
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
  - step_id: rpp_step_2_gather_documents
    process_id: boston_resident_parking_permit
    name: Gather Required Documents
    description: Collect proof of residency and vehicle registration
    order: 2
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
requirements: []
offices: []
document_types: []
"#;

/// Real stores over fixture data, plus the tempdir keeping them alive.
fn fixture_stores() -> (tempfile::TempDir, Arc<FactStore>, Arc<dyn GraphStore>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("boston_rpp.yaml"), FACTS_YAML).unwrap();
    let graph_path = dir.path().join("graph.yaml");
    std::fs::write(&graph_path, GRAPH_YAML).unwrap();

    let facts = Arc::new(FactStore::new(dir.path().to_path_buf()));
    facts.load_registry("boston_rpp").unwrap();
    let graph: Arc<dyn GraphStore> = Arc::new(SeedGraphStore::open(&graph_path).unwrap());
    (dir, facts, graph)
}

fn agent_with(engine: Arc<ScriptedEngine>) -> (tempfile::TempDir, ConversationAgent) {
    let (dir, facts, graph) = fixture_stores();
    let dispatcher = ToolDispatcher::new(graph, facts);
    (dir, ConversationAgent::new(engine, dispatcher, 5))
}

/// Graph store whose every lookup fails, for error-isolation tests.
struct BrokenGraph;

#[async_trait]
impl GraphStore for BrokenGraph {
    async fn get_process(&self, _: &str) -> Result<Option<Process>, GraphError> {
        Err(GraphError::Query("simulated backend failure".to_string()))
    }
    async fn get_process_steps(&self, _: &str) -> Result<Vec<Step>, GraphError> {
        Err(GraphError::Query("simulated backend failure".to_string()))
    }
    async fn get_process_requirements(&self, _: &str) -> Result<Vec<Requirement>, GraphError> {
        Err(GraphError::Query("simulated backend failure".to_string()))
    }
    async fn get_step_office(&self, _: &str) -> Result<Option<Office>, GraphError> {
        Err(GraphError::Query("simulated backend failure".to_string()))
    }
    async fn get_step_documents(&self, _: &str) -> Result<Vec<DocumentType>, GraphError> {
        Err(GraphError::Query("simulated backend failure".to_string()))
    }
    async fn get_requirement_documents(&self, _: &str) -> Result<Vec<DocumentType>, GraphError> {
        Err(GraphError::Query("simulated backend failure".to_string()))
    }
    async fn list_processes(&self) -> Result<Vec<Process>, GraphError> {
        Err(GraphError::Query("simulated backend failure".to_string()))
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

/// Eligibility question: one query_facts call returning three facts yields
/// three citations, in order, with values matching the registry exactly.
#[tokio::test]
async fn test_eligibility_scenario() {
    let engine = ScriptedEngine::sequence(vec![
        tool_use_response(vec![(
            "tu_1",
            "query_facts",
            json!({"query_type": "by_prefix", "prefix": "rpp.eligibility"}),
        )]),
        text_response("To be eligible for a resident parking permit, you must..."),
    ]);
    let (_dir, agent) = agent_with(engine.clone());

    let response = agent
        .ask("Am I eligible for a resident parking permit?")
        .await
        .unwrap();

    assert_eq!(response.tool_calls_made, vec!["query_facts"]);
    assert_eq!(response.citations.len(), 3);
    assert_eq!(engine.calls(), 2);

    // citation soundness: values match the source facts exactly
    let first = &response.citations[0];
    assert_eq!(
        first.fact_id.as_deref(),
        Some("rpp.eligibility.vehicle_class")
    );
    assert_eq!(
        first.text,
        "Vehicle must be a passenger vehicle or motorcycle"
    );
    assert_eq!(
        first.url,
        "https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit"
    );
    assert_eq!(
        first.source_section.as_deref(),
        Some("Eligibility Requirements")
    );
}

/// A refusal with no tool calls is a normal success with zero citations.
#[tokio::test]
async fn test_refusal_without_citations() {
    let engine = ScriptedEngine::sequence(vec![text_response(
        "I don't have verified information about that.",
    )]);
    let (_dir, agent) = agent_with(engine.clone());

    let response = agent.ask("Can I park my boat trailer downtown?").await.unwrap();

    assert_eq!(
        response.answer,
        "I don't have verified information about that."
    );
    assert!(response.citations.is_empty());
    assert!(response.tool_calls_made.is_empty());
    assert_eq!(engine.calls(), 1);
}

/// Combined lookup keeps tool_calls_made in invocation order.
#[tokio::test]
async fn test_combined_lookup_order() {
    let engine = ScriptedEngine::sequence(vec![
        tool_use_response(vec![(
            "tu_1",
            "query_graph",
            json!({"query_type": "get_process_steps", "process_id": "boston_resident_parking_permit"}),
        )]),
        tool_use_response(vec![(
            "tu_2",
            "query_facts",
            json!({"query_type": "by_prefix", "prefix": "rpp.proof_of_residency"}),
        )]),
        text_response("The process has two steps..."),
    ]);
    let (_dir, agent) = agent_with(engine.clone());

    let response = agent.ask("What are the steps?").await.unwrap();

    assert_eq!(response.tool_calls_made, vec!["query_graph", "query_facts"]);
    assert_eq!(response.citations.len(), 1);
    assert_eq!(engine.calls(), 3);
}

/// Multiple tool uses in a single engine response dispatch in the order the
/// engine specified.
#[tokio::test]
async fn test_multiple_tool_uses_in_one_response() {
    let engine = ScriptedEngine::sequence(vec![
        tool_use_response(vec![
            (
                "tu_1",
                "query_graph",
                json!({"query_type": "get_process", "process_id": "boston_resident_parking_permit"}),
            ),
            (
                "tu_2",
                "query_facts",
                json!({"query_type": "by_id", "fact_id": "rpp.proof_of_residency.recency"}),
            ),
        ]),
        text_response("Here is what I found."),
    ]);
    let (_dir, agent) = agent_with(engine.clone());

    let response = agent.ask("Tell me about the permit process").await.unwrap();

    assert_eq!(response.tool_calls_made, vec!["query_graph", "query_facts"]);
    assert_eq!(response.citations.len(), 1);
    assert_eq!(engine.calls(), 2);
}

// ============================================================================
// Citation Properties
// ============================================================================

/// Repeated lookups of the same fact produce exactly one citation.
#[tokio::test]
async fn test_citations_deduplicated_across_calls() {
    let engine = ScriptedEngine::sequence(vec![
        tool_use_response(vec![(
            "tu_1",
            "query_facts",
            json!({"query_type": "by_id", "fact_id": "rpp.eligibility.vehicle_class"}),
        )]),
        tool_use_response(vec![(
            "tu_2",
            "query_facts",
            json!({"query_type": "by_prefix", "prefix": "rpp.eligibility"}),
        )]),
        text_response("Eligibility depends on your vehicle..."),
    ]);
    let (_dir, agent) = agent_with(engine);

    let response = agent.ask("What vehicles qualify?").await.unwrap();

    // the by_id fact appears again in the by_prefix result; still one entry
    assert_eq!(response.citations.len(), 3);
    let ids: Vec<&str> = response
        .citations
        .iter()
        .map(|c| c.fact_id.as_deref().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "rpp.eligibility.vehicle_class",
            "rpp.eligibility.registration_state",
            "rpp.eligibility.no_unpaid_tickets",
        ]
    );
}

// ============================================================================
// Iteration Bound
// ============================================================================

/// An engine that never stops asking for tools exhausts the bound after
/// exactly N engine calls.
#[tokio::test]
async fn test_iteration_bound_enforced_exactly() {
    let engine = ScriptedEngine::always(tool_use_response(vec![(
        "tu_loop",
        "query_facts",
        json!({"query_type": "all"}),
    )]));
    let (_dir, agent) = agent_with(engine.clone());

    let err = agent.ask_with_limit("What are the rules?", 3).await.unwrap_err();
    assert!(matches!(err, AgentError::MaxIterations(3)));
    assert_eq!(engine.calls(), 3);
}

/// The default bound is five engine calls.
#[tokio::test]
async fn test_default_iteration_bound_is_five() {
    let engine = ScriptedEngine::always(tool_use_response(vec![(
        "tu_loop",
        "query_facts",
        json!({"query_type": "all"}),
    )]));
    let (_dir, agent) = agent_with(engine.clone());

    let err = agent.ask("What are the rules?").await.unwrap_err();
    assert!(matches!(err, AgentError::MaxIterations(5)));
    assert_eq!(engine.calls(), 5);
}

// ============================================================================
// Input Validation
// ============================================================================

/// Empty and whitespace-only questions fail before any engine call.
#[tokio::test]
async fn test_empty_question_rejected_before_engine() {
    let engine = ScriptedEngine::sequence(vec![]);
    let (_dir, agent) = agent_with(engine.clone());

    assert!(matches!(
        agent.ask("").await.unwrap_err(),
        AgentError::Validation(_)
    ));
    assert!(matches!(
        agent.ask("   ").await.unwrap_err(),
        AgentError::Validation(_)
    ));
    assert_eq!(engine.calls(), 0);
}

/// The 10,000 character boundary is inclusive.
#[tokio::test]
async fn test_question_length_boundary() {
    let engine = ScriptedEngine::sequence(vec![text_response("That's a long question.")]);
    let (_dir, agent) = agent_with(engine.clone());

    let too_long = "a".repeat(10_001);
    assert!(matches!(
        agent.ask(&too_long).await.unwrap_err(),
        AgentError::Validation(_)
    ));
    assert_eq!(engine.calls(), 0);

    let at_limit = "a".repeat(10_000);
    assert!(agent.ask(&at_limit).await.is_ok());
    assert_eq!(engine.calls(), 1);
}

/// Out-of-range iteration bounds are rejected before any engine call.
#[tokio::test]
async fn test_invalid_iteration_bound_rejected() {
    let engine = ScriptedEngine::sequence(vec![]);
    let (_dir, agent) = agent_with(engine.clone());

    assert!(matches!(
        agent.ask_with_limit("valid question", 0).await.unwrap_err(),
        AgentError::Validation(_)
    ));
    assert!(matches!(
        agent.ask_with_limit("valid question", 21).await.unwrap_err(),
        AgentError::Validation(_)
    ));
    assert_eq!(engine.calls(), 0);
}

// ============================================================================
// Error Isolation
// ============================================================================

/// A broken backing store never escapes `ask`: the loop feeds the engine a
/// structured error and continues to the next iteration.
#[tokio::test]
async fn test_tool_error_isolation() {
    let engine = ScriptedEngine::sequence(vec![
        tool_use_response(vec![(
            "tu_1",
            "query_graph",
            json!({"query_type": "get_process", "process_id": "boston_resident_parking_permit"}),
        )]),
        text_response("I'm having trouble reaching process data right now."),
    ]);

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("boston_rpp.yaml"), FACTS_YAML).unwrap();
    let facts = Arc::new(FactStore::new(dir.path().to_path_buf()));
    facts.load_registry("boston_rpp").unwrap();
    let dispatcher = ToolDispatcher::new(Arc::new(BrokenGraph), facts);
    let agent = ConversationAgent::new(engine.clone(), dispatcher, 5);

    let response = agent.ask("What is the permit process?").await.unwrap();

    assert_eq!(response.tool_calls_made, vec!["query_graph"]);
    assert!(response.citations.is_empty());
    // the loop recovered and made the follow-up engine call
    assert_eq!(engine.calls(), 2);
}

/// A failed engine call surfaces as a loop-level error, not a panic.
#[tokio::test]
async fn test_engine_failure_propagates() {
    let engine = ScriptedEngine::failing(EngineError::Unavailable(
        "connection refused".to_string(),
    ));
    let (_dir, agent) = agent_with(engine);

    let err = agent.ask("Am I eligible?").await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Engine(EngineError::Unavailable(_))
    ));
}

/// An engine response with no content at all is a NoTextResponse error.
#[tokio::test]
async fn test_empty_engine_response_is_error() {
    let engine = ScriptedEngine::sequence(vec![EngineResponse { content: vec![] }]);
    let (_dir, agent) = agent_with(engine);

    let err = agent.ask("Am I eligible?").await.unwrap_err();
    assert!(matches!(err, AgentError::NoTextResponse));
}
