//! Process graph store.
//!
//! The six read-only lookups the `query_graph` tool needs, behind a trait so
//! the backing store is swappable (and scriptable in tests). Absence is
//! `Ok(None)` or an empty list; `GraphError` is reserved for genuine backend
//! failures, with `Unavailable` distinguishable so the transport layer can
//! answer 503 instead of 500.

use async_trait::async_trait;
use beacon_common::{DocumentType, Office, Process, Requirement, Step};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Graph backend failures. Not-found is never an error.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("graph backend unavailable: {0}")]
    Unavailable(String),

    #[error("graph seed error: {0}")]
    Seed(String),

    #[error("graph query failed: {0}")]
    Query(String),
}

/// Read-only query surface over the process graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn get_process(&self, process_id: &str) -> Result<Option<Process>, GraphError>;

    /// Steps for a process, sorted ascending by `order` (stable for ties).
    async fn get_process_steps(&self, process_id: &str) -> Result<Vec<Step>, GraphError>;

    async fn get_process_requirements(
        &self,
        process_id: &str,
    ) -> Result<Vec<Requirement>, GraphError>;

    /// The office handling a step, if any.
    async fn get_step_office(&self, step_id: &str) -> Result<Option<Office>, GraphError>;

    async fn get_step_documents(&self, step_id: &str) -> Result<Vec<DocumentType>, GraphError>;

    async fn get_requirement_documents(
        &self,
        requirement_id: &str,
    ) -> Result<Vec<DocumentType>, GraphError>;

    async fn list_processes(&self) -> Result<Vec<Process>, GraphError>;
}

/// Edge connecting a step to the office that handles it.
#[derive(Debug, Clone, Deserialize)]
struct StepOfficeEdge {
    step_id: String,
    office_id: String,
}

/// Edge connecting a step to a document type it needs.
#[derive(Debug, Clone, Deserialize)]
struct StepDocumentEdge {
    step_id: String,
    doc_type_id: String,
}

/// Edge connecting a requirement to a document type satisfying it.
#[derive(Debug, Clone, Deserialize)]
struct RequirementDocumentEdge {
    requirement_id: String,
    doc_type_id: String,
}

/// On-disk shape of the graph seed document.
#[derive(Debug, Deserialize)]
struct GraphSeed {
    processes: Vec<Process>,
    steps: Vec<Step>,
    requirements: Vec<Requirement>,
    offices: Vec<Office>,
    document_types: Vec<DocumentType>,
    #[serde(default)]
    step_offices: Vec<StepOfficeEdge>,
    #[serde(default)]
    step_documents: Vec<StepDocumentEdge>,
    #[serde(default)]
    requirement_documents: Vec<RequirementDocumentEdge>,
}

/// In-memory graph store hydrated from a YAML seed document.
///
/// Construct with [`SeedGraphStore::open`] and inject where needed; there is
/// no global instance.
pub struct SeedGraphStore {
    processes: Vec<Process>,
    steps_by_process: HashMap<String, Vec<Step>>,
    requirements_by_process: HashMap<String, Vec<Requirement>>,
    office_by_step: HashMap<String, Office>,
    documents_by_step: HashMap<String, Vec<DocumentType>>,
    documents_by_requirement: HashMap<String, Vec<DocumentType>>,
}

impl SeedGraphStore {
    /// Load and index the seed document at `path`.
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            GraphError::Seed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let seed: GraphSeed = serde_yaml::from_str(&raw).map_err(|e| {
            GraphError::Seed(format!("cannot parse {}: {}", path.display(), e))
        })?;
        let store = Self::from_seed(seed)?;
        info!(
            "Opened graph seed {} ({} processes, {} steps)",
            path.display(),
            store.processes.len(),
            store.steps_by_process.values().map(Vec::len).sum::<usize>()
        );
        Ok(store)
    }

    fn from_seed(seed: GraphSeed) -> Result<Self, GraphError> {
        let offices: HashMap<String, Office> = seed
            .offices
            .into_iter()
            .map(|o| (o.office_id.clone(), o))
            .collect();
        let documents: HashMap<String, DocumentType> = seed
            .document_types
            .into_iter()
            .map(|d| (d.doc_type_id.clone(), d))
            .collect();

        let mut steps_by_process: HashMap<String, Vec<Step>> = HashMap::new();
        for step in seed.steps {
            steps_by_process
                .entry(step.process_id.clone())
                .or_default()
                .push(step);
        }
        for steps in steps_by_process.values_mut() {
            // stable sort keeps original seed order for equal `order` values
            steps.sort_by_key(|s| s.order);
        }

        let mut requirements_by_process: HashMap<String, Vec<Requirement>> = HashMap::new();
        for requirement in seed.requirements {
            requirements_by_process
                .entry(requirement.applies_to_process.clone())
                .or_default()
                .push(requirement);
        }

        let mut office_by_step = HashMap::new();
        for edge in seed.step_offices {
            let office = offices.get(&edge.office_id).ok_or_else(|| {
                GraphError::Seed(format!(
                    "step '{}' references unknown office '{}'",
                    edge.step_id, edge.office_id
                ))
            })?;
            office_by_step.insert(edge.step_id, office.clone());
        }

        let mut documents_by_step: HashMap<String, Vec<DocumentType>> = HashMap::new();
        for edge in seed.step_documents {
            let document = documents.get(&edge.doc_type_id).ok_or_else(|| {
                GraphError::Seed(format!(
                    "step '{}' references unknown document type '{}'",
                    edge.step_id, edge.doc_type_id
                ))
            })?;
            documents_by_step
                .entry(edge.step_id)
                .or_default()
                .push(document.clone());
        }

        let mut documents_by_requirement: HashMap<String, Vec<DocumentType>> = HashMap::new();
        for edge in seed.requirement_documents {
            let document = documents.get(&edge.doc_type_id).ok_or_else(|| {
                GraphError::Seed(format!(
                    "requirement '{}' references unknown document type '{}'",
                    edge.requirement_id, edge.doc_type_id
                ))
            })?;
            documents_by_requirement
                .entry(edge.requirement_id)
                .or_default()
                .push(document.clone());
        }

        Ok(Self {
            processes: seed.processes,
            steps_by_process,
            requirements_by_process,
            office_by_step,
            documents_by_step,
            documents_by_requirement,
        })
    }
}

#[async_trait]
impl GraphStore for SeedGraphStore {
    async fn get_process(&self, process_id: &str) -> Result<Option<Process>, GraphError> {
        Ok(self
            .processes
            .iter()
            .find(|p| p.process_id == process_id)
            .cloned())
    }

    async fn get_process_steps(&self, process_id: &str) -> Result<Vec<Step>, GraphError> {
        Ok(self
            .steps_by_process
            .get(process_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_process_requirements(
        &self,
        process_id: &str,
    ) -> Result<Vec<Requirement>, GraphError> {
        Ok(self
            .requirements_by_process
            .get(process_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_step_office(&self, step_id: &str) -> Result<Option<Office>, GraphError> {
        Ok(self.office_by_step.get(step_id).cloned())
    }

    async fn get_step_documents(&self, step_id: &str) -> Result<Vec<DocumentType>, GraphError> {
        Ok(self
            .documents_by_step
            .get(step_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_requirement_documents(
        &self,
        requirement_id: &str,
    ) -> Result<Vec<DocumentType>, GraphError> {
        Ok(self
            .documents_by_requirement
            .get(requirement_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_processes(&self) -> Result<Vec<Process>, GraphError> {
        Ok(self.processes.clone())
    }
}
