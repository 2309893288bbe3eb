//! Facts Registry schema.
//!
//! The registry is the citation backbone: every regulatory claim the assistant
//! makes must trace back to a fact loaded from one of these YAML documents.
//! Registries are validated once at load time and immutable afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Confidence score for a regulatory claim.
///
/// `High` is a direct quote from an official source, `Medium` is inferred from
/// one, `Low` is ambiguous or uncertain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// An atomic regulatory fact with citation metadata.
///
/// Fact ids are hierarchical, dot-separated strings such as
/// `rpp.eligibility.vehicle_class`. Ids are unique within a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Unique hierarchical identifier (e.g. "rpp.eligibility.vehicle_class")
    pub id: String,
    /// Human-readable regulatory claim
    pub text: String,
    /// URL to the official source document
    pub source_url: String,
    /// Section/page reference within the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
    /// Date this fact was last verified against the source
    pub last_verified: NaiveDate,
    pub confidence: ConfidenceLevel,
    /// Additional context or caveats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Root document of a facts registry YAML file.
///
/// One registry file corresponds to one government process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsRegistry {
    /// Semantic version of the registry content (e.g. "1.0.0")
    pub version: String,
    /// Date the registry was last updated
    pub last_updated: NaiveDate,
    /// Scope identifier (e.g. "boston_resident_parking_permit")
    pub scope: String,
    pub facts: Vec<Fact>,
}

/// Validation failures for a registry document.
#[derive(Debug, Error)]
pub enum RegistryValidationError {
    #[error("registry version cannot be empty")]
    EmptyVersion,

    #[error("registry scope cannot be empty")]
    EmptyScope,

    #[error("registry contains no facts")]
    NoFacts,

    #[error("fact id cannot be empty")]
    EmptyFactId,

    #[error("fact '{0}' has empty text")]
    EmptyFactText(String),

    #[error("fact '{id}' has a non-http(s) source url: {url}")]
    InvalidSourceUrl { id: String, url: String },

    #[error("duplicate fact ids in registry: {0}")]
    DuplicateFactIds(String),
}

impl FactsRegistry {
    /// Normalize and validate a freshly deserialized registry.
    ///
    /// Trims ids and texts, then checks the invariants that make the registry
    /// citable: non-empty version/scope, at least one fact, non-blank id and
    /// text per fact, http(s) source urls, and globally unique ids.
    pub fn validate(&mut self) -> Result<(), RegistryValidationError> {
        if self.version.trim().is_empty() {
            return Err(RegistryValidationError::EmptyVersion);
        }
        if self.scope.trim().is_empty() {
            return Err(RegistryValidationError::EmptyScope);
        }
        if self.facts.is_empty() {
            return Err(RegistryValidationError::NoFacts);
        }

        self.version = self.version.trim().to_string();
        self.scope = self.scope.trim().to_string();

        for fact in &mut self.facts {
            fact.id = fact.id.trim().to_string();
            fact.text = fact.text.trim().to_string();

            if fact.id.is_empty() {
                return Err(RegistryValidationError::EmptyFactId);
            }
            if fact.text.is_empty() {
                return Err(RegistryValidationError::EmptyFactText(fact.id.clone()));
            }
            if !fact.source_url.starts_with("http://") && !fact.source_url.starts_with("https://") {
                return Err(RegistryValidationError::InvalidSourceUrl {
                    id: fact.id.clone(),
                    url: fact.source_url.clone(),
                });
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut duplicates: Vec<&str> = Vec::new();
        for fact in &self.facts {
            if !seen.insert(fact.id.as_str()) && !duplicates.contains(&fact.id.as_str()) {
                duplicates.push(fact.id.as_str());
            }
        }
        if !duplicates.is_empty() {
            return Err(RegistryValidationError::DuplicateFactIds(
                duplicates.join(", "),
            ));
        }

        Ok(())
    }
}
