//! Process graph entity schemas.
//!
//! These are the read-only entities the assistant can look up through the
//! `query_graph` tool: the process itself, its ordered steps, eligibility
//! requirements, the office handling in-person steps, and accepted document
//! types. All regulatory entities carry provenance fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::facts::ConfidenceLevel;

/// Category of government process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessCategory {
    Permits,
    Licenses,
    Benefits,
}

/// Source traceability fields shared by every regulatory entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// URL to the official source document
    pub source_url: String,
    /// Date this entity's data was last verified
    pub last_verified: NaiveDate,
    pub confidence: ConfidenceLevel,
}

/// A government service, e.g. "Boston Resident Parking Permit".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub process_id: String,
    pub name: String,
    pub description: String,
    pub category: ProcessCategory,
    /// Governing authority, e.g. "City of Boston"
    pub jurisdiction: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// An actionable task within a process, e.g. "Gather required documents".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    pub process_id: String,
    pub name: String,
    pub description: String,
    /// 1-indexed sequence number; steps are returned sorted by this
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_minutes: Option<u32>,
    #[serde(default)]
    pub cost_usd: f64,
    /// Whether the step can be skipped
    #[serde(default)]
    pub optional: bool,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// An eligibility condition, e.g. "MA registration at a Boston address".
///
/// A requirement with `hard_gate` set blocks process completion if unmet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub requirement_id: String,
    pub text: String,
    /// Facts Registry id backing this requirement
    pub fact_id: String,
    pub applies_to_process: String,
    #[serde(default = "default_hard_gate")]
    pub hard_gate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

fn default_hard_gate() -> bool {
    true
}

/// A physical office handling in-person steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Office {
    pub office_id: String,
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Operating hours, e.g. "Mon-Fri, 9:00-4:30"
    pub hours: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// A template for accepted documents, e.g. "Utility bill no older than 30 days".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentType {
    pub doc_type_id: String,
    pub name: String,
    /// Maximum document age in days
    pub freshness_days: u32,
    #[serde(default = "default_match_required")]
    pub name_match_required: bool,
    #[serde(default = "default_match_required")]
    pub address_match_required: bool,
    /// Example issuers, e.g. ["National Grid", "Eversource"]
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

fn default_match_required() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_deserializes_with_defaults() {
        let yaml = r#"
step_id: rpp_step_1_check_eligibility
process_id: boston_resident_parking_permit
name: Check Eligibility
description: Verify you meet the basic requirements
order: 1
source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
last_verified: 2025-11-09
confidence: high
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.order, 1);
        assert_eq!(step.cost_usd, 0.0);
        assert!(!step.optional);
        assert_eq!(step.provenance.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_requirement_hard_gate_defaults_true() {
        let yaml = r#"
requirement_id: req_vehicle_class
text: Vehicle must be a passenger vehicle or motorcycle
fact_id: rpp.eligibility.vehicle_class
applies_to_process: boston_resident_parking_permit
source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
last_verified: 2025-11-09
confidence: high
"#;
        let requirement: Requirement = serde_yaml::from_str(yaml).unwrap();
        assert!(requirement.hard_gate);
    }

    #[test]
    fn test_provenance_flattens_into_json() {
        let office = Office {
            office_id: "boston_parking_clerk".to_string(),
            name: "Boston Parking Clerk".to_string(),
            address: "1 City Hall Square, Room 224, Boston, MA 02201".to_string(),
            room: Some("224".to_string()),
            hours: "Mon-Fri, 9:00-4:30".to_string(),
            phone: None,
            email: None,
            provenance: Provenance {
                source_url: "https://www.boston.gov/departments/parking-clerk".to_string(),
                last_verified: chrono::NaiveDate::from_ymd_opt(2025, 11, 9).unwrap(),
                confidence: ConfidenceLevel::High,
            },
        };
        let value = serde_json::to_value(&office).unwrap();
        // provenance fields sit at the top level, not nested
        assert!(value.get("source_url").is_some());
        assert!(value.get("provenance").is_none());
    }
}
