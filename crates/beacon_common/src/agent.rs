//! Agent response contract.
//!
//! `ConversationResponse` is what one `ask` produces: the answer text, the
//! citations backing every regulatory claim in it, and the tool-call trail.

use serde::{Deserialize, Serialize};

/// A citation tying a claim in an answer back to its source.
///
/// Citations derived from the Facts Registry carry the originating `fact_id`;
/// the field stays optional so graph-sourced citations remain representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_id: Option<String>,
    /// URL to the official source document
    pub url: String,
    /// The cited claim text
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
}

/// The result of one conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    /// Natural-language answer, possibly with inline citation links in the
    /// form `[claim](source_url "fact_id")`
    pub answer: String,
    /// Deduplicated citations in first-use order; empty for answers that make
    /// no regulatory claims
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Tool names in invocation order, duplicates included
    #[serde(default)]
    pub tool_calls_made: Vec<String>,
}
