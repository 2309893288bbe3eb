//! Citation extraction from accumulated tool results.
//!
//! Only fact-shaped payloads (`fact` / `facts` fields) produce citations;
//! graph lookups carry fact_id references instead, which the engine resolves
//! through `query_facts`. Malformed entries are skipped with a warning so a
//! bad upstream record can never take down an answer.

use beacon_common::Citation;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Build the ordered, deduplicated citation list for one conversation turn.
///
/// Results are walked in call order; the first occurrence of a fact id wins
/// and later duplicates are dropped.
pub fn extract_citations(tool_results: &[Value]) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut seen_fact_ids: HashSet<String> = HashSet::new();

    for result in tool_results {
        if let Some(fact) = result.get("fact") {
            push_fact(fact, &mut citations, &mut seen_fact_ids);
        }
        if let Some(facts) = result.get("facts").and_then(Value::as_array) {
            for fact in facts {
                push_fact(fact, &mut citations, &mut seen_fact_ids);
            }
        }
    }

    citations
}

fn push_fact(fact: &Value, citations: &mut Vec<Citation>, seen: &mut HashSet<String>) {
    if fact.is_null() {
        return;
    }

    let id = fact.get("id").and_then(Value::as_str).filter(|s| !s.is_empty());
    let url = fact
        .get("source_url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let text = fact
        .get("text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    let (Some(id), Some(url), Some(text)) = (id, url, text) else {
        warn!("Skipping malformed fact data in tool result: {}", fact);
        return;
    };

    if seen.contains(id) {
        return;
    }
    seen.insert(id.to_string());

    citations.push(Citation {
        fact_id: Some(id.to_string()),
        url: url.to_string(),
        text: text.to_string(),
        source_section: fact
            .get("source_section")
            .and_then(Value::as_str)
            .map(str::to_string),
    });
}
