//! Decides whether fetched content satisfies a [`PollRule`].
//!
//! Evaluation never fails: content that cannot be interpreted in the
//! rule's mode is logged and counts as "no match".

use serde_json::Value;

use crate::models::{PollRule, SearchMode};
use crate::traits::Cleaner;

/// Evaluates raw content against a rule, before negation.
#[derive(Debug, Clone)]
pub struct ContentEvaluator<C> {
    cleaner: C,
}

impl<C: Cleaner> ContentEvaluator<C> {
    pub fn new(cleaner: C) -> Self {
        Self { cleaner }
    }

    /// Raw match outcome for `content`. Negation is applied by the caller.
    pub fn evaluate(&self, content: &str, rule: &PollRule) -> bool {
        match rule.search_mode() {
            SearchMode::TextMatch => self.text_match(content, rule),
            SearchMode::PathMatch => path_match(content, rule),
        }
    }

    fn text_match(&self, content: &str, rule: &PollRule) -> bool {
        let text = match self.cleaner.clean(content) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Could not parse markup, searching raw text");
                collapse_whitespace(content)
            }
        };
        if text.trim().is_empty() {
            return false;
        }

        let found = if rule.case_sensitive() {
            text.contains(rule.target())
        } else {
            text.to_lowercase().contains(&rule.target().to_lowercase())
        };
        tracing::debug!(target_text = %rule.target(), found, "Text search finished");
        found
    }
}

fn path_match(content: &str, rule: &PollRule) -> bool {
    let Some(query) = rule.query() else {
        tracing::warn!("JSON search without a JSONPath location");
        return false;
    };
    let path = rule.path_str().unwrap_or_default();

    let data: Value = match serde_json::from_str(content) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(error = %e, "Error parsing JSON content");
            return false;
        }
    };

    let nodes = query.query(&data).all();
    if nodes.is_empty() {
        tracing::debug!(%path, "JSONPath found no matches");
        return false;
    }

    let target = rule.target();
    let matched = nodes.iter().find(|node| {
        let value = stringify(node);
        if rule.case_sensitive() {
            value == target
        } else {
            value.to_lowercase() == target.to_lowercase()
        }
    });

    match matched {
        Some(node) => {
            tracing::debug!(%path, value = %node, "JSONPath found matching value");
            true
        }
        None => {
            tracing::debug!(%path, found = ?nodes, target_value = %target, "JSONPath values did not match");
            false
        }
    }
}

/// Strings compare by their raw value, everything else by compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collapse every whitespace run into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
