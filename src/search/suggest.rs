//! Autocomplete over the completion suggester

use crate::models::RecordKey;
use crate::search::engine::SearchEngine;
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Name of the suggestion group in requests and responses
const SUGGESTION_NAME: &str = "name_complete";

/// One autocomplete entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: RecordKey,
    pub value: String,
}

/// Translates free text into completion requests
#[derive(Clone)]
pub struct AutocompleteAdapter {
    engine: Arc<dyn SearchEngine>,
    index: String,
    field: String,
    size: usize,
}

impl AutocompleteAdapter {
    pub fn new(engine: Arc<dyn SearchEngine>, index: impl Into<String>, size: usize) -> Self {
        Self {
            engine,
            index: index.into(),
            field: SUGGESTION_NAME.to_string(),
            size,
        }
    }

    /// Completion request body for a prefix
    pub fn request_body(&self, prefix: &str) -> Value {
        json!({
            SUGGESTION_NAME: {
                "text": prefix,
                "completion": { "field": self.field, "size": self.size }
            }
        })
    }

    pub async fn suggest(&self, prefix: &str) -> SearchResult<Vec<Suggestion>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.engine.suggest(&self.index, &self.request_body(prefix)).await?;
        parse_suggestions(&response)
    }
}

/// Unpack the first result group's options
pub fn parse_suggestions(response: &Value) -> SearchResult<Vec<Suggestion>> {
    let options = response
        .get(SUGGESTION_NAME)
        .and_then(|groups| groups.get(0))
        .and_then(|group| group.get("options"))
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Query("suggest response has no options".to_string()))?;

    options
        .iter()
        .map(|option| {
            let id = option
                .get("payload")
                .and_then(|payload| payload.get("id"))
                .and_then(|id| id.as_i64().or_else(|| id.as_str().and_then(|s| s.parse().ok())))
                .ok_or_else(|| SearchError::Query("suggestion option without payload id".to_string()))?;
            let value = option
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Suggestion { id, value })
        })
        .collect()
}
