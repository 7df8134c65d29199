//! Index write gateway
//!
//! Every write requests refresh-on-write so a completed call is visible to
//! the next read.

use crate::metrics::INDEX_WRITES_TOTAL;
use crate::models::RecordKey;
use crate::search::document::IndexDocument;
use crate::search::engine::{BulkOperation, BulkSummary, IndexTarget, Refresh, SearchEngine};
use crate::search::error::{SearchError, SearchResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Applies create/update/delete operations to the index
#[derive(Clone)]
pub struct IndexWriteGateway {
    engine: Arc<dyn SearchEngine>,
    target: IndexTarget,
}

impl IndexWriteGateway {
    pub fn new(engine: Arc<dyn SearchEngine>, target: IndexTarget) -> Self {
        Self { engine, target }
    }

    pub fn target(&self) -> &IndexTarget {
        &self.target
    }

    fn record(operation: &str, result: &SearchResult<()>) {
        let outcome = if result.is_ok() { "success" } else { "failure" };
        INDEX_WRITES_TOTAL.with_label_values(&[operation, outcome]).inc();
    }

    /// Create a full document
    pub async fn create(&self, document: &IndexDocument) -> SearchResult<()> {
        let result = self
            .engine
            .create_document(&self.target, &document.id(), &document.source(), Refresh::Immediate)
            .await
            .map_err(|e| SearchError::from_write(document.key, e));
        Self::record("create", &result);
        match &result {
            Ok(()) => debug!(key = document.key, "Document created"),
            Err(e) => warn!(key = document.key, error = %e, "Document create failed"),
        }
        result
    }

    /// Merge a partial document into an existing one
    pub async fn update(&self, key: RecordKey, partial: &Map<String, Value>) -> SearchResult<()> {
        let body = Value::Object(partial.clone());
        let result = self
            .engine
            .update_document(&self.target, &key.to_string(), &body, Refresh::Immediate)
            .await
            .map_err(|e| SearchError::from_write(key, e));
        Self::record("update", &result);
        match &result {
            Ok(()) => debug!(key, fields = ?partial.keys().collect::<Vec<_>>(), "Document updated"),
            Err(e) => warn!(key, error = %e, "Document update failed"),
        }
        result
    }

    /// Delete a document by key
    pub async fn delete(&self, key: RecordKey) -> SearchResult<()> {
        let result = self
            .engine
            .delete_document(&self.target, &key.to_string(), Refresh::Immediate)
            .await
            .map_err(|e| SearchError::from_write(key, e));
        Self::record("delete", &result);
        match &result {
            Ok(()) => debug!(key, "Document deleted"),
            Err(e) => warn!(key, error = %e, "Document delete failed"),
        }
        result
    }

    /// Look up the indexed document for a key
    pub async fn get(&self, key: RecordKey) -> SearchResult<Option<IndexDocument>> {
        let source = self.engine.get_document(&self.target, &key.to_string()).await?;
        match source {
            Some(Value::Object(fields)) => Ok(Some(IndexDocument::new(key, fields))),
            Some(other) => Err(SearchError::Query(format!(
                "document {} has a non-object source: {}",
                key, other
            ))),
            None => Ok(None),
        }
    }

    /// Create many documents in one request
    pub async fn bulk_create(&self, documents: &[IndexDocument]) -> SearchResult<BulkSummary> {
        let operations: Vec<BulkOperation> = documents
            .iter()
            .map(|doc| BulkOperation::Create {
                id: doc.id(),
                source: doc.source(),
            })
            .collect();
        let summary = self
            .engine
            .bulk(&self.target, &operations, Refresh::Immediate)
            .await?;
        INDEX_WRITES_TOTAL
            .with_label_values(&["bulk_create", "success"])
            .inc_by(summary.succeeded as f64);
        INDEX_WRITES_TOTAL
            .with_label_values(&["bulk_create", "failure"])
            .inc_by(summary.failed.len() as f64);
        Ok(summary)
    }
}
