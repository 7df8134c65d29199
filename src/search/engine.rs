//! Search engine protocol seam
//!
//! Every component talks to the engine through [`SearchEngine`], an explicit
//! handle passed in at construction time. The trait mirrors the engine's
//! request/response protocol: JSON bodies in, JSON bodies out.

use crate::search::error::EngineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Index name plus document type a document lives under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTarget {
    pub index: String,
    pub doc_type: String,
}

impl IndexTarget {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
        }
    }
}

/// Visibility requested for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Refresh {
    /// Next read observes the write
    Immediate,
}

impl Refresh {
    pub fn as_param(&self) -> &'static str {
        match self {
            Refresh::Immediate => "true",
        }
    }
}

/// Operation in a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BulkOperation {
    Create { id: String, source: Value },
}

impl BulkOperation {
    pub fn id(&self) -> &str {
        match self {
            BulkOperation::Create { id, .. } => id,
        }
    }
}

/// Outcome of a bulk request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub succeeded: usize,
    /// (document id, reason) for each rejected item
    pub failed: Vec<(String, String)>,
}

/// Request/response protocol of the external document search engine
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Check whether an index exists
    async fn index_exists(&self, index: &str) -> EngineResult<bool>;

    /// Create an empty index
    async fn create_index(&self, index: &str) -> EngineResult<()>;

    /// Delete an index and every document in it
    async fn delete_index(&self, index: &str) -> EngineResult<()>;

    /// Apply a mapping to a document type
    async fn put_mapping(&self, target: &IndexTarget, mapping: &Value) -> EngineResult<()>;

    /// Create a document; fails with `Conflict` when the id exists
    async fn create_document(
        &self,
        target: &IndexTarget,
        id: &str,
        source: &Value,
        refresh: Refresh,
    ) -> EngineResult<()>;

    /// Merge `partial` into an existing document; fails with `NotFound` when absent
    async fn update_document(
        &self,
        target: &IndexTarget,
        id: &str,
        partial: &Value,
        refresh: Refresh,
    ) -> EngineResult<()>;

    /// Delete a document; fails with `NotFound` when absent
    async fn delete_document(&self, target: &IndexTarget, id: &str, refresh: Refresh) -> EngineResult<()>;

    /// Fetch a document source
    async fn get_document(&self, target: &IndexTarget, id: &str) -> EngineResult<Option<Value>>;

    /// Run a search body and return the raw response
    async fn search(&self, target: &IndexTarget, body: &Value) -> EngineResult<Value>;

    /// Run a suggest body and return the raw response
    async fn suggest(&self, index: &str, body: &Value) -> EngineResult<Value>;

    /// Count documents of a type
    async fn count(&self, target: &IndexTarget) -> EngineResult<u64>;

    /// Apply many operations in one request
    async fn bulk(
        &self,
        target: &IndexTarget,
        operations: &[BulkOperation],
        refresh: Refresh,
    ) -> EngineResult<BulkSummary>;
}
