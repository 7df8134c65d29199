//! Error types for search operations

use crate::error::AppError;
use crate::models::RecordKey;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type for raw engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures reported by the search engine transport
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Engine unreachable or request could not be sent
    #[error("Engine transport failed: {0}")]
    Transport(String),

    /// Engine answered with an unexpected status
    #[error("Engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Index or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document already exists or version conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Response body could not be decoded
    #[error("Failed to decode engine response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Decode(err.to_string())
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Decode(err.to_string())
    }
}

/// A projection hook or rule could not produce a field value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    /// Mapped field has no strategy, relation or attribute
    #[error("Field '{0}' cannot be projected: no strategy, relation or attribute")]
    UnknownField(String),

    /// Record state cannot be represented in the index
    #[error("Field '{field}' has an invalid value: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Errors that can occur during search operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// Reprovisioning failed
    #[error("Schema error: {0}")]
    Schema(String),

    /// Document projection failed
    #[error("Projection failed: {0}")]
    Projection(#[from] ProjectionError),

    /// Index write failed for one document
    #[error("Write failed for document {key}: {reason}")]
    Write { key: RecordKey, reason: String },

    /// Update or delete addressed a document that is not indexed
    #[error("Document {0} is not indexed")]
    DocumentMissing(RecordKey),

    /// Malformed filter state or unusable search response
    #[error("Query failed: {0}")]
    Query(String),

    /// Engine failure outside a per-document write
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SearchError {
    /// Map an engine failure on a single-document write
    pub(crate) fn from_write(key: RecordKey, err: EngineError) -> Self {
        match err {
            EngineError::NotFound(_) => SearchError::DocumentMissing(key),
            other => SearchError::Write {
                key,
                reason: other.to_string(),
            },
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            SearchError::Query(msg) => AppError::Validation(msg),
            SearchError::DocumentMissing(key) => {
                AppError::NotFound(format!("Document {} is not indexed", key))
            }
            SearchError::Engine(EngineError::Transport(msg)) => AppError::Network(msg),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_not_found_becomes_document_missing() {
        let err = SearchError::from_write(7, EngineError::NotFound("students/7".into()));
        assert!(matches!(err, SearchError::DocumentMissing(7)));

        let err = SearchError::from_write(7, EngineError::Conflict("exists".into()));
        assert!(matches!(err, SearchError::Write { key: 7, .. }));
    }

    #[test]
    fn test_query_error_maps_to_validation() {
        let app: AppError = SearchError::Query("bad key".into()).into();
        assert_eq!(app.error_code(), "VALIDATION_ERROR");
    }
}
