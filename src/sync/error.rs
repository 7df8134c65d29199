//! Error types for index synchronization

use crate::error::AppError;
use crate::models::RecordKey;
use crate::search::{ProjectionError, SearchError};

/// Result type for synchronization operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised while keeping the index in step with the records
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// A record could not be turned into a document
    #[error("Projection failed for record {key}: {source}")]
    Projection {
        key: RecordKey,
        #[source]
        source: ProjectionError,
    },

    /// The index rejected a write
    #[error(transparent)]
    Write(#[from] SearchError),

    /// Dependents of a changed entity could not be looked up
    #[error("Dependent lookup failed: {0}")]
    Lookup(String),

    /// Some dependent documents were left stale
    #[error("Failed to refresh {} dependent(s) of {entity}: {}", .failed.len(), describe(.failed))]
    Propagation {
        entity: String,
        failed: Vec<(RecordKey, String)>,
    },
}

fn describe(failed: &[(RecordKey, String)]) -> String {
    failed
        .iter()
        .map(|(key, reason)| format!("{} ({})", key, reason))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Write(search) => search.into(),
            SyncError::Projection { .. } => AppError::Validation(err.to_string()),
            SyncError::Lookup(msg) => AppError::Internal(msg),
            SyncError::Propagation { .. } => AppError::Synchronization(err.to_string()),
        }
    }
}
