//! Search index provisioning

use crate::search::engine::{IndexTarget, SearchEngine};
use crate::search::error::{SearchError, SearchResult};
use crate::search::mapping::IndexMapping;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Defines and (re)provisions the index mapping
///
/// Reprovisioning is destructive: every indexed document is discarded. It is
/// a maintenance operation and is never triggered by normal writes.
pub struct IndexSchemaManager {
    engine: Arc<dyn SearchEngine>,
    target: IndexTarget,
    mapping: IndexMapping,
}

impl IndexSchemaManager {
    pub fn new(engine: Arc<dyn SearchEngine>, target: IndexTarget, mapping: IndexMapping) -> Self {
        Self {
            engine,
            target,
            mapping,
        }
    }

    pub fn target(&self) -> &IndexTarget {
        &self.target
    }

    /// Rendered mapping body
    pub fn mapping_body(&self) -> Value {
        self.mapping.to_json()
    }

    /// Drop the index if present, create it and apply the mapping
    pub async fn reprovision(&self) -> SearchResult<()> {
        let index = &self.target.index;

        let exists = self
            .engine
            .index_exists(index)
            .await
            .map_err(|e| SearchError::Schema(format!("Failed to check index '{}': {}", index, e)))?;

        if exists {
            self.engine
                .delete_index(index)
                .await
                .map_err(|e| SearchError::Schema(format!("Failed to delete index '{}': {}", index, e)))?;
            info!(index = %index, "Existing index deleted");
        }

        self.engine
            .create_index(index)
            .await
            .map_err(|e| SearchError::Schema(format!("Failed to create index '{}': {}", index, e)))?;

        if let Err(e) = self.engine.put_mapping(&self.target, &self.mapping_body()).await {
            error!(index = %index, error = %e, "Mapping rejected, removing half-created index");
            if let Err(cleanup) = self.engine.delete_index(index).await {
                warn!(index = %index, error = %cleanup, "Failed to remove half-created index");
            }
            return Err(SearchError::Schema(format!(
                "Failed to apply mapping to '{}/{}': {}",
                index, self.target.doc_type, e
            )));
        }

        info!(
            index = %index,
            doc_type = %self.target.doc_type,
            fields = self.mapping.len(),
            "Index reprovisioned"
        );
        Ok(())
    }
}
