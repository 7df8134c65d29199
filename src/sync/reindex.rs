//! Full rebuild of the index from the relational store

use crate::models::{RecordKey, StudentRecord};
use crate::search::{DocumentProjector, IndexSchemaManager, IndexWriteGateway};
use crate::state::RecordStore;
use crate::sync::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Counters of one reindex run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexStats {
    /// Records read from the store
    pub records: usize,

    /// Documents written
    pub indexed: usize,

    /// Records that could not be projected
    pub projection_failures: Vec<(RecordKey, String)>,

    /// Documents the engine rejected, by document id
    pub write_failures: Vec<(String, String)>,

    /// Wall time of the run in milliseconds
    pub elapsed_ms: u64,
}

impl ReindexStats {
    pub fn failed(&self) -> usize {
        self.projection_failures.len() + self.write_failures.len()
    }
}

/// Reprovisions the index and pushes every stored record into it
pub struct Reindexer {
    schema: IndexSchemaManager,
    projector: Arc<DocumentProjector<StudentRecord>>,
    gateway: IndexWriteGateway,
    store: Arc<dyn RecordStore>,
    batch_size: usize,
}

impl Reindexer {
    pub fn new(
        schema: IndexSchemaManager,
        projector: Arc<DocumentProjector<StudentRecord>>,
        gateway: IndexWriteGateway,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            schema,
            projector,
            gateway,
            store,
            batch_size: 500,
        }
    }

    /// Documents per bulk request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rebuild the index
    ///
    /// Destroys the existing index first. Per-record failures are counted,
    /// not fatal.
    pub async fn run(&self) -> SyncResult<ReindexStats> {
        let start_time = Instant::now();
        self.schema.reprovision().await?;

        let records = self
            .store
            .all_records()
            .await
            .map_err(|e| SyncError::Lookup(e.to_string()))?;

        let mut stats = ReindexStats {
            records: records.len(),
            ..Default::default()
        };

        for batch in records.chunks(self.batch_size) {
            let mut documents = Vec::with_capacity(batch.len());
            for record in batch {
                match self.projector.project(record) {
                    Ok(document) => documents.push(document),
                    Err(e) => {
                        warn!(key = record.key(), error = %e, "Skipping record that cannot be projected");
                        stats.projection_failures.push((record.key(), e.to_string()));
                    }
                }
            }
            if documents.is_empty() {
                continue;
            }

            let summary = self.gateway.bulk_create(&documents).await?;
            for (id, reason) in &summary.failed {
                warn!(id = %id, reason = %reason, "Bulk create rejected document");
            }
            stats.indexed += summary.succeeded;
            stats.write_failures.extend(summary.failed);
        }

        stats.elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            index = %self.schema.target().index,
            records = stats.records,
            indexed = stats.indexed,
            failed = stats.failed(),
            elapsed_ms = stats.elapsed_ms,
            "Reindex completed"
        );
        Ok(stats)
    }
}
