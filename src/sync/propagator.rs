//! Change propagation from relational commits to the index

use crate::metrics::PROPAGATION_FAILURES_TOTAL;
use crate::models::{EntityKind, RecordKey, ReferencedEntity, StudentRecord};
use crate::search::{DocumentProjector, IndexWriteGateway};
use crate::state::RecordStore;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::events::DomainEvent;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Index field holding the projection of each referenced entity kind
pub fn dependent_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::University => "university",
        EntityKind::Course => "course_names",
    }
}

/// Outcome of refreshing the dependents of one changed entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    /// Entity that changed, e.g. `university 3`
    pub entity: String,
    pub attempted: usize,
    pub succeeded: usize,
    /// Keys left stale, in dependent order
    pub failures: Vec<(RecordKey, String)>,
}

impl PropagationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fail when any dependent was left stale
    pub fn into_result(self) -> SyncResult<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(SyncError::Propagation {
                entity: self.entity,
                failed: self.failures,
            })
        }
    }
}

/// What handling one event did to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagated {
    Created(RecordKey),
    Updated(RecordKey),
    Deleted(RecordKey),
    Dependents(PropagationReport),
}

/// Turns domain events into index writes
pub struct ChangePropagator {
    projector: Arc<DocumentProjector<StudentRecord>>,
    gateway: IndexWriteGateway,
    store: Arc<dyn RecordStore>,
    concurrency: usize,
}

impl ChangePropagator {
    pub fn new(
        projector: Arc<DocumentProjector<StudentRecord>>,
        gateway: IndexWriteGateway,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            projector,
            gateway,
            store,
            concurrency: 1,
        }
    }

    /// Dependent writes allowed in flight during a fan-out
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Apply the index writes an event calls for
    ///
    /// A dependent fan-out with stale documents is reported as
    /// [`SyncError::Propagation`].
    pub async fn handle(&self, event: &DomainEvent) -> SyncResult<Propagated> {
        debug!(event = event.name(), "Handling domain event");
        match event {
            DomainEvent::RecordSaved { record, is_new } => self.on_record_saved(record, *is_new).await,
            DomainEvent::RecordDeleted { key } => self.on_record_deleted(*key).await,
            DomainEvent::ReferencedEntitySaved { entity } => self
                .on_referenced_entity_saved(entity)
                .await?
                .into_result()
                .map(Propagated::Dependents),
            DomainEvent::MembershipsChanged { record } => self.on_memberships_changed(record).await,
        }
    }

    /// Create or fully refresh a record's document
    pub async fn on_record_saved(&self, record: &StudentRecord, is_new: bool) -> SyncResult<Propagated> {
        let key = record.key();
        let document = self
            .projector
            .project(record)
            .map_err(|source| SyncError::Projection { key, source })?;

        if is_new {
            self.gateway.create(&document).await?;
            Ok(Propagated::Created(key))
        } else {
            self.gateway.update(key, &document.fields).await?;
            Ok(Propagated::Updated(key))
        }
    }

    /// Remove the document of a deleted record
    pub async fn on_record_deleted(&self, key: RecordKey) -> SyncResult<Propagated> {
        self.gateway.delete(key).await?;
        Ok(Propagated::Deleted(key))
    }

    /// Refresh the affected field on every dependent of a changed entity
    ///
    /// Dependents are written independently: a failure is recorded and the
    /// sweep continues.
    pub async fn on_referenced_entity_saved(&self, entity: &ReferencedEntity) -> SyncResult<PropagationReport> {
        let kind = entity.kind();
        let field = dependent_field(kind);
        let kind_label = kind.to_string();
        let label = format!("{} {}", kind_label, entity.key());

        let dependents = self
            .store
            .dependents_of(kind, entity.key())
            .await
            .map_err(|e| SyncError::Lookup(e.to_string()))?;

        let outcomes: Vec<(RecordKey, SyncResult<()>)> = stream::iter(dependents.iter())
            .map(|record| async move { (record.key(), self.refresh_field(record, field).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = PropagationReport {
            entity: label,
            attempted: outcomes.len(),
            ..Default::default()
        };
        for (key, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    warn!(
                        entity = %report.entity,
                        key,
                        field,
                        error = %e,
                        "Dependent document left stale"
                    );
                    PROPAGATION_FAILURES_TOTAL
                        .with_label_values(&[kind_label.as_str()])
                        .inc();
                    report.failures.push((key, e.to_string()));
                }
            }
        }

        info!(
            entity = %report.entity,
            field,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "Dependents refreshed"
        );
        Ok(report)
    }

    /// Fully re-project one record after its memberships changed
    pub async fn on_memberships_changed(&self, record: &StudentRecord) -> SyncResult<Propagated> {
        self.on_record_saved(record, false).await
    }

    async fn refresh_field(&self, record: &StudentRecord, field: &str) -> SyncResult<()> {
        let key = record.key();
        let value = self
            .projector
            .project_field(record, field)
            .map_err(|source| SyncError::Projection { key, source })?;

        let mut partial = Map::new();
        partial.insert(field.to_string(), value);
        self.gateway.update(key, &partial).await?;
        Ok(())
    }
}
