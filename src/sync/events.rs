//! Domain events published after relational commits

use crate::models::{RecordKey, ReferencedEntity, StudentRecord};
use serde::{Deserialize, Serialize};

/// A committed change the search index has to follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A student row was inserted or updated
    RecordSaved { record: StudentRecord, is_new: bool },

    /// A student row was removed; carries the key it had
    RecordDeleted { key: RecordKey },

    /// A university or course was created or changed
    ReferencedEntitySaved { entity: ReferencedEntity },

    /// A student's course memberships changed
    MembershipsChanged { record: StudentRecord },
}

impl DomainEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::RecordSaved { is_new: true, .. } => "record_created",
            DomainEvent::RecordSaved { is_new: false, .. } => "record_updated",
            DomainEvent::RecordDeleted { .. } => "record_deleted",
            DomainEvent::ReferencedEntitySaved { .. } => "referenced_entity_saved",
            DomainEvent::MembershipsChanged { .. } => "memberships_changed",
        }
    }
}
