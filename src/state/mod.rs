pub mod store;

pub use store::*;

use crate::error::Result;
use crate::models::{EntityKind, RecordKey, StudentRecord};
use async_trait::async_trait;

/// Read access to resolved student records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a student with its references resolved
    async fn load_record(&self, key: RecordKey) -> Result<Option<StudentRecord>>;

    /// Students referencing an entity, ordered by key
    ///
    /// For a university these are the students it owns, for a course the
    /// students enrolled in it.
    async fn dependents_of(&self, kind: EntityKind, key: RecordKey) -> Result<Vec<StudentRecord>>;

    /// Every student, ordered by key
    async fn all_records(&self) -> Result<Vec<StudentRecord>>;

    /// Number of stored students
    async fn count_records(&self) -> Result<u64>;
}
