//! Index synchronization
//!
//! Relational commits publish [`DomainEvent`]s; the [`ChangePropagator`]
//! turns each into index writes before the triggering operation returns.
//! The [`Reindexer`] rebuilds the whole index from the store.

mod error;
mod events;
mod propagator;
mod reindex;

pub use error::{SyncError, SyncResult};
pub use events::DomainEvent;
pub use propagator::{dependent_field, ChangePropagator, Propagated, PropagationReport};
pub use reindex::{ReindexStats, Reindexer};
