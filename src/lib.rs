//! Search index synchronization and faceted query engine for student records
//!
//! Student rows live in a relational store; a denormalized copy of each is
//! kept in a search index. Writes to the store publish domain events that
//! the [`sync::ChangePropagator`] applies to the index synchronously. The
//! [`search::SearchService`] answers faceted queries and name autocomplete
//! against that index.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod search;
pub mod seed;
pub mod state;
pub mod sync;

pub use error::{AppError, Result};
