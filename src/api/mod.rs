pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::search::SearchService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
///
/// The router is read-only. Record mutations come from the embedding
/// application, which feeds each store event to a `ChangePropagator`.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(search: Arc<SearchService>) -> Self {
        Self {
            search,
            started_at: Instant::now(),
        }
    }
}
