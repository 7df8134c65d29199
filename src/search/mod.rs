//! Search index synchronization and faceted search
//!
//! This module keeps a denormalized student index in step with the
//! relational records and answers faceted queries against it:
//!
//! - **Schema**: index mapping and destructive reprovisioning
//! - **Projection**: record → document, with per-field strategies
//! - **Writes**: create / partial update / delete with refresh-on-write
//! - **Facets**: filter state → bool query + aggregations → toggle links
//! - **Autocomplete**: prefix completion over student names
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           SearchService / ChangePropagator      │
//! ├─────────────────────────────────────────────────┤
//! │  FacetQueryBuilder   FacetResultAggregator      │
//! │  AutocompleteAdapter DocumentProjector          │
//! │  IndexWriteGateway   IndexSchemaManager         │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │        SearchEngine (Arc<dyn SearchEngine>)     │
//! ├─────────────────────────────────────────────────┤
//! │  HttpSearchEngine     InMemorySearchEngine      │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use roster_search::search::{create_engine, FilterState, SearchConfig, SearchService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SearchConfig::default();
//!     let engine = create_engine(&config)?;
//!     let search = SearchService::new(engine, config);
//!
//!     let state = FilterState::new().with("year_in_school", "FR");
//!     let results = search.search(&state).await?;
//!     println!("Found {} students", results.total_hits);
//!
//!     Ok(())
//! }
//! ```

mod config;
mod document;
mod engine;
mod error;
mod facets;
mod gateway;
mod http;
mod index;
mod mapping;
mod memory;
mod query;
mod service;
mod suggest;

pub use config::{EngineBackend, MultiValueMode, SearchConfig, SearchConfigBuilder};
pub use document::{
    project_course_names, project_name_complete, student_projector, DocumentProjector,
    IndexDocument, Projectable, ProjectionStrategy, RelatedEntity, Relation,
};
pub use engine::{BulkOperation, BulkSummary, IndexTarget, Refresh, SearchEngine};
pub use error::{EngineError, EngineResult, ProjectionError, SearchError, SearchResult};
pub use facets::{
    toggle_option, AggregationResults, FacetBuckets, FacetGroup, FacetModel, FacetOption,
    FacetResultAggregator, HistogramBucket, TermsBucket,
};
pub use gateway::IndexWriteGateway;
pub use http::HttpSearchEngine;
pub use index::IndexSchemaManager;
pub use mapping::{student_mapping, FieldMapping, IndexMapping};
pub use memory::InMemorySearchEngine;
pub use query::{
    engine_path, student_facets, AggregationSpec, FacetField, FacetKind, FacetQuery,
    FacetQueryBuilder, FilterClause, FilterQuery, FilterState, Page, RESERVED_PARAMS,
    UNBOUNDED_BUCKETS,
};
pub use service::{FacetSearchResponse, SearchHit, SearchService};
pub use suggest::{parse_suggestions, AutocompleteAdapter, Suggestion};

use std::sync::Arc;

/// Create the engine handle selected by configuration
pub fn create_engine(config: &SearchConfig) -> SearchResult<Arc<dyn SearchEngine>> {
    match config.backend {
        EngineBackend::Http => {
            if config.engine_url.trim().is_empty() {
                return Err(SearchError::InvalidConfiguration(
                    "HTTP backend requires 'engine_url' configuration".to_string(),
                ));
            }
            tracing::info!(url = %config.engine_url, "Initializing HTTP search engine");
            Ok(Arc::new(HttpSearchEngine::new(config)?))
        }

        EngineBackend::Memory => {
            tracing::info!("Initializing in-memory search engine");
            Ok(Arc::new(InMemorySearchEngine::new()))
        }
    }
}
