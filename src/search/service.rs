//! Read-side search service

use crate::metrics::SEARCH_REQUESTS_TOTAL;
use crate::models::RecordKey;
use crate::search::config::SearchConfig;
use crate::search::document::IndexDocument;
use crate::search::engine::{IndexTarget, SearchEngine};
use crate::search::error::{SearchError, SearchResult};
use crate::search::facets::{AggregationResults, FacetModel, FacetResultAggregator};
use crate::search::gateway::IndexWriteGateway;
use crate::search::query::{FacetQueryBuilder, FilterState, Page};
use crate::search::suggest::{AutocompleteAdapter, Suggestion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// A single search result hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id
    pub id: String,

    /// Indexed document body
    pub source: Value,
}

/// Hits plus the facet navigation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetSearchResponse {
    /// Documents matching the filter
    pub total_hits: u64,

    /// Requested page of hits
    pub hits: Vec<SearchHit>,

    /// Facet options for the next click
    pub facets: FacetModel,

    /// Search execution time in milliseconds
    pub search_time_ms: u64,
}

/// Main search service
pub struct SearchService {
    engine: Arc<dyn SearchEngine>,
    config: SearchConfig,
    target: IndexTarget,
    builder: FacetQueryBuilder,
    aggregator: FacetResultAggregator,
    autocomplete: AutocompleteAdapter,
    gateway: IndexWriteGateway,
}

impl SearchService {
    pub fn new(engine: Arc<dyn SearchEngine>, config: SearchConfig) -> Self {
        let target = config.target();
        Self {
            builder: FacetQueryBuilder::for_students(config.multi_value_mode),
            aggregator: FacetResultAggregator::new(),
            autocomplete: AutocompleteAdapter::new(
                engine.clone(),
                config.index_name.clone(),
                config.suggest_size,
            ),
            gateway: IndexWriteGateway::new(engine.clone(), target.clone()),
            engine,
            config,
            target,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn engine(&self) -> Arc<dyn SearchEngine> {
        self.engine.clone()
    }

    fn record(endpoint: &str, ok: bool) {
        let outcome = if ok { "success" } else { "failure" };
        SEARCH_REQUESTS_TOTAL.with_label_values(&[endpoint, outcome]).inc();
    }

    /// Filtered search with facet aggregations, first page of hits
    pub async fn search(&self, state: &FilterState) -> SearchResult<FacetSearchResponse> {
        self.search_page(state, Page::first(self.config.max_results)).await
    }

    /// Filtered search returning the requested slice of hits
    pub async fn search_page(&self, state: &FilterState, page: Page) -> SearchResult<FacetSearchResponse> {
        let page = Page {
            size: page.size.min(self.config.max_results),
            ..page
        };
        let result = self.run_search(state, page).await;
        Self::record("search", result.is_ok());
        if let Err(e) = &result {
            warn!(error = %e, filters = %state.to_query_string(), "Search failed");
        }
        result
    }

    async fn run_search(&self, state: &FilterState, page: Page) -> SearchResult<FacetSearchResponse> {
        let start_time = Instant::now();

        let query = self.builder.build(state);
        let body = query.to_body(page);
        let response = self.engine.search(&self.target, &body).await?;

        let results = AggregationResults::from_response(&response, &query.aggregations)?;
        let facets = self.aggregator.render(&results, state);
        let (total_hits, hits) = parse_hits(&response)?;

        let search_time_ms = start_time.elapsed().as_millis() as u64;
        debug!(total_hits, search_time_ms, "Search completed");

        Ok(FacetSearchResponse {
            total_hits,
            hits,
            facets,
            search_time_ms,
        })
    }

    /// Name autocomplete
    pub async fn suggest(&self, term: &str) -> SearchResult<Vec<Suggestion>> {
        let result = self.autocomplete.suggest(term).await;
        Self::record("autocomplete", result.is_ok());
        result
    }

    /// Indexed document for a record
    pub async fn document(&self, key: RecordKey) -> SearchResult<IndexDocument> {
        let result = self
            .gateway
            .get(key)
            .await
            .and_then(|doc| doc.ok_or(SearchError::DocumentMissing(key)));
        Self::record("document", result.is_ok());
        result
    }

    /// Number of indexed documents
    pub async fn count(&self) -> SearchResult<u64> {
        Ok(self.engine.count(&self.target).await?)
    }
}

/// Total and hits of a raw search response
///
/// Accepts both the plain number and the `{value, relation}` form of
/// `hits.total`.
fn parse_hits(response: &Value) -> SearchResult<(u64, Vec<SearchHit>)> {
    let hits = response
        .get("hits")
        .ok_or_else(|| SearchError::Query("search response has no hits".to_string()))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .ok_or_else(|| SearchError::Query("search response has no hit total".to_string()))?;

    let entries = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let parsed = entries
        .iter()
        .map(|hit| {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchError::Query("hit without _id".to_string()))?;
            Ok(SearchHit {
                id: id.to_string(),
                source: hit.get("_source").cloned().unwrap_or(Value::Null),
            })
        })
        .collect::<SearchResult<Vec<_>>>()?;

    Ok((total, parsed))
}
