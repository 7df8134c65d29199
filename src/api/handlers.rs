use crate::api::AppState;
use crate::error::Result;
use crate::metrics::gather_metrics;
use crate::models::RecordKey;
use crate::search::{FacetSearchResponse, FilterState, Page, SearchHit, Suggestion};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

/// Health check endpoint
///
/// Reports `degraded` instead of failing when the engine is unreachable.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, indexed_documents) = match state.search.count().await {
        Ok(count) => ("healthy", Some(count)),
        Err(e) => {
            tracing::warn!(error = %e, "Search engine health probe failed");
            ("degraded", None)
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        indexed_documents,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub indexed_documents: Option<u64>,
}

/// Prometheus exposition endpoint
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

/// Faceted search; `from` and `size` page the hits, every other query
/// parameter selects facet values, comma-separated
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<FacetSearchResponse>> {
    let page = Page::from_query_pairs(params.iter().cloned(), state.search.config().max_results)?;
    let filters = FilterState::from_query_pairs(params)?;
    let response = state.search.search_page(&filters, page).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteParams {
    #[serde(default)]
    pub term: String,
}

/// Name autocomplete; a missing or blank term yields no suggestions
pub async fn autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<Vec<Suggestion>>> {
    let suggestions = state.search.suggest(&params.term).await?;
    Ok(Json(suggestions))
}

/// Indexed document of a student
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<RecordKey>,
) -> Result<Json<SearchHit>> {
    let document = state.search.document(id).await?;
    Ok(Json(SearchHit {
        id: document.id(),
        source: document.source(),
    }))
}
