//! Facet result aggregation
//!
//! Turns aggregation buckets into navigable facet options. Each option
//! carries the filter state a click would produce: its value toggled.

use crate::search::error::{SearchError, SearchResult};
use crate::search::query::{AggregationSpec, FacetKind, FilterState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Bucket of a terms aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsBucket {
    pub key: String,
    pub doc_count: u64,
}

/// Bucket of a histogram aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub key: f64,
    pub doc_count: u64,
}

/// Buckets returned for one facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetBuckets {
    Terms(Vec<TermsBucket>),
    Histogram(Vec<HistogramBucket>),
}

/// Parsed aggregation section of a search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResults {
    pub facets: BTreeMap<String, FacetBuckets>,
}

impl AggregationResults {
    /// Extract every requested aggregation from a raw search response
    pub fn from_response(response: &Value, spec: &AggregationSpec) -> SearchResult<Self> {
        let aggregations = response
            .get("aggregations")
            .ok_or_else(|| SearchError::Query("search response has no aggregations".to_string()))?;

        let mut facets = BTreeMap::new();
        for facet in &spec.facets {
            let buckets = aggregations
                .get(&facet.name)
                .and_then(|agg| agg.get("buckets"))
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    SearchError::Query(format!("aggregation '{}' missing from response", facet.name))
                })?;

            let parsed = match facet.kind {
                FacetKind::Terms => FacetBuckets::Terms(
                    buckets
                        .iter()
                        .map(|bucket| {
                            Ok(TermsBucket {
                                key: bucket_key_string(bucket)?,
                                doc_count: doc_count(bucket)?,
                            })
                        })
                        .collect::<SearchResult<_>>()?,
                ),
                FacetKind::Histogram { .. } => FacetBuckets::Histogram(
                    buckets
                        .iter()
                        .map(|bucket| {
                            let key = bucket.get("key").and_then(Value::as_f64).ok_or_else(|| {
                                SearchError::Query("histogram bucket without numeric key".to_string())
                            })?;
                            Ok(HistogramBucket {
                                key,
                                doc_count: doc_count(bucket)?,
                            })
                        })
                        .collect::<SearchResult<_>>()?,
                ),
            };
            facets.insert(facet.name.clone(), parsed);
        }

        Ok(Self { facets })
    }
}

fn doc_count(bucket: &Value) -> SearchResult<u64> {
    bucket
        .get("doc_count")
        .and_then(Value::as_u64)
        .ok_or_else(|| SearchError::Query("bucket without doc_count".to_string()))
}

fn bucket_key_string(bucket: &Value) -> SearchResult<String> {
    if let Some(key) = bucket.get("key_as_string").and_then(Value::as_str) {
        return Ok(key.to_string());
    }
    match bucket.get("key") {
        Some(Value::String(key)) => Ok(key.clone()),
        Some(Value::Number(key)) => Ok(key.to_string()),
        Some(Value::Bool(key)) => Ok(key.to_string()),
        _ => Err(SearchError::Query("terms bucket without key".to_string())),
    }
}

/// One navigable facet value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetOption {
    /// Bucket key shown to the user
    pub name: String,
    /// Matching documents
    pub count: u64,
    /// Whether the value is part of the current filter
    pub is_active: bool,
    /// Query string with this value toggled
    pub url_args: String,
}

/// Facet entries for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetGroup {
    Options(Vec<FacetOption>),
    Histogram(Vec<HistogramBucket>),
}

impl FacetGroup {
    pub fn options(&self) -> Option<&[FacetOption]> {
        match self {
            FacetGroup::Options(options) => Some(options),
            FacetGroup::Histogram(_) => None,
        }
    }
}

/// Facet navigation model handed to presentation
pub type FacetModel = BTreeMap<String, FacetGroup>;

/// Compute a bucket's toggled filter state and active flag
pub fn toggle_option(state: &FilterState, field: &str, value: &str) -> (FilterState, bool) {
    let mut toggled = state.clone();
    let was_active = toggled.toggle(field, value);
    (toggled, was_active)
}

/// Renders aggregation buckets into facet options
#[derive(Debug, Clone, Copy, Default)]
pub struct FacetResultAggregator;

impl FacetResultAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, results: &AggregationResults, state: &FilterState) -> FacetModel {
        let mut model = FacetModel::new();
        for (field, buckets) in &results.facets {
            let group = match buckets {
                FacetBuckets::Histogram(buckets) => FacetGroup::Histogram(buckets.clone()),
                FacetBuckets::Terms(buckets) => FacetGroup::Options(
                    buckets
                        .iter()
                        .map(|bucket| {
                            let (toggled, is_active) = toggle_option(state, field, &bucket.key);
                            FacetOption {
                                name: bucket.key.clone(),
                                count: bucket.doc_count,
                                is_active,
                                url_args: toggled.to_query_string(),
                            }
                        })
                        .collect(),
                ),
            };
            model.insert(field.clone(), group);
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::config::MultiValueMode;
    use crate::search::query::FacetQueryBuilder;
    use serde_json::json;

    fn spec() -> AggregationSpec {
        FacetQueryBuilder::for_students(MultiValueMode::Any)
            .build(&FilterState::new())
            .aggregations
    }

    fn response() -> Value {
        json!({
            "hits": {"total": 4, "hits": []},
            "aggregations": {
                "year_in_school": {"buckets": [
                    {"key": "FR", "doc_count": 3},
                    {"key": "SO", "doc_count": 1}
                ]},
                "course_names": {"buckets": [
                    {"key": "CS101", "doc_count": 2}
                ]},
                "university__name": {"buckets": []},
                "age": {"buckets": [
                    {"key": 16.0, "doc_count": 1},
                    {"key": 18.0, "doc_count": 2},
                    {"key": 20.0, "doc_count": 1}
                ]}
            }
        })
    }

    #[test]
    fn test_toggle_off_active_value() {
        let state = FilterState::new()
            .with("year_in_school", "FR")
            .with("course_names", "CS101");
        let results = AggregationResults::from_response(&response(), &spec()).unwrap();
        let model = FacetResultAggregator::new().render(&results, &state);

        let years = model["year_in_school"].options().unwrap();
        let fr = years.iter().find(|o| o.name == "FR").unwrap();
        assert!(fr.is_active);
        assert_eq!(fr.count, 3);
        assert_eq!(fr.url_args, "course_names=CS101");

        let so = years.iter().find(|o| o.name == "SO").unwrap();
        assert!(!so.is_active);
        assert_eq!(so.url_args, "course_names=CS101&year_in_school=FR%2CSO");

        let courses = model["course_names"].options().unwrap();
        assert!(courses[0].is_active);
        assert_eq!(courses[0].url_args, "year_in_school=FR");
    }

    #[test]
    fn test_histogram_passes_through() {
        let results = AggregationResults::from_response(&response(), &spec()).unwrap();
        let model = FacetResultAggregator::new().render(&results, &FilterState::new());

        match &model["age"] {
            FacetGroup::Histogram(buckets) => {
                assert_eq!(buckets.len(), 3);
                assert_eq!(buckets[0], HistogramBucket { key: 16.0, doc_count: 1 });
            }
            other => panic!("expected histogram, got {:?}", other),
        }
        assert!(model["university__name"].options().unwrap().is_empty());
    }

    #[test]
    fn test_option_order_follows_buckets() {
        let results = AggregationResults::from_response(&response(), &spec()).unwrap();
        let model = FacetResultAggregator::new().render(&results, &FilterState::new());
        let names: Vec<&str> = model["year_in_school"]
            .options()
            .unwrap()
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["FR", "SO"]);
    }

    #[test]
    fn test_missing_aggregation_is_a_query_error() {
        let mut response = response();
        response["aggregations"].as_object_mut().unwrap().remove("age");
        let err = AggregationResults::from_response(&response, &spec()).unwrap_err();
        assert!(matches!(err, SearchError::Query(_)));

        let err = AggregationResults::from_response(&json!({"hits": {}}), &spec()).unwrap_err();
        assert!(matches!(err, SearchError::Query(_)));
    }

    #[test]
    fn test_numeric_terms_keys_become_strings() {
        let bucket = json!({"key": 18, "doc_count": 2});
        assert_eq!(bucket_key_string(&bucket).unwrap(), "18");
        let bucket = json!({"key": 1, "key_as_string": "true", "doc_count": 2});
        assert_eq!(bucket_key_string(&bucket).unwrap(), "true");
    }

    #[test]
    fn test_serialized_model_shape() {
        let results = AggregationResults::from_response(&response(), &spec()).unwrap();
        let model = FacetResultAggregator::new().render(&results, &FilterState::new());
        let value = serde_json::to_value(&model).unwrap();

        assert_eq!(value["age"][1], json!({"key": 18.0, "doc_count": 2}));
        assert_eq!(
            value["year_in_school"][0],
            json!({"name": "FR", "count": 3, "is_active": false, "url_args": "year_in_school=FR"})
        );
    }
}
