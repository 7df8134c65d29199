//! Facet query building
//!
//! Turns the active filter selections of a request into a boolean filter
//! query plus the fixed set of facet aggregations.

use crate::models::FACET_VALUE_SEPARATOR;
use crate::search::config::MultiValueMode;
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Request parameters read by [`Page`] instead of selecting facet values
pub const RESERVED_PARAMS: &[&str] = &["size", "from"];

/// Slice of the hit list a search returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub from: usize,
    pub size: usize,
}

impl Page {
    /// First page of `size` hits
    pub fn first(size: usize) -> Self {
        Self { from: 0, size }
    }

    /// Read `from` and `size` from request parameters
    ///
    /// Missing keys fall back to the first page of `max_size`; a larger
    /// `size` is clamped to `max_size`.
    pub fn from_query_pairs<I, K, V>(pairs: I, max_size: usize) -> SearchResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut page = Self::first(max_size);
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "from" => &mut page.from,
                "size" => &mut page.size,
                _ => continue,
            };
            *slot = value.as_ref().trim().parse().map_err(|_| {
                SearchError::Query(format!(
                    "'{}' must be a non-negative integer, got '{}'",
                    key.as_ref(),
                    value.as_ref()
                ))
            })?;
        }
        page.size = page.size.min(max_size);
        Ok(page)
    }
}

/// Bucket count used for "unbounded" terms aggregations
pub const UNBOUNDED_BUCKETS: i64 = i32::MAX as i64;

/// Translate a facet name to the engine's nested-path syntax
///
/// `university__name` becomes `university.name`.
pub fn engine_path(facet: &str) -> String {
    facet.replace("__", ".")
}

/// Selected values per facet field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    selections: BTreeMap<String, BTreeSet<String>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse request parameters, each a comma-separated value list
    pub fn from_query_pairs<I, K, V>(pairs: I) -> SearchResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut state = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            if RESERVED_PARAMS.contains(&key) {
                continue;
            }
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(SearchError::Query(format!("invalid facet field name: '{}'", key)));
            }
            for item in value.as_ref().split(FACET_VALUE_SEPARATOR) {
                let item = item.trim();
                if !item.is_empty() {
                    state.select(key, item);
                }
            }
        }
        Ok(state)
    }

    /// Add a value to a field's selection
    pub fn select(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.selections.entry(field.into()).or_default().insert(value.into());
    }

    /// Builder-style [`FilterState::select`]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.select(field, value);
        self
    }

    /// Remove a value; a field left without values disappears
    pub fn deselect(&mut self, field: &str, value: &str) -> bool {
        let Some(values) = self.selections.get_mut(field) else {
            return false;
        };
        let removed = values.remove(value);
        if values.is_empty() {
            self.selections.remove(field);
        }
        removed
    }

    /// Flip a value; returns whether it was selected before the flip
    pub fn toggle(&mut self, field: &str, value: &str) -> bool {
        if self.is_selected(field, value) {
            self.deselect(field, value);
            true
        } else {
            self.select(field, value);
            false
        }
    }

    pub fn is_selected(&self, field: &str, value: &str) -> bool {
        self.selections
            .get(field)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn values(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.selections.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.selections.iter().map(|(field, values)| (field.as_str(), values))
    }

    /// Form-urlencoded query string, keys sorted, values comma-joined
    pub fn to_query_string(&self) -> String {
        let separator = FACET_VALUE_SEPARATOR.to_string();
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (field, values) in &self.selections {
            let joined = values.iter().map(String::as_str).collect::<Vec<_>>().join(&separator);
            serializer.append_pair(field, &joined);
        }
        serializer.finish()
    }
}

/// One conjunct of the filter query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterClause {
    /// Field equals value
    Term { field: String, value: String },
    /// Field equals one of the values
    AnyOf { field: String, values: Vec<String> },
}

impl FilterClause {
    pub fn to_json(&self) -> Value {
        match self {
            FilterClause::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            FilterClause::AnyOf { field, values } => {
                let terms: Vec<Value> = values
                    .iter()
                    .map(|value| json!({ "term": { field.as_str(): value } }))
                    .collect();
                json!({ "bool": { "should": terms, "minimum_should_match": 1 } })
            }
        }
    }
}

/// Structured filter query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterQuery {
    /// Every document matches
    MatchAll,
    /// Every clause must match
    All(Vec<FilterClause>),
}

impl FilterQuery {
    pub fn to_json(&self) -> Value {
        match self {
            FilterQuery::MatchAll => json!({ "match_all": {} }),
            FilterQuery::All(clauses) => {
                let must: Vec<Value> = clauses.iter().map(FilterClause::to_json).collect();
                json!({ "bool": { "must": must } })
            }
        }
    }
}

/// Aggregation kind of a facet field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FacetKind {
    /// Discrete values with toggle links
    Terms,
    /// Numeric buckets of a fixed width, informational only
    Histogram { interval: f64 },
}

/// A facet dimension exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetField {
    /// Facet name as used in request parameters
    pub name: String,
    pub kind: FacetKind,
}

impl FacetField {
    pub fn terms(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FacetKind::Terms,
        }
    }

    pub fn histogram(name: impl Into<String>, interval: f64) -> Self {
        Self {
            name: name.into(),
            kind: FacetKind::Histogram { interval },
        }
    }

    /// Engine path of the underlying field
    pub fn path(&self) -> String {
        engine_path(&self.name)
    }

    /// Aggregation request body
    pub fn aggregation_json(&self) -> Value {
        match self.kind {
            FacetKind::Terms => json!({
                "terms": { "field": self.path(), "size": UNBOUNDED_BUCKETS }
            }),
            FacetKind::Histogram { interval } => json!({
                "histogram": { "field": self.path(), "interval": interval }
            }),
        }
    }
}

/// Facets of the student index
pub fn student_facets() -> Vec<FacetField> {
    vec![
        FacetField::terms("course_names"),
        FacetField::terms("university__name"),
        FacetField::terms("year_in_school"),
        FacetField::histogram("age", 2.0),
    ]
}

/// Fixed aggregation requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub facets: Vec<FacetField>,
}

impl AggregationSpec {
    pub fn get(&self, name: &str) -> Option<&FacetField> {
        self.facets.iter().find(|facet| facet.name == name)
    }

    pub fn to_json(&self) -> Value {
        let mut aggs = serde_json::Map::new();
        for facet in &self.facets {
            aggs.insert(facet.name.clone(), facet.aggregation_json());
        }
        Value::Object(aggs)
    }
}

/// Output of [`FacetQueryBuilder::build`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetQuery {
    pub filter: FilterQuery,
    pub aggregations: AggregationSpec,
}

impl FacetQuery {
    /// Search request body
    pub fn to_body(&self, page: Page) -> Value {
        json!({
            "query": self.filter.to_json(),
            "aggs": self.aggregations.to_json(),
            "from": page.from,
            "size": page.size,
        })
    }
}

/// Builds filter queries and aggregation specs from filter state
#[derive(Debug, Clone)]
pub struct FacetQueryBuilder {
    facets: Vec<FacetField>,
    mode: MultiValueMode,
}

impl FacetQueryBuilder {
    pub fn new(facets: Vec<FacetField>, mode: MultiValueMode) -> Self {
        Self { facets, mode }
    }

    /// Builder for the student facets
    pub fn for_students(mode: MultiValueMode) -> Self {
        Self::new(student_facets(), mode)
    }

    pub fn facets(&self) -> &[FacetField] {
        &self.facets
    }

    pub fn build(&self, state: &FilterState) -> FacetQuery {
        FacetQuery {
            filter: self.filter(state),
            aggregations: AggregationSpec {
                facets: self.facets.clone(),
            },
        }
    }

    fn filter(&self, state: &FilterState) -> FilterQuery {
        if state.is_empty() {
            return FilterQuery::MatchAll;
        }

        let mut clauses = Vec::new();
        for (facet, values) in state.iter() {
            let field = engine_path(facet);
            match (self.mode, values.len()) {
                (_, 0) => {}
                (MultiValueMode::Any, n) if n > 1 => clauses.push(FilterClause::AnyOf {
                    field,
                    values: values.iter().cloned().collect(),
                }),
                _ => clauses.extend(values.iter().map(|value| FilterClause::Term {
                    field: field.clone(),
                    value: value.clone(),
                })),
            }
        }
        FilterQuery::All(clauses)
    }
}
