//! In-memory search engine
//!
//! Evaluates the subset of the engine protocol this crate emits: `match_all`,
//! `term`/`terms` and `bool` queries, `terms` and `histogram` aggregations and
//! completion suggestions. Writes are always immediately visible.

use crate::search::engine::{BulkOperation, BulkSummary, IndexTarget, Refresh, SearchEngine};
use crate::search::error::{EngineError, EngineResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct StoredDocument {
    doc_type: String,
    source: Value,
}

#[derive(Debug, Default)]
struct MemoryIndex {
    mappings: HashMap<String, Value>,
    documents: BTreeMap<String, StoredDocument>,
}

/// In-memory engine (for tests and the `memory` backend)
#[derive(Debug, Default)]
pub struct InMemorySearchEngine {
    indices: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping applied to a document type, if any
    pub fn mapping(&self, target: &IndexTarget) -> Option<Value> {
        self.indices
            .read()
            .get(&target.index)
            .and_then(|index| index.mappings.get(&target.doc_type).cloned())
    }

    fn not_found(target: &IndexTarget, id: &str) -> EngineError {
        EngineError::NotFound(format!("{}/{}/{}", target.index, target.doc_type, id))
    }

    fn insert(
        index: &mut MemoryIndex,
        target: &IndexTarget,
        id: &str,
        source: &Value,
    ) -> EngineResult<()> {
        if index.documents.contains_key(id) {
            return Err(EngineError::Conflict(format!(
                "{}/{}/{} already exists",
                target.index, target.doc_type, id
            )));
        }
        index.documents.insert(
            id.to_string(),
            StoredDocument {
                doc_type: target.doc_type.clone(),
                source: source.clone(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl SearchEngine for InMemorySearchEngine {
    async fn index_exists(&self, index: &str) -> EngineResult<bool> {
        Ok(self.indices.read().contains_key(index))
    }

    async fn create_index(&self, index: &str) -> EngineResult<()> {
        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Err(EngineError::Status {
                status: 400,
                body: format!("index_already_exists_exception: {}", index),
            });
        }
        indices.insert(index.to_string(), MemoryIndex::default());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> EngineResult<()> {
        self.indices
            .write()
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(index.to_string()))
    }

    async fn put_mapping(&self, target: &IndexTarget, mapping: &Value) -> EngineResult<()> {
        if !mapping.get("properties").map(Value::is_object).unwrap_or(false) {
            return Err(EngineError::Status {
                status: 400,
                body: "mapper_parsing_exception: mapping has no properties".to_string(),
            });
        }
        let mut indices = self.indices.write();
        let index = indices
            .get_mut(&target.index)
            .ok_or_else(|| EngineError::NotFound(target.index.clone()))?;
        index.mappings.insert(target.doc_type.clone(), mapping.clone());
        Ok(())
    }

    async fn create_document(
        &self,
        target: &IndexTarget,
        id: &str,
        source: &Value,
        _refresh: Refresh,
    ) -> EngineResult<()> {
        let mut indices = self.indices.write();
        let index = indices.entry(target.index.clone()).or_default();
        Self::insert(index, target, id, source)
    }

    async fn update_document(
        &self,
        target: &IndexTarget,
        id: &str,
        partial: &Value,
        _refresh: Refresh,
    ) -> EngineResult<()> {
        let mut indices = self.indices.write();
        let document = indices
            .get_mut(&target.index)
            .and_then(|index| index.documents.get_mut(id))
            .ok_or_else(|| Self::not_found(target, id))?;
        merge(&mut document.source, partial);
        Ok(())
    }

    async fn delete_document(&self, target: &IndexTarget, id: &str, _refresh: Refresh) -> EngineResult<()> {
        self.indices
            .write()
            .get_mut(&target.index)
            .and_then(|index| index.documents.remove(id))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(target, id))
    }

    async fn get_document(&self, target: &IndexTarget, id: &str) -> EngineResult<Option<Value>> {
        Ok(self
            .indices
            .read()
            .get(&target.index)
            .and_then(|index| index.documents.get(id))
            .filter(|doc| doc.doc_type == target.doc_type)
            .map(|doc| doc.source.clone()))
    }

    async fn search(&self, target: &IndexTarget, body: &Value) -> EngineResult<Value> {
        let indices = self.indices.read();
        let index = indices
            .get(&target.index)
            .ok_or_else(|| EngineError::NotFound(target.index.clone()))?;

        let query = body.get("query").cloned().unwrap_or_else(|| json!({"match_all": {}}));
        let mut matched = Vec::new();
        for (id, doc) in &index.documents {
            if doc.doc_type == target.doc_type && matches(&query, &doc.source)? {
                matched.push((id, &doc.source));
            }
        }

        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let hits: Vec<Value> = matched
            .iter()
            .skip(from)
            .take(size)
            .map(|(id, source)| {
                json!({
                    "_index": target.index,
                    "_type": target.doc_type,
                    "_id": id,
                    "_score": 1.0,
                    "_source": source,
                })
            })
            .collect();

        let mut response = json!({
            "took": 0,
            "timed_out": false,
            "hits": { "total": matched.len(), "max_score": 1.0, "hits": hits },
        });

        let aggs = body.get("aggs").or_else(|| body.get("aggregations"));
        if let Some(Value::Object(aggs)) = aggs {
            let sources: Vec<&Value> = matched.iter().map(|(_, source)| *source).collect();
            let mut results = Map::new();
            for (name, spec) in aggs {
                results.insert(name.clone(), aggregate(spec, &sources)?);
            }
            response["aggregations"] = Value::Object(results);
        }

        Ok(response)
    }

    async fn suggest(&self, index: &str, body: &Value) -> EngineResult<Value> {
        let indices = self.indices.read();
        let index = indices
            .get(index)
            .ok_or_else(|| EngineError::NotFound(index.to_string()))?;
        let requests = body
            .as_object()
            .ok_or_else(|| bad_request("suggest body must be an object"))?;

        let mut response = Map::new();
        response.insert("_shards".to_string(), json!({"total": 1, "successful": 1, "failed": 0}));
        for (name, request) in requests {
            let text = request.get("text").and_then(Value::as_str).unwrap_or_default();
            let completion = request
                .get("completion")
                .ok_or_else(|| bad_request("only completion suggesters are supported"))?;
            let field = completion
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| bad_request("completion requires a field"))?;
            let size = completion.get("size").and_then(Value::as_u64).unwrap_or(5) as usize;

            let prefix = text.to_lowercase();
            let mut options: Vec<Value> = index
                .documents
                .values()
                .filter_map(|doc| lookup(&doc.source, field).into_iter().next())
                .filter(|entry| completion_inputs(entry).iter().any(|i| i.starts_with(&prefix)))
                .map(|entry| {
                    let output = entry
                        .get("output")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_default();
                    let mut option = json!({ "text": output, "score": 1.0 });
                    if let Some(payload) = entry.get("payload") {
                        option["payload"] = payload.clone();
                    }
                    option
                })
                .collect();
            options.sort_by(|a, b| a["text"].as_str().cmp(&b["text"].as_str()));
            options.truncate(size);

            response.insert(
                name.clone(),
                json!([{ "text": text, "offset": 0, "length": text.chars().count(), "options": options }]),
            );
        }
        Ok(Value::Object(response))
    }

    async fn count(&self, target: &IndexTarget) -> EngineResult<u64> {
        let indices = self.indices.read();
        let index = indices
            .get(&target.index)
            .ok_or_else(|| EngineError::NotFound(target.index.clone()))?;
        Ok(index
            .documents
            .values()
            .filter(|doc| doc.doc_type == target.doc_type)
            .count() as u64)
    }

    async fn bulk(
        &self,
        target: &IndexTarget,
        operations: &[BulkOperation],
        _refresh: Refresh,
    ) -> EngineResult<BulkSummary> {
        let mut indices = self.indices.write();
        let index = indices.entry(target.index.clone()).or_default();
        let mut summary = BulkSummary::default();
        for operation in operations {
            let outcome = match operation {
                BulkOperation::Create { id, source } => Self::insert(index, target, id, source),
            };
            match outcome {
                Ok(()) => summary.succeeded += 1,
                Err(e) => summary.failed.push((operation.id().to_string(), e.to_string())),
            }
        }
        Ok(summary)
    }
}

fn bad_request(reason: &str) -> EngineError {
    EngineError::Status {
        status: 400,
        body: reason.to_string(),
    }
}

/// Deep-merge `partial` into `target`; objects merge, everything else replaces
fn merge(target: &mut Value, partial: &Value) {
    match (target, partial) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                let nested = value.is_object() && existing.get(key).map(Value::is_object).unwrap_or(false);
                if let Some(slot) = existing.get_mut(key).filter(|_| nested) {
                    merge(slot, value);
                } else {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Leaf values at a dotted path, flattening arrays along the way
fn lookup<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(child) = item.get(segment) {
                            next.push(child);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .filter(|value| !value.is_null())
        .collect()
}

fn term_equals(indexed: &Value, wanted: &Value) -> bool {
    match (indexed, wanted) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
            b.parse::<f64>().ok() == a.as_f64()
        }
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Bool(a), Value::String(b)) => b == &a.to_string(),
        _ => false,
    }
}

fn clause_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
        None => Vec::new(),
    }
}

fn single_entry<'a>(clause: &'a Value, kind: &str) -> EngineResult<(&'a String, &'a Value)> {
    clause
        .as_object()
        .and_then(|map| map.iter().next())
        .ok_or_else(|| bad_request(&format!("{} clause must name a field", kind)))
}

/// Evaluate a query against one document source
fn matches(query: &Value, source: &Value) -> EngineResult<bool> {
    let (kind, clause) = query
        .as_object()
        .and_then(|map| map.iter().next())
        .ok_or_else(|| bad_request("query must be an object with one clause"))?;

    match kind.as_str() {
        "match_all" => Ok(true),
        "term" => {
            let (field, wanted) = single_entry(clause, "term")?;
            let wanted = wanted.get("value").unwrap_or(wanted);
            Ok(lookup(source, field).iter().any(|v| term_equals(v, wanted)))
        }
        "terms" => {
            let (field, wanted) = single_entry(clause, "terms")?;
            let wanted = wanted
                .as_array()
                .ok_or_else(|| bad_request("terms clause requires an array"))?;
            let values = lookup(source, field);
            Ok(wanted.iter().any(|w| values.iter().any(|v| term_equals(v, w))))
        }
        "bool" => {
            for required in clause_list(clause.get("must")).into_iter().chain(clause_list(clause.get("filter"))) {
                if !matches(required, source)? {
                    return Ok(false);
                }
            }
            for excluded in clause_list(clause.get("must_not")) {
                if matches(excluded, source)? {
                    return Ok(false);
                }
            }
            let should = clause_list(clause.get("should"));
            let has_required = clause.get("must").is_some() || clause.get("filter").is_some();
            let minimum = clause
                .get("minimum_should_match")
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(if has_required || should.is_empty() { 0 } else { 1 });
            let mut satisfied = 0;
            for optional in should {
                if matches(optional, source)? {
                    satisfied += 1;
                }
            }
            Ok(satisfied >= minimum)
        }
        other => Err(bad_request(&format!("unsupported query type: {}", other))),
    }
}

/// Compute one aggregation over the matched documents
fn aggregate(spec: &Value, sources: &[&Value]) -> EngineResult<Value> {
    if let Some(terms) = spec.get("terms") {
        let field = terms
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| bad_request("terms aggregation requires a field"))?;
        let size = terms.get("size").and_then(Value::as_i64).unwrap_or(10);

        let mut counts: BTreeMap<String, (Value, u64)> = BTreeMap::new();
        for source in sources {
            let mut seen = Vec::new();
            for value in lookup(source, field) {
                let repr = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(_) | Value::Bool(_) => value.to_string(),
                    _ => continue,
                };
                if seen.contains(&repr) {
                    continue;
                }
                counts.entry(repr.clone()).or_insert_with(|| (value.clone(), 0)).1 += 1;
                seen.push(repr);
            }
        }

        let mut buckets: Vec<(String, Value, u64)> =
            counts.into_iter().map(|(repr, (key, n))| (repr, key, n)).collect();
        buckets.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        if size > 0 {
            buckets.truncate(size as usize);
        }
        let buckets: Vec<Value> = buckets
            .into_iter()
            .map(|(_, key, doc_count)| json!({ "key": key, "doc_count": doc_count }))
            .collect();
        return Ok(json!({ "doc_count_error_upper_bound": 0, "sum_other_doc_count": 0, "buckets": buckets }));
    }

    if let Some(histogram) = spec.get("histogram") {
        let field = histogram
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| bad_request("histogram aggregation requires a field"))?;
        let interval = histogram
            .get("interval")
            .and_then(Value::as_f64)
            .filter(|i| *i > 0.0)
            .ok_or_else(|| bad_request("histogram aggregation requires a positive interval"))?;

        let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
        for source in sources {
            let mut seen = Vec::new();
            for value in lookup(source, field) {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.parse::<f64>().ok(),
                    _ => None,
                };
                let Some(number) = number else { continue };
                let slot = (number / interval).floor() as i64;
                if !seen.contains(&slot) {
                    *counts.entry(slot).or_insert(0) += 1;
                    seen.push(slot);
                }
            }
        }

        let mut buckets = Vec::new();
        if let (Some(first), Some(last)) = (counts.keys().next().copied(), counts.keys().last().copied()) {
            for slot in first..=last {
                let key = slot as f64 * interval;
                let doc_count = counts.get(&slot).copied().unwrap_or(0);
                buckets.push(json!({ "key": key, "doc_count": doc_count }));
            }
        }
        return Ok(json!({ "buckets": buckets }));
    }

    Err(bad_request("unsupported aggregation"))
}

fn completion_inputs(entry: &Value) -> Vec<String> {
    match entry.get("input") {
        Some(Value::String(s)) => vec![s.to_lowercase()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect(),
        _ => Vec::new(),
    }
}
