//! HTTP client for the engine's typed REST API

use crate::search::config::SearchConfig;
use crate::search::engine::{BulkOperation, BulkSummary, IndexTarget, Refresh, SearchEngine};
use crate::search::error::{EngineError, EngineResult};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Engine client speaking JSON over HTTP
#[derive(Clone)]
pub struct HttpSearchEngine {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl HttpSearchEngine {
    /// Create a new client from configuration
    pub fn new(config: &SearchConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.engine_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(method = %method, url = %url, "Engine request");
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> EngineResult<Response> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Transport(format!("Engine request timed out: {}", e))
            } else if e.is_connect() {
                EngineError::Transport(format!("Failed to connect to engine: {}", e))
            } else {
                EngineError::Transport(format!("Engine request failed: {}", e))
            }
        })
    }

    /// Turn a non-success status into the matching error
    async fn check(response: Response, what: &str) -> EngineResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => EngineError::NotFound(what.to_string()),
            StatusCode::CONFLICT => EngineError::Conflict(what.to_string()),
            _ => EngineError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn json_body(response: Response) -> EngineResult<Value> {
        response.json::<Value>().await.map_err(EngineError::from)
    }

    fn doc_path(target: &IndexTarget, id: &str) -> String {
        format!("{}/{}/{}", target.index, target.doc_type, id)
    }
}

#[async_trait]
impl SearchEngine for HttpSearchEngine {
    async fn index_exists(&self, index: &str) -> EngineResult<bool> {
        let response = Self::send(self.request(Method::HEAD, index)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(EngineError::Status {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn create_index(&self, index: &str) -> EngineResult<()> {
        let response = Self::send(self.request(Method::PUT, index)).await?;
        Self::check(response, index).await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> EngineResult<()> {
        let response = Self::send(self.request(Method::DELETE, index)).await?;
        Self::check(response, index).await?;
        Ok(())
    }

    async fn put_mapping(&self, target: &IndexTarget, mapping: &Value) -> EngineResult<()> {
        let path = format!("{}/_mapping/{}", target.index, target.doc_type);
        let response = Self::send(self.request(Method::PUT, &path).json(mapping)).await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    async fn create_document(
        &self,
        target: &IndexTarget,
        id: &str,
        source: &Value,
        refresh: Refresh,
    ) -> EngineResult<()> {
        let path = format!(
            "{}/_create?refresh={}",
            Self::doc_path(target, id),
            refresh.as_param()
        );
        let response = Self::send(self.request(Method::PUT, &path).json(source)).await?;
        Self::check(response, &Self::doc_path(target, id)).await?;
        Ok(())
    }

    async fn update_document(
        &self,
        target: &IndexTarget,
        id: &str,
        partial: &Value,
        refresh: Refresh,
    ) -> EngineResult<()> {
        let path = format!(
            "{}/_update?refresh={}",
            Self::doc_path(target, id),
            refresh.as_param()
        );
        let body = json!({ "doc": partial });
        let response = Self::send(self.request(Method::POST, &path).json(&body)).await?;
        Self::check(response, &Self::doc_path(target, id)).await?;
        Ok(())
    }

    async fn delete_document(&self, target: &IndexTarget, id: &str, refresh: Refresh) -> EngineResult<()> {
        let path = format!("{}?refresh={}", Self::doc_path(target, id), refresh.as_param());
        let response = Self::send(self.request(Method::DELETE, &path)).await?;
        Self::check(response, &Self::doc_path(target, id)).await?;
        Ok(())
    }

    async fn get_document(&self, target: &IndexTarget, id: &str) -> EngineResult<Option<Value>> {
        let path = Self::doc_path(target, id);
        let response = Self::send(self.request(Method::GET, &path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::json_body(Self::check(response, &path).await?).await?;
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(body.get("_source").cloned())
    }

    async fn search(&self, target: &IndexTarget, body: &Value) -> EngineResult<Value> {
        let path = format!("{}/{}/_search", target.index, target.doc_type);
        let response = Self::send(self.request(Method::POST, &path).json(body)).await?;
        Self::json_body(Self::check(response, &path).await?).await
    }

    async fn suggest(&self, index: &str, body: &Value) -> EngineResult<Value> {
        let path = format!("{}/_suggest", index);
        let response = Self::send(self.request(Method::POST, &path).json(body)).await?;
        Self::json_body(Self::check(response, &path).await?).await
    }

    async fn count(&self, target: &IndexTarget) -> EngineResult<u64> {
        let path = format!("{}/{}/_count", target.index, target.doc_type);
        let response = Self::send(self.request(Method::GET, &path)).await?;
        let body = Self::json_body(Self::check(response, &path).await?).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| EngineError::Decode("count response has no 'count'".to_string()))
    }

    async fn bulk(
        &self,
        target: &IndexTarget,
        operations: &[BulkOperation],
        refresh: Refresh,
    ) -> EngineResult<BulkSummary> {
        if operations.is_empty() {
            return Ok(BulkSummary::default());
        }

        let mut payload = String::new();
        for operation in operations {
            let meta = json!({
                "_index": target.index,
                "_type": target.doc_type,
                "_id": operation.id(),
            });
            match operation {
                BulkOperation::Create { source, .. } => {
                    payload.push_str(&json!({ "create": meta }).to_string());
                    payload.push('\n');
                    payload.push_str(&source.to_string());
                    payload.push('\n');
                }
            }
        }

        let path = format!("_bulk?refresh={}", refresh.as_param());
        let response = Self::send(
            self.request(Method::POST, &path)
                .header("Content-Type", "application/x-ndjson")
                .body(payload),
        )
        .await?;
        let body = Self::json_body(Self::check(response, "_bulk").await?).await?;
        Ok(parse_bulk_response(&body))
    }
}

/// Summarise a bulk response's per-item results
fn parse_bulk_response(body: &Value) -> BulkSummary {
    let mut summary = BulkSummary::default();
    let items = body.get("items").and_then(Value::as_array);
    for item in items.into_iter().flatten() {
        let Some(result) = item.as_object().and_then(|o| o.values().next()) else {
            continue;
        };
        let id = result
            .get("_id")
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_default();
        match result.get("error") {
            Some(error) if !error.is_null() => summary.failed.push((id, error.to_string())),
            _ => summary.succeeded += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_for(url: &str) -> HttpSearchEngine {
        let config = SearchConfig {
            engine_url: url.to_string(),
            ..Default::default()
        };
        HttpSearchEngine::new(&config).unwrap()
    }

    fn target() -> IndexTarget {
        IndexTarget::new("students", "student")
    }

    #[test]
    fn test_parse_bulk_response() {
        let body = json!({
            "errors": true,
            "items": [
                {"create": {"_id": "1", "status": 201}},
                {"create": {"_id": "2", "status": 409, "error": {"type": "document_already_exists_exception"}}},
                {"create": {"_id": "3", "status": 201}},
            ]
        });
        let summary = parse_bulk_response(&body);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "2");
    }

    #[tokio::test]
    async fn test_index_exists_maps_404_to_false() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/students")
            .with_status(404)
            .create_async()
            .await;

        let engine = engine_for(&server.url());
        assert!(!engine.index_exists("students").await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_document_requests_refresh() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/students/student/5/_create")
            .match_query(mockito::Matcher::UrlEncoded("refresh".into(), "true".into()))
            .match_body(mockito::Matcher::Json(json!({"first_name": "Ada"})))
            .with_status(201)
            .with_body(r#"{"created": true}"#)
            .create_async()
            .await;

        let engine = engine_for(&server.url());
        engine
            .create_document(&target(), "5", &json!({"first_name": "Ada"}), Refresh::Immediate)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_wraps_partial_in_doc() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/students/student/5/_update")
            .match_query(mockito::Matcher::UrlEncoded("refresh".into(), "true".into()))
            .match_body(mockito::Matcher::Json(json!({"doc": {"university": {"name": "MIT"}}})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let engine = engine_for(&server.url());
        engine
            .update_document(
                &target(),
                "5",
                &json!({"university": {"name": "MIT"}}),
                Refresh::Immediate,
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/students/student/9/_update")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": "document_missing_exception"}"#)
            .create_async()
            .await;

        let engine = engine_for(&server.url());
        let err = engine
            .update_document(&target(), "9", &json!({}), Refresh::Immediate)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_document_returns_source() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/students/student/3")
            .with_status(200)
            .with_body(r#"{"_id": "3", "found": true, "_source": {"age": 19}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/students/student/4")
            .with_status(404)
            .with_body(r#"{"_id": "4", "found": false}"#)
            .create_async()
            .await;

        let engine = engine_for(&server.url());
        assert_eq!(
            engine.get_document(&target(), "3").await.unwrap(),
            Some(json!({"age": 19}))
        );
        assert_eq!(engine.get_document(&target(), "4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_count() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/students/student/_count")
            .with_status(200)
            .with_body(r#"{"count": 42}"#)
            .create_async()
            .await;

        let engine = engine_for(&server.url());
        assert_eq!(engine.count(&target()).await.unwrap(), 42);
    }
}
