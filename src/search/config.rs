//! Search configuration

use crate::search::engine::IndexTarget;
use serde::{Deserialize, Serialize};

/// Which engine implementation backs the search layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineBackend {
    #[default]
    Http,
    Memory,
}

/// How several selected values of the same facet combine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MultiValueMode {
    /// A document matches when it has any of the selected values
    #[default]
    Any,
    /// A document must carry every selected value
    All,
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Engine implementation
    pub backend: EngineBackend,

    /// Base URL of the engine's REST API
    pub engine_url: String,

    /// Basic auth user
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Index holding the student documents
    pub index_name: String,

    /// Document type inside the index
    pub doc_type: String,

    /// Same-field multi-select semantics
    pub multi_value_mode: MultiValueMode,

    /// Hits returned per search
    pub max_results: usize,

    /// Options returned per autocomplete request
    pub suggest_size: usize,

    /// Dependent writes in flight during propagation
    pub propagation_concurrency: usize,

    /// Documents per bulk request during reindexing
    pub bulk_batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::Http,
            engine_url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 10,
            index_name: "students".to_string(),
            doc_type: "student".to_string(),
            multi_value_mode: MultiValueMode::Any,
            max_results: 20,
            suggest_size: 10,
            propagation_concurrency: 1,
            bulk_batch_size: 500,
        }
    }
}

impl SearchConfig {
    /// Index and document type documents are written to
    pub fn target(&self) -> IndexTarget {
        IndexTarget::new(&self.index_name, &self.doc_type)
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn backend(mut self, backend: EngineBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn engine_url(mut self, url: impl Into<String>) -> Self {
        self.config.engine_url = url.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.config.doc_type = doc_type.into();
        self
    }

    pub fn multi_value_mode(mut self, mode: MultiValueMode) -> Self {
        self.config.multi_value_mode = mode;
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.config.max_results = max;
        self
    }

    pub fn suggest_size(mut self, size: usize) -> Self {
        self.config.suggest_size = size;
        self
    }

    pub fn propagation_concurrency(mut self, concurrency: usize) -> Self {
        self.config.propagation_concurrency = concurrency.max(1);
        self
    }

    pub fn bulk_batch_size(mut self, size: usize) -> Self {
        self.config.bulk_batch_size = size.max(1);
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
