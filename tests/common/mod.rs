//! Common test utilities
//!
//! Wires the propagator, search service and in-memory engine/store the way
//! the server does, plus an engine wrapper that rejects writes for chosen
//! documents.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::RwLock;
use roster_search::models::{Course, RecordKey, Student, University, YearInSchool};
use roster_search::search::{
    student_mapping, student_projector, BulkOperation, BulkSummary, EngineError, EngineResult,
    IndexSchemaManager, IndexTarget, IndexWriteGateway, InMemorySearchEngine, Refresh,
    SearchConfig, SearchEngine, SearchService,
};
use roster_search::state::InMemoryStore;
use roster_search::sync::{ChangePropagator, DomainEvent, Propagated, Reindexer, SyncResult};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Delegates to the in-memory engine but fails writes for chosen ids
#[derive(Default)]
pub struct FailingEngine {
    inner: InMemorySearchEngine,
    failing: RwLock<HashSet<String>>,
}

impl FailingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_for(&self, key: RecordKey) {
        self.failing.write().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing.write().clear();
    }

    fn check(&self, id: &str) -> EngineResult<()> {
        if self.failing.read().contains(id) {
            return Err(EngineError::Transport(format!("injected failure for {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchEngine for FailingEngine {
    async fn index_exists(&self, index: &str) -> EngineResult<bool> {
        self.inner.index_exists(index).await
    }

    async fn create_index(&self, index: &str) -> EngineResult<()> {
        self.inner.create_index(index).await
    }

    async fn delete_index(&self, index: &str) -> EngineResult<()> {
        self.inner.delete_index(index).await
    }

    async fn put_mapping(&self, target: &IndexTarget, mapping: &Value) -> EngineResult<()> {
        self.inner.put_mapping(target, mapping).await
    }

    async fn create_document(
        &self,
        target: &IndexTarget,
        id: &str,
        source: &Value,
        refresh: Refresh,
    ) -> EngineResult<()> {
        self.check(id)?;
        self.inner.create_document(target, id, source, refresh).await
    }

    async fn update_document(
        &self,
        target: &IndexTarget,
        id: &str,
        partial: &Value,
        refresh: Refresh,
    ) -> EngineResult<()> {
        self.check(id)?;
        self.inner.update_document(target, id, partial, refresh).await
    }

    async fn delete_document(&self, target: &IndexTarget, id: &str, refresh: Refresh) -> EngineResult<()> {
        self.check(id)?;
        self.inner.delete_document(target, id, refresh).await
    }

    async fn get_document(&self, target: &IndexTarget, id: &str) -> EngineResult<Option<Value>> {
        self.inner.get_document(target, id).await
    }

    async fn search(&self, target: &IndexTarget, body: &Value) -> EngineResult<Value> {
        self.inner.search(target, body).await
    }

    async fn suggest(&self, index: &str, body: &Value) -> EngineResult<Value> {
        self.inner.suggest(index, body).await
    }

    async fn count(&self, target: &IndexTarget) -> EngineResult<u64> {
        self.inner.count(target).await
    }

    async fn bulk(
        &self,
        target: &IndexTarget,
        operations: &[BulkOperation],
        refresh: Refresh,
    ) -> EngineResult<BulkSummary> {
        self.inner.bulk(target, operations, refresh).await
    }
}

/// Store, engine and the components wired on top of them
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub engine: Arc<FailingEngine>,
    pub propagator: ChangePropagator,
    pub search: SearchService,
    pub gateway: IndexWriteGateway,
    pub config: SearchConfig,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(SearchConfig::default()).await
    }

    pub async fn with_config(config: SearchConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let engine = Arc::new(FailingEngine::new());
        let target = config.target();

        IndexSchemaManager::new(engine.clone(), target.clone(), student_mapping())
            .reprovision()
            .await
            .expect("reprovision test index");

        let gateway = IndexWriteGateway::new(engine.clone(), target);
        let propagator = ChangePropagator::new(
            Arc::new(student_projector()),
            gateway.clone(),
            store.clone(),
        )
        .with_concurrency(config.propagation_concurrency);
        let search = SearchService::new(engine.clone(), config.clone());

        Self {
            store,
            engine,
            propagator,
            search,
            gateway,
            config,
        }
    }

    /// Commit-then-index, as a mutation path would
    pub async fn apply(&self, event: roster_search::Result<DomainEvent>) -> SyncResult<Propagated> {
        let event = event.expect("store mutation");
        self.propagator.handle(&event).await
    }

    pub fn reindexer(&self) -> Reindexer {
        let target = self.config.target();
        Reindexer::new(
            IndexSchemaManager::new(self.engine.clone(), target.clone(), student_mapping()),
            Arc::new(student_projector()),
            self.gateway.clone(),
            self.store.clone(),
        )
        .with_batch_size(self.config.bulk_batch_size)
    }

    /// Two universities, three courses, four students, all indexed
    pub async fn seeded() -> Self {
        let harness = Self::new().await;
        harness.seed().await;
        harness
    }

    pub async fn seed(&self) {
        for university in [University::new(1, "MIT"), University::new(2, "CalTech")] {
            self.apply(self.store.save_university(university)).await.unwrap();
        }
        for course in [Course::new(10, "CS101"), Course::new(11, "MATH101"), Course::new(12, "PHYS101")] {
            self.apply(self.store.save_course(course)).await.unwrap();
        }
        for student in fixture_students() {
            self.apply(self.store.save_student(student)).await.unwrap();
        }
    }
}

pub fn fixture_students() -> Vec<Student> {
    vec![
        Student::new(1, "Ada", "Lovelace", 17, YearInSchool::FR)
            .with_university(1)
            .with_courses([10]),
        Student::new(2, "Alan", "Turing", 18, YearInSchool::FR)
            .with_university(1)
            .with_courses([10, 11]),
        Student::new(3, "Grace", "Hopper", 19, YearInSchool::SO)
            .with_university(2)
            .with_courses([11]),
        Student::new(4, "Edsger", "Dijkstra", 20, YearInSchool::JR).with_courses([12]),
    ]
}
