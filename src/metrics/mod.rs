//! Prometheus metrics for index synchronization and search.
//!
//! Collectors live in a dedicated registry and are exported in the text
//! exposition format by the `/metrics` endpoint.
//!
//! # Example
//! ```no_run
//! use roster_search::metrics::INDEX_WRITES_TOTAL;
//!
//! INDEX_WRITES_TOTAL
//!     .with_label_values(&["create", "success"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Opts, Registry};

const NAMESPACE: &str = "roster_search";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Index writes issued by the write gateway
    ///
    /// Labels: operation (create, update, delete, bulk_create), outcome
    pub static ref INDEX_WRITES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("index_writes_total", "Total number of index write operations")
            .namespace(NAMESPACE),
        &["operation", "outcome"]
    ).expect("Failed to create INDEX_WRITES_TOTAL metric");

    /// Dependent documents that could not be refreshed after a referenced
    /// entity changed
    ///
    /// Labels: entity_kind
    pub static ref PROPAGATION_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("propagation_failures_total", "Total number of failed dependent document updates")
            .namespace(NAMESPACE),
        &["entity_kind"]
    ).expect("Failed to create PROPAGATION_FAILURES_TOTAL metric");

    /// Read requests served by the search service
    ///
    /// Labels: endpoint (search, autocomplete, document), outcome
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["endpoint", "outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");
}

/// Register every collector with [`PROMETHEUS_REGISTRY`]
///
/// Calling this more than once is harmless.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
        Box::new(INDEX_WRITES_TOTAL.clone()),
        Box::new(PROPAGATION_FAILURES_TOTAL.clone()),
        Box::new(SEARCH_REQUESTS_TOTAL.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Encode all registered metrics in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
