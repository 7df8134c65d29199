use roster_search::{
    api::{build_router, AppState},
    config::Config,
    search::{
        create_engine, student_mapping, student_projector, IndexSchemaManager, IndexWriteGateway,
        SearchService,
    },
    seed::seed_store,
    state::InMemoryStore,
    sync::Reindexer,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        default_config()
    });

    // Initialize tracing
    let fallback_filter = format!(
        "roster_search={},tower_http={}",
        config.observability.log_level, config.observability.log_level
    );
    let json_logs = config.observability.json_logs;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(
        service = %config.observability.service_name,
        "Starting roster-search v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = roster_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Initialize search engine
    tracing::info!(backend = ?config.search.backend, index = %config.search.index_name, "Search engine backend");
    let engine = create_engine(&config.search)?;

    // Optionally load the demo roster and push it to the index. The store is
    // dropped afterwards; live mutations belong to the embedding application.
    if config.seed.students > 0 {
        let store = Arc::new(InMemoryStore::new());
        seed_store(&store, config.seed.students)?;

        let target = config.search.target();
        let reindexer = Reindexer::new(
            IndexSchemaManager::new(engine.clone(), target.clone(), student_mapping()),
            Arc::new(student_projector()),
            IndexWriteGateway::new(engine.clone(), target),
            store,
        )
        .with_batch_size(config.search.bulk_batch_size);

        let stats = reindexer.run().await?;
        tracing::info!(indexed = stats.indexed, failed = stats.failed(), "Demo roster indexed");
    }

    let search = Arc::new(SearchService::new(engine, config.search.clone()));
    let app = build_router(AppState::new(search));

    let http_addr = config.server.bind_address();
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Faceted search: http://{}/search", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

fn default_config() -> Config {
    use roster_search::config::*;

    Config {
        server: ServerConfig {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        },
        search: Default::default(),
        seed: SeedConfig::default(),
        observability: ObservabilityConfig {
            log_level: "info".to_string(),
            json_logs: false,
            service_name: "roster-search".to_string(),
            prometheus_enabled: true,
        },
    }
}
