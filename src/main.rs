mod artifacts;
mod circuit_breaker;
mod collector;
mod config;
mod db;
mod errors;
mod events;
mod handlers;
mod models;
mod notifier;
mod orchestrator;
mod pg_store;
mod processor;
mod provider;
mod queue;
mod report;
mod report_cache;
mod services;
mod store;
mod synthetic;
mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::artifacts::FsArtifactStore;
use crate::collector::DataCollector;
use crate::config::Config;
use crate::db::Database;
use crate::events::EventBus;
use crate::notifier::CompletionNotifier;
use crate::orchestrator::Orchestrator;
use crate::pg_store::PgCustomerStore;
use crate::processor::AuditProcessor;
use crate::provider::{LiveProvider, SeoDataProvider, SyntheticProvider};
use crate::queue::AuditQueue;
use crate::report::ReportAssembler;
use crate::store::CustomerStore;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection and schema bootstrap.
/// - Caches (report, intake deduplication).
/// - The data provider (live or synthetic, by credential availability).
/// - Audit workers, the staleness sweeper and the completion notifier.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "site_audit_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Event bus: intake, status changes and completions flow through here
    let events = EventBus::default();

    // Customer record store (single source of truth for status)
    let pg_store = PgCustomerStore::new(db.pool.clone(), events.clone());
    pg_store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Schema bootstrap failed: {}", e))?;
    let store: Arc<dyn CustomerStore> = Arc::new(pg_store);

    // Rendered-report cache (1 hour TTL, keyed by result id)
    let report_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(10_000)
        .build();
    tracing::info!("Report cache initialized (1h TTL, 10k capacity)");

    // Intake deduplication cache to absorb rapid duplicate submissions
    // 5 minute TTL is enough to cover typical form double-submits
    let recent_intake_cache = Cache::builder()
        .time_to_live(Duration::from_secs(300))
        .max_capacity(10_000)
        .build();
    tracing::info!("Intake deduplication cache initialized");

    // Select the data provider adapter: live when credentials are complete,
    // otherwise the synthetic generator serves every section
    let seo_provider: Arc<dyn SeoDataProvider> = if config.has_live_credentials() {
        tracing::info!("Live SEO data providers configured (DataForSEO + Firecrawl)");
        Arc::new(LiveProvider::new(&config))
    } else {
        tracing::warn!("Provider credentials missing; audits will use synthetic data");
        Arc::new(SyntheticProvider::new())
    };
    let data_collector = Arc::new(DataCollector::new(seo_provider, config.provider_timeout()));

    // Audit queue and workers
    let audit_queue = Arc::new(AuditQueue::new());
    let assembler = ReportAssembler::default();
    let artifact_store = Arc::new(FsArtifactStore::new(config.report_dir.clone()));

    let audit_processor = Arc::new(AuditProcessor::new(
        Arc::clone(&store),
        Arc::clone(&audit_queue),
        data_collector,
        assembler.clone(),
        artifact_store,
        events.clone(),
    ));
    let _workers = audit_processor.spawn_workers(config.worker_count);
    tracing::info!("Spawned {} audit worker(s)", config.worker_count);

    // Orchestrator plus its periodic staleness sweep
    let workflow = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&audit_queue),
        events.clone(),
        config.staleness_hours,
    ));
    let _sweeper = Arc::clone(&workflow)
        .spawn_sweeper(Duration::from_secs(config.sweep_interval_secs));
    tracing::info!(
        "Staleness sweeper running every {}s (window {}h)",
        config.sweep_interval_secs,
        config.staleness_hours
    );

    // Completion notifications (webhook when configured, log otherwise)
    let completion_notifier = CompletionNotifier::new(config.completion_webhook_url.clone())?;
    let _notifier = completion_notifier.spawn_listener(events.clone());

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        store,
        queue: audit_queue,
        orchestrator: workflow,
        assembler,
        report_cache,
        recent_intake_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // Intake and sweep
        .route("/api/v1/audits", post(handlers::intake))
        .route("/api/v1/audits/process", get(handlers::trigger_sweep))
        // Customer endpoints
        .route("/api/v1/customers", get(handlers::list_customers))
        .route("/api/v1/customers/:id", get(handlers::get_customer))
        .route("/api/v1/customers/:id/audit", post(handlers::trigger_audit))
        .route(
            "/api/v1/customers/:id/refresh",
            post(handlers::refresh_customer),
        )
        // Report artifacts
        .route("/api/v1/customers/:id/report", get(handlers::get_report))
        .route(
            "/api/v1/customers/:id/exports/:table",
            get(handlers::export_csv),
        )
        // Job endpoints
        .route(
            "/api/v1/jobs/:id",
            get(handlers::get_job).delete(handlers::cancel_job),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (intake bodies are small)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
