use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use colorbook_api::config::{ServerConfig, StorageConfig};
use colorbook_api::router::build_app_router;
use colorbook_api::state::AppState;
use colorbook_api::storage::S3AssetStore;
use colorbook_pipeline::{BatchCoordinator, JobRegistry, PollingConfig};
use colorbook_providers::{ProviderConfig, ProviderHub, TaskProvider, Translator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "colorbook_api=debug,colorbook_pipeline=debug,colorbook_providers=debug,tower_http=debug"
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = colorbook_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    colorbook_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    colorbook_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Providers ---
    let provider_config = ProviderConfig::from_env();
    let hub =
        ProviderHub::from_config(&provider_config).expect("Failed to build AI provider client");
    let text = hub.text_client();
    tracing::info!(
        default_image_model = %provider_config.default_image_model.as_str(),
        text_model = %text.model(),
        "AI providers configured",
    );
    let translator: Arc<dyn Translator> = text;
    let provider: Arc<dyn TaskProvider> = Arc::new(hub);

    // --- Job pipeline ---
    let polling = PollingConfig::from_env();
    tracing::info!(
        interval_ms = polling.interval.as_millis() as u64,
        retry_budget = polling.retry_budget,
        "Job registry configured",
    );
    let jobs = JobRegistry::new(provider, polling);
    let batches = BatchCoordinator::new(Arc::clone(&jobs));

    // --- Object storage ---
    let storage_config = StorageConfig::from_env();
    let assets = S3AssetStore::new(&storage_config);
    if let Err(e) = assets.ensure_bucket().await {
        tracing::warn!(bucket = %storage_config.bucket, error = %e, "Storage bucket not ready");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(provider_config.timeout_secs))
        .build()
        .expect("Failed to build HTTP client");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        jobs: Arc::clone(&jobs),
        batches: Arc::clone(&batches),
        assets: Arc::new(assets),
        translator,
        http,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    batches.shutdown();
    let drain = async {
        jobs.shutdown().await;
    };
    if tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), drain)
        .await
        .is_err()
    {
        tracing::warn!("Job registry did not shut down in time");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
