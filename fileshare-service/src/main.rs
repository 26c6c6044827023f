use fileshare_service::config::FileshareConfig;
use fileshare_service::db::{create_pool, run_migrations};
use fileshare_service::services::metrics::{init_metrics, render_metrics};
use fileshare_service::services::{Database, JwtService, S3Storage};
use fileshare_service::utils::Argon2Hasher;
use fileshare_service::AppServices;
use serde_json::json;
use service_core::axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[derive(Clone)]
struct HealthState {
    db: Database,
    // Held for the transport layer mounted on top of this process.
    #[allow(dead_code)]
    services: AppServices,
}

async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "fileshare-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "fileshare-service",
                "error": e.to_string()
            })),
        ),
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        render_metrics(),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = FileshareConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(&config.common.log_level, config.common.log_json);

    init_metrics().map_err(|e| {
        tracing::error!("Failed to initialize metrics: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let pool = create_pool(&config.database).await.map_err(|e| {
        tracing::error!("Failed to connect to PostgreSQL: {}", e);
        std::io::Error::other(format!("Database connection error: {}", e))
    })?;

    run_migrations(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::other(format!("Database migration error: {}", e))
    })?;

    let db = Database::new(pool);
    let storage = S3Storage::from_config(&config.storage).await;

    let services = AppServices::new(
        Arc::new(db.clone()),
        Arc::new(storage),
        Arc::new(Argon2Hasher),
        JwtService::from_config(&config.jwt),
        Duration::from_secs(config.store_timeout_seconds),
    );

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(HealthState { db, services });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind listener to {}: {}", addr, e);
        e
    })?;
    tracing::info!("fileshare-service listening on {}", addr);

    service_core::axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
