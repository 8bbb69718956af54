use axum::{routing::get, Json, Router};
use health::{health_handler, Readiness};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use erp_core::config::Config;
use erp_core::db;

const SERVICE_NAME: &str = "erp-core";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting ERP core service...");

    let config = Config::from_env().expect("Failed to load configuration from environment");

    tracing::info!(host = %config.host, port = config.port, app_env = ?config.app_env, "Configuration loaded");

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let readiness_pool = Arc::new(pool);

    let app = Router::new()
        .route("/api/health", get(|| health_handler(SERVICE_NAME)))
        .route("/api/ready", get({
            let pool = readiness_pool.clone();
            move || ready_handler(pool.clone())
        }))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("ERP core service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}

/// `GET /api/ready`: a DB round-trip on top of the plain liveness check, so
/// load balancers can tell "process is up" apart from "process can actually
/// reach Postgres".
async fn ready_handler(pool: Arc<sqlx::PgPool>) -> Json<Readiness> {
    match sqlx::query("SELECT 1").execute(pool.as_ref()).await {
        Ok(_) => Json(Readiness::ready()),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            Json(Readiness::not_ready(err.to_string()))
        }
    }
}
