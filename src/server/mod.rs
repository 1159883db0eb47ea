//! HTTP server: router construction, startup, and graceful shutdown.
//!
//! The server is thin glue over the data layer. Handlers wrap units of work
//! in `with_transaction` / `with_connection`; on shutdown the listener
//! drains first and then the connection pool, so in-flight transactions are
//! never abandoned mid-write.

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use signet_core::Config;
use signet_db::{init_pool, DbPool, PoolConfig};

pub mod error;
pub mod routes;

/// Shared application context, cloned into every handler.
#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    pub config: Arc<Config>,
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/auth/login", post(routes::login))
        .route("/users/{id}", get(routes::get_user));

    Router::new()
        .route("/hc", get(routes::health))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Start the server and block until a shutdown signal arrives.
pub async fn start(host: String, port: u16, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load_or_default(config_path);
    config.server.host = host;
    config.server.port = port;
    config.apply_env();

    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    tracing::info!("Using database at {}", config.db.path);
    let pool_config = PoolConfig::from(&config.db);
    let db_path = config.db.path.clone();
    // Pool init opens connections and runs the schema script; keep that off
    // the async runtime.
    let db = tokio::task::spawn_blocking(move || init_pool(&db_path, pool_config)).await??;

    let ctx = AppContext {
        db: db.clone(),
        config: Arc::new(config.clone()),
    };
    let app = build_router(ctx);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the pool before exit; shutdown waits for checked-out
    // connections to come back.
    tokio::task::spawn_blocking(move || db.shutdown()).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
