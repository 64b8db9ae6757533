//! Router assembly, shared state and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::{Store, StoreError};

use super::auth;
use super::lists;
use super::tasks;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Store,
}

/// Build the full `/api` router around `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth::routes());

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .nest("/api/lists", lists::routes())
        .nest("/api/tasks", tasks::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database and start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Store::open(&config.database_path)?;
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
    });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

/// Health check endpoint.
async fn health(State(_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Map a store failure onto an HTTP status.
pub(crate) fn store_error(err: StoreError) -> (StatusCode, String) {
    match err {
        StoreError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
        StoreError::EmailTaken(_) => (StatusCode::BAD_REQUEST, "Email already exists".to_string()),
        other => {
            tracing::error!("Storage failure: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

/// Trimmed title, or 400 when nothing is left.
pub(crate) fn required_title(title: &str) -> Result<String, (StatusCode, String)> {
    let title = title.trim();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title is required".to_string()));
    }
    Ok(title.to_string())
}
