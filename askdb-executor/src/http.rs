//! Executor HTTP API
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - POST /query       — execute a SQL statement
//! - GET  /healthcheck — liveness probe, never touches the database

use std::sync::Arc;

use anyhow::Result;
use askdb_core::config::ExecutorConfig;
use askdb_core::AskdbError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::exec::{self, QueryOutcome};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: ExecutorConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/healthcheck", get(healthcheck_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: ExecutorConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(HttpState { config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("askdb executor listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Executor shutting down...");
        })
        .await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub sql: String,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner query — runs the statement and maps the outcome to the wire contract.
/// Reads answer `{"results": [...]}`; writes answer `{"message": ...}`; any
/// failure answers 400 with the underlying error text.
pub async fn query_inner(database_url: &str, req: QueryRequest) -> (StatusCode, serde_json::Value) {
    match exec::run_sql(database_url, &req.sql).await {
        Ok(QueryOutcome::Rows(rows)) => (
            StatusCode::OK,
            serde_json::json!({ "results": rows }),
        ),
        Ok(QueryOutcome::Ack { rows_affected }) => {
            tracing::debug!(rows_affected, "write statement committed");
            (
                StatusCode::OK,
                serde_json::json!({ "message": "Query executed successfully" }),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "query failed");
            // 400 for everything the statement caused; the raw driver text
            // goes in the body so the orchestrator can record it.
            let detail = match e {
                AskdbError::Database(db) => db.to_string(),
                other => other.to_string(),
            };
            (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": detail }),
            )
        }
    }
}

/// Inner healthcheck — pure, idempotent, no database touch.
pub fn healthcheck_inner() -> serde_json::Value {
    serde_json::json!({ "status": "ok" })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn query_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    let (status, body) = query_inner(&state.config.database.url, req).await;
    (status, Json(body))
}

pub async fn healthcheck_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(healthcheck_inner()))
}
