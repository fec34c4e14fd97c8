//! Orchestrator HTTP surface.
//!
//! The conversation view is served as JSON; rendering it is a front-end
//! concern and out of scope here. The log lives behind a single mutex so
//! concurrent requests cannot interleave a user turn and its outcome.
//!
//! Endpoints:
//! - GET  /      — the conversation log
//! - POST /ask   — form-encoded question + model_choice, redirects to /
//! - GET  /reset — clears the log, redirects to /

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use askdb_core::config::UiConfig;
use askdb_core::models::conversation::NO_SQL_SENTINEL;
use askdb_core::{ConversationEntry, ConversationLog, Provider};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};

use crate::pipeline::{self, TurnOutcome};

/// Shared state for all HTTP handlers
pub struct UiState {
    pub config: UiConfig,
    pub client: reqwest::Client,
    pub log: Mutex<ConversationLog>,
}

impl UiState {
    pub fn new(config: UiConfig) -> Self {
        let log = Mutex::new(ConversationLog::new(config.log_capacity));
        Self {
            config,
            client: reqwest::Client::new(),
            log,
        }
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<UiState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ask", post(ask_handler))
        .route("/reset", get(reset_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: UiConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(UiState::new(config));

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("askdb ui listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("UI shutting down...");
        })
        .await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub question: String,
    pub model_choice: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner index — the whole conversation as JSON.
pub async fn index_inner(state: &UiState) -> serde_json::Value {
    let log = state.log.lock().await;
    serde_json::json!({
        "conversation": log.entries(),
        "count": log.len(),
    })
}

/// Inner ask — run the pipeline and append exactly one user/system pair.
/// An empty question appends nothing and makes no outbound call.
pub async fn ask_inner(state: &UiState, form: AskForm) {
    let question = form.question.trim().to_string();
    if question.is_empty() {
        return;
    }

    let model_choice = form.model_choice.as_deref().unwrap_or("openai");

    let (outcome, model_used) = match Provider::from_str(model_choice) {
        Ok(provider) => (
            pipeline::run_question(&state.client, &state.config, &question, provider).await,
            provider.as_key().to_string(),
        ),
        Err(e) => (
            // Unknown key: nothing downstream is called; the turn still lands
            // in the log so the user sees what happened.
            TurnOutcome {
                friendly_text: pipeline::MSG_UNEXPECTED.to_string(),
                technical_details: e,
                sql: NO_SQL_SENTINEL.to_string(),
                raw_results: vec![],
                error: true,
            },
            model_choice.to_string(),
        ),
    };

    let user = ConversationEntry::User {
        text: question,
    };
    let system = ConversationEntry::System {
        friendly_text: outcome.friendly_text,
        technical_details: outcome.technical_details,
        sql: outcome.sql,
        raw_results: outcome.raw_results,
        model_used,
        error: outcome.error,
    };

    let mut log = state.log.lock().await;
    log.push_turn(user, system);
}

/// Inner reset — drop every entry.
pub async fn reset_inner(state: &UiState) {
    state.log.lock().await.clear();
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn index_handler(State(state): State<Arc<UiState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(index_inner(&state).await))
}

pub async fn ask_handler(
    State(state): State<Arc<UiState>>,
    Form(form): Form<AskForm>,
) -> impl IntoResponse {
    ask_inner(&state, form).await;
    Redirect::to("/")
}

pub async fn reset_handler(State(state): State<Arc<UiState>>) -> impl IntoResponse {
    reset_inner(&state).await;
    Redirect::to("/")
}
