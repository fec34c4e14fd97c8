//! Agent HTTP API — translate and summarize
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! directly-testable inner function taking the backend as `&dyn
//! TextGenBackend`. The provider is chosen per request by an optional
//! `provider` field, falling back to the configured default.
//!
//! Endpoints:
//! - POST /translate   — natural-language question → SQL statement
//! - POST /summarize   — question + SQL + rows → one friendly sentence
//! - GET  /healthcheck — liveness probe with the default model id

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use askdb_core::config::AgentConfig;
use askdb_core::{extract, Provider};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::backend::{create_backend, GenerationError, TextGenBackend};
use crate::prompts;

/// Output budget for summaries — one sentence needs less than a query.
const SUMMARY_MAX_TOKENS: u32 = 150;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: AgentConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/translate", post(translate_handler))
        .route("/summarize", post(summarize_handler))
        .route("/healthcheck", get(healthcheck_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: AgentConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(HttpState { config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("askdb agent listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Agent shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub question: String,
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    pub provider: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner translate — validates the question, builds the schema prompt, calls
/// the backend, and extracts a SQL statement from the free-text reply.
pub async fn translate_inner(
    backend: &dyn TextGenBackend,
    question: &str,
    max_tokens: u32,
) -> (StatusCode, serde_json::Value) {
    let question = question.trim();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "No question provided" }),
        );
    }

    let prompt = prompts::translate_prompt(question);
    match backend
        .generate(Some(prompts::TEXT_TO_SQL_PREAMBLE), &prompt, max_tokens)
        .await
    {
        Ok(raw) => {
            let sql = extract::clean_sql_reply(&raw);
            tracing::info!(backend = backend.name(), sql = %sql, "translated question");
            (StatusCode::OK, serde_json::json!({ "sql": sql }))
        }
        Err(e) => generation_error_to_http(e),
    }
}

/// Inner summarize — embeds question, SQL, and rows into the summary prompt,
/// then applies the backend's reply extraction.
pub async fn summarize_inner(
    backend: &dyn TextGenBackend,
    req: SummarizeRequest,
) -> (StatusCode, serde_json::Value) {
    let results_json =
        serde_json::to_string(&req.results).unwrap_or_else(|_| "[]".to_string());
    let prompt = prompts::summarize_prompt(&req.question, &req.sql, &results_json);

    match backend
        .generate(Some(prompts::SUMMARY_SYSTEM), &prompt, SUMMARY_MAX_TOKENS)
        .await
    {
        Ok(raw) => {
            let summary = backend.extract_summary(&raw);
            (StatusCode::OK, serde_json::json!({ "summary": summary }))
        }
        Err(e) => {
            tracing::warn!(backend = backend.name(), error = %e, "summarize failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": e.to_string() }),
            )
        }
    }
}

/// Inner healthcheck — reports the default provider's model id.
pub fn healthcheck_inner(config: &AgentConfig) -> serde_json::Value {
    let model = match Provider::from_str(&config.default_provider) {
        Ok(Provider::HuggingFace) => config.huggingface.model.as_str(),
        _ => config.openai.model.as_str(),
    };
    serde_json::json!({ "status": "ok", "model": model })
}

/// Map a generation failure to the wire contract: upstream status codes are
/// forwarded as-is (with a JSON body when the upstream sent one), everything
/// else is a 500.
fn generation_error_to_http(e: GenerationError) -> (StatusCode, serde_json::Value) {
    match e {
        GenerationError::Api { code, body } => {
            let status =
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .unwrap_or(serde_json::Value::String(body));
            (status, serde_json::json!({ "error": detail }))
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": other.to_string() }),
        ),
    }
}

fn resolve_provider(
    requested: Option<&str>,
    config: &AgentConfig,
) -> Result<Provider, (StatusCode, serde_json::Value)> {
    let key = requested.unwrap_or(&config.default_provider);
    Provider::from_str(key).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": e }),
        )
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn translate_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<TranslateRequest>,
) -> impl IntoResponse {
    let provider = match resolve_provider(req.provider.as_deref(), &state.config) {
        Ok(p) => p,
        Err((status, body)) => return (status, Json(body)),
    };

    let backend = match create_backend(provider, &state.config.openai, &state.config.huggingface) {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    };

    let max_tokens = match provider {
        Provider::OpenAi => state.config.openai.max_tokens,
        Provider::HuggingFace => state.config.huggingface.max_new_tokens,
    };

    let (status, body) = translate_inner(backend.as_ref(), &req.question, max_tokens).await;
    (status, Json(body))
}

pub async fn summarize_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SummarizeRequest>,
) -> impl IntoResponse {
    let provider = match resolve_provider(req.provider.as_deref(), &state.config) {
        Ok(p) => p,
        Err((status, body)) => return (status, Json(body)),
    };

    let backend = match create_backend(provider, &state.config.openai, &state.config.huggingface) {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    };

    let (status, body) = summarize_inner(backend.as_ref(), req).await;
    (status, Json(body))
}

pub async fn healthcheck_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(healthcheck_inner(&state.config)))
}

// ============================================================================
// Unit Tests — stub backend, no network
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Canned backend: returns a fixed reply or a fixed error.
    struct StubBackend {
        reply: Result<String, u16>,
        quote_extraction: bool,
    }

    #[async_trait]
    impl TextGenBackend for StubBackend {
        async fn generate(
            &self,
            _system: Option<&str>,
            _prompt: &str,
            _max_tokens: u32,
        ) -> Result<String, GenerationError> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(code) => Err(GenerationError::Api {
                    code: *code,
                    body: r#"{"error":"upstream says no"}"#.to_string(),
                }),
            }
        }

        fn extract_summary(&self, raw: &str) -> String {
            if self.quote_extraction {
                askdb_core::extract::last_quoted_sentence(raw)
            } else {
                raw.trim().to_string()
            }
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    #[tokio::test]
    async fn empty_question_rejected_before_any_call() {
        // A backend that would panic the test if reached is not needed — the
        // stub's reply is an error, and we must not see it.
        let backend = StubBackend {
            reply: Err(500),
            quote_extraction: false,
        };
        let (status, body) = translate_inner(&backend, "   ", 200).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No question provided");
    }

    #[tokio::test]
    async fn fenced_sql_reply_round_trips() {
        let backend = StubBackend {
            reply: Ok("```sql\nSELECT 1;\n```".to_string()),
            quote_extraction: false,
        };
        let (status, body) = translate_inner(&backend, "anything", 200).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sql"], "SELECT 1;");
    }

    #[tokio::test]
    async fn upstream_status_code_is_forwarded() {
        let backend = StubBackend {
            reply: Err(503),
            quote_extraction: false,
        };
        let (status, body) = translate_inner(&backend, "anything", 200).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["error"], "upstream says no");
    }

    #[tokio::test]
    async fn summarize_applies_provider_extraction() {
        let req = || SummarizeRequest {
            question: "What is the total money spent on Fridays?".to_string(),
            sql: "SELECT SUM(total) AS total_spent FROM sales WHERE week_day = 'Friday';"
                .to_string(),
            results: vec![serde_json::json!({ "total_spent": 1234.50 })],
            provider: None,
        };

        let quoting = StubBackend {
            reply: Ok("Happy to help! \"Fridays brought in $1,234.50!\"".to_string()),
            quote_extraction: true,
        };
        let (status, body) = summarize_inner(&quoting, req()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Fridays brought in $1,234.50!");
        let summary = body["summary"].as_str().unwrap();
        assert!(!summary.contains("SQL") && !summary.contains("SELECT"));

        let direct = StubBackend {
            reply: Ok("  Fridays brought in $1,234.50!  ".to_string()),
            quote_extraction: false,
        };
        let (status, body) = summarize_inner(&direct, req()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Fridays brought in $1,234.50!");
    }

    #[tokio::test]
    async fn summarize_failure_is_500() {
        let backend = StubBackend {
            reply: Err(503),
            quote_extraction: false,
        };
        let req = SummarizeRequest {
            question: String::new(),
            sql: String::new(),
            results: vec![],
            provider: None,
        };
        let (status, body) = summarize_inner(&backend, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[test]
    fn healthcheck_reports_default_provider_model() {
        let mut config = AgentConfig::default();
        config.default_provider = "huggingface".to_string();
        let v = healthcheck_inner(&config);
        assert_eq!(v["status"], "ok");
        assert_eq!(v["model"], config.huggingface.model);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = AgentConfig::default();
        let err = resolve_provider(Some("mistral"), &config);
        match err {
            Err((status, body)) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(body["error"].as_str().unwrap().contains("mistral"));
            }
            Ok(p) => panic!("expected rejection, got {:?}", p),
        }
    }
}
