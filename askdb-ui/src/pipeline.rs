//! Per-question orchestration: translate → execute → summarize.
//!
//! Strictly sequential with no branching back; the first failure produces the
//! turn's outcome and nothing further runs. Whatever was obtained before the
//! failure (the SQL, the raw rows) is still recorded for display. Transport
//! failures are mapped to a different user-facing message than
//! application-level errors; technical detail is kept separately in both
//! cases.

use std::time::Duration;

use askdb_core::config::{ProviderEndpoints, UiConfig};
use askdb_core::models::conversation::NO_SQL_SENTINEL;
use askdb_core::Provider;
use serde_json::Value;

pub const MSG_TRANSLATE_FAILED: &str = "Couldn't process your question. Please try again.";
pub const MSG_MISSING_SQL: &str = "Invalid question format. Please be more specific.";
pub const MSG_QUERY_FAILED: &str = "We found an issue with your question. Please rephrase it.";
pub const MSG_SUMMARY_FAILED: &str = "We couldn't summarize the results. Try another question.";
pub const MSG_NO_RESULTS: &str = "Query executed successfully (no results returned)";
pub const MSG_CONNECTION: &str = "Connection error. Please check your internet.";
pub const MSG_UNEXPECTED: &str = "Unexpected error. Contact support.";

/// Everything the system turn records about one question.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub friendly_text: String,
    pub technical_details: String,
    pub sql: String,
    pub raw_results: Vec<Value>,
    pub error: bool,
}

impl TurnOutcome {
    fn failed(friendly: &str, technical: String, sql: String, raw_results: Vec<Value>) -> Self {
        Self {
            friendly_text: friendly.to_string(),
            technical_details: technical,
            sql,
            raw_results,
            error: true,
        }
    }
}

/// Run the full pipeline for one question against the configured services.
/// Never fails — every failure mode becomes an error-flagged outcome.
pub async fn run_question(
    client: &reqwest::Client,
    config: &UiConfig,
    question: &str,
    provider: Provider,
) -> TurnOutcome {
    let endpoints = provider_endpoints(config, provider);
    let model_timeout = Duration::from_secs(config.model_timeout_seconds);
    let query_timeout = Duration::from_secs(config.query_timeout_seconds);

    // TRANSLATE
    let resp = match client
        .post(&endpoints.translate_url)
        .timeout(model_timeout)
        .json(&serde_json::json!({
            "question": question,
            "provider": provider.as_key(),
        }))
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => return transport_failure(e, NO_SQL_SENTINEL.to_string(), vec![]),
    };

    if !resp.status().is_success() {
        let code = resp.status().as_u16();
        return TurnOutcome::failed(
            MSG_TRANSLATE_FAILED,
            format!("Translate Error {}: {}", code, error_body(resp).await),
            NO_SQL_SENTINEL.to_string(),
            vec![],
        );
    }

    let body: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => {
            return TurnOutcome::failed(
                MSG_UNEXPECTED,
                format!("Translate reply unreadable: {}", e),
                NO_SQL_SENTINEL.to_string(),
                vec![],
            )
        }
    };

    let sql = match body.get("sql").and_then(Value::as_str) {
        Some(sql) => sql.to_string(),
        None => {
            return TurnOutcome::failed(
                MSG_MISSING_SQL,
                format!("Missing 'sql' in response: {}", body),
                NO_SQL_SENTINEL.to_string(),
                vec![],
            )
        }
    };

    // EXECUTE — the attempted SQL is recorded from here on, success or not.
    let resp = match client
        .post(&config.executor_url)
        .timeout(query_timeout)
        .json(&serde_json::json!({ "sql": sql }))
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => return transport_failure(e, sql, vec![]),
    };

    if !resp.status().is_success() {
        let code = resp.status().as_u16();
        let detail = truncate(&error_body(resp).await, 200);
        return TurnOutcome::failed(
            MSG_QUERY_FAILED,
            format!("Backend Error {}: {}", code, detail),
            sql,
            vec![],
        );
    }

    let body: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => {
            return TurnOutcome::failed(
                MSG_UNEXPECTED,
                format!("Backend reply unreadable: {}", e),
                sql,
                vec![],
            )
        }
    };

    let raw_results: Vec<Value> = body
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    // SUMMARIZE — skipped entirely for an empty result set.
    if raw_results.is_empty() {
        return TurnOutcome {
            friendly_text: MSG_NO_RESULTS.to_string(),
            technical_details: String::new(),
            sql,
            raw_results,
            error: false,
        };
    }

    let resp = match client
        .post(&endpoints.summarize_url)
        .timeout(model_timeout)
        .json(&serde_json::json!({
            "question": question,
            "sql": sql,
            "results": raw_results,
            "provider": provider.as_key(),
        }))
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => return transport_failure(e, sql, raw_results),
    };

    if !resp.status().is_success() {
        let code = resp.status().as_u16();
        return TurnOutcome::failed(
            MSG_SUMMARY_FAILED,
            format!("Summarize Error {}: {}", code, error_body(resp).await),
            sql,
            raw_results,
        );
    }

    let body: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => {
            return TurnOutcome::failed(
                MSG_UNEXPECTED,
                format!("Summarize reply unreadable: {}", e),
                sql,
                raw_results,
            )
        }
    };

    let friendly_text = body
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("No summary returned")
        .to_string();

    TurnOutcome {
        friendly_text,
        technical_details: String::new(),
        sql,
        raw_results,
        error: false,
    }
}

fn provider_endpoints(config: &UiConfig, provider: Provider) -> &ProviderEndpoints {
    match provider {
        Provider::OpenAi => &config.openai,
        Provider::HuggingFace => &config.huggingface,
    }
}

/// Transport-level failure (timeout, refused connection, DNS): distinct
/// friendly message, full error in the technical detail.
fn transport_failure(e: reqwest::Error, sql: String, raw_results: Vec<Value>) -> TurnOutcome {
    tracing::warn!(error = %e, "transport failure reaching a dependency");
    TurnOutcome::failed(
        MSG_CONNECTION,
        format!("Transport error: {}", e),
        sql,
        raw_results,
    )
}

/// Read a non-success body for the technical detail: JSON when it parses,
/// raw text otherwise.
async fn error_body(resp: reqwest::Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&text) {
        Ok(v) => v.to_string(),
        Err(_) => text,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
