//! Orchestrator integration tests: full router dispatch with fake translate,
//! query, and summarize services behind one wiremock server.

use askdb_core::config::{ProviderEndpoints, UiConfig};
use askdb_ui::http::{build_router, UiState};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SQL: &str = "SELECT SUM(total) AS total_spent FROM sales WHERE week_day = 'Friday';";

fn test_state(base: &str) -> Arc<UiState> {
    let mut config = UiConfig::default();
    config.executor_url = format!("{}/query", base);
    let endpoints = ProviderEndpoints {
        translate_url: format!("{}/translate", base),
        summarize_url: format!("{}/summarize", base),
    };
    config.openai = endpoints.clone();
    config.huggingface = endpoints;
    config.query_timeout_seconds = 5;
    config.model_timeout_seconds = 5;
    Arc::new(UiState::new(config))
}

async fn post_form(state: Arc<UiState>, body: &str) -> StatusCode {
    let app = build_router(state);
    let req = Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(req).await.unwrap().status()
}

async fn get_conversation(state: Arc<UiState>) -> serde_json::Value {
    let app = build_router(state);
    let req = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mount_happy_path(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sql": SQL })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "total_spent": 1234.50 }]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "summary": "Fridays brought in $1,234.50 in total!"
        })))
        .mount(server)
        .await;
}

// ===========================================================================
// TEST 1: POST /ask happy path — redirect, then two entries in the log
// ===========================================================================
#[tokio::test]
async fn ask_appends_user_and_system_turn() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;
    let state = test_state(&server.uri());

    let status = post_form(
        state.clone(),
        "question=What+is+the+total+money+spent+on+Fridays%3F&model_choice=openai",
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let v = get_conversation(state).await;
    assert_eq!(v["count"], 2);

    let user = &v["conversation"][0];
    assert_eq!(user["role"], "user");
    assert_eq!(user["text"], "What is the total money spent on Fridays?");

    let system = &v["conversation"][1];
    assert_eq!(system["role"], "system");
    assert_eq!(system["error"], false);
    assert_eq!(system["friendly_text"], "Fridays brought in $1,234.50 in total!");
    assert_eq!(system["technical_details"], "");
    assert_eq!(system["sql"], SQL);
    assert_eq!(system["model_used"], "openai");
    assert_eq!(system["raw_results"][0]["total_spent"], 1234.50);
}

// ===========================================================================
// TEST 2: zero rows — summarizer skipped, canned message, error=false
// ===========================================================================
#[tokio::test]
async fn zero_rows_yield_the_canned_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sql": SQL })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let state = test_state(&server.uri());
    post_form(state.clone(), "question=anything&model_choice=huggingface").await;

    let v = get_conversation(state).await;
    let system = &v["conversation"][1];
    assert_eq!(system["error"], false);
    assert_eq!(
        system["friendly_text"],
        "Query executed successfully (no results returned)"
    );
    assert_eq!(system["model_used"], "huggingface");
}

// ===========================================================================
// TEST 3: empty question — redirect, nothing appended, no outbound call
// ===========================================================================
#[tokio::test]
async fn empty_question_is_a_no_op() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let state = test_state(&server.uri());
    let status = post_form(state.clone(), "question=++&model_choice=openai").await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let v = get_conversation(state).await;
    assert_eq!(v["count"], 0);
}

// ===========================================================================
// TEST 4: GET /reset then GET / — conversation shows zero entries
// ===========================================================================
#[tokio::test]
async fn reset_then_index_shows_nothing() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;
    let state = test_state(&server.uri());

    post_form(state.clone(), "question=first&model_choice=openai").await;
    post_form(state.clone(), "question=second&model_choice=openai").await;
    assert_eq!(get_conversation(state.clone()).await["count"], 4);

    let app = build_router(state.clone());
    let req = Request::builder()
        .method("GET")
        .uri("/reset")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    assert_eq!(get_conversation(state).await["count"], 0);
}

// ===========================================================================
// TEST 5: translate error — error turn recorded, pipeline stops there
// ===========================================================================
#[tokio::test]
async fn translate_error_records_an_error_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "error": "boom" })),
        )
        .mount(&server)
        .await;

    // The executor must never be reached.
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let state = test_state(&server.uri());
    post_form(state.clone(), "question=anything&model_choice=openai").await;

    let v = get_conversation(state).await;
    let system = &v["conversation"][1];
    assert_eq!(system["error"], true);
    assert_eq!(system["sql"], "NO_SQL_GENERATED");
    assert!(system["technical_details"]
        .as_str()
        .unwrap()
        .contains("Translate Error 500"));
}
