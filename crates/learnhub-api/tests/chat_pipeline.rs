use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use learnhub_api::{create_router, AppState};
use learnhub_core::Settings;
use serde_json::{json, Value};
use std::path::Path;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings(base_url: &str, rules_path: &Path, assistant: bool) -> Settings {
    Settings {
        api_key: "test-key".to_string(),
        base_url: base_url.to_string(),
        model: "gpt-4o-mini".to_string(),
        assistant_id: assistant.then(|| "asst_123".to_string()),
        vector_store_id: None,
        temperature: None,
        rules_path: rules_path.to_path_buf(),
        poll_interval_ms: 10,
        run_timeout_ms: 500,
        request_timeout_secs: 5,
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

fn write_rules(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("extreme_rules.json");
    std::fs::write(
        &path,
        r#"{
            "normalization": {"products": {"FC": "Fabric Connect"}},
            "entities": {
                "voss": {"canonical": "Fabric Engine (VOSS)", "synonyms": ["VOSS"]}
            },
            "query_expansion": {
                "expand_if_absent": [{"entity": "voss"}],
                "max_added_terms": 4
            }
        }"#,
    )
    .unwrap();
    path
}

async fn post_json(router: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn mount_assistant_happy_path(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_abc"})))
        .mount(server)
        .await;
    // the rewritten user turn must carry the normalized query
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/messages"))
        .and(body_string_contains("Normalized: What is Fabric Connect?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/runs"))
        .and(body_string_contains("canonical names"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "run_xyz", "status": "queued"})),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/runs/run_xyz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "run_xyz", "status": "completed"})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "msg_2",
                "role": "assistant",
                "content": [{
                    "type": "text",
                    "text": {
                        "value": "Fabric Connect extends SPB.\u{3010}4:1\u{2020}source\u{3011}",
                        "annotations": [{
                            "type": "file_citation",
                            "file_citation": {"file_id": "file_99"},
                            "start_index": 0,
                            "end_index": 10
                        }]
                    }
                }]
            }]
        })))
        .mount(server)
        .await;
    // refinement pass sees the cleaned assistant output
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("User request:\\nWhat is FC?"))
        .and(body_string_contains("Fabric Connect extends SPB."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {
                "role": "assistant",
                "content": "Reviewed: Fabric Connect extends SPB.\u{3010}7:2\u{2020}source\u{3011}"
            }}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 20, "total_tokens": 60}
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let rules_path = write_rules(&dir);
    let state = AppState::new(test_settings("http://unused.invalid", &rules_path, false)).unwrap();
    let router = create_router(state);

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn assistant_pipeline_runs_both_passes_and_strips_glyphs() {
    let server = MockServer::start().await;
    mount_assistant_happy_path(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let rules_path = write_rules(&dir);
    let state = AppState::new(test_settings(&server.uri(), &rules_path, true)).unwrap();
    let router = create_router(state);

    let (status, body) = post_json(
        router,
        "/api/chat",
        json!({"messages": [{"role": "user", "content": "What is FC?"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Reviewed: Fabric Connect extends SPB.");
    assert_eq!(body["annotations"][0]["type"], "file_citation");
    assert_eq!(body["annotations"][0]["file_id"], "file_99");
    assert_eq!(body["usage"]["total_tokens"], 60);
    assert_eq!(body["model"], "gpt-4o-mini");
}

#[tokio::test]
async fn upstream_thread_failure_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let rules_path = write_rules(&dir);
    let state = AppState::new(test_settings(&server.uri(), &rules_path, true)).unwrap();
    let router = create_router(state);

    let (status, body) = post_json(
        router,
        "/api/chat",
        json!({"messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("backend exploded"));
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn plain_mode_uses_chat_completions_directly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {
                "role": "assistant",
                "content": "Plain answer.\u{3010}1:1\u{2020}source\u{3011}"
            }}],
            "usage": {"prompt_tokens": 4, "completion_tokens": 3, "total_tokens": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let rules_path = write_rules(&dir);
    let state = AppState::new(test_settings(&server.uri(), &rules_path, false)).unwrap();
    let router = create_router(state);

    let (status, body) = post_json(
        router,
        "/api/chat",
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Plain answer.");
    assert!(body.get("annotations").is_none());
}

#[tokio::test]
async fn missing_file_meta_id_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let rules_path = write_rules(&dir);
    let state = AppState::new(test_settings("http://unused.invalid", &rules_path, false)).unwrap();
    let router = create_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/assistant/file-meta")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn vector_files_without_store_returns_warning_payload() {
    let dir = tempfile::tempdir().unwrap();
    let rules_path = write_rules(&dir);
    let state = AppState::new(test_settings("http://unused.invalid", &rules_path, false)).unwrap();
    let router = create_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/assistant/vector-files")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["files"], json!([]));
    assert_eq!(body["warning"], "OPENAI_VECTOR_STORE_ID not set");
}
