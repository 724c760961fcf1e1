//! HTTP integration tests: gateway → ReqwestTransport → stub GitLab (axum).

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use base64::Engine;
use gitlab_mcp::gitlab::ReqwestTransport;
use gitlab_mcp::tools::Gateway;
use gitlab_mcp::types::{Config, GitLabConfig, RATE_LIMIT_PHRASE};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

const TOKEN: &str = "glpat-integration";

#[derive(Debug, Clone)]
struct Recorded {
    method: &'static str,
    project: String,
    file: String,
    body: Value,
}

#[derive(Clone, Default)]
struct StubGitLab {
    files: Arc<Mutex<HashMap<(String, String), String>>>,
    writes: Arc<Mutex<Vec<Recorded>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(&format!("Bearer {}", TOKEN))
}

async fn get_project(Path(id): Path<String>) -> impl IntoResponse {
    if id == "limited" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": format!("403 Forbidden - {}", RATE_LIMIT_PHRASE) })),
        );
    }
    (StatusCode::NOT_FOUND, Json(json!({ "message": "404 Project Not Found" })))
}

async fn get_file(
    State(stub): State<StubGitLab>,
    Path((project, file)): Path<(String, String)>,
) -> impl IntoResponse {
    let files = stub.files.lock().unwrap();
    match files.get(&(project, file.clone())) {
        Some(content) => (
            StatusCode::OK,
            Json(json!({
                "file_name": file.rsplit('/').next().unwrap_or_default(),
                "file_path": file,
                "size": content.len(),
                "encoding": "base64",
                "content": base64::engine::general_purpose::STANDARD.encode(content),
                "content_sha256": "sha",
                "ref": "main",
                "blob_id": "blob-1",
                "commit_id": "commit-1",
                "last_commit_id": "last-1",
            })),
        ),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "404 File Not Found" }))),
    }
}

fn record_write(
    stub: &StubGitLab,
    method: &'static str,
    project: String,
    file: String,
    body: Value,
) -> Json<Value> {
    let content = body["content"].as_str().unwrap_or_default().to_string();
    let branch = body["branch"].clone();
    stub.files.lock().unwrap().insert((project.clone(), file.clone()), content);
    stub.writes.lock().unwrap().push(Recorded {
        method,
        project,
        file: file.clone(),
        body,
    });
    Json(json!({ "file_path": file, "branch": branch }))
}

async fn create_file(
    State(stub): State<StubGitLab>,
    Path((project, file)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    (StatusCode::CREATED, record_write(&stub, "POST", project, file, body))
}

async fn update_file(
    State(stub): State<StubGitLab>,
    Path((project, file)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record_write(&stub, "PUT", project, file, body)
}

async fn job_trace(headers: HeaderMap, Path((_project, job)): Path<(String, u64)>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "401 Unauthorized".to_string());
    }
    (StatusCode::OK, format!("job {} started\n$ cargo test\nok\n", job))
}

/// Spin up the stub on a random port and build a gateway pointed at it.
async fn start_stub() -> (StubGitLab, Gateway) {
    let stub = StubGitLab::default();
    let app = Router::new()
        .route("/api/v4/projects/{id}", get(get_project))
        .route(
            "/api/v4/projects/{id}/repository/files/{file}",
            get(get_file).post(create_file).put(update_file),
        )
        .route("/api/v4/projects/{id}/jobs/{job}/trace", get(job_trace))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let config = Config {
        gitlab: GitLabConfig {
            token: TOKEN.to_string(),
            api_url: format!("http://{}/api/v4", addr),
            ..Default::default()
        },
        ..Default::default()
    };
    let transport = Arc::new(ReqwestTransport::new(&config.gitlab).unwrap());
    let gateway = Gateway::new(&config, transport).unwrap();
    (stub, gateway)
}

fn response_text(response: gitlab_mcp::tools::ToolResponse) -> String {
    response.content.into_iter().next().unwrap().text
}

#[tokio::test]
async fn test_create_or_update_file_checks_then_writes() {
    let (stub, gateway) = start_stub().await;
    let args = json!({
        "project_id": "group/app",
        "file_path": "docs/README.md",
        "content": "v1",
        "commit_message": "add readme",
        "branch": "main",
    });

    gateway.dispatch("create_or_update_file", Some(args.clone())).await.unwrap();

    let mut update = args;
    update["content"] = json!("v2");
    gateway.dispatch("create_or_update_file", Some(update)).await.unwrap();

    let writes = stub.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 2);

    assert_eq!(writes[0].method, "POST");
    assert_eq!(writes[0].project, "group/app");
    assert_eq!(writes[0].file, "docs/README.md");
    assert_eq!(writes[0].body["encoding"], "text");
    assert!(writes[0].body.get("last_commit_id").is_none());

    assert_eq!(writes[1].method, "PUT");
    assert_eq!(writes[1].body["content"], "v2");
    assert_eq!(writes[1].body["commit_id"], "commit-1");
    assert_eq!(writes[1].body["last_commit_id"], "last-1");
}

#[tokio::test]
async fn test_file_contents_are_decoded() {
    let (stub, gateway) = start_stub().await;
    stub.files.lock().unwrap().insert(
        ("42".to_string(), "src/lib.rs".to_string()),
        "pub fn answer() -> u32 { 42 }".to_string(),
    );

    let response = gateway
        .dispatch(
            "get_file_contents",
            Some(json!({ "project_id": "42", "file_path": "src/lib.rs", "ref": "main" })),
        )
        .await
        .unwrap();
    let file: Value = serde_json::from_str(&response_text(response)).unwrap();
    assert_eq!(file["content"], "pub fn answer() -> u32 { 42 }");
    assert_eq!(file["encoding"], "utf8");
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let (_stub, gateway) = start_stub().await;
    let err = gateway
        .dispatch(
            "get_file_contents",
            Some(json!({ "project_id": "42", "file_path": "nope.txt", "ref": "main" })),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
    assert!(err.to_string().contains("nope.txt"));
}

#[tokio::test]
async fn test_rate_limited_forbidden_is_classified() {
    let (_stub, gateway) = start_stub().await;
    let err = gateway
        .dispatch("get_project", Some(json!({ "project_id": "limited" })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "RATE_LIMITED");
}

#[tokio::test]
async fn test_job_trace_is_plain_text_with_bearer_auth() {
    let (_stub, gateway) = start_stub().await;
    let response = gateway
        .dispatch("get_pipeline_job_output", Some(json!({ "project_id": "42", "job_id": 7 })))
        .await
        .unwrap();
    assert_eq!(response_text(response), "job 7 started\n$ cargo test\nok\n");
}
