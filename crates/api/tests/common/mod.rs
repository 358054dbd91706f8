#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use blackroad_api::config::ServerConfig;
use blackroad_api::router::build_app_router;
use blackroad_api::state::AppState;

/// A migrated database plus upload and model dirs, all under one temp dir.
pub struct TestEnv {
    pub state: AppState,
    pub dir: TempDir,
}

/// Build a test `ServerConfig` rooted in `dir`.
///
/// Short cancel grace so cancellation tests stay fast.
pub fn test_config(dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: format!("sqlite://{}", dir.path().join("ledger.db").display()),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        job_run_timeout_secs: 30,
        stream_cancel_grace_ms: 200,
        models_dir: dir.path().join("models"),
        transcribe_tmp: dir.path().join("uploads"),
        ..ServerConfig::default()
    }
}

pub async fn test_env() -> TestEnv {
    test_env_with(|_| {}).await
}

/// Like [`test_env`], letting the caller adjust the config first.
pub async fn test_env_with(adjust: impl FnOnce(&mut ServerConfig)) -> TestEnv {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = test_config(&dir);
    adjust(&mut config);

    std::fs::create_dir_all(&config.models_dir).expect("create models dir");
    std::fs::create_dir_all(&config.transcribe_tmp).expect("create upload dir");

    let pool = blackroad_db::create_pool(&config.database_url)
        .await
        .expect("open database");
    blackroad_db::run_migrations(&pool)
        .await
        .expect("run migrations");

    TestEnv {
        state: AppState::new(pool, config),
        dir,
    }
}

/// Build the full application router, exactly as `main.rs` does.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state).expect("build router")
}

/// Serve the app on an ephemeral port for WebSocket tests.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = build_test_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

const BOUNDARY: &str = "blackroad-test-boundary";

/// A multipart POST to `uri` carrying a single file field.
pub fn multipart_request(uri: &str, field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
