//! Shared helpers for driving the router in-process.

use std::sync::Arc;

use askql::config::{BudgetConfig, ServerConfig};
use askql::dataset::DatasetRegistry;
use askql::llm::MockLlmClient;
use askql::monitoring::Monitor;
use askql::server::{router, AppState};
use askql::service::QueryService;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PEOPLE_CSV: &[u8] = b"id,name\n1,Alice\n2,Bob\n";

pub struct TestApp {
    pub dir: TempDir,
    pub llm: MockLlmClient,
    pub app: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default(), BudgetConfig::default())
    }

    pub fn with_config(mut server: ServerConfig, budget: BudgetConfig) -> Self {
        let dir = TempDir::new().unwrap();
        server.upload_dir = dir.path().join("uploads");
        server.default_database = dir.path().join("database.db");
        Self::build(dir, server, budget)
    }

    /// Builds the app over an existing directory, e.g. one with a default store.
    pub fn build(dir: TempDir, server: ServerConfig, budget: BudgetConfig) -> Self {
        let registry =
            DatasetRegistry::new(&server.upload_dir, &server.default_database).unwrap();
        registry.restore().unwrap();

        let llm = MockLlmClient::new();
        let service = QueryService::new(
            Arc::new(registry),
            Arc::new(llm.clone()),
            Arc::new(Monitor::new(&budget)),
        );
        let state = AppState::new(Arc::new(service), &server);
        let app = router(state, &server);

        Self { dir, llm, app }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn upload(&self, filename: &str, content: &[u8]) -> (StatusCode, Value) {
        let (boundary, body) = multipart_body("file", filename, content);
        self.send(
            Request::builder()
                .method("POST")
                .uri("/upload_csv")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Scripts one completion and asks `question`.
    pub async fn ask(&self, question: &str, completion: &str) -> (StatusCode, Value) {
        self.llm.push_response(completion);
        self.post_json(
            "/generate_sql",
            serde_json::json!({ "question": question }),
        )
        .await
    }
}

/// Builds a multipart body with a single file field.
pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "----TestBoundary1234567890";
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    (boundary.to_string(), body)
}
