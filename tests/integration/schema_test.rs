//! Schema and service endpoint tests.

use super::common::{TestApp, PEOPLE_CSV};
use askql::config::{BudgetConfig, ServerConfig};
use askql::dataset::NO_DATASET_MESSAGE;
use askql::db::{DatabaseClient, SqliteClient, Value};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tower::ServiceExt;

#[tokio::test]
async fn test_schema_without_dataset_is_not_found() {
    let t = TestApp::new();
    let (status, body) = t.get("/schema").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], NO_DATASET_MESSAGE);
}

#[tokio::test]
async fn test_schema_matches_upload() {
    let t = TestApp::new();
    let (_, uploaded) = t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.get("/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dataset"], "people");
    assert_eq!(body["schema"], uploaded["schema"]);
    assert_eq!(body["schema_info"], uploaded["schema_info"]);
}

#[tokio::test]
async fn test_schema_of_multi_table_default_database() {
    let dir = TempDir::new().unwrap();
    let default_db = dir.path().join("database.db");

    let store = SqliteClient::create(&default_db).await.unwrap();
    let id = vec![("id".to_string(), "INTEGER".to_string())];
    store
        .replace_table("alpha", &id, &[vec![Value::Int(1)], vec![Value::Int(2)]])
        .await
        .unwrap();
    store
        .replace_table("beta", &id, &[vec![Value::Int(3)]])
        .await
        .unwrap();
    store.close().await.unwrap();

    let server = ServerConfig {
        upload_dir: dir.path().join("uploads"),
        default_database: default_db,
        ..ServerConfig::default()
    };
    let t = TestApp::build(dir, server, BudgetConfig::default());

    let (status, body) = t.get("/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dataset"], "database");
    assert_eq!(body["schema_info"]["table_name"], "2 tables");
    assert_eq!(body["schema_info"]["row_count"], 3);
    assert_eq!(
        body["schema_info"]["columns"][0]["name"],
        "Tables: alpha, beta"
    );
    assert_eq!(
        body["schema_info"]["columns"][0]["stats"],
        "Multiple tables available"
    );
    assert!(body["schema"].as_str().unwrap().contains("Table 'beta' (1 rows):"));
}

#[tokio::test]
async fn test_health_and_banner() {
    let t = TestApp::new();

    let (status, body) = t.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&text).starts_with("askql"));
}
