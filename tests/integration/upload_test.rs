//! CSV upload tests.

use super::common::{multipart_body, TestApp, PEOPLE_CSV};
use askql::config::{BudgetConfig, ServerConfig};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_upload_creates_dataset() {
    let t = TestApp::new();

    let (status, body) = t.upload("people.csv", PEOPLE_CSV).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "File processed successfully");
    assert_eq!(body["filename"], "people.csv");
    assert_eq!(body["dataset"], "people");
    assert_eq!(body["table_name"], "people");
    assert_eq!(body["row_count"], 2);

    let schema = body["schema"].as_str().unwrap();
    assert!(schema.contains("Table 'people' (2 rows):"));
    assert!(schema.contains("Column 'id' (type: INTEGER) | Stats: min=1, max=2, avg=1.50"));

    assert_eq!(body["schema_info"]["table_name"], "people");
    assert_eq!(body["schema_info"]["row_count"], 2);
    assert_eq!(
        body["schema_info"]["columns"][0],
        json!({"name": "id", "type": "number", "stats": "min=1, max=2, avg=1.50"})
    );
    assert_eq!(body["schema_info"]["columns"][1]["type"], "string");

    let uploads = t.dir.path().join("uploads");
    assert!(uploads.join("people.csv").is_file());
    assert!(uploads.join("people.db").is_file());
    assert!(uploads.join("people_context.json").is_file());
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let t = TestApp::new();
    let (boundary, body) = multipart_body("attachment", "people.csv", PEOPLE_CSV);

    let (status, body) = t
        .send(
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
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file part");
}

#[tokio::test]
async fn test_upload_that_is_not_multipart() {
    let t = TestApp::new();
    let (status, body) = t.post_json("/upload_csv", json!({"file": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file part");
}

#[tokio::test]
async fn test_upload_rejects_other_extensions() {
    let t = TestApp::new();
    let (status, body) = t.upload("people.txt", PEOPLE_CSV).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid file type");
    assert_eq!(body["kind"], "Invalid Input");
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let t = TestApp::new();
    let (status, body) = t.upload("", PEOPLE_CSV).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No selected file");
}

#[tokio::test]
async fn test_upload_accepts_uppercase_extension_and_spaces() {
    let t = TestApp::new();
    let (status, body) = t.upload("Sales Data.CSV", b"region,amount\nnorth,1.5\n").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dataset"], "Sales Data");
    assert_eq!(body["table_name"], "Sales_Data");
}

#[tokio::test]
async fn test_upload_rejects_rows_with_extra_cells() {
    let t = TestApp::new();
    let (status, body) = t.upload("bad.csv", b"a,b\n1,2\n3,4,5\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Row "));
}

#[tokio::test]
async fn test_reupload_replaces_table() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.upload("people.csv", b"id,name\n7,Carol\n").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["row_count"], 1);

    let (status, body) = t.ask("everyone", "SELECT * FROM people").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!([[7, "Carol"]]));
}

#[tokio::test]
async fn test_datasets_lists_uploads_and_active() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;
    t.upload("orders.csv", b"id,total\n1,9.5\n").await;

    let (status, body) = t.get("/datasets").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "orders");

    let names: Vec<&str> = body["datasets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["orders", "people"]);

    let people = &body["datasets"][1];
    assert_eq!(people["table_name"], "people");
    assert_eq!(people["active"], false);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let server = ServerConfig {
        upload_limit_mb: 1,
        ..ServerConfig::default()
    };
    let t = TestApp::with_config(server, BudgetConfig::default());

    let mut csv = b"id,note\n".to_vec();
    while csv.len() < 2 * 1024 * 1024 {
        csv.extend_from_slice(b"1,padding padding padding padding padding\n");
    }

    let (status, body) = t.upload("big.csv", &csv).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File too large. Maximum upload size is 1 MB.");
    assert!(!t.dir.path().join("uploads").join("big.csv").exists());
}
