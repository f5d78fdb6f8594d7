//! Question and feedback tests.

use super::common::{TestApp, PEOPLE_CSV};
use askql::config::{BudgetConfig, ServerConfig};
use askql::dataset::NO_DATASET_MESSAGE;
use askql::error::DECLINED_MESSAGE;
use askql::server::REDACTED_MESSAGE;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_select_all_returns_rows() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.ask("show everyone", "```sql\nSELECT * FROM people\n```").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql_query"], "SELECT * FROM people");
    assert_eq!(body["columns"], json!(["id", "name"]));
    assert_eq!(body["result"], json!([[1, "Alice"], [2, "Bob"]]));
    assert!(body["request_id"].as_str().unwrap().ends_with("_0"));
    assert!(body["cost"].as_f64().unwrap() > 0.0);
    assert_eq!(body["total_cost"], body["cost"]);
    assert!(body["latency"].as_f64().unwrap() >= 0.0);
    assert!(body.get("feedback_applied").is_none());

    let prompt = &t.llm.prompts()[0];
    assert!(prompt.contains("Table 'people' (2 rows):"));
    assert!(prompt.contains("\"show everyone\""));
}

#[tokio::test]
async fn test_count_matches_schema_row_count() {
    let t = TestApp::new();
    let (_, uploaded) = t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t
        .ask("how many people", "SELECT COUNT(*) AS total FROM people")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["columns"], json!(["total"]));
    assert_eq!(body["result"][0][0], uploaded["schema_info"]["row_count"]);
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t
        .ask("nobody", "SELECT name FROM people WHERE id > 100")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["columns"], json!(["name"]));
    assert_eq!(body["result"], json!([]));
}

#[tokio::test]
async fn test_non_data_question_is_declined() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.ask("tell me a joke", "invalid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], DECLINED_MESSAGE);

    // The completion was still paid for.
    let (_, snapshot) = t.get("/monitoring").await;
    assert_eq!(snapshot["total_requests"], 1);
}

#[tokio::test]
async fn test_non_select_is_forbidden() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.ask("remove people", "DROP TABLE people").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "Security violation: Only SELECT statements are allowed."
    );

    // Still there.
    let (status, body) = t.ask("everyone", "SELECT * FROM people").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stacked_statement_is_forbidden() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t
        .ask("q", "SELECT * FROM people; DROP TABLE people")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Dangerous SQL pattern detected (DROP)"));
}

#[tokio::test]
async fn test_trailing_semicolon_is_forbidden() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.ask("q", "SELECT * FROM people;").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("(;)"));
}

#[tokio::test]
async fn test_missing_question() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.post_json("/generate_sql", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Question is required.");
    assert!(t.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_malformed_body() {
    let t = TestApp::new();
    let (status, body) = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/generate_sql")
                .header("Content-Type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn test_question_before_any_upload() {
    let t = TestApp::new();
    let (status, body) = t.ask("anything", "SELECT 1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], NO_DATASET_MESSAGE);
}

#[tokio::test]
async fn test_named_dataset() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;
    t.upload("orders.csv", b"id,total\n1,9.5\n").await;

    t.llm.push_response("SELECT name FROM people ORDER BY id");
    let (status, body) = t
        .post_json(
            "/generate_sql",
            json!({"question": "names", "dataset": "people"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!([["Alice"], ["Bob"]]));

    let (status, _) = t
        .post_json(
            "/generate_sql",
            json!({"question": "names", "dataset": "missing"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_execution_error_detail() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.ask("emails", "SELECT email FROM people").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("no such column"));
}

#[tokio::test]
async fn test_execution_error_redacted() {
    let server = ServerConfig {
        redact_errors: true,
        ..ServerConfig::default()
    };
    let t = TestApp::with_config(server, BudgetConfig::default());
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.ask("emails", "SELECT email FROM people").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], REDACTED_MESSAGE);
    assert_eq!(body["kind"], "Query Error");
}

#[tokio::test]
async fn test_feedback_regenerates() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (_, first) = t.ask("names", "SELECT name FROM people").await;
    let first_id = first["request_id"].as_str().unwrap().to_string();

    t.llm.push_response("SELECT name FROM people WHERE name = 'Bob'");
    let (status, body) = t
        .post_json(
            "/submit_feedback",
            json!({
                "original_question": "names",
                "feedback": "only Bob",
                "request_id": first_id,
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback_applied"], true);
    assert_eq!(body["original_request_id"], first_id.as_str());
    assert_eq!(body["result"], json!([["Bob"]]));
    assert!(body["request_id"].as_str().unwrap().contains("_fb_0"));

    let prompt = &t.llm.prompts()[1];
    assert!(prompt.contains("### Original User Question:\n\"names\""));
    assert!(prompt.contains("### User Feedback/Clarification:\n\"only Bob\""));
}

#[tokio::test]
async fn test_feedback_requires_both_texts() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t
        .post_json("/submit_feedback", json!({"original_question": "names"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Both original_question and feedback are required."
    );
}
