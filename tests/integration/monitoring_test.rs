//! Monitoring, cost cap and reset tests.

use super::common::{TestApp, PEOPLE_CSV};
use askql::config::{BudgetConfig, ServerConfig};
use askql::error::BUDGET_EXHAUSTED_MESSAGE;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

fn reset_request(header: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/reset_monitoring");
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_snapshot_tracks_requests() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;
    t.ask("everyone", "SELECT * FROM people").await;
    t.ask("names", "SELECT name FROM people").await;

    let (status, body) = t.get("/monitoring").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_requests"], 2);
    assert_eq!(body["total_feedback_sessions"], 0);
    assert_eq!(body["cost_cap"], 10.0);

    let total = body["total_cost"].as_f64().unwrap();
    let remaining = body["remaining_budget"].as_f64().unwrap();
    assert!(total > 0.0);
    assert!((total + remaining - 10.0).abs() < 1e-5);

    let recent = body["recent_requests"].as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[1]["question"], "names");
    assert_eq!(recent[1]["sql_query"], "SELECT name FROM people");
}

#[tokio::test]
async fn test_cap_reached_refuses_without_calling_model() {
    let budget = BudgetConfig {
        cost_cap: 0.0,
        ..BudgetConfig::default()
    };
    let t = TestApp::with_config(ServerConfig::default(), budget);
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, body) = t.ask("everyone", "SELECT * FROM people").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], BUDGET_EXHAUSTED_MESSAGE);
    assert!(t.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_cap_reached_wins_over_blank_question() {
    let budget = BudgetConfig {
        cost_cap: 0.0,
        ..BudgetConfig::default()
    };
    let t = TestApp::with_config(ServerConfig::default(), budget);

    let (status, body) = t
        .post_json("/generate_sql", json!({"question": "   "}))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], BUDGET_EXHAUSTED_MESSAGE);
}

#[tokio::test]
async fn test_cap_reached_after_spending() {
    let budget = BudgetConfig {
        cost_cap: 1e-9,
        ..BudgetConfig::default()
    };
    let t = TestApp::with_config(ServerConfig::default(), budget);
    t.upload("people.csv", PEOPLE_CSV).await;

    let (status, _) = t.ask("everyone", "SELECT * FROM people").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.ask("everyone again", "SELECT * FROM people").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(t.llm.prompts().len(), 1);
}

#[tokio::test]
async fn test_reset_without_token_configured() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;
    t.ask("everyone", "SELECT * FROM people").await;

    let (status, body) = t.send(reset_request(None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Monitoring data reset successfully");

    let (_, body) = t.get("/monitoring").await;
    assert_eq!(body["total_requests"], 0);
    assert_eq!(body["total_cost"], 0.0);
    assert_eq!(body["recent_requests"], json!([]));
}

#[tokio::test]
async fn test_reset_requires_configured_token() {
    let server = ServerConfig {
        admin_token: Some("s3cret".to_string()),
        ..ServerConfig::default()
    };
    let t = TestApp::with_config(server, BudgetConfig::default());
    t.upload("people.csv", PEOPLE_CSV).await;
    t.ask("everyone", "SELECT * FROM people").await;

    let (status, body) = t.send(reset_request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "Unauthorized");

    let (status, _) = t
        .send(reset_request(Some(("Authorization", "Bearer wrong"))))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = t.get("/monitoring").await;
    assert_eq!(body["total_requests"], 1);

    let (status, _) = t
        .send(reset_request(Some(("Authorization", "Bearer s3cret"))))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send(reset_request(Some(("X-Admin-Token", "s3cret"))))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_feedback_sessions_are_counted() {
    let t = TestApp::new();
    t.upload("people.csv", PEOPLE_CSV).await;
    let (_, first) = t.ask("names", "SELECT name FROM people").await;

    t.llm.push_response("SELECT name FROM people WHERE id = 1");
    t.post_json(
        "/submit_feedback",
        json!({
            "original_question": "names",
            "feedback": "just Alice",
            "request_id": first["request_id"],
        }),
    )
    .await;

    let (_, body) = t.get("/monitoring").await;
    assert_eq!(body["total_requests"], 2);
    assert_eq!(body["total_feedback_sessions"], 1);
    assert_eq!(body["feedback_improvement_rate"], 50.0);

    let session = &body["recent_feedback_sessions"][0];
    assert_eq!(session["feedback"], "just Alice");
    assert_eq!(session["original_request_id"], first["request_id"]);
    assert_eq!(
        body["recent_requests"][1]["question"],
        "names [FEEDBACK: just Alice]"
    );
}
