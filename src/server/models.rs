//! Request and response bodies.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetEntry;
use crate::db::{Row, SchemaInfo};
use crate::monitoring::round_to;
use crate::service::GeneratedQuery;

/// Body of `POST /generate_sql`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub dataset: Option<String>,
}

/// Body of `POST /submit_feedback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackBody {
    #[serde(default)]
    pub original_question: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub dataset: Option<String>,
}

/// Successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub filename: String,
    pub dataset: String,
    pub table_name: String,
    pub row_count: usize,
    pub schema: String,
    pub schema_info: SchemaInfo,
}

/// Schema of the resolved dataset.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaResponse {
    pub dataset: String,
    pub schema: String,
    pub schema_info: SchemaInfo,
}

/// Generated SQL with its result rows.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub request_id: String,
    pub sql_query: String,
    pub result: Vec<Row>,
    pub columns: Vec<String>,
    /// Seconds, 3dp.
    pub latency: f64,
    pub cost: f64,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_request_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub feedback_applied: bool,
}

impl From<GeneratedQuery> for GenerateResponse {
    fn from(generated: GeneratedQuery) -> Self {
        Self {
            request_id: generated.request_id,
            sql_query: generated.sql_query,
            result: generated.result.rows,
            columns: generated.result.columns,
            latency: round_to(generated.latency.as_secs_f64(), 3),
            cost: round_to(generated.cost, 6),
            total_cost: round_to(generated.total_cost, 6),
            original_request_id: generated.original_request_id,
            feedback_applied: generated.feedback_applied,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Known datasets.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetsResponse {
    pub active: Option<String>,
    pub upload_dir: PathBuf,
    pub datasets: Vec<DatasetEntry>,
}
