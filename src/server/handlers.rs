//! Route handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::{info, warn};

use super::error::ApiError;
use super::models::{
    DatasetsResponse, FeedbackBody, GenerateRequest, GenerateResponse, HealthResponse,
    MessageResponse, SchemaResponse, UploadResponse,
};
use super::AppState;
use crate::error::AskError;
use crate::monitoring::MonitoringSnapshot;
use crate::service::FeedbackRequest;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub async fn index() -> &'static str {
    concat!("askql ", env!("CARGO_PKG_VERSION"))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /upload_csv`
pub async fn upload_csv(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResponse> {
    let multipart = multipart.map_err(|_| state.error(AskError::invalid_input("No file part")))?;
    let (filename, bytes) = read_file_field(multipart, state.upload_limit_bytes)
        .await
        .map_err(|e| state.error(e))?;

    let outcome = state
        .service
        .registry()
        .import_csv(&filename, &bytes)
        .await
        .map_err(|e| state.error(e))?;

    let schema_info = outcome.dataset.summary.schema_info();
    Ok(Json(UploadResponse {
        message: "File processed successfully",
        filename: outcome.filename,
        dataset: outcome.dataset.name,
        table_name: outcome.table_name,
        row_count: outcome.row_count,
        schema: outcome.dataset.schema,
        schema_info,
    }))
}

/// Pulls the `file` field out of an upload form.
async fn read_file_field(
    mut multipart: Multipart,
    upload_limit_bytes: usize,
) -> crate::error::Result<(String, Vec<u8>)> {
    let upload_limit_mb = upload_limit_bytes / 1024 / 1024;

    let too_large = || {
        AskError::invalid_input(format!(
            "File too large. Maximum upload size is {upload_limit_mb} MB."
        ))
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large()
        } else {
            AskError::invalid_input(format!("Failed to read multipart field: {e}"))
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                too_large()
            } else {
                AskError::invalid_input(format!("Failed to read file data: {e}"))
            }
        })?;
        return Ok((filename, bytes.to_vec()));
    }

    Err(AskError::invalid_input("No file part"))
}

/// `GET /schema`
pub async fn schema(State(state): State<AppState>) -> ApiResult<SchemaResponse> {
    let dataset = state
        .service
        .registry()
        .resolve(None)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(SchemaResponse {
        schema_info: dataset.summary.schema_info(),
        dataset: dataset.name,
        schema: dataset.schema,
    }))
}

/// `GET /datasets`
pub async fn datasets(State(state): State<AppState>) -> ApiResult<DatasetsResponse> {
    let registry = state.service.registry();
    let datasets = registry.list().map_err(|e| state.error(e))?;

    Ok(Json(DatasetsResponse {
        active: registry.active(),
        upload_dir: registry.upload_dir().to_path_buf(),
        datasets,
    }))
}

/// `POST /generate_sql`
pub async fn generate_sql(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<GenerateResponse> {
    let Json(body) = payload.map_err(|e| state.error(bad_json(e)))?;

    let generated = state
        .service
        .generate(&body.question, body.dataset.as_deref())
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(generated.into()))
}

/// `POST /submit_feedback`
pub async fn submit_feedback(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FeedbackBody>, JsonRejection>,
) -> ApiResult<GenerateResponse> {
    let Json(body) = payload.map_err(|e| state.error(bad_json(e)))?;

    let generated = state
        .service
        .regenerate_with_feedback(FeedbackRequest {
            original_question: body.original_question,
            feedback: body.feedback,
            request_id: body.request_id.filter(|id| !id.trim().is_empty()),
            dataset: body.dataset,
        })
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(generated.into()))
}

/// `GET /monitoring`
pub async fn monitoring(State(state): State<AppState>) -> Json<MonitoringSnapshot> {
    Json(state.service.monitor().snapshot())
}

/// `POST /reset_monitoring`
pub async fn reset_monitoring(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<MessageResponse> {
    if let Some(expected) = state.admin_token.as_deref() {
        if presented_token(&headers) != Some(expected) {
            warn!("Rejected monitoring reset without a valid admin token");
            return Err(state.error(AskError::unauthorized("a valid admin token is required")));
        }
    }

    state.service.monitor().reset();
    info!("Monitoring data reset");
    Ok(Json(MessageResponse {
        message: "Monitoring data reset successfully",
    }))
}

/// Token from `Authorization: Bearer <token>` or `X-Admin-Token`.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer.or_else(|| {
        headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    })
}

fn bad_json(rejection: JsonRejection) -> AskError {
    AskError::invalid_input(format!("Invalid JSON body: {}", rejection.body_text()))
}
