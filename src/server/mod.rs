//! HTTP interface.
//!
//! A thin axum layer over `QueryService`: handlers decode requests, call the
//! service, and map `AskError` onto status codes through `ApiError`.

mod error;
mod handlers;
mod models;

pub use error::{ApiError, ErrorBody, REDACTED_MESSAGE};
pub use models::{
    DatasetsResponse, FeedbackBody, GenerateRequest, GenerateResponse, HealthResponse,
    MessageResponse, SchemaResponse, UploadResponse,
};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{AskError, Result};
use crate::service::QueryService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
    pub admin_token: Option<Arc<str>>,
    pub redact_errors: bool,
    pub upload_limit_bytes: usize,
}

impl AppState {
    /// Creates state from the service and server settings.
    pub fn new(service: Arc<QueryService>, config: &ServerConfig) -> Self {
        Self {
            service,
            admin_token: config.admin_token.as_deref().map(Arc::from),
            redact_errors: config.redact_errors,
            upload_limit_bytes: config.upload_limit_mb * 1024 * 1024,
        }
    }

    fn error(&self, err: AskError) -> ApiError {
        ApiError::new(err, self.redact_errors)
    }
}

/// Builds the CORS layer; no configured origins allows any.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Assembles the application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let upload_limit = state.upload_limit_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route(
            "/upload_csv",
            post(handlers::upload_csv).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/schema", get(handlers::schema))
        .route("/datasets", get(handlers::datasets))
        .route("/generate_sql", post(handlers::generate_sql))
        .route("/submit_feedback", post(handlers::submit_feedback))
        .route("/monitoring", get(handlers::monitoring))
        .route("/reset_monitoring", post(handlers::reset_monitoring))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `config.bind_addr()` and serves until the process is stopped.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    if state.admin_token.is_none() {
        warn!("No admin token configured; /reset_monitoring is open to every client");
    }

    let app = router(state, config);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AskError::config(format!("Failed to bind {addr}: {e}")))?;

    info!("askql listening on http://{}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| AskError::internal(format!("Server error: {e}")))
}
