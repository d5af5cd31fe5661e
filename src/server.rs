//! HTTP entry point.
//!
//! A thin JSON API that forwards each request to the [`Pipeline`] and
//! reports where the results were written.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/fetch_and_search` | Run the pipeline for a query |
//! | `GET`  | `/runs` | List runs and their artifacts |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `stage_failed` (500),
//! `storage_failed` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::PipelineError;
use crate::pipeline::{Pipeline, RunRequest};
use crate::run_store::RunSummary;

const DEFAULT_SCOPE: &str = "Atlanta";
const DEFAULT_TOPIC: &str = "Food";

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Start the HTTP server on `[server].bind` and serve until the process
/// is terminated.
pub async fn run_server(pipeline: Pipeline) -> anyhow::Result<()> {
    let bind_addr = pipeline.config().server.bind.clone();
    let app = router(Arc::new(pipeline));

    info!(%bind_addr, "server listening");
    println!("Listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed for in-process tests.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/fetch_and_search", post(handle_fetch_and_search))
        .route("/runs", get(handle_runs))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_invalid_input() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %err, "pipeline failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /fetch_and_search ============

/// Request body. `city` is accepted as an alias of `scope`.
#[derive(Deserialize)]
struct FetchSearchRequest {
    query: String,
    #[serde(default = "default_scope", alias = "city")]
    scope: String,
    #[serde(default = "default_topic")]
    topic: String,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    answer: bool,
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

#[derive(Serialize)]
struct FetchSearchResponse {
    message: String,
    output_filename: String,
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
}

async fn handle_fetch_and_search(
    State(state): State<AppState>,
    Json(body): Json<FetchSearchRequest>,
) -> Result<Json<FetchSearchResponse>, AppError> {
    let mut request = RunRequest::new(body.scope, body.topic, body.query);
    request.run_id = body.run_id;
    request.answer = body.answer;

    let outcome = state.pipeline.run(request).await?;

    Ok(Json(FetchSearchResponse {
        message: outcome.status_message,
        output_filename: outcome.result_artifact_path.display().to_string(),
        run_id: outcome.run_id,
        answer: outcome.answer,
    }))
}

// ============ GET /runs ============

#[derive(Serialize)]
struct RunsResponse {
    runs: Vec<RunSummary>,
}

async fn handle_runs(State(state): State<AppState>) -> Result<Json<RunsResponse>, AppError> {
    let runs = state
        .pipeline
        .store()
        .list_runs()
        .map_err(PipelineError::Storage)?;
    Ok(Json(RunsResponse { runs }))
}
