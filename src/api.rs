//! HTTP trigger surface for the ingestion pipeline.
//!
//! - `POST /ingest/*name` – Run the pipeline on the raw request body. The path tail is the
//!   source name and `Content-Length` is the declared size. Returns the stored document id.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable catalog of the routes above.
//!
//! Failures map to a status per stage: validation 400, extraction 502, persistence 503.

use crate::pipeline::{IngestionApi, IngestionEvent, PipelineError, Stage};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode, header::CONTENT_LENGTH},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Build the router. Request bodies above `max_body_bytes` are refused by the framework.
pub fn create_router<S>(service: Arc<S>, max_body_bytes: usize) -> Router
where
    S: IngestionApi + 'static,
{
    Router::new()
        .route("/ingest/*name", post(ingest_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(service)
}

/// Success response for `POST /ingest/*name`.
#[derive(Serialize)]
struct IngestResponse {
    id: Uuid,
    filename: String,
    source_url: String,
    insight_degraded: bool,
}

async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError>
where
    S: IngestionApi,
{
    let declared = declared_size(&headers).unwrap_or(body.len());
    let event = IngestionEvent::new(name, body).with_declared_size(declared);
    let outcome = service.ingest(event).await?;
    tracing::info!(
        id = %outcome.id,
        filename = %outcome.filename,
        insight_degraded = outcome.insight_degraded,
        "Ingest request completed"
    );
    Ok(Json(IngestResponse {
        id: outcome.id,
        filename: outcome.filename,
        source_url: outcome.source_url,
        insight_degraded: outcome.insight_degraded,
    }))
}

fn declared_size(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> impl IntoResponse
where
    S: IngestionApi,
{
    Json(service.metrics_snapshot())
}

#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/ingest/{source_name}",
                description: "Extract layout, analyze, and persist the raw request body. Response returns { \"id\", \"filename\", \"source_url\", \"insight_degraded\" }.",
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters (documents persisted, degraded insights, failed runs, pages extracted).",
            },
        ],
    })
}

struct AppError(PipelineError);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.stage() {
            Stage::Validation => StatusCode::BAD_REQUEST,
            Stage::Extraction => StatusCode::BAD_GATEWAY,
            Stage::Persistence => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": self.0.to_string(),
            "stage": self.0.stage(),
            "retryable": self.0.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
