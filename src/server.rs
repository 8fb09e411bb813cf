// SYNOID FitCheck Upload Server
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Component, Path};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::health::check_dependencies;
use crate::pipeline::orchestrator::{ResultDescriptor, OUTPUTS_ROUTE};
use crate::pipeline::thresholds::{Exercise, FitnessLevel};
use crate::pipeline::upload_guard::{UploadRequest, UploadedVideo};
use crate::state::{HealthStatus, ResultView, ServiceState};

pub type AppState = Arc<ServiceState>;

/// Query keys the result view accepts for the measurement, in priority order.
const MEASUREMENT_PARAMS: &[&str] = &["reps", "height", "reach", "measurement"];

#[derive(Serialize)]
pub struct UploadResponse {
    pub result_url: String,
    pub video: String,
    pub video_url: String,
    pub exercise: Exercise,
    pub measurement: f64,
    pub level: FitnessLevel,
}

impl From<ResultDescriptor> for UploadResponse {
    fn from(d: ResultDescriptor) -> Self {
        Self {
            result_url: d.result_url(),
            video_url: d.video_url(),
            video: d.video,
            exercise: d.exercise,
            measurement: d.measurement,
            level: d.level,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let outputs = ServeDir::new(&state.config.output_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/upload", post(handle_upload))
        .route("/result", get(show_result))
        .route("/api/health", get(get_health))
        .nest_service(OUTPUTS_ROUTE, outputs)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("🚀 FitCheck upload server running on http://127.0.0.1:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Collect the multipart form into an [`UploadRequest`].
///
/// Unparseable ages are treated as missing, like an empty form field.
async fn read_upload_form(
    multipart: &mut Multipart,
    limit_bytes: usize,
) -> Result<UploadRequest, PipelineError> {
    let mut req = UploadRequest::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(form_error(None, e, limit_bytes)),
        };

        let name = field.name().unwrap_or_default().to_string();
        let read_err = |e: MultipartError| form_error(Some(&name), e, limit_bytes);

        match name.as_str() {
            "video" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(read_err)?;
                req.video = Some(UploadedVideo {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "age" => {
                let text = field.text().await.map_err(read_err)?;
                req.age = text.trim().parse::<u32>().ok();
            }
            "gender" => req.gender = Some(field.text().await.map_err(read_err)?),
            "exercise" => req.exercise = Some(field.text().await.map_err(read_err)?),
            _ => {}
        }
    }

    Ok(req)
}

/// Over-limit bodies become 413; anything else is a malformed form.
fn form_error(field: Option<&str>, e: MultipartError, limit_bytes: usize) -> PipelineError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("[SERVER] Upload rejected: body over {} bytes", limit_bytes);
        return PipelineError::TooLarge {
            limit_mb: limit_bytes / (1024 * 1024),
        };
    }
    error!("[SERVER] Upload read error: {}", e);
    match field {
        Some(name) => PipelineError::Validation(format!("Failed to read field '{}': {}", name, e)),
        None => PipelineError::Validation(format!("Malformed upload: {}", e)),
    }
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, PipelineError> {
    let req = read_upload_form(&mut multipart, state.config.max_upload_bytes).await?;
    let descriptor = state.pipeline.run(req).await?;
    Ok(Json(UploadResponse::from(descriptor)))
}

/// A result `video` must be a bare file name inside the output folder.
fn validate_video_name(raw: &str) -> Result<&str, String> {
    let mut components = Path::new(raw).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !raw.starts_with('.') && !raw.contains('\\') => {
            Ok(raw)
        }
        _ => Err(format!("Invalid video name: {}", raw)),
    }
}

async fn show_result(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let video = match params.get("video").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => return PipelineError::Validation("Missing video".to_string()).into_response(),
    };
    let video = match validate_video_name(video) {
        Ok(v) => v,
        Err(e) => return PipelineError::Validation(e).into_response(),
    };

    let measurement = MEASUREMENT_PARAMS
        .iter()
        .find_map(|key| params.get(*key))
        .cloned()
        .unwrap_or_else(|| "?".to_string());
    let level = params
        .get("level")
        .cloned()
        .unwrap_or_else(|| FitnessLevel::NotApplicable.label().to_string());

    Json(ResultView {
        video_url: format!("{}/{}", OUTPUTS_ROUTE, video),
        exercise: params.get("exercise").cloned(),
        measurement,
        level,
    })
    .into_response()
}

async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let missing = check_dependencies(&state.config.ffmpeg, &state.config.analyzers).await;
    let warnings = state.health.warnings();
    let status = if missing.is_empty() && warnings.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    (
        StatusCode::OK,
        Json(HealthStatus {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.health.uptime_secs(),
            missing_dependencies: missing,
            warnings,
        }),
    )
}
