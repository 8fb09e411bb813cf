// SYNOID FitCheck Error Taxonomy
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Terminal failure of one intake request.
///
/// Validation failures are user-correctable (400) and happen before any
/// artifact is written, as are oversized bodies (413). Everything else is a
/// 500-class processing failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("Upload exceeds the {limit_mb} MB limit")]
    TooLarge { limit_mb: usize },

    /// Transcoder missing, failed to spawn, or exited non-zero.
    #[error(
        "Uploaded file is not MP4 and server conversion failed ({0}). \
         Make sure the ffmpeg path is correct."
    )]
    Conversion(String),

    #[error("Processing error: {0}")]
    Analysis(String),

    #[error("Processing timed out during {stage} after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TooLarge { .. } => "UPLOAD_TOO_LARGE",
            Self::Conversion(_) => "CONVERSION_ERROR",
            Self::Analysis(_) => "ANALYSIS_ERROR",
            Self::Timeout { .. } => "PROCESSING_TIMEOUT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));
        (self.status(), body).into_response()
    }
}
