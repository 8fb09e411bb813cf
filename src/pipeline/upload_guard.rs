// SYNOID FitCheck Upload Guard
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// First gate of the intake pipeline. Everything here is pure: a request
// that fails validation never touches the filesystem.

use crate::error::PipelineError;
use crate::pipeline::thresholds::Exercise;
use tracing::warn;

/// Upload extensions the pipeline accepts (matched case-insensitively).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv"];

/// Format every analyzer can decode directly.
pub const CANONICAL_EXTENSION: &str = "mp4";

#[derive(Debug, Clone)]
pub struct UploadedVideo {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One user submission as received from the web layer or the CLI.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub video: Option<UploadedVideo>,
    /// Absent means push-up (the single-exercise form).
    pub exercise: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

/// A request that passed every check, ready to be persisted.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub exercise: Exercise,
    pub age: u32,
    pub gender: String,
    /// Lowercased final dot-segment of the original filename.
    pub extension: String,
    pub stored_name: String,
}

/// Final dot-segment of `filename`, lowercased, if it is an accepted one.
pub fn accepted_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    ACCEPTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reduce a client filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    // Only the last component of either separator style survives.
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned
        .trim_start_matches(['.', '_'])
        .trim_end_matches('.')
        .to_string()
}

/// Check a request in the order the upload form reports problems.
pub fn validate(req: &UploadRequest) -> Result<ValidatedUpload, PipelineError> {
    let video = req
        .video
        .as_ref()
        .ok_or_else(|| reject("No file part"))?;

    if video.filename.trim().is_empty() {
        return Err(reject("No selected file"));
    }

    if video.bytes.is_empty() {
        return Err(reject("Uploaded file is empty"));
    }

    let age = req.age.filter(|a| *a > 0);
    let gender = req
        .gender
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty());
    let (Some(age), Some(gender)) = (age, gender) else {
        return Err(reject("Age and gender are required"));
    };

    let extension =
        accepted_extension(&video.filename).ok_or_else(|| reject("File type not allowed"))?;

    let exercise = match req.exercise.as_deref().map(str::trim) {
        None | Some("") => Exercise::PushUp,
        Some(raw) => Exercise::from_str(raw)
            .ok_or_else(|| reject(&format!("Unknown exercise type: {}", raw)))?,
    };

    let mut stored_name = sanitize_filename(&video.filename);
    if accepted_extension(&stored_name).as_deref() != Some(extension.as_str()) {
        stored_name = format!("video.{}", extension);
    }

    Ok(ValidatedUpload {
        exercise,
        age,
        gender: gender.to_string(),
        extension,
        stored_name,
    })
}

fn reject(reason: &str) -> PipelineError {
    warn!("[UPLOAD] 🛡️ Rejected: {}", reason);
    PipelineError::Validation(reason.to_string())
}
