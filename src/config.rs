// SYNOID FitCheck Configuration
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Resolved once at process start from the environment (and `.env`), then
// handed around read-only. Nothing in the pipeline reads env vars itself.

use crate::pipeline::analyzer::AnalyzerCommand;
use crate::pipeline::health::probe_executable;
use crate::pipeline::thresholds::Exercise;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const ENV_FFMPEG: &str = "FITCHECK_FFMPEG";
pub const ENV_UPLOAD_DIR: &str = "FITCHECK_UPLOAD_DIR";
pub const ENV_OUTPUT_DIR: &str = "FITCHECK_OUTPUT_DIR";
pub const ENV_TIMEOUT_SECS: &str = "FITCHECK_TIMEOUT_SECS";
pub const ENV_MAX_UPLOAD_MB: &str = "FITCHECK_MAX_UPLOAD_MB";

const DEFAULT_TIMEOUT_SECS: u64 = 600;
const DEFAULT_MAX_UPLOAD_MB: usize = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("transcoder {0:?} is not reachable; set FITCHECK_FFMPEG to a working ffmpeg")]
    TranscoderUnreachable(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ffmpeg: PathBuf,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub analyzers: HashMap<Exercise, AnalyzerCommand>,
    /// Applies to each transcoder and analyzer run.
    pub processing_timeout: Duration,
    pub max_upload_bytes: usize,
}

/// Env var holding the analyzer command line for an exercise.
pub fn analyzer_env_key(exercise: Exercise) -> String {
    format!("FITCHECK_ANALYZER_{}", exercise.key().to_uppercase())
}

fn default_analyzer(exercise: Exercise) -> AnalyzerCommand {
    let script = match exercise {
        Exercise::PushUp => "analyzers/pushup_counter.py",
        Exercise::SitUp => "analyzers/sit_ups.py",
        Exercise::VerticalJump => "analyzers/vertical_jump.py",
        Exercise::SitAndReach => "analyzers/sit_and_reach.py",
    };
    AnalyzerCommand::new("python3", vec![script.to_string()])
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ffmpeg = get(ENV_FFMPEG).unwrap_or_else(|| "ffmpeg".to_string());
        let upload_dir = get(ENV_UPLOAD_DIR).unwrap_or_else(|| "static/uploads".to_string());
        let output_dir = get(ENV_OUTPUT_DIR).unwrap_or_else(|| "static/outputs".to_string());

        let timeout_secs = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => parse_positive(ENV_TIMEOUT_SECS, &raw)? as u64,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let max_upload_mb = match get(ENV_MAX_UPLOAD_MB) {
            Some(raw) => parse_positive(ENV_MAX_UPLOAD_MB, &raw)?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        let mut analyzers = HashMap::new();
        for exercise in Exercise::ALL {
            let key = analyzer_env_key(exercise);
            let cmd = match get(&key) {
                Some(line) => AnalyzerCommand::parse(&line).ok_or_else(|| ConfigError::Invalid {
                    key: key.clone(),
                    reason: "empty command".to_string(),
                })?,
                None => default_analyzer(exercise),
            };
            analyzers.insert(exercise, cmd);
        }

        Ok(Self {
            ffmpeg: PathBuf::from(ffmpeg),
            upload_dir: PathBuf::from(upload_dir),
            output_dir: PathBuf::from(output_dir),
            analyzers,
            processing_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    /// Fail fast when the configured ffmpeg cannot run.
    pub async fn verify_transcoder(&self) -> Result<(), ConfigError> {
        if probe_executable(&self.ffmpeg, "-version").await {
            info!("[CONFIG] ✅ Transcoder reachable: {:?}", self.ffmpeg);
            Ok(())
        } else {
            Err(ConfigError::TranscoderUnreachable(self.ffmpeg.clone()))
        }
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("expected a positive integer, got {:?}", raw),
        }),
    }
}
