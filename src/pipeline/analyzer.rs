// SYNOID FitCheck Analyzer Dispatcher
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Pose/motion analysis lives in external sidecar processes, one per
// exercise. Each is invoked as `<program> <args..> <input> <output>`,
// writes an annotated video to <output>, and prints a JSON line:
//
//   {"measurement": 23, "output_path": "static/outputs/processed_ab12cd34.mp4"}
//
// The dispatcher only selects the sidecar for the declared exercise and
// checks that what came back is usable.

use crate::pipeline::thresholds::Exercise;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Stderr lines kept when reporting a failed analyzer run.
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no analyzer configured for {0}")]
    NotConfigured(Exercise),

    #[error("failed to start analyzer: {0}")]
    Spawn(String),

    #[error("analyzer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("analyzer timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("unreadable analyzer report: {0}")]
    BadReport(String),

    #[error("analyzer reported invalid measurement {0}")]
    InvalidMeasurement(f64),

    #[error("analyzer produced no output video at {0:?}")]
    MissingOutput(PathBuf),
}

/// One scalar measurement plus the annotated video it came with.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Repetition count or distance in cm, depending on the exercise.
    pub measurement: f64,
    pub output_path: PathBuf,
}

/// Command line for one sidecar analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl AnalyzerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Whitespace-separated command line, e.g. `python3 analyzers/sit_ups.py`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SidecarReport {
    measurement: f64,
    #[serde(default)]
    output_path: Option<PathBuf>,
}

/// Selects and runs the sidecar for a declared exercise.
#[derive(Debug, Clone)]
pub struct AnalyzerDispatcher {
    commands: HashMap<Exercise, AnalyzerCommand>,
    timeout: Duration,
}

impl AnalyzerDispatcher {
    pub fn new(commands: HashMap<Exercise, AnalyzerCommand>, timeout: Duration) -> Self {
        Self { commands, timeout }
    }

    pub fn command_for(&self, exercise: Exercise) -> Option<&AnalyzerCommand> {
        self.commands.get(&exercise)
    }

    pub async fn analyze(
        &self,
        exercise: Exercise,
        input: &Path,
        output: &Path,
    ) -> Result<AnalysisResult, AnalysisError> {
        let cmd = self
            .command_for(exercise)
            .ok_or(AnalysisError::NotConfigured(exercise))?;

        info!(
            "[ANALYZER] Running {} analyzer ({}) on {:?}",
            exercise, cmd.program, input
        );

        let run = Command::new(&cmd.program)
            .args(&cmd.args)
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let out = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => {
                error!(
                    "[ANALYZER] ❌ {} analyzer still running after {}s, killed",
                    exercise,
                    self.timeout.as_secs()
                );
                return Err(AnalysisError::TimedOut(self.timeout));
            }
            Ok(Err(e)) => {
                error!("[ANALYZER] ❌ Failed to spawn {}: {}", cmd.program, e);
                return Err(AnalysisError::Spawn(e.to_string()));
            }
            Ok(Ok(out)) => out,
        };

        if !out.status.success() {
            let stderr = stderr_tail(&out.stderr);
            error!("[ANALYZER] ❌ {} analyzer exited with {}: {}", exercise, out.status, stderr);
            return Err(AnalysisError::Failed {
                status: out.status.to_string(),
                stderr,
            });
        }

        let report = parse_report(&out.stdout)?;
        if !report.measurement.is_finite() || report.measurement < 0.0 {
            return Err(AnalysisError::InvalidMeasurement(report.measurement));
        }

        if let Some(reported) = &report.output_path {
            if !same_location(reported, output) {
                warn!(
                    "[ANALYZER] {} analyzer reported {:?} instead of {:?}",
                    exercise, reported, output
                );
                return Err(AnalysisError::BadReport(format!(
                    "output_path {:?} is not the requested {:?}",
                    reported, output
                )));
            }
        }
        if !output.exists() {
            return Err(AnalysisError::MissingOutput(output.to_path_buf()));
        }

        info!(
            "[ANALYZER] ✅ {} analysis complete: {} {}",
            exercise,
            exercise.format_measurement(report.measurement),
            exercise.unit()
        );

        Ok(AnalysisResult {
            measurement: report.measurement,
            output_path: output.to_path_buf(),
        })
    }
}

/// Literal match, or both resolve to the same existing file.
fn same_location(reported: &Path, requested: &Path) -> bool {
    if reported == requested {
        return true;
    }
    match (reported.canonicalize(), requested.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// The report is the last non-empty stdout line; sidecars may log above it.
fn parse_report(stdout: &[u8]) -> Result<SidecarReport, AnalysisError> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| AnalysisError::BadReport("empty stdout".to_string()))?;
    serde_json::from_str(line).map_err(|e| AnalysisError::BadReport(format!("{} in {:?}", e, line)))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
