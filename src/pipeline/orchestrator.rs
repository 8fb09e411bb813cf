// SYNOID FitCheck Pipeline Orchestrator
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// One upload, one linear attempt:
//   validate → persist → normalize → analyze → classify → respond
// The first failing stage ends the request. Nothing is retried and no
// state is shared between requests beyond the read-only configuration.

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::pipeline::analyzer::{AnalysisError, AnalyzerDispatcher};
use crate::pipeline::artifacts::{public_name, ArtifactStore};
use crate::pipeline::classifier::classify;
use crate::pipeline::normalizer::{ConversionFailure, FormatNormalizer, Normalized};
use crate::pipeline::thresholds::{Exercise, FitnessLevel};
use crate::pipeline::upload_guard::{self, UploadRequest};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use url::form_urlencoded;

/// Where the annotated output videos are served from.
pub const OUTPUTS_ROUTE: &str = "/static/outputs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validate,
    Persist,
    Normalize,
    Analyze,
    Classify,
    Respond,
}

/// Terminal output of a successful request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDescriptor {
    /// File name of the annotated video inside the output folder.
    pub video: String,
    pub exercise: Exercise,
    pub measurement: f64,
    pub level: FitnessLevel,
}

impl ResultDescriptor {
    pub fn video_url(&self) -> String {
        format!("{}/{}", OUTPUTS_ROUTE, self.video)
    }

    pub fn display_measurement(&self) -> String {
        self.exercise.format_measurement(self.measurement)
    }

    /// Link to the result view carrying the display parameters.
    pub fn result_url(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("video", &self.video)
            .append_pair("exercise", self.exercise.key())
            .append_pair(self.exercise.result_param(), &self.display_measurement())
            .append_pair("level", self.level.label())
            .finish();
        format!("/result?{}", query)
    }
}

pub type ProgressCallback = Arc<dyn Fn(PipelineStage, &str) + Send + Sync>;

pub struct FitnessPipeline {
    store: ArtifactStore,
    normalizer: FormatNormalizer,
    analyzers: AnalyzerDispatcher,
    progress_callback: Option<ProgressCallback>,
}

impl FitnessPipeline {
    pub fn new(
        store: ArtifactStore,
        normalizer: FormatNormalizer,
        analyzers: AnalyzerDispatcher,
    ) -> Self {
        Self {
            store,
            normalizer,
            analyzers,
            progress_callback: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ArtifactStore::new(&config.upload_dir, &config.output_dir),
            FormatNormalizer::new(&config.ffmpeg, config.processing_timeout),
            AnalyzerDispatcher::new(config.analyzers.clone(), config.processing_timeout),
        )
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Startup routine: provision the artifact folders.
    pub async fn prepare(&self) -> std::io::Result<()> {
        self.store.provision().await
    }

    pub async fn run(&self, req: UploadRequest) -> Result<ResultDescriptor, PipelineError> {
        // 1. Validate (no side effects)
        self.report_progress(PipelineStage::Validate, "Validating upload");
        let upload = upload_guard::validate(&req)?;
        let bytes = req.video.map(|v| v.bytes).unwrap_or_default();

        // 2. Persist & name
        self.report_progress(PipelineStage::Persist, "Storing upload");
        let stored = self.store.persist_upload(&upload.stored_name, &bytes).await?;
        let id = stored.id.clone();
        drop(bytes);

        // 3. Normalize
        self.report_progress(
            PipelineStage::Normalize,
            &format!("[{}] Normalizing .{} upload", id, upload.extension),
        );
        let video = match self
            .normalizer
            .normalize(&stored.path, &upload.extension, &self.store.converted_path(&id))
            .await
        {
            Normalized::Ready(video) => video,
            Normalized::Failed(ConversionFailure::TimedOut(d)) => {
                error!("[PIPELINE] [{}] Transcode timed out", id);
                return Err(PipelineError::Timeout {
                    stage: "transcoding",
                    secs: d.as_secs(),
                });
            }
            Normalized::Failed(failure) => {
                error!("[PIPELINE] [{}] Transcode failed: {}", id, failure);
                return Err(PipelineError::Conversion(failure.to_string()));
            }
        };

        // 4. Dispatch to the exercise analyzer
        self.report_progress(
            PipelineStage::Analyze,
            &format!("[{}] Analyzing {} video ({:?})", id, upload.exercise, video.format),
        );
        let analysis = self
            .analyzers
            .analyze(upload.exercise, &video.path, &self.store.output_path(&id))
            .await
            .map_err(|e| {
                error!("[PIPELINE] [{}] Analysis failed: {}", id, e);
                match e {
                    AnalysisError::TimedOut(d) => PipelineError::Timeout {
                        stage: "analysis",
                        secs: d.as_secs(),
                    },
                    other => PipelineError::Analysis(other.to_string()),
                }
            })?;

        // 5. Classify
        let level = classify(upload.exercise, analysis.measurement, upload.age, &upload.gender);
        self.report_progress(
            PipelineStage::Classify,
            &format!(
                "[{}] {} {} → {} (age {}, {})",
                id,
                upload.exercise.format_measurement(analysis.measurement),
                upload.exercise.unit(),
                level,
                upload.age,
                upload.gender
            ),
        );

        // 6. Respond
        let descriptor = ResultDescriptor {
            video: public_name(&analysis.output_path),
            exercise: upload.exercise,
            measurement: analysis.measurement,
            level,
        };
        self.report_progress(
            PipelineStage::Respond,
            &format!("[{}] Pipeline complete: {}", id, descriptor.video),
        );
        Ok(descriptor)
    }

    fn report_progress(&self, stage: PipelineStage, msg: &str) {
        info!("[PIPELINE] {}", msg);
        if let Some(ref callback) = self.progress_callback {
            callback(stage, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_url_uses_exercise_param() {
        let d = ResultDescriptor {
            video: "processed_ab12cd34.mp4".to_string(),
            exercise: Exercise::SitAndReach,
            measurement: 22.0,
            level: FitnessLevel::AboveAverage,
        };
        assert_eq!(
            d.result_url(),
            concat!(
                "/result?video=processed_ab12cd34.mp4",
                "&exercise=sit_and_reach&reach=22&level=Above+Average"
            )
        );
        assert_eq!(d.video_url(), "/static/outputs/processed_ab12cd34.mp4");
    }

    #[test]
    fn test_result_url_for_counted_exercise() {
        let d = ResultDescriptor {
            video: "processed_00000000.mp4".to_string(),
            exercise: Exercise::PushUp,
            measurement: 12.0,
            level: FitnessLevel::NotApplicable,
        };
        assert!(d.result_url().contains("&reps=12&level=N%2FA"));
    }
}
