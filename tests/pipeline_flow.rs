#![cfg(unix)]

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use synoid_fitcheck::pipeline::analyzer::{AnalyzerCommand, AnalyzerDispatcher};
use synoid_fitcheck::pipeline::artifacts::ArtifactStore;
use synoid_fitcheck::pipeline::normalizer::FormatNormalizer;
use synoid_fitcheck::pipeline::orchestrator::PipelineStage;
use synoid_fitcheck::pipeline::{
    Exercise, FitnessLevel, FitnessPipeline, UploadRequest, UploadedVideo,
};
use synoid_fitcheck::PipelineError;
use tempfile::TempDir;

// Copies its input to the last argument, like a successful transcode.
const FAKE_FFMPEG: &str = r#"#!/bin/sh
for last; do :; done
printf 'transcoded' > "$last"
"#;

const BROKEN_FFMPEG: &str = "#!/bin/sh\necho 'Invalid data found' >&2\nexit 1\n";

fn analyzer_script(measurement: u32) -> String {
    format!(
        "cp \"$1\" \"$2\"\necho 'loading pose model'\necho '{{\"measurement\": {}}}'\n",
        measurement
    )
}

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn executable(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Analyzer scripts run through `/bin/sh`, so they need no exec bit.
    fn analyzer(&self, name: &str, body: &str) -> AnalyzerCommand {
        let path = self.path(name);
        std::fs::write(&path, body).unwrap();
        AnalyzerCommand::new("/bin/sh", vec![path.to_string_lossy().to_string()])
    }

    fn pipeline(
        &self,
        ffmpeg: &Path,
        analyzer: AnalyzerCommand,
        timeout: Duration,
    ) -> FitnessPipeline {
        let analyzers: HashMap<Exercise, AnalyzerCommand> = Exercise::ALL
            .iter()
            .map(|e| (*e, analyzer.clone()))
            .collect();
        FitnessPipeline::new(
            ArtifactStore::new(self.path("uploads"), self.path("outputs")),
            FormatNormalizer::new(ffmpeg, timeout),
            AnalyzerDispatcher::new(analyzers, timeout),
        )
    }

    fn count(&self, folder: &str) -> usize {
        std::fs::read_dir(self.path(folder))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn request(filename: &str, exercise: &str, age: u32, gender: &str) -> UploadRequest {
    UploadRequest {
        video: Some(UploadedVideo {
            filename: filename.to_string(),
            bytes: b"not really a video".to_vec(),
        }),
        exercise: Some(exercise.to_string()),
        age: Some(age),
        gender: Some(gender.to_string()),
    }
}

#[tokio::test]
async fn test_mp4_upload_skips_transcode() {
    let sandbox = Sandbox::new();
    // An mp4 upload must never reach the transcoder.
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("pushups.sh", &analyzer_script(23)),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let result = pipeline
        .run(request("my clip.mp4", "pushup", 16, "male"))
        .await
        .expect("pipeline should succeed");

    assert_eq!(result.exercise, Exercise::PushUp);
    assert_eq!(result.measurement, 23.0);
    assert_eq!(result.level, FitnessLevel::Average);
    assert!(result.video.starts_with("processed_"));
    assert!(result.video.ends_with(".mp4"));
    assert!(sandbox.path("outputs").join(&result.video).exists());
    assert!(result.result_url().contains("&reps=23&level=Average"));

    // Only the raw upload, no conv_ intermediate.
    let uploads: Vec<String> = std::fs::read_dir(sandbox.path("uploads"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].starts_with("upload_"));
    assert!(uploads[0].ends_with("_my_clip.mp4"));
}

#[tokio::test]
async fn test_webm_upload_is_transcoded() {
    let sandbox = Sandbox::new();
    let ffmpeg = sandbox.executable("ffmpeg", FAKE_FFMPEG);
    let pipeline = sandbox.pipeline(
        &ffmpeg,
        sandbox.analyzer("reach.sh", &analyzer_script(22)),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let result = pipeline
        .run(request("stretch.WEBM", "sit_and_reach", 25, "female"))
        .await
        .expect("pipeline should succeed");

    assert_eq!(result.level, FitnessLevel::AboveAverage);
    let id = result
        .video
        .trim_start_matches("processed_")
        .trim_end_matches(".mp4")
        .to_string();
    assert_eq!(id.len(), 8);
    assert!(sandbox.path("uploads").join(format!("conv_{}.mp4", id)).exists());
    assert_eq!(
        result.result_url(),
        format!(
            "/result?video=processed_{}.mp4&exercise=sit_and_reach&reach=22&level=Above+Average",
            id
        )
    );
}

#[tokio::test]
async fn test_failed_transcode_is_conversion_error() {
    let sandbox = Sandbox::new();
    let ffmpeg = sandbox.executable("ffmpeg", BROKEN_FFMPEG);
    let pipeline = sandbox.pipeline(
        &ffmpeg,
        sandbox.analyzer("pushups.sh", &analyzer_script(10)),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.mov", "pushup", 30, "male"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Conversion(_)), "got {:?}", err);
    assert!(err.to_string().contains("ffmpeg path"));
    assert_eq!(sandbox.count("outputs"), 0);
}

#[tokio::test]
async fn test_missing_transcoder_is_conversion_error() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("pushups.sh", &analyzer_script(10)),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.avi", "pushup", 30, "male"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Conversion(_)));
    assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_analyzer_crash_is_processing_error() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("crash.sh", "echo 'Traceback: no pose detected' >&2\nexit 3\n"),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.mp4", "situp", 22, "female"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Analysis(_)), "got {:?}", err);
    let msg = err.to_string();
    assert!(msg.starts_with("Processing error:"));
    assert!(msg.contains("no pose detected"));
}

#[tokio::test]
async fn test_analyzer_without_output_video_fails() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("lazy.sh", "echo '{\"measurement\": 40}'\n"),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.mp4", "vertical_jump", 20, "male"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Analysis(_)));
}

#[tokio::test]
async fn test_slow_analyzer_times_out() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("slow.sh", "sleep 30\n"),
        Duration::from_secs(1),
    );
    pipeline.prepare().await.unwrap();

    let started = std::time::Instant::now();
    let err = pipeline
        .run(request("clip.mp4", "pushup", 18, "female"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Timeout { stage: "analysis", .. }),
        "got {:?}",
        err
    );
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[tokio::test]
async fn test_rejected_upload_writes_nothing() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("pushups.sh", &analyzer_script(10)),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.xyz", "pushup", 16, "male"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(ref m) if m == "File type not allowed"));

    let mut missing_age = request("clip.mp4", "pushup", 16, "male");
    missing_age.age = None;
    let err = pipeline.run(missing_age).await.unwrap_err();
    assert_eq!(err.to_string(), "Age and gender are required");

    assert_eq!(sandbox.count("uploads"), 0);
    assert_eq!(sandbox.count("outputs"), 0);
}

#[tokio::test]
async fn test_uncovered_age_grades_not_applicable() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("situps.sh", &analyzer_script(50)),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let result = pipeline
        .run(request("clip.mp4", "situp", 45, "male"))
        .await
        .unwrap();
    assert_eq!(result.level, FitnessLevel::NotApplicable);
    assert!(result.result_url().ends_with("level=N%2FA"));
}

#[tokio::test]
async fn test_progress_reports_every_stage() {
    let sandbox = Sandbox::new();
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = stages.clone();
    let pipeline = sandbox
        .pipeline(
            Path::new("__no_such_ffmpeg_xyz"),
            sandbox.analyzer("pushups.sh", &analyzer_script(5)),
            Duration::from_secs(10),
        )
        .with_progress(Arc::new(move |stage: PipelineStage, _msg: &str| {
            sink.lock().unwrap().push(stage);
        }));
    pipeline.prepare().await.unwrap();

    pipeline
        .run(request("clip.mp4", "pushup", 40, "female"))
        .await
        .unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            PipelineStage::Validate,
            PipelineStage::Persist,
            PipelineStage::Normalize,
            PipelineStage::Analyze,
            PipelineStage::Classify,
            PipelineStage::Respond,
        ]
    );
}

#[tokio::test]
async fn test_slow_transcoder_times_out() {
    let sandbox = Sandbox::new();
    let ffmpeg = sandbox.executable("ffmpeg", "#!/bin/sh\nsleep 30\n");
    let pipeline = sandbox.pipeline(
        &ffmpeg,
        sandbox.analyzer("pushups.sh", &analyzer_script(10)),
        Duration::from_secs(1),
    );
    pipeline.prepare().await.unwrap();

    let started = std::time::Instant::now();
    let err = pipeline
        .run(request("clip.mkv", "pushup", 18, "male"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Timeout { stage: "transcoding", secs: 1 }),
        "got {:?}",
        err
    );
    assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(sandbox.count("outputs"), 0);
}

#[tokio::test]
async fn test_negative_measurement_is_rejected() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer(
            "negative.sh",
            "cp \"$1\" \"$2\"\necho '{\"measurement\": -3}'\n",
        ),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.mp4", "vertical_jump", 20, "male"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Analysis(_)), "got {:?}", err);
    assert!(err.to_string().contains("invalid measurement"));
}

#[tokio::test]
async fn test_unrepresentable_measurement_is_rejected() {
    let sandbox = Sandbox::new();
    // Overflows f64, so it can never become a finite measurement.
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer(
            "overflow.sh",
            "cp \"$1\" \"$2\"\necho '{\"measurement\": 1e999}'\n",
        ),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.mp4", "situp", 20, "female"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Analysis(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_foreign_output_path_is_rejected() {
    let sandbox = Sandbox::new();
    let elsewhere = sandbox.path("elsewhere.mp4");
    std::fs::write(&elsewhere, b"stale video").unwrap();
    let script = format!(
        "cp \"$1\" \"$2\"\necho '{{\"measurement\": 30, \"output_path\": \"{}\"}}'\n",
        elsewhere.display()
    );
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("foreign.sh", &script),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let err = pipeline
        .run(request("clip.mp4", "pushup", 25, "male"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Analysis(_)), "got {:?}", err);
    assert!(err.to_string().contains("not the requested"));
}

#[tokio::test]
async fn test_echoed_output_path_is_accepted() {
    let sandbox = Sandbox::new();
    let script = concat!(
        "cp \"$1\" \"$2\"\n",
        "printf '{\"measurement\": 12, \"output_path\": \"%s\"}\\n' \"$2\"\n"
    );
    let pipeline = sandbox.pipeline(
        Path::new("__no_such_ffmpeg_xyz"),
        sandbox.analyzer("echo.sh", script),
        Duration::from_secs(10),
    );
    pipeline.prepare().await.unwrap();

    let result = pipeline
        .run(request("clip.mp4", "situp", 35, "female"))
        .await
        .unwrap();
    assert!(result.video.starts_with("processed_"));
    assert!(sandbox.path("outputs").join(&result.video).exists());
}
