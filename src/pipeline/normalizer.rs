// SYNOID FitCheck Format Normalizer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Makes sure the analyzers always receive an MP4. Anything else is
// re-encoded through ffmpeg with a fixed H.264/AAC profile. Failures are
// reported, never raised: the orchestrator decides what the user sees.

use crate::pipeline::upload_guard::CANONICAL_EXTENSION;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Whether the normalized video is the upload itself or a transcoded copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    AlreadyMp4,
    Transcoded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVideo {
    pub path: PathBuf,
    pub format: VideoFormat,
}

/// Why the transcoder did not produce a usable file.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionFailure {
    /// Executable missing or could not be spawned.
    Unavailable(String),
    /// Non-zero exit (`None` when killed by a signal).
    ExitStatus(Option<i32>),
    TimedOut(Duration),
}

impl std::fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "transcoder unavailable: {}", reason),
            Self::ExitStatus(Some(code)) => write!(f, "transcoder exited with status {}", code),
            Self::ExitStatus(None) => write!(f, "transcoder terminated by signal"),
            Self::TimedOut(d) => write!(f, "transcoder timed out after {}s", d.as_secs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Ready(NormalizedVideo),
    Failed(ConversionFailure),
}

impl Normalized {
    pub fn ok(&self) -> bool {
        matches!(self, Normalized::Ready(_))
    }
}

#[derive(Debug, Clone)]
pub struct FormatNormalizer {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl FormatNormalizer {
    pub fn new(ffmpeg: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout,
        }
    }

    pub fn needs_transcode(declared_extension: &str) -> bool {
        !declared_extension.eq_ignore_ascii_case(CANONICAL_EXTENSION)
    }

    /// Fixed transcode profile: libx264 veryfast/crf23, AAC 128k.
    pub fn transcode_args(input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.as_os_str().to_owned()];
        for arg in [
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-crf", "23",
            "-c:a", "aac",
            "-b:a", "128k",
        ] {
            args.push(OsString::from(arg));
        }
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Return `input` untouched when it is already MP4, otherwise transcode
    /// it into `target`.
    pub async fn normalize(
        &self,
        input: &Path,
        declared_extension: &str,
        target: &Path,
    ) -> Normalized {
        if !Self::needs_transcode(declared_extension) {
            info!("[NORMALIZE] {:?} is already MP4, no transcode needed", input);
            return Normalized::Ready(NormalizedVideo {
                path: input.to_path_buf(),
                format: VideoFormat::AlreadyMp4,
            });
        }

        info!(
            "[NORMALIZE] Transcoding {} → MP4: {:?} -> {:?}",
            declared_extension, input, target
        );

        let child = Command::new(&self.ffmpeg)
            .args(Self::transcode_args(input, target))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let status = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                error!(
                    "[NORMALIZE] ❌ ffmpeg still running after {}s, killed",
                    self.timeout.as_secs()
                );
                return Normalized::Failed(ConversionFailure::TimedOut(self.timeout));
            }
            Ok(Err(e)) => {
                error!("[NORMALIZE] ❌ Failed to spawn {:?}: {}", self.ffmpeg, e);
                return Normalized::Failed(ConversionFailure::Unavailable(e.to_string()));
            }
            Ok(Ok(status)) => status,
        };

        if !status.success() {
            error!("[NORMALIZE] ❌ ffmpeg exited with {}", status);
            return Normalized::Failed(ConversionFailure::ExitStatus(status.code()));
        }

        if !target.exists() {
            warn!("[NORMALIZE] ffmpeg reported success but wrote nothing to {:?}", target);
            return Normalized::Failed(ConversionFailure::ExitStatus(status.code()));
        }

        info!("[NORMALIZE] ✅ Transcode complete: {:?}", target);
        Normalized::Ready(NormalizedVideo {
            path: target.to_path_buf(),
            format: VideoFormat::Transcoded,
        })
    }
}
