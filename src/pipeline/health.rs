// SYNOID FitCheck Health Check & Watchdog
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Dependency probing for the external executables the pipeline shells out
// to, plus a background watchdog for long-running `serve` sessions. The
// watchdog keeps its latest verdicts so `/api/health` can report them.

use crate::pipeline::analyzer::AnalyzerCommand;
use crate::pipeline::thresholds::Exercise;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::SystemExt;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// How long a `-version` style probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Memory usage above this share of total RAM counts as pressure.
const MEMORY_CEILING_PCT: f64 = 95.0;

/// Run `program <arg>` and report whether it exits successfully.
pub async fn probe_executable(program: &Path, arg: &str) -> bool {
    let probe = Command::new(program)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, probe).await,
        Ok(Ok(status)) if status.success()
    )
}

async fn probe_analyzer(exercise: Exercise, cmd: Option<AnalyzerCommand>) -> Option<String> {
    let Some(cmd) = cmd else {
        return Some(format!("{} analyzer (not configured)", exercise));
    };

    // Interpreter-hosted analyzers: check the script file too.
    let program_ok = probe_executable(Path::new(&cmd.program), "--version").await
        || Path::new(&cmd.program).is_file();
    let script_ok = cmd
        .args
        .first()
        .filter(|a| !a.starts_with('-'))
        .map_or(true, |script| Path::new(script).exists());

    (!program_ok || !script_ok).then(|| format!("{} analyzer ({})", exercise, cmd.program))
}

/// Names of external dependencies that cannot be started.
///
/// All probes run concurrently, so the whole check is bounded by a single
/// probe timeout. The transcoder, when missing, is always listed first.
pub async fn check_dependencies(
    ffmpeg: &Path,
    analyzers: &HashMap<Exercise, AnalyzerCommand>,
) -> Vec<String> {
    let mut probes = JoinSet::new();

    let ffmpeg = ffmpeg.to_path_buf();
    probes.spawn(async move {
        let ok = probe_executable(&ffmpeg, "-version").await;
        (0, (!ok).then(|| format!("ffmpeg ({})", ffmpeg.display())))
    });
    for (slot, exercise) in Exercise::ALL.into_iter().enumerate() {
        let cmd = analyzers.get(&exercise).cloned();
        probes.spawn(async move { (slot + 1, probe_analyzer(exercise, cmd).await) });
    }

    let mut missing = Vec::new();
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((slot, Some(name))) => missing.push((slot, name)),
            Ok((_, None)) => {}
            Err(e) => error!("[HEALTH] Dependency probe panicked: {}", e),
        }
    }
    missing.sort_by_key(|(slot, _)| *slot);
    missing.into_iter().map(|(_, name)| name).collect()
}

/// Latest watchdog readings, shared with the background task.
struct Vitals {
    running: AtomicBool,
    heartbeats: AtomicU64,
    memory_ok: AtomicBool,
    output_writable: AtomicBool,
}

impl Vitals {
    fn record(&self, memory_ok: bool, output_writable: bool) {
        self.memory_ok.store(memory_ok, Ordering::Relaxed);
        self.output_writable.store(output_writable, Ordering::Relaxed);
    }
}

/// Background watchdog for the output folder and host memory.
///
/// Verdicts start out healthy and are replaced on every sample, either by
/// the heartbeat loop or by an explicit [`HealthMonitor::sample`].
pub struct HealthMonitor {
    started: Instant,
    interval: Duration,
    output_dir: PathBuf,
    vitals: Arc<Vitals>,
}

impl HealthMonitor {
    /// `output_dir` is the folder that must stay writable.
    pub fn new(check_interval_secs: u64, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            started: Instant::now(),
            interval: Duration::from_secs(check_interval_secs),
            output_dir: output_dir.into(),
            vitals: Arc::new(Vitals {
                running: AtomicBool::new(false),
                heartbeats: AtomicU64::new(0),
                memory_ok: AtomicBool::new(true),
                output_writable: AtomicBool::new(true),
            }),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn heartbeats(&self) -> u64 {
        self.vitals.heartbeats.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.vitals.running.load(Ordering::Relaxed)
    }

    /// Take one reading now and return the resulting warnings.
    pub fn sample(&self) -> Vec<String> {
        take_reading(&self.output_dir, &self.vitals);
        self.warnings()
    }

    /// Problems seen by the most recent reading.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.vitals.memory_ok.load(Ordering::Relaxed) {
            warnings.push(format!("memory usage above {}%", MEMORY_CEILING_PCT));
        }
        if !self.vitals.output_writable.load(Ordering::Relaxed) {
            warnings.push(format!(
                "output folder not writable ({})",
                self.output_dir.display()
            ));
        }
        warnings
    }

    /// Spawn the heartbeat loop. Calling it while running is a no-op.
    pub fn start(&self) {
        if self.vitals.running.swap(true, Ordering::Relaxed) {
            return;
        }

        let vitals = self.vitals.clone();
        let output_dir = self.output_dir.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            info!("[HEALTH] Watchdog started (interval: {:?})", interval);

            while vitals.running.load(Ordering::Relaxed) {
                tokio::time::sleep(interval).await;
                let beat = vitals.heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
                let (memory_ok, writable) = take_reading(&output_dir, &vitals);

                if beat % 60 == 0 {
                    info!(
                        "[HEALTH] ♥ Heartbeat #{} | Memory: {} | Output: {}",
                        beat,
                        if memory_ok { "OK" } else { "WARN" },
                        if writable { "OK" } else { "WARN" },
                    );
                }
            }

            info!("[HEALTH] Watchdog stopped.");
        });
    }

    pub fn stop(&self) {
        self.vitals.running.store(false, Ordering::Relaxed);
        info!("[HEALTH] Shutdown requested.");
    }

    pub fn status_report(&self) -> String {
        let uptime = self.uptime_secs();
        let warnings = self.warnings();
        format!(
            "FitCheck Health Report\n  Uptime: {}h {}m {}s\n  Heartbeats: {}\n  Warnings: {}",
            uptime / 3600,
            (uptime % 3600) / 60,
            uptime % 60,
            self.heartbeats(),
            if warnings.is_empty() {
                "none".to_string()
            } else {
                warnings.join("; ")
            },
        )
    }
}

fn take_reading(output_dir: &Path, vitals: &Vitals) -> (bool, bool) {
    let memory_ok = memory_usage_pct().map_or(true, |pct| pct < MEMORY_CEILING_PCT);
    let writable = output_dir_writable(output_dir);

    if !memory_ok {
        warn!("[HEALTH] ⚠️ Memory pressure detected");
    }
    if !writable {
        warn!("[HEALTH] ⚠️ Output folder {:?} not writable", output_dir);
    }

    vitals.record(memory_ok, writable);
    (memory_ok, writable)
}

fn memory_usage_pct() -> Option<f64> {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    (total > 0).then(|| sys.used_memory() as f64 / total as f64 * 100.0)
}

fn output_dir_writable(dir: &Path) -> bool {
    let marker = dir.join(".fitcheck_health_check");
    match std::fs::write(&marker, b"ok") {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            true
        }
        Err(e) => {
            error!("[HEALTH] Write check failed in {:?}: {}", dir, e);
            false
        }
    }
}
