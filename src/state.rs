// SYNOID FitCheck Service State
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use crate::config::AppConfig;
use crate::pipeline::health::HealthMonitor;
use crate::pipeline::FitnessPipeline;
use serde::Serialize;

/// Read-only state shared by every request handler.
pub struct ServiceState {
    pub config: AppConfig,
    pub pipeline: FitnessPipeline,
    pub health: HealthMonitor,
}

impl ServiceState {
    pub fn new(config: AppConfig) -> Self {
        let pipeline = FitnessPipeline::from_config(&config);
        let health = HealthMonitor::new(30, &config.output_dir);
        Self {
            config,
            pipeline,
            health,
        }
    }
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub missing_dependencies: Vec<String>,
    /// Latest watchdog findings (memory pressure, unwritable output folder).
    pub warnings: Vec<String>,
}

/// Display parameters of the result view.
#[derive(Debug, Serialize, PartialEq)]
pub struct ResultView {
    pub video_url: String,
    pub exercise: Option<String>,
    pub measurement: String,
    pub level: String,
}
