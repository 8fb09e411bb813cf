// SYNOID FitCheck Pipeline Modules
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod analyzer;
pub mod artifacts;
pub mod classifier;
pub mod health;
pub mod normalizer;
pub mod orchestrator;
pub mod thresholds;
pub mod upload_guard;

pub use classifier::classify;
pub use orchestrator::{FitnessPipeline, ResultDescriptor};
pub use thresholds::{Exercise, FitnessLevel, Gender};
pub use upload_guard::{UploadRequest, UploadedVideo};
