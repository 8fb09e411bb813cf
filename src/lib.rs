// SYNOID FitCheck Library
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod state;

pub use error::PipelineError;
