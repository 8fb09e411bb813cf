// SYNOID FitCheck Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use synoid_fitcheck::config::AppConfig;
use synoid_fitcheck::pipeline::health::check_dependencies;
use synoid_fitcheck::pipeline::{classify, Exercise, UploadRequest, UploadedVideo};
use synoid_fitcheck::server;
use synoid_fitcheck::state::ServiceState;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synoid-fitcheck")]
#[command(about = "SYNOID FitCheck: exercise video intake and fitness grading", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the upload web server
    Serve {
        /// Port to run the server on
        #[arg(short, long, default_value_t = 5000)]
        port: u16,

        /// Override the upload folder
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        /// Override the output folder
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Override the ffmpeg executable
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
    },

    /// Run the full pipeline on a local video file
    Process {
        /// Input video path
        #[arg(short, long)]
        input: PathBuf,

        /// Exercise type (pushup, situp, vertical_jump, sit_and_reach)
        #[arg(short, long, default_value = "pushup")]
        exercise: String,

        /// Subject age in years
        #[arg(short, long)]
        age: u32,

        /// Subject gender (male/female)
        #[arg(short, long)]
        gender: String,
    },

    /// Grade a measurement without any video
    Classify {
        #[arg(short, long)]
        exercise: String,

        /// Repetitions or centimetres
        #[arg(short, long)]
        measurement: f64,

        #[arg(short, long)]
        age: u32,

        #[arg(short, long)]
        gender: String,
    },

    /// Check that ffmpeg and the analyzers can be started
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Cli::parse();

    match args.command {
        Commands::Serve {
            port,
            upload_dir,
            output_dir,
            ffmpeg,
        } => {
            let mut config = AppConfig::from_env()?;
            if let Some(dir) = upload_dir {
                config.upload_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(path) = ffmpeg {
                config.ffmpeg = path;
            }

            info!("--- SYNOID FITCHECK v{} ---", env!("CARGO_PKG_VERSION"));
            config.verify_transcoder().await?;
            let missing = check_dependencies(&config.ffmpeg, &config.analyzers).await;
            if !missing.is_empty() {
                warn!("⚠️ Missing dependencies: {:?}. Affected exercises will fail.", missing);
            }

            let state = Arc::new(ServiceState::new(config));
            state
                .pipeline
                .prepare()
                .await
                .context("Failed to provision artifact folders")?;

            for warning in state.health.sample() {
                warn!("⚠️ {}", warning);
            }
            state.health.start();
            let result = server::start_server(port, state.clone()).await;
            state.health.stop();
            info!("{}", state.health.status_report());
            result?;
        }
        Commands::Process {
            input,
            exercise,
            age,
            gender,
        } => {
            let config = AppConfig::from_env()?;
            config.verify_transcoder().await?;

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {:?}", input))?;
            let filename = input
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| anyhow!("Input path has no file name: {:?}", input))?;

            let state = ServiceState::new(config);
            state.pipeline.prepare().await?;

            let descriptor = state
                .pipeline
                .run(UploadRequest {
                    video: Some(UploadedVideo { filename, bytes }),
                    exercise: Some(exercise),
                    age: Some(age),
                    gender: Some(gender),
                })
                .await?;

            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Commands::Classify {
            exercise,
            measurement,
            age,
            gender,
        } => {
            let exercise = Exercise::from_str(&exercise)
                .ok_or_else(|| anyhow!("Unknown exercise type: {}", exercise))?;
            let level = classify(exercise, measurement, age, &gender);
            info!(
                "[CLASSIFY] {} {} {} (age {}, {})",
                exercise,
                exercise.format_measurement(measurement),
                exercise.unit(),
                age,
                gender
            );
            println!("{}", level);
        }
        Commands::Check => {
            let config = AppConfig::from_env()?;
            let missing = check_dependencies(&config.ffmpeg, &config.analyzers).await;
            if missing.is_empty() {
                println!("✅ ffmpeg and all analyzers are available.");
            } else {
                for dep in &missing {
                    println!("❌ {}", dep);
                }
                return Err(anyhow!("{} dependencies missing", missing.len()));
            }
        }
    }

    Ok(())
}
