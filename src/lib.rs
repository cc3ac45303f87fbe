//! Clip Recorder - record a short camera clip, re-encode it and grab a thumbnail.
//!
//! This is the library crate behind the `clip-recorder` binary. It provides
//! the capture, recording, transcode and pipeline modules, plus the terminal
//! front end that drives them.

pub mod capture;
pub mod commands;
pub mod config;
pub mod pipeline;
pub mod recorder;
pub mod registry;
pub mod transcode;
pub mod utils;

#[cfg(test)]
mod testing;

use anyhow::Context;
use config::PipelineConfig;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the application
pub fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clip_recorder=debug,clip_recorder_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Clip Recorder v{}", env!("CARGO_PKG_VERSION"));

    let config = PipelineConfig::from_env().context("Failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let result = runtime.block_on(commands::run_terminal(config));

    // stdin reads may still be parked on a blocking thread
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}
