//! Engine error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the audio-reactive engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("analyser init failed: {0}")]
    AnalyserInit(String),

    #[error("failed to load resource {path}: {reason}")]
    ResourceLoad { path: PathBuf, reason: String },

    #[error("render pass failed: {0}")]
    RenderPass(String),

    #[error("graphics setup failed: {0}")]
    GraphicsSetup(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
