//! Error types for wavstream

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WavPlayerError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("WAV format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Playback did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, WavPlayerError>;
