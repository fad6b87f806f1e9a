//! Error types for the frame bridge

use thiserror::Error;

use crate::capture::frame::{PixelFormat, Resolution};

/// Errors surfaced by the queue, bridge and stream adapter.
///
/// None of these are fatal: a rejected frame is dropped and the pipeline keeps running.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },

    #[error("Frame resolution {actual} does not match stream resolution {expected}")]
    DimensionMismatch {
        expected: Resolution,
        actual: Resolution,
    },

    #[error("Frame pixel format {actual:?} does not match bridge format {expected:?}")]
    PixelFormatMismatch {
        expected: PixelFormat,
        actual: PixelFormat,
    },

    #[error("Queue capacity must be at least 1")]
    InvalidCapacity,

    #[error("Frame rate must be at least 1")]
    InvalidFrameRate,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
