pub mod capture;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod utils;

use std::path::Path;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use capture::frame::{Frame, PixelFormat};
pub use error::{BridgeError, Result};
pub use pipeline::{Admission, VideoBridge};
pub use session::VideoSession;

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Environment variable prefix, e.g. `VIDBRIDGE__BRIDGE__QUEUE_CAPACITY=5`
const ENV_PREFIX: &str = "VIDBRIDGE";

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub bridge: BridgeConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Frames held before the oldest is dropped
    pub queue_capacity: usize,
    /// Target frame rate advertised by the output stream
    pub frame_rate: u32,
    pub pixel_format: PixelFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Playback clock rate in samples per second
    pub sample_rate: u32,
    /// Demo duration; 0 runs until Ctrl-C
    pub run_for_secs: u64,
    pub stats_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 3,
            frame_rate: 30,
            pixel_format: PixelFormat::I420,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                width: 640,
                height: 480,
                fps: 30,
            },
            bridge: BridgeConfig::default(),
            display: DisplayConfig {
                sample_rate: 30,
                run_for_secs: 5,
                stats_interval_ms: 1000,
            },
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `VIDBRIDGE__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}

/// Counters collected across the bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub frames_written: usize,
    pub frames_read: usize,
    pub frames_dropped: usize,
    pub queued: usize,
    pub samples_delivered: u64,
}
