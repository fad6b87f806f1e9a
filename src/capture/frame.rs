use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// One decoded raw video image.
///
/// Cloning is cheap: pixel data and metadata are reference counted and never mutated.
#[derive(Clone)]
pub struct Frame {
    /// Opaque pixel data
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp, used for latency diagnostics only
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Planar 4:2:0, Y then U then V
    I420,
    Nv12,
    Yuyv4,
    Rgb24,
}

impl PixelFormat {
    /// Average bits per pixel, used for bitrate estimation
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::I420 | PixelFormat::Nv12 => 12,
            PixelFormat::Yuyv4 => 16,
            PixelFormat::Rgb24 => 24,
        }
    }

    /// Bytes needed to hold one image of the given size
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::I420 | PixelFormat::Nv12 => {
                let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize;
                pixels + 2 * chroma
            }
            PixelFormat::Yuyv4 => pixels * 2,
            PixelFormat::Rgb24 => pixels * 3,
        }
    }
}

/// Width and height of a frame or stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Frame {
    pub fn new(data: Bytes, meta: FrameMetadata) -> Self {
        Self {
            data,
            meta: Arc::new(meta),
            timestamp: Instant::now(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn format(&self) -> PixelFormat {
        self.meta.format
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.meta.width, self.meta.height)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.meta.sequence)
            .field("resolution", &self.resolution())
            .field("format", &self.meta.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i420_frame_size() {
        assert_eq!(PixelFormat::I420.frame_size(640, 480), 640 * 480 * 3 / 2);
        // Odd sizes round chroma planes up
        assert_eq!(PixelFormat::I420.frame_size(3, 3), 9 + 2 * 4);
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
        assert!(Resolution::new(0, 480).is_empty());
    }
}
