//! Test-pattern video source standing in for a camera track

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{info, instrument};

use crate::{
    capture::frame::{Frame, FrameMetadata, PixelFormat},
    utils, CaptureConfig,
};

/// Produces planar I420 frames with a horizontally scrolling luma gradient
pub struct TestPatternSource {
    config: CaptureConfig,
    sequence: u64,
    ticker: Option<Interval>,
}

impl TestPatternSource {
    pub fn new(config: CaptureConfig) -> Self {
        info!(
            "Test pattern source: {}x{} @ {} fps",
            config.width, config.height, config.fps
        );
        Self {
            config,
            sequence: 0,
            ticker: None,
        }
    }

    /// Time between two captured frames
    pub fn frame_interval(&self) -> Duration {
        utils::frame_interval(self.config.fps)
    }

    /// Build the next frame immediately, without pacing
    pub fn next_frame(&mut self) -> Frame {
        self.sequence += 1;

        let width = self.config.width;
        let height = self.config.height;
        let size = PixelFormat::I420.frame_size(width, height);
        let mut buf = BytesMut::with_capacity(size);

        let shift = self.sequence as u32;
        for _ in 0..height {
            for x in 0..width {
                buf.put_u8((x.wrapping_add(shift) & 0xff) as u8);
            }
        }
        // Neutral chroma
        buf.put_bytes(128, size - buf.len());

        Frame::new(
            buf.freeze(),
            FrameMetadata {
                sequence: self.sequence,
                width,
                height,
                stride: width,
                format: PixelFormat::I420,
            },
        )
    }

    /// Wait for the next capture tick, then produce a frame
    #[instrument(skip(self))]
    pub async fn capture_frame(&mut self) -> Frame {
        let period = self.frame_interval();
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval(period);
            // A late producer skips frames rather than bursting
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        ticker.tick().await;
        self.next_frame()
    }
}
