//! Consumer-facing live video stream

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::capture::{Frame, PixelFormat, Resolution};
use crate::error::{BridgeError, Result};
use crate::pipeline::VideoBridge;
use crate::utils::frame_interval;

/// Rational frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

/// Immutable description of the output stream, fixed by the first frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub encoding: PixelFormat,
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
    /// Estimated bits per second of uncompressed video
    pub bitrate: u64,
    pub is_live: bool,
    pub can_seek: bool,
    pub buffer_time: Duration,
}

impl StreamDescriptor {
    pub fn new(resolution: Resolution, encoding: PixelFormat, frame_rate: u32) -> Result<Self> {
        if resolution.is_empty() {
            return Err(BridgeError::InvalidFrame {
                width: resolution.width,
                height: resolution.height,
            });
        }
        if frame_rate == 0 {
            return Err(BridgeError::InvalidFrameRate);
        }

        let bitrate = u64::from(frame_rate)
            * u64::from(resolution.width)
            * u64::from(resolution.height)
            * u64::from(encoding.bits_per_pixel());

        Ok(Self {
            encoding,
            resolution,
            frame_rate: FrameRate {
                numerator: frame_rate,
                denominator: 1,
            },
            bitrate,
            is_live: true,
            can_seek: false,
            buffer_time: Duration::ZERO,
        })
    }

    pub fn frame_duration(&self) -> Duration {
        frame_interval(self.frame_rate.numerator) * self.frame_rate.denominator
    }
}

/// A frame packaged for the playback pipeline
#[derive(Debug, Clone)]
pub struct Sample {
    pub frame: Frame,
    /// Position of this sample in the stream
    pub index: u64,
    pub presentation_time: Duration,
    pub duration: Duration,
}

/// How a sample request was answered
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    Delivered(Sample),
    /// No frame buffered yet; the consumer asks again on its next tick
    NotYetAvailable,
}

/// One pending request from the playback clock.
///
/// Must be completed or declined before the call that received it returns.
#[derive(Debug, Default)]
pub struct SampleRequest {
    outcome: Option<SampleOutcome>,
}

impl SampleRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&mut self, sample: Sample) {
        self.answer(SampleOutcome::Delivered(sample));
    }

    pub fn decline(&mut self) {
        self.answer(SampleOutcome::NotYetAvailable);
    }

    fn answer(&mut self, outcome: SampleOutcome) {
        if self.outcome.is_some() {
            debug!("Sample request already answered");
            return;
        }
        self.outcome = Some(outcome);
    }

    pub fn is_answered(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&SampleOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_outcome(self) -> Option<SampleOutcome> {
        self.outcome
    }

    pub fn into_sample(self) -> Option<Sample> {
        match self.outcome {
            Some(SampleOutcome::Delivered(sample)) => Some(sample),
            _ => None,
        }
    }
}

/// Presentation side of the stream: the object that plays it.
///
/// Only ever called on the presentation-owning thread. `attach` runs while the bridge
/// holds its stream lock and must not close the bridge.
pub trait Presentation: Send + Sync {
    fn attach(&self, stream: Arc<StreamAdapter>);
    fn detach(&self);
}

/// Serves frames from a bridge as timestamped samples
pub struct StreamAdapter {
    descriptor: StreamDescriptor,
    source: Weak<VideoBridge>,
    delivered: AtomicU64,
}

impl StreamAdapter {
    #[instrument(skip(source))]
    pub fn new(
        resolution: Resolution,
        encoding: PixelFormat,
        frame_rate: u32,
        source: Weak<VideoBridge>,
    ) -> Result<Self> {
        let descriptor = StreamDescriptor::new(resolution, encoding, frame_rate)?;
        info!(
            "Stream created: {} {:?} @ {}/{} fps, ~{} bps",
            descriptor.resolution,
            descriptor.encoding,
            descriptor.frame_rate.numerator,
            descriptor.frame_rate.denominator,
            descriptor.bitrate
        );
        Ok(Self {
            descriptor,
            source,
            delivered: AtomicU64::new(0),
        })
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn samples_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Answer one request with the next buffered frame, or decline it
    pub fn on_sample_requested(&self, request: &mut SampleRequest) {
        let frame = self.source.upgrade().and_then(|bridge| bridge.fetch());
        match frame {
            Some(frame) => request.complete(self.package(frame)),
            None => {
                metrics::counter!("bridge_samples_empty").increment(1);
                request.decline();
            }
        }
    }

    /// Wrap a frame as the next sample of this stream.
    ///
    /// Presentation times count delivered samples, not capture time, so they stay
    /// strictly increasing across dropped frames.
    pub fn package(&self, frame: Frame) -> Sample {
        let index = self.delivered.fetch_add(1, Ordering::Relaxed);
        let duration = self.descriptor.frame_duration();
        let presentation_time =
            Duration::from_nanos((duration.as_nanos() as u64).saturating_mul(index));

        metrics::counter!("bridge_samples_served").increment(1);
        metrics::histogram!("frame_latency_ms")
            .record(frame.timestamp.elapsed().as_secs_f64() * 1000.0);

        Sample {
            frame,
            index,
            presentation_time,
            duration,
        }
    }
}
