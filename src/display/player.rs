//! Pull-driven playback consumer
//! Requests one sample per tick of its own clock and keeps the last one for re-render.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use arc_swap::ArcSwapOption;
use tracing::{debug, info};

use crate::display::stream::{
    Presentation, Sample, SampleRequest, StreamAdapter, StreamDescriptor,
};
use crate::utils::frame_interval;

/// Playback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub ticks: u64,
    pub samples: u64,
    pub empty: u64,
}

/// Plays whichever stream is currently attached
#[derive(Default)]
pub struct Player {
    stream: ArcSwapOption<StreamAdapter>,
    last: ArcSwapOption<Sample>,
    ticks: AtomicU64,
    samples: AtomicU64,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.stream.load().is_some()
    }

    pub fn descriptor(&self) -> Option<StreamDescriptor> {
        self.stream.load_full().map(|s| s.descriptor().clone())
    }

    /// One tick of the playback clock: ask the stream for a sample.
    ///
    /// Returns the new sample, or `None` when nothing new was available; the
    /// previous sample stays in [`Player::last_sample`].
    pub fn request_sample(&self) -> Option<Sample> {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let stream = self.stream.load_full()?;

        let mut request = SampleRequest::new();
        stream.on_sample_requested(&mut request);

        let sample = request.into_sample()?;
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.last.store(Some(Arc::new(sample.clone())));
        Some(sample)
    }

    /// Most recent sample, for rendering a stale frame when the queue is empty
    pub fn last_sample(&self) -> Option<Arc<Sample>> {
        self.last.load_full()
    }

    pub fn stats(&self) -> PlayerStats {
        let ticks = self.ticks.load(Ordering::Relaxed);
        let samples = self.samples.load(Ordering::Relaxed);
        PlayerStats {
            ticks,
            samples,
            empty: ticks.saturating_sub(samples),
        }
    }

    /// Drive `request_sample` from a dedicated clock thread until `stop` is set
    pub fn spawn_clock(
        self: Arc<Self>,
        sample_rate: u32,
        stop: Arc<AtomicBool>,
    ) -> io::Result<JoinHandle<()>> {
        let period = frame_interval(sample_rate);
        thread::Builder::new()
            .name("playback-clock".into())
            .spawn(move || {
                info!("Playback clock running every {:?}", period);
                let mut next = Instant::now();
                while !stop.load(Ordering::Relaxed) {
                    if let Some(sample) = self.request_sample() {
                        debug!(
                            index = sample.index,
                            sequence = sample.frame.sequence(),
                            "Presenting sample at {:?}",
                            sample.presentation_time
                        );
                    }
                    next += period;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
                info!("Playback clock stopped");
            })
    }
}

impl Presentation for Player {
    fn attach(&self, stream: Arc<StreamAdapter>) {
        let descriptor = stream.descriptor();
        info!(
            "Player attached to {} stream, starting playback",
            descriptor.resolution
        );
        self.stream.store(Some(stream));
    }

    fn detach(&self) {
        info!("Player detached");
        self.stream.store(None);
        self.last.store(None);
    }
}
