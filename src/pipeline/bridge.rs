//! Bridge between a push-driven frame producer and a pull-driven playback consumer

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::capture::{Frame, Resolution};
use crate::display::dispatch::OwnerDispatcher;
use crate::display::stream::{Presentation, SampleRequest, StreamAdapter};
use crate::error::{BridgeError, Result};
use crate::pipeline::ringbuf::{ensure_dimensions, Admission, FrameQueue};
use crate::{BridgeConfig, BridgeStats};

/// Lifecycle of a [`VideoBridge`]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BridgeState {
    Uninitialized = 0,
    Active = 1,
    Closed = 2,
}

impl BridgeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BridgeState::Uninitialized,
            1 => BridgeState::Active,
            _ => BridgeState::Closed,
        }
    }
}

/// The output stream plus the lock ordering its attach against teardown
#[derive(Default)]
struct StreamSlot {
    stream: OnceCell<Arc<StreamAdapter>>,
    attach: Mutex<()>,
}

impl StreamSlot {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.attach.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decouples the capture thread from the playback clock.
///
/// Both sides only ever touch the queue through one short lock, so neither can stall
/// the other. The first accepted frame fixes the stream resolution and triggers stream
/// construction on the presentation-owning thread, exactly once.
pub struct VideoBridge {
    config: BridgeConfig,
    queue: Mutex<FrameQueue>,
    state: AtomicU8,
    /// Resolution of the first accepted frame
    resolution: OnceCell<Resolution>,
    stream: Arc<StreamSlot>,
    dispatcher: Arc<dyn OwnerDispatcher>,
    presentation: Arc<dyn Presentation>,
    this: Weak<VideoBridge>,
}

impl VideoBridge {
    pub fn new(
        config: BridgeConfig,
        dispatcher: Arc<dyn OwnerDispatcher>,
        presentation: Arc<dyn Presentation>,
    ) -> Result<Arc<Self>> {
        if config.frame_rate == 0 {
            return Err(BridgeError::InvalidFrameRate);
        }
        let queue = FrameQueue::new(config.queue_capacity)?;
        debug!(
            capacity = config.queue_capacity,
            "Video bridge created for {:?} @ {} fps", config.pixel_format, config.frame_rate
        );

        Ok(Arc::new_cyclic(|this| Self {
            config,
            queue: Mutex::new(queue),
            state: AtomicU8::new(BridgeState::Uninitialized as u8),
            resolution: OnceCell::new(),
            stream: Arc::new(StreamSlot::default()),
            dispatcher,
            presentation,
            this: this.clone(),
        }))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.state() == BridgeState::Closed
    }

    /// Mark both sides as attached. Returns false if the bridge was not `Uninitialized`.
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                BridgeState::Uninitialized as u8,
                BridgeState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Resolution fixed by the first accepted frame
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution.get().copied()
    }

    /// The stream, once the presentation thread has built it
    pub fn stream(&self) -> Option<Arc<StreamAdapter>> {
        self.stream.stream.get().cloned()
    }

    pub fn stream_ready(&self) -> bool {
        self.stream.stream.get().is_some()
    }

    fn lock_queue(&self) -> MutexGuard<'_, FrameQueue> {
        // Queue operations cannot leave it half-updated, so a poisoned lock is still usable
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Producer entry point. Never blocks on the consumer.
    pub fn on_frame_ready(&self, frame: Frame) -> Result<Admission> {
        // Before the resolution is recorded, so an empty frame can never fix it
        ensure_dimensions(&frame)?;
        let resolution = frame.resolution();
        if self.is_closed() {
            return Ok(Admission::Discarded);
        }
        if frame.format() != self.config.pixel_format {
            metrics::counter!("bridge_frames_rejected").increment(1);
            return Err(BridgeError::PixelFormatMismatch {
                expected: self.config.pixel_format,
                actual: frame.format(),
            });
        }

        let mut first = false;
        let expected = *self.resolution.get_or_init(|| {
            first = true;
            resolution
        });
        if expected != resolution {
            warn!(
                sequence = frame.sequence(),
                "Rejecting {} frame on {} stream", resolution, expected
            );
            metrics::counter!("bridge_frames_rejected").increment(1);
            return Err(BridgeError::DimensionMismatch {
                expected,
                actual: resolution,
            });
        }

        let admission = {
            let mut queue = self.lock_queue();
            // Checked under the lock so nothing is queued after close() drains
            if self.is_closed() {
                return Ok(Admission::Discarded);
            }
            queue.push(frame)?
        };

        if first {
            info!("First frame {}, requesting stream creation", resolution);
            self.post_stream_creation(resolution);
        }
        Ok(admission)
    }

    fn post_stream_creation(&self, resolution: Resolution) {
        let bridge = self.this.clone();
        self.dispatcher.post(Box::new(move || {
            if let Some(bridge) = bridge.upgrade() {
                bridge.create_stream(resolution);
            }
        }));
    }

    /// Runs on the presentation-owning thread.
    ///
    /// The closed check, publication and attach happen under the slot lock that the
    /// teardown also takes, so a stream is either never attached or detached exactly once.
    fn create_stream(&self, resolution: Resolution) {
        let _attach = self.stream.lock();
        if self.is_closed() {
            debug!("Bridge closed before stream creation");
            return;
        }
        let adapter = match StreamAdapter::new(
            resolution,
            self.config.pixel_format,
            self.config.frame_rate,
            self.this.clone(),
        ) {
            Ok(adapter) => Arc::new(adapter),
            Err(e) => {
                warn!("Failed to create stream: {}", e);
                return;
            }
        };
        if self.stream.stream.set(Arc::clone(&adapter)).is_ok() {
            self.presentation.attach(adapter);
        }
    }

    /// Take the oldest buffered frame without waiting
    pub fn fetch(&self) -> Option<Frame> {
        if self.is_closed() {
            return None;
        }
        self.lock_queue().try_pop()
    }

    /// Consumer entry point. Always answers the request before returning.
    pub fn on_sample_requested(&self, request: &mut SampleRequest) {
        match self.stream() {
            Some(stream) if !self.is_closed() => stream.on_sample_requested(request),
            _ => request.decline(),
        }
    }

    /// Release buffered frames and detach the presentation. Idempotent.
    pub fn close(&self) {
        let previous = self.state.swap(BridgeState::Closed as u8, Ordering::AcqRel);
        if previous == BridgeState::Closed as u8 {
            return;
        }

        let released = self.lock_queue().clear();
        info!(released, "Video bridge closed");

        let slot = Arc::clone(&self.stream);
        let presentation = Arc::clone(&self.presentation);
        self.dispatcher.post(Box::new(move || {
            let _attach = slot.lock();
            if slot.stream.get().is_some() {
                presentation.detach();
            }
        }));
    }

    pub fn queue_len(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn stats(&self) -> BridgeStats {
        let (queue, queued) = {
            let queue = self.lock_queue();
            (queue.stats(), queue.len())
        };
        BridgeStats {
            frames_written: queue.frames_written,
            frames_read: queue.frames_read,
            frames_dropped: queue.frames_dropped,
            queued,
            samples_delivered: self.stream.stream.get().map_or(0, |s| s.samples_delivered()),
        }
    }
}

impl Drop for VideoBridge {
    fn drop(&mut self) {
        self.close();
    }
}
