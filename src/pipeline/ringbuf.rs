//! Bounded drop-oldest ring buffer for the frame pipeline

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use tracing::{trace, warn};

use crate::error::{BridgeError, Result};
use crate::Frame;

/// Outcome of handing a frame to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Frame queued, nothing evicted
    Queued,
    /// Frame queued after evicting the oldest entry
    QueuedDroppingOldest,
    /// Pipeline closed, frame released without effect
    Discarded,
}

/// Fixed-capacity FIFO of frames with a drop-oldest overflow policy.
///
/// The queue itself is not synchronized; the owner wraps it in a single lock and
/// every operation is constant time so the critical section stays short. Counters
/// are atomics so they can be read without taking that lock.
pub struct FrameQueue {
    ring: HeapRb<Frame>,

    /// Statistics
    stats: CachePadded<Stats>,
}

#[derive(Default)]
struct Stats {
    frames_written: AtomicUsize,
    frames_read: AtomicUsize,
    frames_dropped: AtomicUsize,
}

/// Point-in-time copy of the queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub frames_written: usize,
    pub frames_read: usize,
    pub frames_dropped: usize,
}

/// Reject frames with a zero width or height. The only place such frames are
/// logged and counted.
pub(crate) fn ensure_dimensions(frame: &Frame) -> Result<()> {
    if frame.width() == 0 || frame.height() == 0 {
        warn!(
            sequence = frame.sequence(),
            "Rejecting frame with empty dimensions {}x{}",
            frame.width(),
            frame.height()
        );
        metrics::counter!("bridge_frames_rejected").increment(1);
        return Err(BridgeError::InvalidFrame {
            width: frame.width(),
            height: frame.height(),
        });
    }
    Ok(())
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BridgeError::InvalidCapacity);
        }
        Ok(Self {
            ring: HeapRb::new(capacity),
            stats: CachePadded::new(Stats::default()),
        })
    }

    /// Producer: admit a frame, evicting the oldest one when full
    pub fn push(&mut self, frame: Frame) -> Result<Admission> {
        ensure_dimensions(&frame)?;

        self.stats.frames_written.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bridge_frames_submitted").increment(1);

        match self.ring.push_overwrite(frame) {
            None => Ok(Admission::Queued),
            Some(evicted) => {
                trace!(sequence = evicted.sequence(), "Dropped oldest frame");
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("bridge_frames_dropped").increment(1);
                Ok(Admission::QueuedDroppingOldest)
            }
        }
    }

    /// Consumer: take the oldest frame, if any
    pub fn try_pop(&mut self) -> Option<Frame> {
        let frame = self.ring.try_pop()?;
        self.stats.frames_read.fetch_add(1, Ordering::Relaxed);
        Some(frame)
    }

    /// Release every buffered frame, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        self.ring.pop_iter().count()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            frames_written: self.stats.frames_written.load(Ordering::Relaxed),
            frames_read: self.stats.frames_read.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameMetadata, PixelFormat};
    use bytes::Bytes;
    use std::time::{Duration, Instant};

    fn frame(sequence: u64, width: u32, height: u32) -> Frame {
        Frame::new(
            Bytes::from_static(&[0u8; 6]),
            FrameMetadata {
                sequence,
                width,
                height,
                stride: width,
                format: PixelFormat::I420,
            },
        )
    }

    fn drain(queue: &mut FrameQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.try_pop().map(|f| f.sequence())).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            FrameQueue::new(0),
            Err(BridgeError::InvalidCapacity)
        ));
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut queue = FrameQueue::new(3).unwrap();
        for id in 1..=3 {
            assert_eq!(queue.push(frame(id, 2, 2)).unwrap(), Admission::Queued);
        }
        assert_eq!(
            queue.push(frame(4, 2, 2)).unwrap(),
            Admission::QueuedDroppingOldest
        );

        assert_eq!(queue.len(), 3);
        assert_eq!(drain(&mut queue), vec![2, 3, 4]);
        assert_eq!(
            queue.stats(),
            QueueStats {
                frames_written: 4,
                frames_read: 3,
                frames_dropped: 1,
            }
        );
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        for capacity in 1..=5 {
            let mut queue = FrameQueue::new(capacity).unwrap();
            for id in 0..20 {
                queue.push(frame(id, 2, 2)).unwrap();
                assert!(queue.len() <= capacity);
                if id % 7 == 0 {
                    queue.try_pop();
                }
            }
            assert_eq!(queue.capacity(), capacity);
        }
    }

    #[test]
    fn test_capacity_one_keeps_newest() {
        let mut queue = FrameQueue::new(1).unwrap();
        for id in 1..=4 {
            queue.push(frame(id, 2, 2)).unwrap();
        }
        assert_eq!(drain(&mut queue), vec![4]);
    }

    #[test]
    fn test_empty_dimensions_rejected() {
        let mut queue = FrameQueue::new(2).unwrap();
        queue.push(frame(1, 2, 2)).unwrap();

        assert!(matches!(
            queue.push(frame(2, 0, 480)),
            Err(BridgeError::InvalidFrame { width: 0, height: 480 })
        ));
        assert!(matches!(
            queue.push(frame(3, 640, 0)),
            Err(BridgeError::InvalidFrame { .. })
        ));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats().frames_written, 1);
    }

    #[test]
    fn test_try_pop_empty_is_immediate() {
        let mut queue = FrameQueue::new(4).unwrap();
        let start = Instant::now();
        for _ in 0..100 {
            assert!(queue.try_pop().is_none());
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_clear_releases_frames() {
        let mut queue = FrameQueue::new(4).unwrap();
        let kept = frame(1, 8, 8);
        for _ in 0..3 {
            queue.push(kept.clone()).unwrap();
        }
        assert_eq!(std::sync::Arc::strong_count(&kept.meta), 4);

        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert_eq!(std::sync::Arc::strong_count(&kept.meta), 1);
    }
}
