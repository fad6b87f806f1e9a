//! Session lifecycle: one bridge per started session

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{info, instrument};

use crate::capture::Frame;
use crate::display::dispatch::OwnerDispatcher;
use crate::display::stream::{Presentation, SampleRequest};
use crate::error::Result;
use crate::pipeline::{Admission, VideoBridge};
use crate::{BridgeConfig, BridgeStats};

/// Owns the bridge for a running session and routes producer/consumer calls to it.
///
/// Calls that race with [`VideoSession::stop`] either finish against the bridge they
/// already loaded or find no bridge and do nothing.
pub struct VideoSession {
    config: BridgeConfig,
    dispatcher: Arc<dyn OwnerDispatcher>,
    presentation: Arc<dyn Presentation>,
    bridge: ArcSwapOption<VideoBridge>,
}

impl VideoSession {
    pub fn new(
        config: BridgeConfig,
        dispatcher: Arc<dyn OwnerDispatcher>,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            presentation,
            bridge: ArcSwapOption::empty(),
        }
    }

    /// Create and activate a bridge. Returns the running one if already started.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<Arc<VideoBridge>> {
        if let Some(bridge) = self.bridge.load_full() {
            return Ok(bridge);
        }

        let bridge = VideoBridge::new(
            self.config.clone(),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.presentation),
        )?;

        let previous = self
            .bridge
            .compare_and_swap(&None::<Arc<VideoBridge>>, Some(Arc::clone(&bridge)));
        if let Some(running) = &*previous {
            // Lost a race with another start(); the fresh bridge is dropped unused
            return Ok(Arc::clone(running));
        }

        bridge.activate();
        info!("Video session started");
        Ok(bridge)
    }

    /// Close and release the bridge. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(bridge) = self.bridge.swap(None) {
            bridge.close();
            info!("Video session stopped");
        }
    }

    /// Application suspend: same teardown as [`VideoSession::stop`]
    pub fn suspend(&self) {
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.bridge.load().is_some()
    }

    pub fn bridge(&self) -> Option<Arc<VideoBridge>> {
        self.bridge.load_full()
    }

    /// Producer entry point; frames arriving with no running bridge are discarded
    pub fn on_frame_ready(&self, frame: Frame) -> Result<Admission> {
        match self.bridge.load_full() {
            Some(bridge) => bridge.on_frame_ready(frame),
            None => Ok(Admission::Discarded),
        }
    }

    /// Consumer entry point; declines when no bridge is running
    pub fn on_sample_requested(&self, request: &mut SampleRequest) {
        match self.bridge.load_full() {
            Some(bridge) => bridge.on_sample_requested(request),
            None => request.decline(),
        }
    }

    pub fn stats(&self) -> Option<BridgeStats> {
        self.bridge.load_full().map(|bridge| bridge.stats())
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameMetadata, PixelFormat};
    use crate::display::dispatch::InlineDispatcher;
    use crate::display::player::Player;
    use crate::display::stream::SampleOutcome;
    use crate::pipeline::BridgeState;
    use bytes::Bytes;

    fn frame(sequence: u64) -> Frame {
        Frame::new(
            Bytes::new(),
            FrameMetadata {
                sequence,
                width: 64,
                height: 48,
                stride: 64,
                format: PixelFormat::I420,
            },
        )
    }

    fn session() -> (VideoSession, Arc<Player>) {
        let player = Arc::new(Player::new());
        let session = VideoSession::new(
            BridgeConfig::default(),
            Arc::new(InlineDispatcher),
            player.clone(),
        );
        (session, player)
    }

    #[test]
    fn test_idle_session_noops() {
        let (session, _) = session();
        assert!(!session.is_running());
        assert_eq!(
            session.on_frame_ready(frame(1)).unwrap(),
            Admission::Discarded
        );

        let mut request = SampleRequest::new();
        session.on_sample_requested(&mut request);
        assert!(matches!(
            request.into_outcome(),
            Some(SampleOutcome::NotYetAvailable)
        ));
        session.stop();
        assert!(session.stats().is_none());
    }

    #[test]
    fn test_start_is_idempotent() {
        let (session, _) = session();
        let first = session.start().unwrap();
        let second = session.start().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.state(), BridgeState::Active);
    }

    #[test]
    fn test_stop_then_restart_uses_fresh_bridge() {
        let (session, player) = session();
        let first = session.start().unwrap();
        session.on_frame_ready(frame(1)).unwrap();
        assert!(player.is_attached());

        session.suspend();
        assert!(!session.is_running());
        assert!(first.is_closed());
        assert!(!player.is_attached());
        session.stop();

        let second = session.start().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.state(), BridgeState::Active);
        assert!(!second.stream_ready());

        session.on_frame_ready(frame(2)).unwrap();
        let mut request = SampleRequest::new();
        session.on_sample_requested(&mut request);
        let sample = request.into_sample().unwrap();
        assert_eq!(sample.frame.sequence(), 2);
        assert_eq!(sample.index, 0);
    }

    #[test]
    fn test_in_flight_bridge_handle_noops_after_stop() {
        let (session, _) = session();
        let in_flight = session.start().unwrap();
        session.stop();

        assert_eq!(
            in_flight.on_frame_ready(frame(1)).unwrap(),
            Admission::Discarded
        );
        assert_eq!(in_flight.queue_len(), 0);
    }
}
