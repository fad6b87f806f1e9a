//! vidbridge demo: test-pattern capture bridged into a pull-driven player

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};

use vidbridge::capture::TestPatternSource;
use vidbridge::display::{OwnerThread, Player};
use vidbridge::{utils, Config, VideoSession};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    utils::init_tracing("vidbridge=debug");

    info!("vidbridge launching...");

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    vidbridge::CONFIG.store(Arc::new(config.clone()));
    info!("Configuration: {:?}", config);

    // Presentation-owning thread and the player living on it
    let (dispatcher, presentation_thread) = OwnerThread::spawn("presentation")?;
    let player = Arc::new(Player::new());

    let session = Arc::new(VideoSession::new(
        config.bridge.clone(),
        Arc::new(dispatcher),
        player.clone(),
    ));
    session.start()?;

    // Consumer: playback clock on its own thread
    let stop = Arc::new(AtomicBool::new(false));
    let clock = Arc::clone(&player)
        .spawn_clock(config.display.sample_rate, Arc::clone(&stop))?;

    // Producer: capture task at its own cadence
    let capture_session = Arc::clone(&session);
    let capture_config = config.capture.clone();
    let capture_handle = tokio::spawn(async move {
        let mut source = TestPatternSource::new(capture_config);
        loop {
            let frame = source.capture_frame().await;
            if let Err(e) = capture_session.on_frame_ready(frame) {
                warn!("Frame rejected: {}", e);
            }
        }
    });

    let run_for = config.display.run_for_secs;
    let deadline = tokio::time::sleep(Duration::from_secs(run_for));
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stats_tick =
        tokio::time::interval(Duration::from_millis(config.display.stats_interval_ms.max(1)));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl-C received");
                break;
            }
            _ = &mut deadline, if run_for > 0 => {
                info!("Run time of {}s elapsed", run_for);
                break;
            }
            _ = stats_tick.tick() => {
                if let Some(stats) = session.stats() {
                    info!(
                        "Bridge: {} in, {} out, {} dropped, {} queued | Player: {:?}",
                        stats.frames_written,
                        stats.frames_read,
                        stats.frames_dropped,
                        stats.queued,
                        player.stats()
                    );
                }
            }
        }
    }

    // Suspend path: stop producing, close the bridge, then stop the clock
    capture_handle.abort();
    let _ = capture_handle.await;
    session.suspend();
    stop.store(true, Ordering::Relaxed);
    clock
        .join()
        .map_err(|_| eyre!("Playback clock thread panicked"))?;

    // Dropping the last dispatcher lets the presentation thread exit
    drop(session);
    presentation_thread
        .join()
        .map_err(|_| eyre!("Presentation thread panicked"))?;

    info!("vidbridge shutting down");
    Ok(())
}
