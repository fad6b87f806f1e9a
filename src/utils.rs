use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Time between ticks of a clock running at `fps`; zero is treated as one
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}

/// Install the fmt subscriber, honouring `RUST_LOG` when set
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_thread_names(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(25), Duration::from_millis(40));
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }
}
