pub mod bridge;
pub mod ringbuf;

pub use bridge::{BridgeState, VideoBridge};
pub use ringbuf::{Admission, FrameQueue, QueueStats};
