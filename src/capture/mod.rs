pub mod frame;
pub mod synthetic;

pub use frame::Frame;
pub use frame::{FrameMetadata, PixelFormat, Resolution};
pub use synthetic::TestPatternSource;
