pub mod dispatch;
pub mod player;
pub mod stream;

pub use dispatch::{ChannelDispatcher, InlineDispatcher, OwnerDispatcher, OwnerLoop, OwnerThread};
pub use player::{Player, PlayerStats};
pub use stream::{
    Presentation, Sample, SampleOutcome, SampleRequest, StreamAdapter, StreamDescriptor,
};
