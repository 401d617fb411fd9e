mod barrier;
mod solo;
mod synchronizer;

pub use barrier::BarrierSync;
pub use solo::Solo;
pub use synchronizer::Synchronizer;
