mod delta;
mod partition;
mod stats;
mod tracker;

pub use delta::{DEFAULT_INIT, DEFAULT_MAX, TrustRegion};
pub use partition::FeatureBlock;
pub use stats::{GroupStats, RowBlock, SAMPLE_STRIDE};
pub use tracker::BlockTracker;
