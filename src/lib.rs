//! Optimizer core of a block-partitioned factorization machine trainer.
//!
//! The key space of the requested feature groups is split into blocks
//! ([`blocks::FeatureBlock`]), workers coordinate over those blocks with a
//! [`blocks::BlockTracker`], and per-feature model state lives in a
//! [`storage::WeightStore`] driven by the FTRL/Adagrad [`optimization::SgdUpdater`].
//!
//! An updater applies one update at a time. To update blocks in parallel, build
//! one updater per block range with [`optimization::SgdUpdater::with_range`] and
//! share each through its own [`optimization::UpdaterHandle`].

pub mod blocks;
pub mod error;
pub mod feature;
pub mod initialization;
pub mod optimization;
pub mod storage;

pub use error::{FmErr, Result};
pub use feature::{FeatureId, FeatureKey, Range};
