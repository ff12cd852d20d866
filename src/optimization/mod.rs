mod config;
mod handle;
mod sgd;
mod updater;

pub use config::{KEYS, SgdConfig};
pub use handle::UpdaterHandle;
pub use sgd::SgdUpdater;
pub use updater::{UpdateStats, Updater, ValueType};
