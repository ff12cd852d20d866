mod entry;
mod persist;
mod store;

pub use entry::{Embedding, SgdEntry};
pub use store::{DENSE_RANGE_LIMIT, WeightStore};
