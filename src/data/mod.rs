//! Batches, loaders and the dataset bundle consumed by training
//!
//! Dataset loading and transforms live outside this crate; the loaders here
//! hold already prepared batches. [`synthetic_bundle`] builds a small
//! clustered dataset for demos and tests.

mod batch;
mod loader;
mod synthetic;

pub use batch::Batch;
pub use loader::{DataLoader, DatasetBundle};
pub use synthetic::{synthetic_bundle, SyntheticConfig};
