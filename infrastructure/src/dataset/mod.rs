//! Dataset snapshot loading.

mod loader;

pub use loader::{DatasetFile, DatasetLoader};
