//! Persistence layer for staged pipeline products
//!
//! Every stage reads its inputs from a [`Store`] and writes its outputs back
//! before the next stage begins, so a run can be suspended and resumed at any
//! stage boundary. Two backends: [`MemoryStore`] for tests and [`FileStore`]
//! for production, the latter with write-to-temporary-then-rename discipline
//! so a partially written artifact is never discoverable.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::raster::Raster;
use crate::vector::FeatureCollection;

/// Keyed persistence for grids and feature collections.
///
/// Keys are slash-separated logical paths (directory convention plus file
/// stem); backends decide how they map to storage. Grids move through the
/// store as `Raster<f64>` with NaN nodata; callers cast to their working
/// type on load.
pub trait Store: Send + Sync {
    /// Whether a grid exists under this key
    fn has_grid(&self, key: &str) -> bool;

    /// Load a grid
    fn load_grid(&self, key: &str) -> Result<Raster<f64>>;

    /// Persist a grid atomically
    fn store_grid(&self, key: &str, grid: &Raster<f64>) -> Result<()>;

    /// Whether a feature collection exists under this key
    fn has_vectors(&self, key: &str) -> bool;

    /// Load a feature collection
    fn load_vectors(&self, key: &str) -> Result<FeatureCollection>;

    /// Persist a feature collection atomically
    fn store_vectors(&self, key: &str, features: &FeatureCollection) -> Result<()>;
}
