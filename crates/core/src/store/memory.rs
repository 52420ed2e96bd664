//! In-memory store backend for tests and fixtures

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::raster::Raster;
use crate::store::Store;
use crate::vector::FeatureCollection;

/// Store backend holding everything in memory.
///
/// Backs unit and integration tests; also useful for one-shot runs where
/// checkpointing to disk is not wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    grids: Mutex<HashMap<String, Raster<f64>>>,
    vectors: Mutex<HashMap<String, FeatureCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored grids, for resume assertions in tests
    pub fn grid_count(&self) -> usize {
        self.grids.lock().unwrap().len()
    }
}

impl Store for MemoryStore {
    fn has_grid(&self, key: &str) -> bool {
        self.grids.lock().unwrap().contains_key(key)
    }

    fn load_grid(&self, key: &str) -> Result<Raster<f64>> {
        self.grids
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no grid stored under '{}'", key)))
    }

    fn store_grid(&self, key: &str, grid: &Raster<f64>) -> Result<()> {
        self.grids
            .lock()
            .unwrap()
            .insert(key.to_string(), grid.clone());
        Ok(())
    }

    fn has_vectors(&self, key: &str) -> bool {
        self.vectors.lock().unwrap().contains_key(key)
    }

    fn load_vectors(&self, key: &str) -> Result<FeatureCollection> {
        self.vectors
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no vectors stored under '{}'", key)))
    }

    fn store_vectors(&self, key: &str, features: &FeatureCollection) -> Result<()> {
        self.vectors
            .lock()
            .unwrap()
            .insert(key.to_string(), features.clone());
        Ok(())
    }
}
