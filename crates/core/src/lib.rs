//! # Humedal Core
//!
//! Core types and persistence for the humedal wetland-delineation pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced grid type
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system handling
//! - `Feature`/`FeatureCollection`: DN-attributed polygon features
//! - `Store`: the persistence layer the pipeline checkpoints through
//!   (in-memory fixture backend and an atomic file backend)

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod store;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use store::{FileStore, MemoryStore, Store};
pub use vector::{Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::store::Store;
    pub use crate::vector::{Feature, FeatureCollection};
    pub use crate::Algorithm;
}

/// Core trait for grid algorithms.
///
/// Algorithms are pure functions from an input and a parameter set to a new
/// output; they never mutate their input.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(
        &self,
        input: Self::Input,
    ) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
