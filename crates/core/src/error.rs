//! Error types for the humedal pipeline
//!
//! Every fatal condition names the stage it was raised from and the grid or
//! parameter involved; there is no silent degradation anywhere in the
//! pipeline.

use thiserror::Error;

/// Main error type for humedal operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{stage}: grid mismatch for '{grid}': expected {expected}, got {actual}")]
    GridMismatch {
        stage: &'static str,
        grid: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported class domain: {0}")]
    UnsupportedClassDomain(String),

    #[error("{stage}: empty input set, no annual grids to process")]
    EmptyInputSet { stage: &'static str },

    #[error("{stage}: value {value} at ({row}, {col}) in an operation that requires a binary mask")]
    InvalidMaskDomain {
        stage: &'static str,
        value: i64,
        row: usize,
        col: usize,
    },

    #[error("index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serde(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serde(e.to_string())
    }
}

/// Result type alias for humedal operations
pub type Result<T> = std::result::Result<T, Error>;
