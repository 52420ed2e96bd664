//! I/O for grid persistence

mod geotiff;

pub use geotiff::{decode_grid, encode_grid, read_grid, write_grid};
