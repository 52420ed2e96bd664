//! Wetland binarization
//!
//! Maps a categorical land-cover grid to a binary wetland/non-wetland mask
//! given the two disjoint class partitions from the run configuration.

use std::collections::HashSet;

use crate::maybe_rayon::*;
use humedal_core::raster::Raster;
use humedal_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Nodata marker carried by all binary masks in the pipeline
pub const MASK_NODATA: u8 = u8::MAX;

/// Parameters for binarization
#[derive(Debug, Clone, Default)]
pub struct BinarizeParams {
    /// Class codes mapped to 1
    pub wetland: Vec<i32>,
    /// Class codes mapped to 0 (the full non-wetland list, woody included)
    pub non_wetland: Vec<i32>,
}

/// Binarization algorithm
#[derive(Debug, Clone, Default)]
pub struct Binarize;

impl Algorithm for Binarize {
    type Input = Raster<i32>;
    type Output = Raster<u8>;
    type Params = BinarizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Binarize"
    }

    fn description(&self) -> &'static str {
        "Map a categorical land-cover grid to a wetland/non-wetland mask"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        binarize(&input, &params)
    }
}

/// Binarize a categorical grid.
///
/// Wetland classes become 1, non-wetland classes 0, nodata cells carry
/// [`MASK_NODATA`]. A cell value in neither set that is not nodata aborts
/// the stage: the class partition is wrong and continuing would produce a
/// plausible-looking but corrupt mask.
pub fn binarize(classes: &Raster<i32>, params: &BinarizeParams) -> Result<Raster<u8>> {
    let wetland: HashSet<i32> = params.wetland.iter().copied().collect();
    let non_wetland: HashSet<i32> = params.non_wetland.iter().copied().collect();

    let (rows, cols) = classes.shape();

    let row_data: Vec<Vec<u8>> = (0..rows)
        .into_par_iter()
        .map(|row| -> Result<Vec<u8>> {
            let mut out = vec![0u8; cols];

            for (col, cell) in out.iter_mut().enumerate() {
                let value = unsafe { classes.get_unchecked(row, col) };

                if classes.is_nodata(value) {
                    *cell = MASK_NODATA;
                } else if wetland.contains(&value) {
                    *cell = 1;
                } else if non_wetland.contains(&value) {
                    *cell = 0;
                } else {
                    return Err(Error::UnsupportedClassDomain(format!(
                        "class code {} at ({}, {}) is in neither the wetland nor the non-wetland set",
                        value, row, col
                    )));
                }
            }

            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;

    let data: Vec<u8> = row_data.into_iter().flatten().collect();

    let mut output = classes.with_same_meta::<u8>();
    output.set_nodata(Some(MASK_NODATA));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use humedal_core::GeoTransform;

    fn params() -> BinarizeParams {
        BinarizeParams {
            wetland: vec![2, 5],
            non_wetland: vec![1, 3, 4],
        }
    }

    fn class_grid(values: Vec<i32>) -> Raster<i32> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        r
    }

    #[test]
    fn test_binarize_indicator() {
        let grid = class_grid(vec![2, 1, 5, 3]);
        let mask = binarize(&grid, &params()).unwrap();

        assert_eq!(mask.get(0, 0).unwrap(), 1);
        assert_eq!(mask.get(0, 1).unwrap(), 0);
        assert_eq!(mask.get(1, 0).unwrap(), 1);
        assert_eq!(mask.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_binarize_output_is_binary() {
        let grid = class_grid(vec![2, 1, 3, 4]);
        let mask = binarize(&grid, &params()).unwrap();
        for row in 0..2 {
            for col in 0..2 {
                assert!(mask.get(row, col).unwrap() <= 1);
            }
        }
    }

    #[test]
    fn test_binarize_nodata_passes_through() {
        let mut grid = class_grid(vec![2, 1, -9999, 3]);
        grid.set_nodata(Some(-9999));

        let mask = binarize(&grid, &params()).unwrap();
        assert_eq!(mask.get(1, 0).unwrap(), MASK_NODATA);
        assert!(mask.is_nodata(mask.get(1, 0).unwrap()));
    }

    #[test]
    fn test_binarize_unknown_class_is_fatal() {
        let grid = class_grid(vec![2, 1, 99, 3]);
        let err = binarize(&grid, &params()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedClassDomain(_)));
    }

    #[test]
    fn test_binarize_via_algorithm_trait() {
        let grid = class_grid(vec![2, 1, 5, 3]);
        let mask = Binarize.execute(grid, params()).unwrap();
        assert_eq!(mask.get(0, 0).unwrap(), 1);
    }
}
