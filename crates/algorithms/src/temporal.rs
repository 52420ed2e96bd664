//! Temporal aggregation of annual wetland masks
//!
//! Stacks T binary masks into a pixelwise sum grid and a frequency grid
//! (sum / T). The frequency grid is what the morphological smoother and all
//! downstream persistence consume.

use crate::components::ensure_binary;
use crate::maybe_rayon::*;
use humedal_core::raster::Raster;
use humedal_core::{Error, Result};
use ndarray::Array2;

const STAGE: &str = "temporal-aggregate";

/// Aggregate T annual binary masks into (SumGrid, FrequencyGrid).
///
/// A cell's sum counts the years it was classified wetland; nodata years do
/// not contribute. A cell that is nodata in every year stays nodata in both
/// outputs.
pub fn aggregate_years(masks: &[Raster<u8>]) -> Result<(Raster<i32>, Raster<f64>)> {
    let first = masks.first().ok_or(Error::EmptyInputSet { stage: STAGE })?;

    for (i, mask) in masks.iter().enumerate() {
        first.expect_aligned(mask, STAGE, &format!("year {}", i))?;
        ensure_binary(mask, STAGE)?;
    }

    let (rows, cols) = first.shape();
    let years = masks.len() as f64;

    let row_data: Vec<(Vec<i32>, Vec<f64>)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut sum_row = vec![0i32; cols];
            let mut freq_row = vec![0.0f64; cols];

            for col in 0..cols {
                let mut sum = 0i32;
                let mut valid = false;

                for mask in masks {
                    let v = unsafe { mask.get_unchecked(row, col) };
                    if mask.is_nodata(v) {
                        continue;
                    }
                    valid = true;
                    sum += v as i32;
                }

                if valid {
                    sum_row[col] = sum;
                    freq_row[col] = sum as f64 / years;
                } else {
                    sum_row[col] = i32::MAX;
                    freq_row[col] = f64::NAN;
                }
            }

            (sum_row, freq_row)
        })
        .collect();

    let mut sum_data = Vec::with_capacity(rows * cols);
    let mut freq_data = Vec::with_capacity(rows * cols);
    for (s, f) in row_data {
        sum_data.extend(s);
        freq_data.extend(f);
    }

    let mut sum_grid = first.with_same_meta::<i32>();
    sum_grid.set_nodata(Some(i32::MAX));
    *sum_grid.data_mut() =
        Array2::from_shape_vec((rows, cols), sum_data).map_err(|e| Error::Other(e.to_string()))?;

    let mut freq_grid = first.with_same_meta::<f64>();
    freq_grid.set_nodata(Some(f64::NAN));
    *freq_grid.data_mut() =
        Array2::from_shape_vec((rows, cols), freq_data).map_err(|e| Error::Other(e.to_string()))?;

    Ok((sum_grid, freq_grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binarize::MASK_NODATA;
    use approx::assert_relative_eq;
    use humedal_core::GeoTransform;

    fn mask(values: Vec<u8>, rows: usize, cols: usize) -> Raster<u8> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r.set_nodata(Some(MASK_NODATA));
        r
    }

    #[test]
    fn test_two_year_scenario() {
        // Year 1: 2x2 wetland block at rows 0-1, cols 0-1.
        // Year 2: same block plus one extra wetland cell at (2,2).
        let mut y1 = vec![0u8; 16];
        let mut y2 = vec![0u8; 16];
        for row in 0..2 {
            for col in 0..2 {
                y1[row * 4 + col] = 1;
                y2[row * 4 + col] = 1;
            }
        }
        y2[2 * 4 + 2] = 1;

        let (sum, freq) = aggregate_years(&[mask(y1, 4, 4), mask(y2, 4, 4)]).unwrap();

        assert_eq!(sum.get(0, 0).unwrap(), 2);
        assert_eq!(sum.get(2, 2).unwrap(), 1);
        assert_eq!(sum.get(3, 3).unwrap(), 0);
        assert_relative_eq!(freq.get(0, 0).unwrap(), 1.0);
        assert_relative_eq!(freq.get(2, 2).unwrap(), 0.5);
    }

    #[test]
    fn test_frequency_bounds() {
        let masks: Vec<_> = (0..3)
            .map(|i| mask(vec![(i % 2) as u8, 1, 0, 1], 2, 2))
            .collect();
        let (_, freq) = aggregate_years(&masks).unwrap();

        for row in 0..2 {
            for col in 0..2 {
                let f = freq.get(row, col).unwrap();
                assert!((0.0..=1.0).contains(&f), "frequency {} out of range", f);
            }
        }
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let err = aggregate_years(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyInputSet { .. }));
    }

    #[test]
    fn test_geometry_mismatch_is_fatal() {
        let a = mask(vec![0, 1, 0, 1], 2, 2);
        let b = mask(vec![0, 1], 1, 2);
        assert!(matches!(
            aggregate_years(&[a, b]).unwrap_err(),
            Error::GridMismatch { .. }
        ));
    }

    #[test]
    fn test_nodata_year_does_not_count() {
        let a = mask(vec![1, MASK_NODATA, 0, 1], 2, 2);
        let b = mask(vec![1, MASK_NODATA, 1, 1], 2, 2);

        let (sum, freq) = aggregate_years(&[a, b]).unwrap();
        assert_eq!(sum.get(0, 0).unwrap(), 2);
        // Nodata in every year stays nodata
        assert!(sum.is_nodata(sum.get(0, 1).unwrap()));
        assert!(freq.get(0, 1).unwrap().is_nan());
    }
}
