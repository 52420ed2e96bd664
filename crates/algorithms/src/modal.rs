//! Modal aggregation across years
//!
//! Per-pixel most-frequent reclassified code over a stack of annual grids.
//! The tie-break is an explicit contract: among codes tied at maximum
//! frequency the smallest numeric code wins, which after the ordering the
//! reclassifier imposes means wetlands win ties against non-wetlands.

use crate::maybe_rayon::*;
use humedal_core::raster::Raster;
use humedal_core::{Error, Result};
use ndarray::Array2;

const STAGE: &str = "modal-aggregate";

/// Compute per-pixel mode and its frequency over a stack of code grids.
///
/// Returns (ModeGrid, FrequencyGrid). Nodata years are skipped per pixel; a
/// pixel with no valid year is nodata with frequency 0. This is a pure
/// pixel-independent reduction.
pub fn modal(stack: &[Raster<i32>]) -> Result<(Raster<i32>, Raster<i32>)> {
    let first = stack.first().ok_or(Error::EmptyInputSet { stage: STAGE })?;

    for (i, grid) in stack.iter().enumerate() {
        first.expect_aligned(grid, STAGE, &format!("year {}", i))?;
    }

    let (rows, cols) = first.shape();
    let nodata_out = i32::MAX;

    let row_data: Vec<(Vec<i32>, Vec<i32>)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut mode_row = vec![nodata_out; cols];
            let mut freq_row = vec![0i32; cols];
            // (code, count) pairs; the stack holds few distinct codes per pixel
            let mut counts: Vec<(i32, i32)> = Vec::with_capacity(stack.len());

            for col in 0..cols {
                counts.clear();

                for grid in stack {
                    let v = unsafe { grid.get_unchecked(row, col) };
                    if grid.is_nodata(v) {
                        continue;
                    }
                    match counts.iter_mut().find(|(code, _)| *code == v) {
                        Some((_, n)) => *n += 1,
                        None => counts.push((v, 1)),
                    }
                }

                let mut best: Option<(i32, i32)> = None;
                for &(code, n) in &counts {
                    best = match best {
                        None => Some((code, n)),
                        Some((bc, bn)) => {
                            if n > bn || (n == bn && code < bc) {
                                Some((code, n))
                            } else {
                                Some((bc, bn))
                            }
                        }
                    };
                }

                if let Some((code, n)) = best {
                    mode_row[col] = code;
                    freq_row[col] = n;
                }
            }

            (mode_row, freq_row)
        })
        .collect();

    let mut mode_data = Vec::with_capacity(rows * cols);
    let mut freq_data = Vec::with_capacity(rows * cols);
    for (m, f) in row_data {
        mode_data.extend(m);
        freq_data.extend(f);
    }

    let mut mode = first.with_same_meta::<i32>();
    mode.set_nodata(Some(nodata_out));
    *mode.data_mut() =
        Array2::from_shape_vec((rows, cols), mode_data).map_err(|e| Error::Other(e.to_string()))?;

    let mut freq = first.with_same_meta::<i32>();
    *freq.data_mut() =
        Array2::from_shape_vec((rows, cols), freq_data).map_err(|e| Error::Other(e.to_string()))?;

    Ok((mode, freq))
}

/// Gate a code grid by a binary mask.
///
/// Cells where the mask is 1 keep their code; everywhere else becomes 0.
/// Nodata code cells stay nodata.
pub fn mask_by(grid: &Raster<i32>, mask: &Raster<u8>, stage: &'static str) -> Result<Raster<i32>> {
    grid.expect_aligned(mask, stage, "mask")?;

    let (rows, cols) = grid.shape();
    let mut output = grid.clone();

    for row in 0..rows {
        for col in 0..cols {
            let code = unsafe { grid.get_unchecked(row, col) };
            if grid.is_nodata(code) {
                continue;
            }
            let m = unsafe { mask.get_unchecked(row, col) };
            if m != 1 {
                unsafe { output.set_unchecked(row, col, 0) };
            }
        }
    }

    Ok(output)
}
