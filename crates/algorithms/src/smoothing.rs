//! Convolutional smoothing
//!
//! Two smoothing schemes share one convolution core:
//!
//! - the first-pass **consensus** smoother convolves the temporal sum grid
//!   with every configured kernel radius, thresholds each result at half the
//!   kernel's active-cell count, and keeps a pixel when all but at most one
//!   kernel agree;
//! - the pond-specific **recursive** smoother chains three convolutions of a
//!   small kernel over a binary mask, each thresholded at
//!   active-cells / kernel-size (deliberately gentler than one-half), and
//!   ORs the passes together.

use crate::kernel::{circular_kernel, CircularKernel};
use crate::maybe_rayon::*;
use humedal_core::raster::{Raster, RasterElement};
use humedal_core::{Error, Result};
use ndarray::Array2;

/// Zero-padded same-size convolution of a grid with a circular kernel.
///
/// Cells beyond the boundary and nodata cells contribute 0.
pub fn convolve<T: RasterElement>(
    grid: &Raster<T>,
    kernel: &CircularKernel,
) -> Result<Raster<f64>> {
    let (rows, cols) = grid.shape();
    let offsets = kernel.offsets();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = vec![0.0f64; cols];

            for (col, cell) in out.iter_mut().enumerate() {
                let mut acc = 0.0;

                for &(dr, dc) in offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let v = unsafe { grid.get_unchecked(nr as usize, nc as usize) };
                    if grid.is_nodata(v) {
                        continue;
                    }
                    acc += v.to_f64().unwrap_or(0.0);
                }

                *cell = acc;
            }

            out
        })
        .collect();

    let mut output = grid.with_same_meta::<f64>();
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

fn threshold_mask(conv: &Raster<f64>, threshold: f64) -> Raster<u8> {
    let mut mask = conv.with_same_meta::<u8>();
    let (rows, cols) = conv.shape();
    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { conv.get_unchecked(row, col) };
            if v >= threshold {
                unsafe { mask.set_unchecked(row, col, 1) };
            }
        }
    }
    mask
}

fn validate_radii(radii: &[usize], name: &'static str) -> Result<()> {
    if radii.is_empty() {
        return Err(Error::InvalidParameter {
            name,
            value: "[]".to_string(),
            reason: "at least one kernel radius is required".to_string(),
        });
    }
    if let Some(&r) = radii.iter().find(|&&r| r == 0) {
        return Err(Error::InvalidParameter {
            name,
            value: r.to_string(),
            reason: "kernel radius must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Multi-kernel consensus smoothing of the temporal sum grid.
///
/// For each radius the sum grid is convolved and thresholded at half that
/// kernel's active-cell count; a pixel enters the output mask when it passes
/// in at least `radii.len() - 1` kernels, so no single kernel's boundary
/// artifacts can veto or force a pixel.
pub fn consensus_smooth(sum: &Raster<i32>, radii: &[usize]) -> Result<Raster<u8>> {
    validate_radii(radii, "kernel_radii")?;

    let (rows, cols) = sum.shape();
    let mut passes = Array2::<u8>::zeros((rows, cols));

    for &radius in radii {
        let kernel = circular_kernel(radius);
        let conv = convolve(sum, &kernel)?;
        let threshold = kernel.active_cells() as f64 / 2.0;

        for row in 0..rows {
            for col in 0..cols {
                let v = unsafe { conv.get_unchecked(row, col) };
                if v >= threshold {
                    passes[(row, col)] += 1;
                }
            }
        }
    }

    let required = (radii.len().saturating_sub(1)).max(1) as u8;

    let mut mask = sum.with_same_meta::<u8>();
    for row in 0..rows {
        for col in 0..cols {
            if passes[(row, col)] >= required {
                unsafe { mask.set_unchecked(row, col, 1) };
            }
        }
    }

    Ok(mask)
}

/// Recursive convolutional smoothing of a binary mask.
///
/// Runs `passes` chained convolve-and-threshold rounds with a single kernel,
/// each round re-convolving the previous boolean output and thresholding at
/// active-cells / `divisor`, then ORs every round's output together.
pub fn recursive_smooth(
    mask: &Raster<u8>,
    radius: usize,
    passes: usize,
    divisor: f64,
) -> Result<Raster<u8>> {
    validate_radii(&[radius], "pond_kernel_size")?;
    if passes == 0 {
        return Err(Error::InvalidParameter {
            name: "passes",
            value: "0".to_string(),
            reason: "at least one smoothing pass is required".to_string(),
        });
    }
    if divisor <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "divisor",
            value: divisor.to_string(),
            reason: "threshold divisor must be positive".to_string(),
        });
    }

    let kernel = circular_kernel(radius);
    let threshold = kernel.active_cells() as f64 / divisor;

    let (rows, cols) = mask.shape();
    let mut combined = mask.with_same_meta::<u8>();
    let mut current = mask.clone();

    for _ in 0..passes {
        let conv = convolve(&current, &kernel)?;
        current = threshold_mask(&conv, threshold);

        for row in 0..rows {
            for col in 0..cols {
                if unsafe { current.get_unchecked(row, col) } == 1 {
                    unsafe { combined.set_unchecked(row, col, 1) };
                }
            }
        }
    }

    Ok(combined)
}
