//! Wetland subtype extractors
//!
//! Each extractor is a fixed composition of component filtering and, where
//! the subtype calls for it, recursive smoothing or river-buffer gating,
//! applied to the modal classification grid. Cluster/hole sizes follow the
//! configuration: components smaller than `min_cluster` pixels are removed,
//! holes up to `max_hole` pixels are filled.

use geo::{BooleanOps, Intersects};
use geo_types::MultiPolygon;
use humedal_core::raster::Raster;
use humedal_core::vector::{Feature, FeatureCollection};
use humedal_core::Result;

use crate::components::{component_filter, ComponentFilterParams, Connectivity};
use crate::polygonize::{polygonize, rasterize_polygons};
use crate::smoothing::recursive_smooth;

/// Mask of cells equal to one reclassified code (nodata reads as 0)
pub fn class_mask(grid: &Raster<i32>, code: i32) -> Raster<u8> {
    let (rows, cols) = grid.shape();
    let mut mask = grid.with_same_meta::<u8>();

    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { grid.get_unchecked(row, col) };
            if !grid.is_nodata(v) && v == code {
                unsafe { mask.set_unchecked(row, col, 1) };
            }
        }
    }

    mask
}

fn sieve(mask: &Raster<u8>, min_cluster: usize) -> Result<Raster<u8>> {
    component_filter(
        mask,
        &ComponentFilterParams {
            target: 1,
            threshold: min_cluster.saturating_sub(1),
            connectivity: Connectivity::Four,
            fill_gaps: false,
        },
    )
}

fn fill(mask: &Raster<u8>, max_hole: usize) -> Result<Raster<u8>> {
    component_filter(
        mask,
        &ComponentFilterParams {
            target: 1,
            threshold: max_hole,
            connectivity: Connectivity::Four,
            fill_gaps: true,
        },
    )
}

/// Parameters for the pond extractor
#[derive(Debug, Clone)]
pub struct PondParams {
    /// Reclassified pond code
    pub code: i32,
    /// Radius of the recursive smoothing kernel
    pub kernel_size: usize,
    /// Smallest retained cluster, in pixels
    pub min_cluster: usize,
    /// Largest filled hole, in pixels
    pub max_hole: usize,
}

impl Default for PondParams {
    fn default() -> Self {
        Self {
            code: 100,
            kernel_size: 3,
            min_cluster: 10,
            max_hole: 2000,
        }
    }
}

/// Extract the pond mask from the masked modal grid.
///
/// Sieve, fill, then three chained convolution passes ORed together, and a
/// final sieve of whatever the smoothing grew. The per-pass threshold
/// divides the kernel's cell count by the kernel size rather than by two, a
/// deliberately gentler smoothing than the first-pass consensus.
pub fn extract_ponds(masked_mode: &Raster<i32>, params: &PondParams) -> Result<Raster<u8>> {
    let mask = class_mask(masked_mode, params.code);
    let mask = sieve(&mask, params.min_cluster)?;
    let mask = fill(&mask, params.max_hole)?;

    let smoothed = recursive_smooth(&mask, params.kernel_size, 3, params.kernel_size as f64)?;

    sieve(&smoothed, params.min_cluster)
}

/// Parameters for the artificial-wetland extractor
#[derive(Debug, Clone)]
pub struct ArtificialParams {
    /// Reclassified artificial-wetland code
    pub code: i32,
    pub min_cluster: usize,
    pub max_hole: usize,
}

impl Default for ArtificialParams {
    fn default() -> Self {
        Self {
            code: 101,
            min_cluster: 10,
            max_hole: 2000,
        }
    }
}

/// Extract the artificial-wetland mask: sieve and fill, no smoothing
pub fn extract_artificial(
    masked_mode: &Raster<i32>,
    params: &ArtificialParams,
) -> Result<Raster<u8>> {
    let mask = class_mask(masked_mode, params.code);
    let mask = sieve(&mask, params.min_cluster)?;
    fill(&mask, params.max_hole)
}

/// Parameters for the woody-floodplain extractor
#[derive(Debug, Clone)]
pub struct WoodyParams {
    /// Reclassified woody code
    pub code: i32,
    pub min_cluster: usize,
    /// Largest filled hole, both before and after buffer gating
    pub max_hole: usize,
}

impl Default for WoodyParams {
    fn default() -> Self {
        Self {
            code: 102,
            min_cluster: 10,
            max_hole: 10,
        }
    }
}

/// Extract the woody-floodplain mask.
///
/// Works on the *unmasked* modal grid: woody patches are gated spatially by
/// the river buffers, not by the first-pass wetland footprint. Candidate
/// patches are polygonized, kept only when they intersect the near buffer,
/// clipped to the far buffer, rasterized back and gap-filled.
pub fn extract_woody(
    mode: &Raster<i32>,
    params: &WoodyParams,
    near: &MultiPolygon<f64>,
    far: &MultiPolygon<f64>,
) -> Result<Raster<u8>> {
    let mask = class_mask(mode, params.code);
    let mask = sieve(&mask, params.min_cluster)?;
    let mask = fill(&mask, params.max_hole)?;

    let candidates = polygonize(&mask, 1)?;

    let mut gated = FeatureCollection::with_crs(candidates.crs.clone());
    for feature in candidates.iter() {
        if !feature.geometry.intersects(near) {
            continue;
        }

        let patch = MultiPolygon::new(vec![feature.geometry.clone()]);
        for clipped in patch.intersection(far) {
            gated.push(Feature::new(clipped, feature.dn));
        }
    }

    let rasterized = rasterize_polygons(&gated, mode);
    fill(&rasterized, params.max_hole)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::river_buffers;
    use geo_types::LineString;
    use humedal_core::GeoTransform;

    fn mode_grid(values: Vec<i32>, rows: usize, cols: usize) -> Raster<i32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r.set_nodata(Some(i32::MAX));
        r
    }

    #[test]
    fn test_class_mask_selects_code() {
        let grid = mode_grid(vec![100, 101, 100, 0], 2, 2);
        let mask = class_mask(&grid, 100);

        assert_eq!(mask.get(0, 0).unwrap(), 1);
        assert_eq!(mask.get(0, 1).unwrap(), 0);
        assert_eq!(mask.get(1, 0).unwrap(), 1);
        assert_eq!(mask.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_artificial_removes_small_clusters() {
        // One 2x2 patch of code 101 and one isolated cell
        let mut values = vec![0i32; 36];
        for &(r, c) in &[(1, 1), (1, 2), (2, 1), (2, 2)] {
            values[r * 6 + c] = 101;
        }
        values[4 * 6 + 4] = 101;
        let grid = mode_grid(values, 6, 6);

        let out = extract_artificial(
            &grid,
            &ArtificialParams {
                code: 101,
                min_cluster: 2,
                max_hole: 0,
            },
        )
        .unwrap();

        assert_eq!(out.get(1, 1).unwrap(), 1);
        assert_eq!(out.get(4, 4).unwrap(), 0);
    }

    #[test]
    fn test_ponds_small_cluster_threshold_applies_twice() {
        // A single pond pixel disappears even before smoothing
        let mut values = vec![0i32; 49];
        values[24] = 100;
        let grid = mode_grid(values, 7, 7);

        let out = extract_ponds(
            &grid,
            &PondParams {
                code: 100,
                kernel_size: 1,
                min_cluster: 2,
                max_hole: 0,
            },
        )
        .unwrap();

        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_ponds_block_survives() {
        let mut values = vec![0i32; 81];
        for r in 2..7 {
            for c in 2..7 {
                values[r * 9 + c] = 100;
            }
        }
        let grid = mode_grid(values, 9, 9);

        let out = extract_ponds(
            &grid,
            &PondParams {
                code: 100,
                kernel_size: 1,
                min_cluster: 4,
                max_hole: 10,
            },
        )
        .unwrap();

        assert_eq!(out.get(4, 4).unwrap(), 1);
    }

    #[test]
    fn test_woody_gated_by_near_buffer() {
        // Grid in a 100 m world: 10x10 cells of 10 m.
        // River runs along y = 55 (row 4/5 boundary area).
        let mut values = vec![0i32; 100];
        // Patch A: rows 3-4, cols 2-4 (near the river)
        for r in 3..5 {
            for c in 2..5 {
                values[r * 10 + c] = 102;
            }
        }
        // Patch B: rows 8-9, cols 7-9 (far from the river)
        for r in 8..10 {
            for c in 7..10 {
                values[r * 10 + c] = 102;
            }
        }
        let mut grid = Raster::from_vec(values, 10, 10).unwrap();
        grid.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
        grid.set_nodata(Some(i32::MAX));

        let river = vec![LineString::from(vec![(0.0, 55.0), (100.0, 55.0)])];
        let buffers = river_buffers(&river, 15.0, 30.0).unwrap();

        let out = extract_woody(
            &grid,
            &WoodyParams {
                code: 102,
                min_cluster: 2,
                max_hole: 0,
            },
            &buffers.near,
            &buffers.far,
        )
        .unwrap();

        // Patch A intersects the near buffer and lies within the far buffer
        assert_eq!(out.get(3, 3).unwrap(), 1);
        // Patch B is wholly outside the near buffer
        assert_eq!(out.get(8, 8).unwrap(), 0);
        assert_eq!(out.get(9, 9).unwrap(), 0);
    }

    #[test]
    fn test_woody_clipped_to_far_buffer() {
        // A tall patch crossing the far-buffer boundary is kept but clipped
        let mut values = vec![0i32; 100];
        for r in 0..9 {
            for c in 4..6 {
                values[r * 10 + c] = 102;
            }
        }
        let mut grid = Raster::from_vec(values, 10, 10).unwrap();
        grid.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
        grid.set_nodata(Some(i32::MAX));

        let river = vec![LineString::from(vec![(0.0, 50.0), (100.0, 50.0)])];
        let buffers = river_buffers(&river, 15.0, 25.0).unwrap();

        let out = extract_woody(
            &grid,
            &WoodyParams {
                code: 102,
                min_cluster: 2,
                max_hole: 0,
            },
            &buffers.near,
            &buffers.far,
        )
        .unwrap();

        // Inside the far buffer (rows 3-6 span y 40-70, buffer is y 25-75)
        assert_eq!(out.get(4, 4).unwrap(), 1);
        // Above the far buffer (row 0 spans y 90-100)
        assert_eq!(out.get(0, 4).unwrap(), 0);
        assert_eq!(out.get(1, 5).unwrap(), 0);
    }
}
