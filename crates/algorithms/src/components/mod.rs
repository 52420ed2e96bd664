//! Connected-component labeling and size filtering
//!
//! The pipeline's universal denoising primitive. One operation serves as
//! both "delete small clusters" (normal mode) and "fill small holes"
//! (`fill_gaps` mode, the same filter applied to the complement of the
//! target region).
//!
//! Connectivity and the size-threshold rule are explicit, documented
//! contracts: components are maximal sets of same-valued cells adjacent
//! under the chosen rule, and any component whose pixel count is at most
//! the threshold is removed (or, in `fill_gaps` mode, filled). Labeling is a
//! single deterministic whole-grid pass; labels are assigned in row-major
//! order of first contact.

mod disjoint_set;

pub use disjoint_set::DisjointSet;

use humedal_core::raster::Raster;
use humedal_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Adjacency rule for component labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge-adjacent cells only (the pipeline default)
    #[default]
    Four,
    /// Edge- and corner-adjacent cells
    Eight,
}

impl Connectivity {
    /// Backward scan offsets: neighbors already visited in a row-major pass
    fn backward_offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (0, -1)],
            Connectivity::Eight => &[(-1, -1), (-1, 0), (-1, 1), (0, -1)],
        }
    }
}

/// Parameters for the component filter
#[derive(Debug, Clone)]
pub struct ComponentFilterParams {
    /// Cell value treated as foreground
    pub target: u8,
    /// Components with pixel count <= this are removed (normal mode) or
    /// filled (`fill_gaps` mode); 0 is the identity
    pub threshold: usize,
    /// Adjacency rule
    pub connectivity: Connectivity,
    /// Operate on the complement: fill background holes instead of deleting
    /// foreground clusters
    pub fill_gaps: bool,
}

impl Default for ComponentFilterParams {
    fn default() -> Self {
        Self {
            target: 1,
            threshold: 0,
            connectivity: Connectivity::Four,
            fill_gaps: false,
        }
    }
}

/// Component filter algorithm
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter;

impl Algorithm for ComponentFilter {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = ComponentFilterParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ComponentFilter"
    }

    fn description(&self) -> &'static str {
        "Remove small connected components or fill small holes in a binary mask"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        component_filter(&input, &params)
    }
}

/// Require that a mask holds only {0, 1} and nodata.
///
/// Raised conditions are programming/configuration errors, not data errors,
/// so they abort the stage.
pub(crate) fn ensure_binary(mask: &Raster<u8>, stage: &'static str) -> Result<()> {
    let (rows, cols) = mask.shape();
    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { mask.get_unchecked(row, col) };
            if v > 1 && !mask.is_nodata(v) {
                return Err(Error::InvalidMaskDomain {
                    stage,
                    value: v as i64,
                    row,
                    col,
                });
            }
        }
    }
    Ok(())
}

/// Label connected components of cells matching `predicate`.
///
/// Returns the label grid (0 = unlabeled) and per-label pixel counts,
/// indexed by label (index 0 unused).
fn label_where<F>(
    mask: &Raster<u8>,
    connectivity: Connectivity,
    predicate: F,
) -> (Array2<i32>, Vec<usize>)
where
    F: Fn(u8) -> bool,
{
    let (rows, cols) = mask.shape();
    let mut provisional = Array2::<u32>::zeros((rows, cols));
    let mut sets = DisjointSet::new();
    let offsets = connectivity.backward_offsets();

    // First pass: provisional labels, merging across backward neighbors.
    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { mask.get_unchecked(row, col) };
            if !predicate(v) {
                continue;
            }

            let mut label = 0u32;
            for &(dr, dc) in offsets {
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr < 0 || nc < 0 || nc >= cols as isize {
                    continue;
                }
                let neighbor = provisional[(nr as usize, nc as usize)];
                if neighbor == 0 {
                    continue;
                }
                if label == 0 {
                    label = neighbor;
                } else {
                    sets.union(label, neighbor);
                }
            }

            if label == 0 {
                label = sets.make_set();
            }
            provisional[(row, col)] = label;
        }
    }

    // Second pass: resolve roots and compact to 1..n in first-contact order.
    let mut root_to_compact = std::collections::HashMap::new();
    let mut labels = Array2::<i32>::zeros((rows, cols));
    let mut counts: Vec<usize> = vec![0];

    for row in 0..rows {
        for col in 0..cols {
            let p = provisional[(row, col)];
            if p == 0 {
                continue;
            }
            let root = sets.find(p);
            let id = *root_to_compact.entry(root).or_insert_with(|| {
                counts.push(0);
                (counts.len() - 1) as i32
            });
            labels[(row, col)] = id;
            counts[id as usize] += 1;
        }
    }

    (labels, counts)
}

/// Label connected components of cells equal to `target`.
///
/// Returns the label grid (labels 1.., 0 = background) and per-label pixel
/// counts indexed by label.
pub fn label_components(
    mask: &Raster<u8>,
    target: u8,
    connectivity: Connectivity,
) -> (Raster<i32>, Vec<usize>) {
    let (labels, counts) = label_where(mask, connectivity, |v| v == target);

    let mut out = mask.with_same_meta::<i32>();
    *out.data_mut() = labels;
    (out, counts)
}

/// Filter a binary mask by connected-component size.
///
/// Normal mode removes foreground components of size <= threshold; in
/// `fill_gaps` mode the same rule runs on the complement, turning small
/// background holes into foreground while larger background regions stay
/// untouched. Nodata cells are never relabeled in either mode.
pub fn component_filter(mask: &Raster<u8>, params: &ComponentFilterParams) -> Result<Raster<u8>> {
    ensure_binary(mask, "component-filter")?;

    let target = params.target;
    let mut output = mask.clone();

    if params.threshold == 0 {
        return Ok(output);
    }

    if params.fill_gaps {
        let (labels, counts) = label_where(mask, params.connectivity, |v| {
            v != target && !mask.is_nodata(v)
        });

        let (rows, cols) = mask.shape();
        for row in 0..rows {
            for col in 0..cols {
                let label = labels[(row, col)];
                if label > 0 && counts[label as usize] <= params.threshold {
                    unsafe { output.set_unchecked(row, col, target) };
                }
            }
        }
    } else {
        let (labels, counts) = label_where(mask, params.connectivity, |v| v == target);

        let (rows, cols) = mask.shape();
        for row in 0..rows {
            for col in 0..cols {
                let label = labels[(row, col)];
                if label > 0 && counts[label as usize] <= params.threshold {
                    unsafe { output.set_unchecked(row, col, 0) };
                }
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binarize::MASK_NODATA;

    fn mask(values: Vec<u8>, rows: usize, cols: usize) -> Raster<u8> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_nodata(Some(MASK_NODATA));
        r
    }

    fn filter(threshold: usize, fill_gaps: bool) -> ComponentFilterParams {
        ComponentFilterParams {
            target: 1,
            threshold,
            connectivity: Connectivity::Four,
            fill_gaps,
        }
    }

    #[test]
    fn test_threshold_zero_is_identity() {
        let m = mask(vec![1, 0, 0, 0, 1, 1, 0, 1, 0], 3, 3);

        let kept = component_filter(&m, &filter(0, false)).unwrap();
        let filled = component_filter(&m, &filter(0, true)).unwrap();

        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(kept.get(row, col).unwrap(), m.get(row, col).unwrap());
                assert_eq!(filled.get(row, col).unwrap(), m.get(row, col).unwrap());
            }
        }
    }

    #[test]
    fn test_single_pixel_keep_and_remove() {
        // 5x5, single foreground pixel at center
        let mut values = vec![0u8; 25];
        values[12] = 1;
        let m = mask(values, 5, 5);

        let kept = component_filter(&m, &filter(0, false)).unwrap();
        assert_eq!(kept.get(2, 2).unwrap(), 1);

        let removed = component_filter(&m, &filter(1, false)).unwrap();
        assert_eq!(removed.get(2, 2).unwrap(), 0);
    }

    #[test]
    fn test_large_components_survive() {
        // 2x2 block plus isolated pixel
        let values = vec![
            1, 1, 0, 0,
            1, 1, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 1,
        ];
        let m = mask(values, 4, 4);

        let out = component_filter(&m, &filter(2, false)).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 1);
        assert_eq!(out.get(1, 1).unwrap(), 1);
        assert_eq!(out.get(3, 3).unwrap(), 0);
    }

    #[test]
    fn test_fill_gaps_fills_small_holes_only() {
        // Ring of foreground around a single-pixel hole, plus a wide open
        // background region elsewhere.
        let values = vec![
            1, 1, 1, 0, 0,
            1, 0, 1, 0, 0,
            1, 1, 1, 0, 0,
            0, 0, 0, 0, 0,
            0, 0, 0, 0, 0,
        ];
        let m = mask(values, 5, 5);

        let out = component_filter(&m, &filter(1, true)).unwrap();
        // The 1-pixel hole is filled
        assert_eq!(out.get(1, 1).unwrap(), 1);
        // The big outside background is untouched
        assert_eq!(out.get(4, 4).unwrap(), 0);
        assert_eq!(out.get(0, 3).unwrap(), 0);
    }

    #[test]
    fn test_four_vs_eight_connectivity() {
        // Two pixels touching only diagonally
        let values = vec![
            1, 0,
            0, 1,
        ];
        let m = mask(values, 2, 2);

        let (_, counts4) = label_components(&m, 1, Connectivity::Four);
        assert_eq!(counts4.len() - 1, 2);

        let (_, counts8) = label_components(&m, 1, Connectivity::Eight);
        assert_eq!(counts8.len() - 1, 1);
        assert_eq!(counts8[1], 2);

        // Under 4-connectivity each diagonal pixel is its own size-1
        // component, so threshold 1 removes both.
        let out = component_filter(&m, &filter(1, false)).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 0);
        assert_eq!(out.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_labels_deterministic_row_major() {
        let values = vec![
            1, 0, 1,
            0, 0, 0,
            1, 0, 0,
        ];
        let m = mask(values, 3, 3);

        let (labels, counts) = label_components(&m, 1, Connectivity::Four);
        assert_eq!(labels.get(0, 0).unwrap(), 1);
        assert_eq!(labels.get(0, 2).unwrap(), 2);
        assert_eq!(labels.get(2, 0).unwrap(), 3);
        assert_eq!(&counts[1..], &[1, 1, 1]);
    }

    #[test]
    fn test_u_shape_merges_across_scan() {
        // U shape forces a union between two provisional labels
        let values = vec![
            1, 0, 1,
            1, 0, 1,
            1, 1, 1,
        ];
        let m = mask(values, 3, 3);

        let (_, counts) = label_components(&m, 1, Connectivity::Four);
        assert_eq!(counts.len() - 1, 1);
        assert_eq!(counts[1], 7);
    }

    #[test]
    fn test_nodata_never_relabeled() {
        let values = vec![
            1, MASK_NODATA,
            0, 1,
        ];
        let m = mask(values, 2, 2);

        let out = component_filter(&m, &filter(1, true)).unwrap();
        assert_eq!(out.get(0, 1).unwrap(), MASK_NODATA);
    }

    #[test]
    fn test_non_binary_input_is_fatal() {
        let m = mask(vec![0, 1, 2, 0], 2, 2);
        let err = component_filter(&m, &filter(1, false)).unwrap_err();
        assert!(matches!(err, Error::InvalidMaskDomain { value: 2, .. }));
    }

    #[test]
    fn test_filter_via_algorithm_trait() {
        let mut values = vec![0u8; 25];
        values[12] = 1;
        let m = mask(values, 5, 5);

        let out = ComponentFilter.execute(m, filter(1, false)).unwrap();
        assert_eq!(out.get(2, 2).unwrap(), 0);
    }
}
