//! Final merging of subtype masks
//!
//! Combines the first-pass wetland mask, the three subtype masks and the
//! rasterized river mask into the unified wetland/non-wetland product and
//! the differentiated wetland-type product. The differentiated overwrite
//! order is fixed: generic wetland, then artificial, then pond, then river.
//! Last applied wins wherever masks overlap, so ponds take precedence over
//! artificial wetlands and rivers over everything.

use humedal_core::raster::Raster;
use humedal_core::Result;

use crate::components::{component_filter, ComponentFilterParams, Connectivity};

/// Differentiated map code: pond
pub const POND_CODE: u8 = 1;
/// Differentiated map code: generic wetland (woody floodplain included)
pub const GENERIC_WETLAND_CODE: u8 = 2;
/// Differentiated map code: artificial wetland
pub const ARTIFICIAL_CODE: u8 = 3;
/// Differentiated map code: river
pub const RIVER_CODE: u8 = 4;

const STAGE: &str = "merge";

/// The five aligned masks the merger consumes
#[derive(Debug)]
pub struct MergeInputs<'a> {
    pub first_pass: &'a Raster<u8>,
    pub ponds: &'a Raster<u8>,
    pub artificial: &'a Raster<u8>,
    pub woody: &'a Raster<u8>,
    pub river: &'a Raster<u8>,
}

impl<'a> MergeInputs<'a> {
    fn all(&self) -> [(&'a Raster<u8>, &'static str); 5] {
        [
            (self.first_pass, "first_pass"),
            (self.ponds, "ponds"),
            (self.artificial, "artificial"),
            (self.woody, "woody"),
            (self.river, "river"),
        ]
    }
}

/// Merge the subtype masks into (unified mask, differentiated grid).
///
/// The unified mask is the OR of all five inputs with seams between subtype
/// masks smoothed by a hole-fill pass of `seam_hole_size` pixels. The
/// differentiated grid starts from that mask as generic wetland and applies
/// the fixed overwrite order.
pub fn merge_masks(
    inputs: &MergeInputs<'_>,
    seam_hole_size: usize,
) -> Result<(Raster<u8>, Raster<u8>)> {
    let reference = inputs.first_pass;
    for (mask, name) in inputs.all() {
        reference.expect_aligned(mask, STAGE, name)?;
    }

    let (rows, cols) = reference.shape();

    // Step 1: unified wetland/non-wetland mask
    let mut unified = reference.with_same_meta::<u8>();
    for row in 0..rows {
        for col in 0..cols {
            let any = inputs.all().iter().any(|(mask, _)| {
                let v = unsafe { mask.get_unchecked(row, col) };
                !mask.is_nodata(v) && v == 1
            });
            if any {
                unsafe { unified.set_unchecked(row, col, 1) };
            }
        }
    }

    let unified = component_filter(
        &unified,
        &ComponentFilterParams {
            target: 1,
            threshold: seam_hole_size,
            connectivity: Connectivity::Four,
            fill_gaps: true,
        },
    )?;

    // Step 2: differentiated wetland-type grid, fixed overwrite order
    let mut differentiated = unified.with_same_meta::<u8>();
    for row in 0..rows {
        for col in 0..cols {
            if unsafe { unified.get_unchecked(row, col) } == 1 {
                unsafe { differentiated.set_unchecked(row, col, GENERIC_WETLAND_CODE) };
            }
        }
    }

    for (mask, code) in [
        (inputs.artificial, ARTIFICIAL_CODE),
        (inputs.ponds, POND_CODE),
        (inputs.river, RIVER_CODE),
    ] {
        for row in 0..rows {
            for col in 0..cols {
                let v = unsafe { mask.get_unchecked(row, col) };
                if !mask.is_nodata(v) && v == 1 {
                    unsafe { differentiated.set_unchecked(row, col, code) };
                }
            }
        }
    }

    Ok((unified, differentiated))
}
