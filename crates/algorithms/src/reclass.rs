//! Tie-break-aware reclassification
//!
//! A per-pixel mode that breaks ties by smallest value would favor whichever
//! raw class code happens to be smallest. Re-encoding every year's codes
//! into ordered bands first (wetland classes below woody below all
//! non-wetland classes) makes ties between a wetland and a non-wetland
//! class at equal frequency resolve in favor of the wetland,
//! deterministically.

use crate::maybe_rayon::*;
use humedal_core::raster::Raster;
use humedal_core::{Algorithm, Error, Result};
use ndarray::Array2;
use std::collections::HashSet;

/// First wetland band: wetland class with priority i maps to 100 + i
pub const WETLAND_BASE: i32 = 100;
/// First non-wetland band: non-wetland class at position j maps to 200 + j
pub const NON_WETLAND_BASE: i32 = 200;

/// Category of a raw class code within the configured partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassCategory {
    /// Wetland class with its priority index (0 = highest priority)
    Wetland(usize),
    /// The single woody class
    Woody,
    /// Non-wetland class with its position in the configured order
    NonWetland(usize),
}

/// Encode a category into the ordered numeric domain.
///
/// Wetland bands start at [`WETLAND_BASE`], the woody class takes the next
/// value after the last wetland band, and non-wetland bands start at
/// [`NON_WETLAND_BASE`]. The encoding is injective and every favored-on-tie
/// code is strictly below every disfavored one.
pub fn reclass_code(category: ClassCategory, wetland_count: usize) -> i32 {
    match category {
        ClassCategory::Wetland(i) => WETLAND_BASE + i as i32,
        ClassCategory::Woody => WETLAND_BASE + wetland_count as i32,
        ClassCategory::NonWetland(j) => NON_WETLAND_BASE + j as i32,
    }
}

/// The validated three-way partition of the class domain
#[derive(Debug, Clone)]
pub struct ClassPartition {
    wetland: Vec<i32>,
    woody: i32,
    non_wetland: Vec<i32>,
}

impl ClassPartition {
    /// Build and validate a partition.
    ///
    /// `wetland` is the ordered priority list, `woody` the single woody
    /// class code, `non_wetland` the ordered non-wetland list *excluding*
    /// woody. The three subsets must be pairwise disjoint; this is checked
    /// here, once, before any grid is processed.
    pub fn new(wetland: Vec<i32>, woody: i32, non_wetland: Vec<i32>) -> Result<Self> {
        let wetland_set: HashSet<i32> = wetland.iter().copied().collect();
        let non_wetland_set: HashSet<i32> = non_wetland.iter().copied().collect();

        if wetland_set.len() != wetland.len() {
            return Err(Error::UnsupportedClassDomain(
                "duplicate code in the wetland priority list".to_string(),
            ));
        }
        if non_wetland_set.len() != non_wetland.len() {
            return Err(Error::UnsupportedClassDomain(
                "duplicate code in the non-wetland list".to_string(),
            ));
        }
        if let Some(shared) = wetland_set.intersection(&non_wetland_set).next() {
            return Err(Error::UnsupportedClassDomain(format!(
                "code {} appears in both the wetland and non-wetland sets",
                shared
            )));
        }
        if wetland_set.contains(&woody) || non_wetland_set.contains(&woody) {
            return Err(Error::UnsupportedClassDomain(format!(
                "woody code {} overlaps another partition subset",
                woody
            )));
        }
        if wetland.len() as i32 >= NON_WETLAND_BASE - WETLAND_BASE {
            return Err(Error::UnsupportedClassDomain(format!(
                "{} wetland classes exceed the wetland band capacity",
                wetland.len()
            )));
        }

        Ok(Self {
            wetland,
            woody,
            non_wetland,
        })
    }

    /// Ordered wetland priority list
    pub fn wetland_classes(&self) -> &[i32] {
        &self.wetland
    }

    /// Categorize a raw class code, or None if it is outside the partition
    pub fn category_of(&self, code: i32) -> Option<ClassCategory> {
        if code == self.woody {
            return Some(ClassCategory::Woody);
        }
        if let Some(i) = self.wetland.iter().position(|&c| c == code) {
            return Some(ClassCategory::Wetland(i));
        }
        self.non_wetland
            .iter()
            .position(|&c| c == code)
            .map(ClassCategory::NonWetland)
    }

    /// Reclassified code for a raw class code
    pub fn reclassified(&self, code: i32) -> Option<i32> {
        self.category_of(code)
            .map(|cat| reclass_code(cat, self.wetland.len()))
    }

    /// Reclassified code of the woody class
    pub fn woody_code(&self) -> i32 {
        reclass_code(ClassCategory::Woody, self.wetland.len())
    }
}

/// Parameters wrapper for the reclassification algorithm
#[derive(Debug, Clone)]
pub struct ReclassifyParams {
    pub partition: ClassPartition,
}

impl Default for ReclassifyParams {
    fn default() -> Self {
        Self {
            partition: ClassPartition {
                wetland: Vec::new(),
                woody: -1,
                non_wetland: Vec::new(),
            },
        }
    }
}

/// Reclassification algorithm
#[derive(Debug, Clone, Default)]
pub struct Reclassify;

impl Algorithm for Reclassify {
    type Input = Raster<i32>;
    type Output = Raster<i32>;
    type Params = ReclassifyParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Reclassify"
    }

    fn description(&self) -> &'static str {
        "Re-encode class codes into the tie-break-ordered numeric domain"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        reclassify(&input, &params.partition)
    }
}

/// Re-encode one year's categorical grid.
///
/// Nodata passes through; a code outside the partition aborts the stage.
pub fn reclassify(grid: &Raster<i32>, partition: &ClassPartition) -> Result<Raster<i32>> {
    let (rows, cols) = grid.shape();
    let nodata_out = i32::MAX;

    let row_data: Vec<Vec<i32>> = (0..rows)
        .into_par_iter()
        .map(|row| -> Result<Vec<i32>> {
            let mut out = vec![0i32; cols];

            for (col, cell) in out.iter_mut().enumerate() {
                let value = unsafe { grid.get_unchecked(row, col) };

                if grid.is_nodata(value) {
                    *cell = nodata_out;
                    continue;
                }

                *cell = partition.reclassified(value).ok_or_else(|| {
                    Error::UnsupportedClassDomain(format!(
                        "class code {} at ({}, {}) is outside the configured partition",
                        value, row, col
                    ))
                })?;
            }

            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;

    let data: Vec<i32> = row_data.into_iter().flatten().collect();

    let mut output = grid.with_same_meta::<i32>();
    output.set_nodata(Some(nodata_out));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
