//! Run configuration
//!
//! One immutable structure holds everything a run needs, validated once
//! before any grid is touched and threaded explicitly into every stage
//! call. No stage reads ambient state.

use std::path::PathBuf;

use humedal_algorithms::reclass::ClassPartition;
use humedal_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Free-text traceability tags woven into every output name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingTags {
    /// Output file prefix
    pub prefix: String,
    /// Years the run covers, e.g. "2017-2021"
    pub years_covered: String,
    /// Run date tag, e.g. "-20220315"
    pub running_date: String,
}

/// Full configuration of a delineation run.
///
/// All fields are required; the only defaults in the system are the
/// subtype cluster/hole sizes documented in [`crate::stages`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WetlandConfig {
    /// Directory holding one categorical grid per classified year
    pub input_dir: PathBuf,
    /// River line-network file
    pub river_network: PathBuf,
    /// EPSG code of the output coordinate reference system
    pub output_epsg: u32,
    /// Number of classified years (T)
    pub years_classified: usize,
    /// Smallest wetland cluster retained by the first-pass smoother, pixels
    pub min_cluster_size: usize,
    /// Largest wetland hole filled by the first-pass smoother, pixels
    pub max_hole_size: usize,
    /// Mean floodplain extent: far river-buffer distance, map units
    pub floodplain_extent: f64,
    /// Maximum river search distance: near river-buffer distance, map units
    pub river_search_distance: f64,
    /// Ordered smoothing kernel radii for the consensus smoother
    pub kernel_radii: Vec<usize>,
    /// Kernel radius for the pond recursive smoother
    pub pond_kernel_size: usize,
    /// Wetland classes in priority order; the first is the pond class
    pub wetland_classes: Vec<i32>,
    /// Every non-wetland class, woody included
    pub non_wetland_classes: Vec<i32>,
    /// Non-wetland classes excluding the woody class
    pub non_wetland_without_woody: Vec<i32>,
    /// The single woody class code
    pub woody_class: i32,
    /// The artificial-wetland class code (must be a wetland class)
    pub artificial_class: i32,
    /// Output naming tags
    pub naming: NamingTags,
}

impl WetlandConfig {
    /// Validate the configuration.
    ///
    /// Checks the class partition (disjointness, woody placement), the
    /// kernel list, T and the buffer distances. Called once, eagerly, by
    /// [`crate::Pipeline::new`].
    pub fn validate(&self) -> Result<()> {
        if self.years_classified == 0 {
            return Err(Error::InvalidParameter {
                name: "years_classified",
                value: "0".to_string(),
                reason: "at least one classified year is required".to_string(),
            });
        }
        if self.kernel_radii.is_empty() {
            return Err(Error::InvalidParameter {
                name: "kernel_radii",
                value: "[]".to_string(),
                reason: "at least one smoothing kernel radius is required".to_string(),
            });
        }
        if let Some(&r) = self.kernel_radii.iter().find(|&&r| r == 0) {
            return Err(Error::InvalidParameter {
                name: "kernel_radii",
                value: r.to_string(),
                reason: "kernel radius must be at least 1".to_string(),
            });
        }
        if self.pond_kernel_size == 0 {
            return Err(Error::InvalidParameter {
                name: "pond_kernel_size",
                value: "0".to_string(),
                reason: "pond kernel radius must be at least 1".to_string(),
            });
        }
        if self.river_search_distance <= 0.0 || self.floodplain_extent <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "river_buffers",
                value: format!(
                    "near {}, far {}",
                    self.river_search_distance, self.floodplain_extent
                ),
                reason: "buffer distances must be positive".to_string(),
            });
        }
        if self.river_search_distance > self.floodplain_extent {
            return Err(Error::InvalidParameter {
                name: "river_search_distance",
                value: self.river_search_distance.to_string(),
                reason: "search distance cannot exceed the floodplain extent".to_string(),
            });
        }

        // The partition constructor checks pairwise disjointness.
        let partition = self.partition()?;

        // The full non-wetland list must be exactly woody plus the rest.
        let full: HashSet<i32> = self.non_wetland_classes.iter().copied().collect();
        let mut expected: HashSet<i32> = self.non_wetland_without_woody.iter().copied().collect();
        expected.insert(self.woody_class);
        if full != expected {
            return Err(Error::UnsupportedClassDomain(format!(
                "non-wetland list {:?} is not the woody class plus the woody-free list",
                self.non_wetland_classes
            )));
        }

        match partition.wetland_classes() {
            [] => Err(Error::UnsupportedClassDomain(
                "at least one wetland class is required".to_string(),
            )),
            [pond, ..] if *pond == self.artificial_class => {
                Err(Error::UnsupportedClassDomain(format!(
                    "artificial class {} cannot also be the pond (highest-priority) class",
                    self.artificial_class
                )))
            }
            _ => {
                if !self.wetland_classes.contains(&self.artificial_class) {
                    return Err(Error::UnsupportedClassDomain(format!(
                        "artificial class {} is not in the wetland priority list",
                        self.artificial_class
                    )));
                }
                Ok(())
            }
        }
    }

    /// The validated three-way class partition
    pub fn partition(&self) -> Result<ClassPartition> {
        ClassPartition::new(
            self.wetland_classes.clone(),
            self.woody_class,
            self.non_wetland_without_woody.clone(),
        )
    }

    /// Collection name the sibling output directories derive from
    pub fn collection(&self) -> String {
        self.input_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WetlandConfig {
        WetlandConfig {
            input_dir: PathBuf::from("/data/parana-lulc"),
            river_network: PathBuf::from("/data/rivers.json"),
            output_epsg: 32720,
            years_classified: 5,
            min_cluster_size: 25,
            max_hole_size: 100,
            floodplain_extent: 500.0,
            river_search_distance: 120.0,
            kernel_radii: vec![2, 3, 5],
            pond_kernel_size: 3,
            wetland_classes: vec![2, 5],
            non_wetland_classes: vec![1, 3, 4, 7],
            non_wetland_without_woody: vec![1, 3, 4],
            woody_class: 7,
            artificial_class: 5,
            naming: NamingTags {
                prefix: "wetlands-".to_string(),
                years_covered: "2017-2021".to_string(),
                running_date: "-20220315".to_string(),
            },
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_overlapping_partition_rejected() {
        let mut cfg = sample();
        cfg.wetland_classes = vec![2, 3];
        assert!(matches!(
            cfg.validate().unwrap_err(),
            Error::UnsupportedClassDomain(_)
        ));
    }

    #[test]
    fn test_woody_must_be_in_full_non_wetland_list() {
        let mut cfg = sample();
        cfg.non_wetland_classes = vec![1, 3, 4];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_empty_kernel_list_rejected() {
        let mut cfg = sample();
        cfg.kernel_radii = vec![];
        assert!(matches!(
            cfg.validate().unwrap_err(),
            Error::InvalidParameter { .. }
        ));
    }

    #[test]
    fn test_zero_years_rejected() {
        let mut cfg = sample();
        cfg.years_classified = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_search_distance_beyond_floodplain_rejected() {
        let mut cfg = sample();
        cfg.river_search_distance = 1000.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_artificial_must_be_wetland() {
        let mut cfg = sample();
        cfg.artificial_class = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = sample();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let back: WetlandConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output_epsg, 32720);
        assert_eq!(back.kernel_radii, vec![2, 3, 5]);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_collection_from_input_dir() {
        assert_eq!(sample().collection(), "parana-lulc");
    }
}
