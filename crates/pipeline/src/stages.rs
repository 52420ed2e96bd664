//! The staged delineation pipeline
//!
//! Stages run strictly in dependency order; every artifact is persisted
//! through the store before the next stage begins and reused when already
//! present, so a suspended run resumes at the first missing artifact
//! without reprocessing earlier stages.
//!
//! Subtype refinement sizes are fixed by design: clusters under 10 px are
//! removed, pond/artificial holes up to 2000 px and woody holes up to 10 px
//! are filled, and seams in the merged product up to 20 px are closed.

use geo_types::{LineString, MultiPolygon};
use tracing::{debug, info};

use humedal_algorithms::binarize::{binarize, BinarizeParams};
use humedal_algorithms::buffer::{buffer_lines, RiverBuffers};
use humedal_algorithms::components::{component_filter, ComponentFilterParams, Connectivity};
use humedal_algorithms::merge::{
    merge_masks, MergeInputs, ARTIFICIAL_CODE, GENERIC_WETLAND_CODE, POND_CODE, RIVER_CODE,
};
use humedal_algorithms::modal::{mask_by, modal};
use humedal_algorithms::polygonize::{polygonize, rasterize_lines};
use humedal_algorithms::reclass::reclassify;
use humedal_algorithms::smoothing::consensus_smooth;
use humedal_algorithms::subtypes::{
    extract_artificial, extract_ponds, extract_woody, ArtificialParams, PondParams, WoodyParams,
};
use humedal_algorithms::temporal::aggregate_years;
use humedal_core::raster::Raster;
use humedal_core::vector::{Feature, FeatureCollection};
use humedal_core::{Error, Result, Store, CRS};

use crate::config::WetlandConfig;
use crate::naming::{OutputNaming, StageDir};

/// Smallest subtype cluster retained, pixels
const SUBTYPE_MIN_CLUSTER: usize = 10;
/// Largest pond/artificial hole filled, pixels
const SUBTYPE_MAX_HOLE: usize = 2000;
/// Largest woody hole filled, pixels
const WOODY_MAX_HOLE: usize = 10;
/// Largest seam between merged subtype masks closed, pixels
const SEAM_HOLE_SIZE: usize = 20;

/// One classified year: a free-text tag (woven into artifact names) and its
/// categorical grid
#[derive(Debug, Clone)]
pub struct AnnualGrid {
    pub tag: String,
    pub classes: Raster<i32>,
}

/// The durable outputs of a completed run
#[derive(Debug)]
pub struct PipelineProducts {
    pub unified_mask: Raster<u8>,
    pub unified_polygons: FeatureCollection,
    pub differentiated: Raster<u8>,
    pub differentiated_polygons: FeatureCollection,
    pub pond_mask: Raster<u8>,
    pub artificial_mask: Raster<u8>,
    pub woody_mask: Raster<u8>,
    pub river_mask: Raster<u8>,
}

/// The staged pipeline, bound to one validated configuration and one store
pub struct Pipeline<'a, S: Store> {
    config: &'a WetlandConfig,
    naming: OutputNaming,
    store: &'a S,
}

impl<'a, S: Store> Pipeline<'a, S> {
    /// Bind a pipeline to its configuration and store.
    ///
    /// The configuration is validated here, before any grid is touched.
    pub fn new(config: &'a WetlandConfig, store: &'a S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            naming: OutputNaming::new(config.collection(), config.naming.clone()),
            store,
        })
    }

    /// Run every stage, reusing persisted artifacts where present.
    ///
    /// `years` supplies one categorical grid per classified year, `rivers`
    /// the line network the buffers and the river mask derive from.
    pub fn run(
        &self,
        years: &[AnnualGrid],
        rivers: &[LineString<f64>],
    ) -> Result<PipelineProducts> {
        if years.is_empty() {
            return Err(Error::EmptyInputSet {
                stage: "pipeline-input",
            });
        }
        if years.len() != self.config.years_classified {
            return Err(Error::InvalidParameter {
                name: "years_classified",
                value: self.config.years_classified.to_string(),
                reason: format!("{} annual grids supplied", years.len()),
            });
        }

        // The output CRS is authoritative for every product.
        let crs = CRS::from_epsg(self.config.output_epsg);
        let mut annual = Vec::with_capacity(years.len());
        for year in years {
            let mut classes = year.classes.clone();
            classes.set_crs(Some(crs.clone()));
            annual.push(AnnualGrid {
                tag: year.tag.clone(),
                classes,
            });
        }

        let reference = annual[0].classes.clone();
        for year in &annual[1..] {
            reference.expect_aligned(&year.classes, "pipeline-input", &year.tag)?;
        }

        let partition = self.config.partition()?;

        // Stage 1: binarize each year
        info!(years = annual.len(), "binarizing annual grids");
        let binarize_params = BinarizeParams {
            wetland: self.config.wetland_classes.clone(),
            non_wetland: self.config.non_wetland_classes.clone(),
        };
        let mut binary_masks = Vec::with_capacity(annual.len());
        for year in &annual {
            let key = self
                .naming
                .key(StageDir::Binary, &format!("binary-{}", year.tag));
            let mask = self
                .cached_grid(&key, || {
                    Ok(binarize(&year.classes, &binarize_params)?.cast())
                })?
                .cast::<u8>();
            binary_masks.push(mask);
        }

        // Stage 2: temporal aggregation
        info!("aggregating sum and frequency grids");
        let sum_key = self.naming.key(StageDir::IntermediateTifs, "sum");
        let freq_key = self.naming.key(StageDir::IntermediateTifs, "frequency");
        let sum = if self.store.has_grid(&sum_key) && self.store.has_grid(&freq_key) {
            debug!(key = %sum_key, "reusing persisted grid");
            self.store.load_grid(&sum_key)?
        } else {
            let (sum, frequency) = aggregate_years(&binary_masks)?;
            let sum = sum.cast::<f64>();
            self.store.store_grid(&sum_key, &sum)?;
            self.store.store_grid(&freq_key, &frequency)?;
            sum
        }
        .cast::<i32>();

        // Stage 3: consensus smoothing into the first-pass wetland mask
        info!(radii = ?self.config.kernel_radii, "building first-pass wetland mask");
        let first_pass_key = self.naming.key(StageDir::IntermediateTifs, "first-pass-mask");
        let first_pass = self
            .cached_grid(&first_pass_key, || {
                let consensus = consensus_smooth(&sum, &self.config.kernel_radii)?;
                let sieved = component_filter(
                    &consensus,
                    &ComponentFilterParams {
                        target: 1,
                        threshold: self.config.min_cluster_size.saturating_sub(1),
                        connectivity: Connectivity::Four,
                        fill_gaps: false,
                    },
                )?;
                let filled = component_filter(
                    &sieved,
                    &ComponentFilterParams {
                        target: 1,
                        threshold: self.config.max_hole_size,
                        connectivity: Connectivity::Four,
                        fill_gaps: true,
                    },
                )?;
                Ok(filled.cast())
            })?
            .cast::<u8>();

        // Stage 4: tie-break reclassification of each year
        info!("reclassifying annual grids");
        let mut reclassified = Vec::with_capacity(annual.len());
        for year in &annual {
            let key = self
                .naming
                .key(StageDir::Reclass, &format!("reclass-{}", year.tag));
            let grid = self
                .cached_grid(&key, || Ok(reclassify(&year.classes, &partition)?.cast()))?
                .cast::<i32>();
            reclassified.push(grid);
        }

        // Stage 5: modal aggregation, gated by the first-pass mask
        info!("computing modal classification");
        let mode_key = self.naming.key(StageDir::IntermediateTifs, "mode");
        let mode_freq_key = self.naming.key(StageDir::IntermediateTifs, "mode-frequency");
        let mode = if self.store.has_grid(&mode_key) && self.store.has_grid(&mode_freq_key) {
            debug!(key = %mode_key, "reusing persisted grid");
            self.store.load_grid(&mode_key)?
        } else {
            let (mode, frequency) = modal(&reclassified)?;
            let mode = mode.cast::<f64>();
            self.store.store_grid(&mode_key, &mode)?;
            self.store.store_grid(&mode_freq_key, &frequency.cast())?;
            mode
        }
        .cast::<i32>();

        let masked_mode = self
            .cached_grid(&self.naming.key(StageDir::IntermediateTifs, "mode-masked"), || {
                Ok(mask_by(&mode, &first_pass, "mode-gating")?.cast())
            })?
            .cast::<i32>();

        // Stage 6: river buffers (cached; a missing cache entry is
        // recomputed, never an error)
        info!(
            near = self.config.river_search_distance,
            far = self.config.floodplain_extent,
            "preparing river buffers"
        );
        let buffers = RiverBuffers {
            near: self.cached_buffer(rivers, self.config.river_search_distance, &crs)?,
            far: self.cached_buffer(rivers, self.config.floodplain_extent, &crs)?,
        };

        // Stage 7: subtype extraction
        info!("extracting wetland subtypes");
        let pond_class = self.config.wetland_classes[0];
        let pond_code = partition.reclassified(pond_class).ok_or_else(|| {
            Error::UnsupportedClassDomain(format!("pond class {} left the partition", pond_class))
        })?;
        let artificial_code = partition
            .reclassified(self.config.artificial_class)
            .ok_or_else(|| {
                Error::UnsupportedClassDomain(format!(
                    "artificial class {} left the partition",
                    self.config.artificial_class
                ))
            })?;

        let pond_mask = self
            .cached_grid(&self.naming.key(StageDir::IntermediateTifs, "ponds-mask"), || {
                Ok(extract_ponds(
                    &masked_mode,
                    &PondParams {
                        code: pond_code,
                        kernel_size: self.config.pond_kernel_size,
                        min_cluster: SUBTYPE_MIN_CLUSTER,
                        max_hole: SUBTYPE_MAX_HOLE,
                    },
                )?
                .cast())
            })?
            .cast::<u8>();
        self.cached_polygons(
            &self.naming.key(StageDir::IntermediateShapefiles, "ponds"),
            &pond_mask,
        )?;

        let artificial_mask = self
            .cached_grid(
                &self.naming.key(StageDir::IntermediateTifs, "artificial-mask"),
                || {
                    Ok(extract_artificial(
                        &masked_mode,
                        &ArtificialParams {
                            code: artificial_code,
                            min_cluster: SUBTYPE_MIN_CLUSTER,
                            max_hole: SUBTYPE_MAX_HOLE,
                        },
                    )?
                    .cast())
                },
            )?
            .cast::<u8>();
        self.cached_polygons(
            &self.naming.key(StageDir::IntermediateShapefiles, "artificial"),
            &artificial_mask,
        )?;

        // Woody detection runs on the unmasked mode grid: the river buffers,
        // not the first-pass footprint, are its spatial gate.
        let woody_mask = self
            .cached_grid(&self.naming.key(StageDir::IntermediateTifs, "woody-mask"), || {
                Ok(extract_woody(
                    &mode,
                    &WoodyParams {
                        code: partition.woody_code(),
                        min_cluster: SUBTYPE_MIN_CLUSTER,
                        max_hole: WOODY_MAX_HOLE,
                    },
                    &buffers.near,
                    &buffers.far,
                )?
                .cast())
            })?
            .cast::<u8>();

        let river_mask = self
            .cached_grid(&self.naming.key(StageDir::IntermediateTifs, "river-mask"), || {
                Ok(rasterize_lines(rivers, &reference).cast())
            })?
            .cast::<u8>();

        // Stage 8: merge and polygonize the final products
        info!("merging subtype masks");
        let unified_key = self.naming.key(StageDir::FinalTifs, "unified");
        let differentiated_key = self.naming.key(StageDir::FinalTifs, "differentiated");
        let (unified_mask, differentiated) = if self.store.has_grid(&unified_key)
            && self.store.has_grid(&differentiated_key)
        {
            debug!(key = %unified_key, "reusing persisted grid");
            (
                self.store.load_grid(&unified_key)?.cast::<u8>(),
                self.store.load_grid(&differentiated_key)?.cast::<u8>(),
            )
        } else {
            let (unified, differentiated) = merge_masks(
                &MergeInputs {
                    first_pass: &first_pass,
                    ponds: &pond_mask,
                    artificial: &artificial_mask,
                    woody: &woody_mask,
                    river: &river_mask,
                },
                SEAM_HOLE_SIZE,
            )?;
            self.store.store_grid(&unified_key, &unified.cast())?;
            self.store
                .store_grid(&differentiated_key, &differentiated.cast())?;
            (unified, differentiated)
        };

        let unified_polygons = self.cached_polygons(
            &self.naming.key(StageDir::FinalShapefiles, "unified"),
            &unified_mask,
        )?;

        let differentiated_polygons = {
            let key = self.naming.key(StageDir::FinalShapefiles, "differentiated");
            if self.store.has_vectors(&key) {
                self.store.load_vectors(&key)?
            } else {
                let mut collection = FeatureCollection::with_crs(Some(crs.clone()));
                for code in [POND_CODE, GENERIC_WETLAND_CODE, ARTIFICIAL_CODE, RIVER_CODE] {
                    collection.extend(polygonize(&differentiated, code)?);
                }
                self.store.store_vectors(&key, &collection)?;
                collection
            }
        };

        info!("run complete");
        Ok(PipelineProducts {
            unified_mask,
            unified_polygons,
            differentiated,
            differentiated_polygons,
            pond_mask,
            artificial_mask,
            woody_mask,
            river_mask,
        })
    }

    /// Load a grid if persisted, otherwise compute and persist it
    fn cached_grid<F>(&self, key: &str, compute: F) -> Result<Raster<f64>>
    where
        F: FnOnce() -> Result<Raster<f64>>,
    {
        if self.store.has_grid(key) {
            debug!(key, "reusing persisted grid");
            return self.store.load_grid(key);
        }
        let grid = compute()?;
        self.store.store_grid(key, &grid)?;
        Ok(grid)
    }

    /// Polygonize a mask, reusing the persisted vector set when present
    fn cached_polygons(&self, key: &str, mask: &Raster<u8>) -> Result<FeatureCollection> {
        if self.store.has_vectors(key) {
            debug!(key, "reusing persisted vectors");
            return self.store.load_vectors(key);
        }
        let collection = polygonize(mask, 1)?;
        self.store.store_vectors(key, &collection)?;
        Ok(collection)
    }

    /// A river buffer for one distance, cached under a parameter-derived key.
    ///
    /// An unreadable cache entry is recomputed rather than failing the run.
    fn cached_buffer(
        &self,
        rivers: &[LineString<f64>],
        distance: f64,
        crs: &CRS,
    ) -> Result<MultiPolygon<f64>> {
        let key = self.naming.key(
            StageDir::IntermediateShapefiles,
            &format!("river-buffer-{}m", distance),
        );

        if self.store.has_vectors(&key) {
            match self.store.load_vectors(&key) {
                Ok(cached) => {
                    debug!(key = %key, "reusing cached river buffer");
                    return Ok(MultiPolygon::new(
                        cached.into_iter().map(|f| f.geometry).collect(),
                    ));
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "cached buffer unreadable, recomputing");
                }
            }
        }

        let buffer = buffer_lines(rivers, distance)?;
        let mut collection = FeatureCollection::with_crs(Some(crs.clone()));
        for polygon in &buffer.0 {
            collection.push(Feature::new(polygon.clone(), 1));
        }
        self.store.store_vectors(&key, &collection)?;
        Ok(buffer)
    }
}
