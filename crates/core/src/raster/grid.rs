//! Georeferenced grid type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D grid of cell values.
///
/// `Raster<T>` stores values of a single semantic type (class code, binary
/// flag, count or frequency) in row-major order together with its geographic
/// metadata (affine transform, CRS, nodata value).
///
/// Every pipeline stage builds a new `Raster` from its inputs; grids are
/// never mutated in place once a stage has produced them.
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values, (row, col) indexed
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster from row-major cell data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            data: array,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        })
    }

    /// Create a raster with this raster's metadata but a different cell type,
    /// filled with zeros
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Create a raster with the same dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Set value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn set_unchecked(&mut self, row: usize, col: usize, value: T) {
        unsafe {
            *self.data.uget_mut((row, col)) = value;
        }
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    // Alignment

    /// Short description of shape, transform origin and CRS, used in
    /// mismatch errors
    pub fn geometry_string(&self) -> String {
        let (rows, cols) = self.shape();
        format!(
            "{}x{} @ ({}, {}) px {} crs {}",
            rows,
            cols,
            self.transform.origin_x,
            self.transform.origin_y,
            self.transform.pixel_width,
            self.crs
                .as_ref()
                .map(|c| c.identifier())
                .unwrap_or_else(|| "-".to_string()),
        )
    }

    /// Require that `other` shares this raster's shape, transform and CRS.
    ///
    /// Every operation that combines multiple grids calls this first;
    /// disagreement is a fatal configuration error, not a recoverable one.
    pub fn expect_aligned<U: RasterElement>(
        &self,
        other: &Raster<U>,
        stage: &'static str,
        grid: &str,
    ) -> Result<()> {
        let shapes_match = self.shape() == other.shape();
        let transforms_match = self.transform == other.transform;
        let crs_match = match (&self.crs, &other.crs) {
            (Some(a), Some(b)) => a.is_equivalent(b),
            (None, None) => true,
            _ => false,
        };

        if shapes_match && transforms_match && crs_match {
            Ok(())
        } else {
            Err(Error::GridMismatch {
                stage,
                grid: grid.to_string(),
                expected: self.geometry_string(),
                actual: other.geometry_string(),
            })
        }
    }

    // Conversion

    /// Convert every cell to `U`, mapping nodata cells to `U`'s nodata.
    ///
    /// Integer targets are rounded, so grids that round-tripped through a
    /// float store band come back exact.
    pub fn cast<U: RasterElement>(&self) -> Raster<U> {
        let nodata_out = U::default_nodata();
        let data = self.data.mapv(|v| {
            if self.is_nodata(v) {
                nodata_out
            } else {
                v.to_f64()
                    .and_then(U::from_f64)
                    .unwrap_or(nodata_out)
            }
        });

        Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: Some(nodata_out),
        }
    }
}
