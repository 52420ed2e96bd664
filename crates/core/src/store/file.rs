//! Directory-backed store with atomic writes

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::{read_grid, write_grid};
use crate::raster::Raster;
use crate::store::Store;
use crate::vector::FeatureCollection;

/// Store backend mapping keys to files under a root directory.
///
/// Grid keys become `<root>/<key>.tif` (single-band GeoTIFF), vector keys
/// `<root>/<key>.json`. Parent directories are created on demand, matching
/// the pipeline's sibling-directory output convention. All writes go to a
/// `.tmp` sibling first and are renamed into place, so an interrupted run
/// never leaves a partially written artifact under a discoverable name.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn grid_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.tif", key))
    }

    fn vector_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    fn prepare_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

impl Store for FileStore {
    fn has_grid(&self, key: &str) -> bool {
        self.grid_path(key).is_file()
    }

    fn load_grid(&self, key: &str) -> Result<Raster<f64>> {
        let mut grid: Raster<f64> = read_grid(self.grid_path(key))?;
        grid.set_nodata(Some(f64::NAN));
        Ok(grid)
    }

    fn store_grid(&self, key: &str, grid: &Raster<f64>) -> Result<()> {
        let path = self.grid_path(key);
        Self::prepare_parent(&path)?;

        let tmp = Self::tmp_path(&path);
        write_grid(grid, &tmp)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn has_vectors(&self, key: &str) -> bool {
        self.vector_path(key).is_file()
    }

    fn load_vectors(&self, key: &str) -> Result<FeatureCollection> {
        let bytes = fs::read(self.vector_path(key))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn store_vectors(&self, key: &str, features: &FeatureCollection) -> Result<()> {
        let path = self.vector_path(key);
        Self::prepare_parent(&path)?;

        let tmp = Self::tmp_path(&path);
        fs::write(&tmp, serde_json::to_vec(features)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::raster::GeoTransform;
    use crate::vector::Feature;
    use geo_types::{LineString, Polygon};

    fn sample_grid() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![0.0, 1.0, 1.0, f64::NAN], 2, 2).unwrap();
        r.set_transform(GeoTransform::new(100.0, 200.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32720)));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_grid_roundtrip_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let grid = sample_grid();

        store.store_grid("run_binary/mask-2019", &grid).unwrap();
        assert!(store.has_grid("run_binary/mask-2019"));

        let back = store.load_grid("run_binary/mask-2019").unwrap();
        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.get(0, 1).unwrap(), 1.0);
        assert!(back.get(1, 1).unwrap().is_nan());
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32720));
    }

    #[test]
    fn test_no_tmp_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.store_grid("out/final", &sample_grid()).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["final.tif"]);
    }

    #[test]
    fn test_vector_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let square = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            vec![],
        );
        let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(4326)));
        fc.push(Feature::new(square, 4));

        store.store_vectors("out/rivers", &fc).unwrap();
        assert!(store.has_vectors("out/rivers"));

        let back = store.load_vectors("out/rivers").unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.features[0].dn, 4);
    }

    #[test]
    fn test_missing_grid_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(!store.has_grid("absent"));
        assert!(store.load_grid("absent").is_err());
    }
}
