//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate directly; grids persist as a single 32-bit float
//! band with pixel-scale, tiepoint and geokey tags. The EPSG code travels in
//! ProjectedCSTypeGeoKey so a stored grid round-trips its CRS.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read a grid from a GeoTIFF file
pub fn read_grid<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_grid(file)
}

/// Decode a grid from any `Read + Seek` source
pub fn decode_grid<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("cannot read TIFF dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("cannot read TIFF image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I8(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::Other(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// Read the affine transform from pixel-scale + tiepoint tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Other("no pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Other("no tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];

        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("cannot determine geotransform".into()))
}

/// Read the CRS from the geokey directory, if present
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()?;

    // Entries of 4 shorts after the 4-short header: key id, location, count, value
    for entry in keys.chunks(4).skip(1) {
        if entry.len() == 4 && entry[0] == PROJECTED_CS_TYPE_KEY && entry[1] == 0 {
            return Some(CRS::from_epsg(entry[3] as u32));
        }
    }
    None
}

/// Write a grid to a GeoTIFF file (single f32 band)
pub fn write_grid<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_grid(raster, file)
}

/// Encode a grid as GeoTIFF into any `Write + Seek` sink
pub fn encode_grid<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    // Nodata cells become NaN in the f32 band; everything the pipeline stores
    // round-trips exactly through f32 at its value ranges.
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())
        .map_err(|e| Error::Other(format!("cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("cannot write tiepoint tag: {}", e)))?;

    // GeoKeyDirectory: GTModelTypeGeoKey=1 (Projected), GTRasterTypeGeoKey=1
    // (RasterPixelIsArea), plus the EPSG code when known.
    let mut geokeys: Vec<u16> = vec![
        1, 1, 0, 2, // version 1.1.0, key count patched below
        1024, 0, 1, 1,
        1025, 0, 1, 1,
    ];
    if let Some(epsg) = raster.crs().and_then(|c| c.epsg()) {
        if epsg <= u16::MAX as u32 {
            geokeys.extend_from_slice(&[PROJECTED_CS_TYPE_KEY, 0, 1, epsg as u16]);
            geokeys[3] = 3;
        }
    }
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("cannot write geokey tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_grid() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![0.0, 1.0, 2.0, f64::NAN], 2, 2).unwrap();
        r.set_transform(GeoTransform::new(500000.0, 6000000.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32720)));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let grid = sample_grid();

        let mut buf = Vec::new();
        encode_grid(&grid, Cursor::new(&mut buf)).unwrap();
        let back: Raster<f64> = decode_grid(Cursor::new(&buf)).unwrap();

        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.get(0, 0).unwrap(), 0.0);
        assert_eq!(back.get(1, 0).unwrap(), 2.0);
        assert!(back.get(1, 1).unwrap().is_nan());
        assert_eq!(back.transform().origin_x, 500000.0);
        assert_eq!(back.transform().pixel_width, 30.0);
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32720));
    }

    #[test]
    fn test_integer_values_roundtrip_exactly() {
        let mut grid: Raster<f64> = Raster::from_vec(vec![100.0, 101.0, 200.0, 201.0], 2, 2).unwrap();
        grid.set_crs(Some(CRS::from_epsg(32720)));

        let mut buf = Vec::new();
        encode_grid(&grid, Cursor::new(&mut buf)).unwrap();
        let back: Raster<f64> = decode_grid(Cursor::new(&buf)).unwrap();

        assert_eq!(back.cast::<i32>().get(1, 0).unwrap(), 200);
    }
}
