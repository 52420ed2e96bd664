//! Raster to/from vector conversion
//!
//! `polygonize` traces the pixel-edge boundary of every connected component
//! into a polygon (exterior ring plus hole rings), carrying the source
//! raster value as the DN attribute. `rasterize_polygons` burns polygons
//! back onto a reference grid by pixel-center test; polygonizing a mask and
//! rasterizing the result against the same geometry reproduces the exact
//! foreground set. `rasterize_lines` marks every cell a line network
//! touches, used for the river mask.

use std::collections::HashMap;

use geo::{BoundingRect, Contains};
use geo_types::{Coord, LineString, Point, Polygon};
use humedal_core::raster::{Raster, RasterElement};
use humedal_core::vector::{Feature, FeatureCollection};
use humedal_core::Result;

use crate::components::{label_components, Connectivity};

/// A directed edge between pixel-corner lattice points, oriented so the
/// component interior is on its left in (col, row) axes.
#[derive(Debug, Clone, Copy)]
struct BoundaryEdge {
    from: (i64, i64),
    to: (i64, i64),
}

impl BoundaryEdge {
    fn direction(&self) -> (i64, i64) {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Convert a binary mask into polygons, one feature per 4-connected
/// component of cells equal to `target`, with DN = `target`.
pub fn polygonize(mask: &Raster<u8>, target: u8) -> Result<FeatureCollection> {
    let (labels, counts) = label_components(mask, target, Connectivity::Four);
    let component_count = counts.len() - 1;

    let mut collection = FeatureCollection::with_crs(mask.crs().cloned());
    if component_count == 0 {
        return Ok(collection);
    }

    // Gather directed boundary edges per component.
    let (rows, cols) = mask.shape();
    let mut edges: Vec<Vec<BoundaryEdge>> = vec![Vec::new(); component_count];

    let label_at = |row: isize, col: isize| -> i32 {
        if row < 0 || col < 0 || row >= rows as isize || col >= cols as isize {
            0
        } else {
            unsafe { labels.get_unchecked(row as usize, col as usize) }
        }
    };

    for row in 0..rows {
        for col in 0..cols {
            let label = unsafe { labels.get_unchecked(row, col) };
            if label == 0 {
                continue;
            }

            let r = row as isize;
            let c = col as isize;
            let (x, y) = (col as i64, row as i64);
            let bucket = &mut edges[label as usize - 1];

            // One edge per side whose neighbor is outside the component,
            // directed to keep the interior on the left.
            if label_at(r - 1, c) != label {
                bucket.push(BoundaryEdge { from: (x, y), to: (x + 1, y) });
            }
            if label_at(r + 1, c) != label {
                bucket.push(BoundaryEdge { from: (x + 1, y + 1), to: (x, y + 1) });
            }
            if label_at(r, c - 1) != label {
                bucket.push(BoundaryEdge { from: (x, y + 1), to: (x, y) });
            }
            if label_at(r, c + 1) != label {
                bucket.push(BoundaryEdge { from: (x + 1, y), to: (x + 1, y + 1) });
            }
        }
    }

    for component_edges in edges {
        let rings = assemble_rings(&component_edges);
        if let Some(polygon) = rings_to_polygon(rings, mask) {
            collection.push(Feature::new(polygon, target as i32));
        }
    }

    Ok(collection)
}

/// Chain directed edges into closed rings.
///
/// At a saddle corner (two rings touching at one lattice point) the walk
/// takes the rightmost turn, which keeps each ring hugging its own adjacent
/// background region.
fn assemble_rings(edges: &[BoundaryEdge]) -> Vec<Vec<(i64, i64)>> {
    let mut outgoing: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }

        let origin = edges[start].from;
        let mut ring = vec![origin];
        let mut current = start;
        used[start] = true;

        loop {
            let point = edges[current].to;
            if point == origin {
                break;
            }
            push_collinear(&mut ring, point);

            let incoming = edges[current].direction();
            let candidates = outgoing.get(&point).map(Vec::as_slice).unwrap_or(&[]);

            let next = candidates
                .iter()
                .copied()
                .filter(|&i| !used[i])
                .min_by_key(|&i| turn_rank(incoming, edges[i].direction()));

            match next {
                Some(i) => {
                    used[i] = true;
                    current = i;
                }
                // Open chain: malformed input, drop the partial ring
                None => return rings,
            }
        }

        ring.push(origin);
        rings.push(ring);
    }

    rings
}

/// Rank a turn for the rightmost-first walk: right < straight < left
fn turn_rank(incoming: (i64, i64), candidate: (i64, i64)) -> i64 {
    let cross = incoming.0 * candidate.1 - incoming.1 * candidate.0;
    match cross.signum() {
        -1 => 0,
        0 => 1,
        _ => 2,
    }
}

/// Append a point, merging collinear runs so rings keep one vertex per corner
fn push_collinear(ring: &mut Vec<(i64, i64)>, point: (i64, i64)) {
    if ring.len() >= 2 {
        let a = ring[ring.len() - 2];
        let b = ring[ring.len() - 1];
        let collinear = (b.0 - a.0) * (point.1 - b.1) == (b.1 - a.1) * (point.0 - b.0);
        if collinear {
            if let Some(last) = ring.last_mut() {
                *last = point;
            }
            return;
        }
    }
    ring.push(point);
}

/// Twice the signed shoelace area in (col, row) axes; positive = exterior
fn ring_area2(ring: &[(i64, i64)]) -> i64 {
    let mut acc = 0i64;
    for window in ring.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        acc += x0 * y1 - x1 * y0;
    }
    acc
}

fn rings_to_polygon(rings: Vec<Vec<(i64, i64)>>, mask: &Raster<u8>) -> Option<Polygon<f64>> {
    let transform = mask.transform();
    let to_geo = |ring: Vec<(i64, i64)>| -> LineString<f64> {
        ring.into_iter()
            .map(|(x, y)| {
                let (gx, gy) = transform.pixel_to_geo_corner(x as usize, y as usize);
                Coord { x: gx, y: gy }
            })
            .collect()
    };

    let mut exterior = None;
    let mut holes = Vec::new();

    for ring in rings {
        if ring_area2(&ring) > 0 {
            exterior = Some(to_geo(ring));
        } else {
            holes.push(to_geo(ring));
        }
    }

    exterior.map(|ext| Polygon::new(ext, holes))
}

/// Burn polygon features onto a grid matching `template`'s geometry.
///
/// A cell is set to 1 when its center lies inside a feature (holes
/// excluded).
pub fn rasterize_polygons<T: RasterElement>(
    features: &FeatureCollection,
    template: &Raster<T>,
) -> Raster<u8> {
    let (rows, cols) = template.shape();
    let transform = *template.transform();
    let mut output = template.with_same_meta::<u8>();

    for feature in features.iter() {
        let Some(rect) = feature.geometry.bounding_rect() else {
            continue;
        };

        // Geographic bounds to covered pixel range (y axis flips under a
        // north-up transform, so take min/max over both corners).
        let (c0, r0) = transform.geo_to_pixel(rect.min().x, rect.min().y);
        let (c1, r1) = transform.geo_to_pixel(rect.max().x, rect.max().y);

        let row_lo = r0.min(r1).floor().max(0.0) as usize;
        let row_hi = (r0.max(r1).ceil() as usize).min(rows);
        let col_lo = c0.min(c1).floor().max(0.0) as usize;
        let col_hi = (c0.max(c1).ceil() as usize).min(cols);

        for row in row_lo..row_hi {
            for col in col_lo..col_hi {
                let (x, y) = transform.pixel_to_geo(col, row);
                if feature.geometry.contains(&Point::new(x, y)) {
                    unsafe { output.set_unchecked(row, col, 1) };
                }
            }
        }
    }

    output
}

/// Mark every cell a line network passes through.
///
/// Segments are walked at half-cell steps; deterministic and independent of
/// feature order.
pub fn rasterize_lines<T: RasterElement>(
    lines: &[LineString<f64>],
    template: &Raster<T>,
) -> Raster<u8> {
    let (rows, cols) = template.shape();
    let transform = *template.transform();
    let step = transform.cell_size() / 2.0;
    let mut output = template.with_same_meta::<u8>();

    let mut mark = |x: f64, y: f64| {
        let (col, row) = transform.geo_to_pixel(x, y);
        if col >= 0.0 && row >= 0.0 {
            let (col, row) = (col.floor() as usize, row.floor() as usize);
            if row < rows && col < cols {
                unsafe { output.set_unchecked(row, col, 1) };
            }
        }
    };

    for line in lines {
        for window in line.0.windows(2) {
            let (a, b) = (window[0], window[1]);
            let length = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
            let steps = (length / step).ceil().max(1.0) as usize;

            for i in 0..=steps {
                let t = i as f64 / steps as f64;
                mark(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use humedal_core::GeoTransform;

    fn mask(values: Vec<u8>, rows: usize, cols: usize) -> Raster<u8> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    fn roundtrip(values: Vec<u8>, rows: usize, cols: usize) {
        let m = mask(values, rows, cols);
        let polygons = polygonize(&m, 1).unwrap();
        let burned = rasterize_polygons(&polygons, &m);

        for row in 0..rows {
            for col in 0..cols {
                assert_eq!(
                    burned.get(row, col).unwrap(),
                    m.get(row, col).unwrap(),
                    "round-trip mismatch at ({}, {})",
                    row,
                    col
                );
            }
        }
    }

    #[test]
    fn test_roundtrip_single_pixel() {
        let mut values = vec![0u8; 25];
        values[12] = 1;
        roundtrip(values, 5, 5);
    }

    #[test]
    fn test_roundtrip_block_and_isolated() {
        let values = vec![
            1, 1, 0, 0, 0,
            1, 1, 0, 0, 0,
            0, 0, 0, 1, 0,
            0, 0, 0, 0, 0,
            1, 0, 0, 0, 1,
        ];
        roundtrip(values, 5, 5);
    }

    #[test]
    fn test_roundtrip_with_hole() {
        let values = vec![
            1, 1, 1, 0,
            1, 0, 1, 0,
            1, 1, 1, 0,
            0, 0, 0, 0,
        ];
        roundtrip(values, 4, 4);
    }

    #[test]
    fn test_roundtrip_u_shape() {
        let values = vec![
            1, 0, 1,
            1, 0, 1,
            1, 1, 1,
        ];
        roundtrip(values, 3, 3);
    }

    #[test]
    fn test_feature_count_and_dn() {
        let values = vec![
            1, 1, 0,
            0, 0, 0,
            0, 0, 1,
        ];
        let m = mask(values, 3, 3);
        let fc = polygonize(&m, 1).unwrap();

        assert_eq!(fc.len(), 2);
        assert!(fc.iter().all(|f| f.dn == 1));
    }

    #[test]
    fn test_hole_becomes_interior_ring() {
        let values = vec![
            1, 1, 1,
            1, 0, 1,
            1, 1, 1,
        ];
        let m = mask(values, 3, 3);
        let fc = polygonize(&m, 1).unwrap();

        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0].geometry.interiors().len(), 1);
    }

    #[test]
    fn test_empty_mask_yields_no_features() {
        let m = mask(vec![0; 9], 3, 3);
        let fc = polygonize(&m, 1).unwrap();
        assert!(fc.is_empty());
    }

    #[test]
    fn test_polygon_coordinates_are_georeferenced() {
        // Single pixel at (row 1, col 2) with a 10 m transform
        let mut values = vec![0u8; 16];
        values[6] = 1;
        let mut m = Raster::from_vec(values, 4, 4).unwrap();
        m.set_transform(GeoTransform::new(1000.0, 2000.0, 10.0, -10.0));

        let fc = polygonize(&m, 1).unwrap();
        assert_eq!(fc.len(), 1);

        let ring = fc.features[0].geometry.exterior();
        // Pixel corners: x in [1020, 1030], y in [1980, 1990]
        for coord in ring.0.iter() {
            assert!(coord.x == 1020.0 || coord.x == 1030.0);
            assert!(coord.y == 1980.0 || coord.y == 1990.0);
        }
    }

    #[test]
    fn test_rasterize_lines_marks_path() {
        let template: Raster<u8> = mask(vec![0; 25], 5, 5);
        // Horizontal line through the middle row (y = 2.5 in geo = row 2)
        let line = LineString::from(vec![(0.5, 2.5), (4.5, 2.5)]);

        let burned = rasterize_lines(&[line], &template);
        for col in 0..5 {
            assert_eq!(burned.get(2, col).unwrap(), 1, "col {}", col);
        }
        assert_eq!(burned.get(0, 0).unwrap(), 0);
    }
}
