//! River-line buffering
//!
//! Builds the near (search-distance) and far (floodplain-extent) buffer
//! regions around a river line network. Each segment contributes a
//! flat-capped rectangle and each interior vertex a small disk covering the
//! join; the pieces are dissolved into one region. Join geometry is
//! approximate: the contract is containment behavior, not the exact shape
//! at bends.

use geo::BooleanOps;
use geo_types::{LineString, MultiPolygon, Polygon};
use humedal_core::{Error, Result};
use std::f64::consts::PI;

/// Segments used to approximate the join disks
const JOIN_SEGMENTS: usize = 16;

/// The two buffer regions gating woody-floodplain detection
#[derive(Debug, Clone)]
pub struct RiverBuffers {
    /// Search-distance buffer: woody patches must intersect it
    pub near: MultiPolygon<f64>,
    /// Floodplain-extent buffer: surviving patches are clipped to it
    pub far: MultiPolygon<f64>,
}

/// Buffer every line of a network by `distance`
pub fn buffer_lines(lines: &[LineString<f64>], distance: f64) -> Result<MultiPolygon<f64>> {
    if distance <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "buffer_distance",
            value: distance.to_string(),
            reason: "buffer distance must be positive".to_string(),
        });
    }

    let mut pieces: Vec<Polygon<f64>> = Vec::new();

    for line in lines {
        for window in line.0.windows(2) {
            if let Some(rect) = segment_rectangle(window[0].x_y(), window[1].x_y(), distance) {
                pieces.push(rect);
            }
        }

        // Disks over interior vertices close the wedge gaps between
        // consecutive rectangles; endpoints stay flat-capped.
        for coord in line.0.iter().take(line.0.len().saturating_sub(1)).skip(1) {
            pieces.push(vertex_disk(coord.x, coord.y, distance));
        }
    }

    Ok(dissolve(pieces))
}

/// Build both river buffers in one call
pub fn river_buffers(
    lines: &[LineString<f64>],
    near_distance: f64,
    far_distance: f64,
) -> Result<RiverBuffers> {
    Ok(RiverBuffers {
        near: buffer_lines(lines, near_distance)?,
        far: buffer_lines(lines, far_distance)?,
    })
}

/// Flat-capped rectangle offset `distance` to both sides of a segment
fn segment_rectangle(a: (f64, f64), b: (f64, f64), distance: f64) -> Option<Polygon<f64>> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let length = (dx * dx + dy * dy).sqrt();
    if length < f64::EPSILON {
        return None;
    }

    // Unit normal
    let nx = -dy / length * distance;
    let ny = dx / length * distance;

    Some(Polygon::new(
        LineString::from(vec![
            (a.0 + nx, a.1 + ny),
            (b.0 + nx, b.1 + ny),
            (b.0 - nx, b.1 - ny),
            (a.0 - nx, a.1 - ny),
            (a.0 + nx, a.1 + ny),
        ]),
        vec![],
    ))
}

/// Disk approximated as a regular polygon
fn vertex_disk(cx: f64, cy: f64, radius: f64) -> Polygon<f64> {
    let mut coords = Vec::with_capacity(JOIN_SEGMENTS + 1);
    for i in 0..JOIN_SEGMENTS {
        let angle = 2.0 * PI * i as f64 / JOIN_SEGMENTS as f64;
        coords.push((cx + radius * angle.cos(), cy + radius * angle.sin()));
    }
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

/// Dissolve overlapping pieces into one region by balanced pairwise union
fn dissolve(pieces: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut parts: Vec<MultiPolygon<f64>> = pieces
        .into_iter()
        .map(|p| MultiPolygon::new(vec![p]))
        .collect();

    while parts.len() > 1 {
        parts = parts
            .chunks(2)
            .map(|pair| {
                if pair.len() == 2 {
                    pair[0].union(&pair[1])
                } else {
                    pair[0].clone()
                }
            })
            .collect();
    }

    parts
        .pop()
        .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Intersects};
    use geo_types::Point;

    fn horizontal_river() -> Vec<LineString<f64>> {
        vec![LineString::from(vec![(0.0, 0.0), (100.0, 0.0)])]
    }

    #[test]
    fn test_buffer_contains_line_vicinity() {
        let buffer = buffer_lines(&horizontal_river(), 10.0).unwrap();

        assert!(buffer.intersects(&Point::new(50.0, 5.0)));
        assert!(buffer.intersects(&Point::new(50.0, -9.0)));
        assert!(!buffer.intersects(&Point::new(50.0, 20.0)));
    }

    #[test]
    fn test_flat_caps() {
        let buffer = buffer_lines(&horizontal_river(), 10.0).unwrap();
        // Beyond the endpoint along the line axis: flat cap, not round
        assert!(!buffer.intersects(&Point::new(109.0, 0.0)));
        assert!(!buffer.intersects(&Point::new(-5.0, 0.0)));
    }

    #[test]
    fn test_bend_is_covered() {
        let bent = vec![LineString::from(vec![
            (0.0, 0.0),
            (50.0, 0.0),
            (50.0, 50.0),
        ])];
        let buffer = buffer_lines(&bent, 10.0).unwrap();

        // Outside corner of the bend, covered by the join disk
        assert!(buffer.intersects(&Point::new(56.0, -6.0)));
    }

    #[test]
    fn test_buffer_area_scale() {
        let buffer = buffer_lines(&horizontal_river(), 10.0).unwrap();
        let area = buffer.unsigned_area();
        // Rectangle 100 x 20
        assert!((area - 2000.0).abs() / 2000.0 < 0.05, "area {}", area);
    }

    #[test]
    fn test_near_far_nesting() {
        let buffers = river_buffers(&horizontal_river(), 10.0, 40.0).unwrap();

        let probe = Point::new(50.0, 25.0);
        assert!(!buffers.near.intersects(&probe));
        assert!(buffers.far.intersects(&probe));
    }

    #[test]
    fn test_nonpositive_distance_is_fatal() {
        assert!(buffer_lines(&horizontal_river(), 0.0).is_err());
        assert!(buffer_lines(&horizontal_river(), -5.0).is_err());
    }

    #[test]
    fn test_empty_network() {
        let buffer = buffer_lines(&[], 10.0).unwrap();
        assert!(buffer.0.is_empty());
    }
}
