//! Discrete circular convolution kernels
//!
//! A kernel of integer radius r is a (2r+1)×(2r+1) binary stencil: a cell is
//! active if its euclidean distance from the center is <= r + 0.4. The extra
//! margin keeps rasterized circles closed along diagonals; the cardinal axis
//! cells at exactly distance r and the center are forced on explicitly.

/// A circular binary stencil used by the smoothing convolutions
#[derive(Debug, Clone)]
pub struct CircularKernel {
    radius: usize,
    offsets: Vec<(isize, isize)>,
}

impl CircularKernel {
    /// Kernel radius in cells
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Number of active cells in the stencil
    pub fn active_cells(&self) -> usize {
        self.offsets.len()
    }

    /// (dr, dc) offsets of all active cells relative to the center
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }
}

/// Build the circular kernel of the given radius
pub fn circular_kernel(radius: usize) -> CircularKernel {
    let r = radius as isize;
    let size = 2 * radius + 1;
    let mut stencil = vec![false; size * size];
    let limit = radius as f64 + 0.4;

    let index = |dr: isize, dc: isize| ((dr + r) as usize) * size + (dc + r) as usize;

    for dr in -r..=r {
        for dc in -r..=r {
            let dist = ((dr * dr + dc * dc) as f64).sqrt();
            if dist <= limit {
                stencil[index(dr, dc)] = true;
            }
        }
    }

    // Cross-shaped axis completion: center and cardinal endpoints are part of
    // the stencil by contract, independent of the distance predicate.
    stencil[index(0, 0)] = true;
    stencil[index(-r, 0)] = true;
    stencil[index(r, 0)] = true;
    stencil[index(0, -r)] = true;
    stencil[index(0, r)] = true;

    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if stencil[index(dr, dc)] {
                offsets.push((dr, dc));
            }
        }
    }

    CircularKernel { radius, offsets }
}
