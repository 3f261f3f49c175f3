//! Neighbour topology for voxel grids.
//!
//! A [`Neighborhood`] is the offset table for one grid and one connectivity.
//! It is built once and then shared read-only by every worker, so the hot
//! loops never branch on the connectivity.
//!
//! Two lookup flavours exist:
//! - **mirrored**: an offset that leaves the grid is clamped back onto the
//!   edge, so a border voxel sees itself in the missing direction. This is
//!   the boundary rule of the maxima, flood and filter kernels.
//! - **bounded**: offsets leaving the grid are skipped. Used by labeling.

use serde::{Deserialize, Serialize};

use super::grid::Grid;
use crate::error::{Result, SegmentError};

/// Adjacency rule, named by the highest-order shared element.
///
/// The rank is the maximum number of non-zero offset components, matching
/// `generate_binary_structure(ndim, rank)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Shared faces: 6 neighbours in 3-D, 4 in 2-D.
    Face,
    /// Faces and edges: 18 neighbours in 3-D, 8 in 2-D.
    #[default]
    Edge,
    /// Faces, edges and corners: 26 neighbours in 3-D, 8 in 2-D.
    Vertex,
}

impl Connectivity {
    /// Parse the integer rank 1, 2 or 3.
    pub fn from_rank(rank: u8) -> Result<Self> {
        match rank {
            1 => Ok(Connectivity::Face),
            2 => Ok(Connectivity::Edge),
            3 => Ok(Connectivity::Vertex),
            other => Err(SegmentError::invalid(format!(
                "connectivity must be 1, 2 or 3, got {other}"
            ))),
        }
    }

    pub fn rank(self) -> usize {
        match self {
            Connectivity::Face => 1,
            Connectivity::Edge => 2,
            Connectivity::Vertex => 3,
        }
    }
}

#[inline]
fn mirror(c: usize, d: isize, n: usize) -> usize {
    match d {
        -1 => c.saturating_sub(1),
        1 => (c + 1).min(n - 1),
        _ => c,
    }
}

#[inline]
fn shift(c: usize, d: isize, n: usize) -> Option<usize> {
    let moved = c as isize + d;
    if moved < 0 || moved >= n as isize {
        None
    } else {
        Some(moved as usize)
    }
}

/// Offset table for a grid under a given connectivity.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    grid: Grid,
    offsets: Vec<[isize; 3]>,
}

impl Neighborhood {
    /// Build the table. Offsets are ordered lexicographically over
    /// `(dz, dy, dx)`; planar grids only get in-plane offsets.
    pub fn new(grid: Grid, connectivity: Connectivity) -> Self {
        let planar = grid.rank() == 2;
        let rank = connectivity.rank();
        let mut offsets = Vec::with_capacity(26);

        for dz in -1isize..=1 {
            if planar && dz != 0 {
                continue;
            }
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    let nonzero = [dz, dy, dx].iter().filter(|&&d| d != 0).count();
                    if nonzero == 0 || nonzero > rank {
                        continue;
                    }
                    offsets.push([dz, dy, dx]);
                }
            }
        }

        Self { grid, offsets }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Number of neighbours per voxel, counting mirrored duplicates.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[[isize; 3]] {
        &self.offsets
    }

    /// Neighbours of `index` under the mirror boundary condition.
    ///
    /// Always yields exactly [`Self::len`] indices; border voxels may
    /// receive themselves or a duplicate in-grid neighbour.
    #[inline]
    pub fn mirrored(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let [z, y, x] = self.grid.coord(index);
        let [nz, ny, nx] = self.grid.dims();
        self.offsets.iter().map(move |&[dz, dy, dx]| {
            self.grid
                .index([mirror(z, dz, nz), mirror(y, dy, ny), mirror(x, dx, nx)])
        })
    }

    /// Neighbours of `index` that lie inside the grid.
    #[inline]
    pub fn bounded(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bounded_from(index, &self.offsets)
    }

    /// In-grid neighbours that precede `index` in raster order.
    ///
    /// The offset set is symmetric and sorted, so the first half of the
    /// table holds exactly the offsets that point backwards.
    #[inline]
    pub fn preceding(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bounded_from(index, &self.offsets[..self.offsets.len() / 2])
    }

    fn bounded_from<'a>(
        &'a self,
        index: usize,
        offsets: &'a [[isize; 3]],
    ) -> impl Iterator<Item = usize> + 'a {
        let [z, y, x] = self.grid.coord(index);
        let [nz, ny, nx] = self.grid.dims();
        offsets.iter().filter_map(move |&[dz, dy, dx]| {
            Some(self.grid.index([
                shift(z, dz, nz)?,
                shift(y, dy, ny)?,
                shift(x, dx, nx)?,
            ]))
        })
    }
}
