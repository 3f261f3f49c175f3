//! Shape bookkeeping for dense volumes.

use ndarray::{Array3, ArrayView3};

use crate::error::{Result, SegmentError};

/// Dimensions of a row-major `[z, y, x]` volume.
///
/// A grid with a single z-plane is treated as a planar (rank 2) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    dims: [usize; 3],
}

impl Grid {
    pub fn new(dims: [usize; 3]) -> Self {
        Self { dims }
    }

    /// Grid matching the shape of an array view.
    pub fn of<T>(view: &ArrayView3<T>) -> Self {
        let (nz, ny, nx) = view.dim();
        Self::new([nz, ny, nx])
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.dims[0], self.dims[1], self.dims[2])
    }

    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of spatial dimensions the neighbourhood spans.
    pub fn rank(&self) -> usize {
        if self.dims[0] == 1 {
            2
        } else {
            3
        }
    }

    #[inline]
    pub fn coord(&self, index: usize) -> [usize; 3] {
        let plane = self.dims[1] * self.dims[2];
        let z = index / plane;
        let rem = index % plane;
        [z, rem / self.dims[2], rem % self.dims[2]]
    }

    #[inline]
    pub fn index(&self, coord: [usize; 3]) -> usize {
        (coord[0] * self.dims[1] + coord[1]) * self.dims[2] + coord[2]
    }
}

/// Copy a view into a row-major vector regardless of its memory layout.
pub(crate) fn flatten<T: Copy>(view: &ArrayView3<T>) -> Vec<T> {
    view.iter().copied().collect()
}

pub(crate) fn volume_from_vec<T>(grid: Grid, data: Vec<T>) -> Result<Array3<T>> {
    Ok(Array3::from_shape_vec(grid.shape(), data)?)
}

/// Check that a field and its mask agree in shape and that the mask is usable.
///
/// Returns the shared grid and the number of masked voxels.
pub(crate) fn validate_field_and_mask(
    field: &ArrayView3<f64>,
    mask: &ArrayView3<bool>,
) -> Result<(Grid, usize)> {
    let grid = Grid::of(field);
    let mask_grid = Grid::of(mask);
    if grid != mask_grid {
        return Err(SegmentError::invalid(format!(
            "field shape {:?} does not match mask shape {:?}",
            grid.dims(),
            mask_grid.dims()
        )));
    }
    let masked = validate_mask(mask)?;
    Ok((grid, masked))
}

/// Reject empty grids and masks with no voxel set.
pub(crate) fn validate_mask(mask: &ArrayView3<bool>) -> Result<usize> {
    if mask.is_empty() {
        return Err(SegmentError::invalid("volume has no voxels"));
    }
    let masked = mask.iter().filter(|&&m| m).count();
    if masked == 0 {
        return Err(SegmentError::invalid("mask is entirely false"));
    }
    Ok(masked)
}
