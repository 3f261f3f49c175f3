//! Binary and grey-level morphology on voxel grids.
//!
//! Structuring elements are the neighbourhood of a [`Connectivity`] plus the
//! centre voxel. Filters use the mirror boundary condition.

use ndarray::{Array3, ArrayView3};
use rayon::prelude::*;

use super::grid::{flatten, volume_from_vec, Grid};
use super::labeling::{label_flat, RegionArena};
use super::neighborhood::{Connectivity, Neighborhood};
use crate::error::Result;

pub(crate) fn dilate_flat(binary: &[bool], neighborhood: &Neighborhood) -> Vec<bool> {
    (0..binary.len())
        .into_par_iter()
        .map(|index| binary[index] || neighborhood.mirrored(index).any(|n| binary[n]))
        .collect()
}

pub(crate) fn maximum_filter_flat(values: &[f64], neighborhood: &Neighborhood) -> Vec<f64> {
    (0..values.len())
        .into_par_iter()
        .map(|index| {
            neighborhood
                .mirrored(index)
                .map(|n| values[n])
                .fold(values[index], f64::max)
        })
        .collect()
}

/// One step of binary dilation.
pub fn binary_dilation(
    binary: &ArrayView3<bool>,
    connectivity: Connectivity,
) -> Result<Array3<bool>> {
    let grid = Grid::of(binary);
    let neighborhood = Neighborhood::new(grid, connectivity);
    volume_from_vec(grid, dilate_flat(&flatten(binary), &neighborhood))
}

/// Grey-level maximum over the structuring element.
pub fn maximum_filter(field: &ArrayView3<f64>, connectivity: Connectivity) -> Result<Array3<f64>> {
    let grid = Grid::of(field);
    let neighborhood = Neighborhood::new(grid, connectivity);
    volume_from_vec(grid, maximum_filter_flat(&flatten(field), &neighborhood))
}

/// Clear connected components with fewer than `min_size` voxels.
pub fn remove_small_objects(
    mask: &ArrayView3<bool>,
    min_size: usize,
    connectivity: Connectivity,
) -> Result<Array3<bool>> {
    let grid = Grid::of(mask);
    let mut flat = flatten(mask);
    if min_size > 1 {
        let neighborhood = Neighborhood::new(grid, connectivity);
        let (labels, count) = label_flat(&flat, &neighborhood);
        let arena = RegionArena::from_labels(&labels, count);
        for (_, members) in arena.iter() {
            if members.len() < min_size {
                for &index in members {
                    flat[index] = false;
                }
            }
        }
    }
    volume_from_vec(grid, flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_dilation_of_single_voxel() {
        let mut volume = Array3::from_elem((5, 5, 5), false);
        volume[[2, 2, 2]] = true;

        let face = binary_dilation(&volume.view(), Connectivity::Face).unwrap();
        assert_eq!(face.iter().filter(|&&v| v).count(), 7);

        let edge = binary_dilation(&volume.view(), Connectivity::Edge).unwrap();
        assert_eq!(edge.iter().filter(|&&v| v).count(), 19);

        let vertex = binary_dilation(&volume.view(), Connectivity::Vertex).unwrap();
        assert_eq!(vertex.iter().filter(|&&v| v).count(), 27);
    }

    #[test]
    fn test_dilation_at_corner_stays_in_grid() {
        let mut volume = Array3::from_elem((3, 3, 3), false);
        volume[[0, 0, 0]] = true;
        let dilated = binary_dilation(&volume.view(), Connectivity::Vertex).unwrap();
        assert_eq!(dilated.iter().filter(|&&v| v).count(), 8);
    }

    #[test]
    fn test_maximum_filter() {
        let mut field = Array3::<f64>::zeros((1, 3, 4));
        field[[0, 1, 1]] = 5.0;
        let filtered = maximum_filter(&field.view(), Connectivity::Face).unwrap();
        assert_eq!(filtered[[0, 1, 1]], 5.0);
        assert_eq!(filtered[[0, 0, 1]], 5.0);
        assert_eq!(filtered[[0, 1, 2]], 5.0);
        assert_eq!(filtered[[0, 0, 0]], 0.0);
        assert_eq!(filtered[[0, 1, 3]], 0.0);

        let filtered = maximum_filter(&field.view(), Connectivity::Edge).unwrap();
        assert_eq!(filtered[[0, 0, 0]], 5.0);
    }

    #[test]
    fn test_remove_small_objects() {
        let mut mask = Array3::from_elem((1, 4, 6), false);
        // three-voxel bar survives
        mask[[0, 0, 0]] = true;
        mask[[0, 0, 1]] = true;
        mask[[0, 0, 2]] = true;
        // isolated pair is removed
        mask[[0, 3, 4]] = true;
        mask[[0, 3, 5]] = true;

        let cleaned = remove_small_objects(&mask.view(), 3, Connectivity::Face).unwrap();
        assert_eq!(cleaned.iter().filter(|&&v| v).count(), 3);
        assert!(cleaned[[0, 0, 1]]);
        assert!(!cleaned[[0, 3, 4]]);

        let untouched = remove_small_objects(&mask.view(), 1, Connectivity::Face).unwrap();
        assert_eq!(untouched, mask);
    }
}
