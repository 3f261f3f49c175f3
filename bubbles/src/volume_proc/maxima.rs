//! Local maxima of a scalar field restricted to a mask.

use ndarray::{Array3, ArrayView3};
use rayon::prelude::*;

use super::grid::{flatten, validate_field_and_mask, volume_from_vec};
use super::neighborhood::{Connectivity, Neighborhood};
use crate::error::Result;

/// Smallest field value over the masked voxels.
pub(crate) fn masked_floor(values: &[f64], mask: &[bool]) -> f64 {
    values
        .iter()
        .zip(mask)
        .filter(|(_, &inside)| inside)
        .map(|(&v, _)| v)
        .fold(f64::INFINITY, f64::min)
}

pub(crate) fn local_maxima_flat(
    values: &[f64],
    mask: &[bool],
    neighborhood: &Neighborhood,
) -> Vec<bool> {
    let floor = masked_floor(values, mask);
    (0..values.len())
        .into_par_iter()
        .map(|index| {
            if !mask[index] {
                return false;
            }
            let value = values[index];
            value > floor
                && neighborhood
                    .mirrored(index)
                    .filter(|&n| mask[n])
                    .all(|n| values[n] <= value)
        })
        .collect()
}

/// Mark every masked voxel that is not exceeded by any masked neighbour.
///
/// Ties with neighbours are allowed, so a plateau top is marked as a whole.
/// Voxels at the minimum value of the masked field are never maxima; in
/// particular a constant field has no maxima at all.
pub fn find_local_maxima(
    field: &ArrayView3<f64>,
    mask: &ArrayView3<bool>,
    connectivity: Connectivity,
) -> Result<Array3<bool>> {
    let (grid, _) = validate_field_and_mask(field, mask)?;
    let neighborhood = Neighborhood::new(grid, connectivity);
    let maxima = local_maxima_flat(&flatten(field), &flatten(mask), &neighborhood);
    volume_from_vec(grid, maxima)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentError;
    use ndarray::Array3;

    #[test]
    fn test_single_peak() {
        let mut field = Array3::from_elem((5, 5, 5), 1.0);
        field[[2, 2, 2]] = 10.0;
        let mask = Array3::from_elem((5, 5, 5), true);

        let maxima = find_local_maxima(&field.view(), &mask.view(), Connectivity::Edge).unwrap();
        assert_eq!(maxima.iter().filter(|&&m| m).count(), 1);
        assert!(maxima[[2, 2, 2]]);
    }

    #[test]
    fn test_plateau_is_kept_whole() {
        let mut field = Array3::from_elem((1, 5, 5), 0.0);
        field[[0, 2, 1]] = 3.0;
        field[[0, 2, 2]] = 3.0;
        let mask = Array3::from_elem((1, 5, 5), true);

        let maxima = find_local_maxima(&field.view(), &mask.view(), Connectivity::Face).unwrap();
        assert_eq!(maxima.iter().filter(|&&m| m).count(), 2);
        assert!(maxima[[0, 2, 1]] && maxima[[0, 2, 2]]);
    }

    #[test]
    fn test_flat_field_has_no_maxima() {
        let field = Array3::from_elem((3, 3, 3), 4.0);
        let mask = Array3::from_elem((3, 3, 3), true);
        let maxima = find_local_maxima(&field.view(), &mask.view(), Connectivity::Vertex).unwrap();
        assert!(maxima.iter().all(|&m| !m));
    }

    #[test]
    fn test_unmasked_neighbours_are_ignored() {
        // The tall voxel is outside the mask, so its masked neighbour wins.
        let mut field = Array3::from_elem((1, 1, 4), 0.0);
        field[[0, 0, 1]] = 2.0;
        field[[0, 0, 2]] = 9.0;
        let mut mask = Array3::from_elem((1, 1, 4), true);
        mask[[0, 0, 2]] = false;

        let maxima = find_local_maxima(&field.view(), &mask.view(), Connectivity::Face).unwrap();
        assert!(maxima[[0, 0, 1]]);
        assert!(!maxima[[0, 0, 2]]);
        assert!(maxima.iter().zip(mask.iter()).all(|(&m, &k)| !m || k));
    }

    #[test]
    fn test_invalid_inputs() {
        let field = Array3::from_elem((2, 2, 2), 1.0);
        let empty = Array3::from_elem((2, 2, 2), false);
        assert!(matches!(
            find_local_maxima(&field.view(), &empty.view(), Connectivity::Edge),
            Err(SegmentError::InvalidInput(_))
        ));

        let wrong = Array3::from_elem((2, 2, 3), true);
        assert!(matches!(
            find_local_maxima(&field.view(), &wrong.view(), Connectivity::Edge),
            Err(SegmentError::InvalidInput(_))
        ));
    }
}
