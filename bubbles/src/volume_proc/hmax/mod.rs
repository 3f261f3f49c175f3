//! H-maximum transform.
//!
//! Shallow maxima, those that sit less than `h` below a taller neighbouring
//! peak, are absorbed into that peak so the later watershed is not
//! over-seeded by noise. Three engines implement [`HTransform`]:
//!
//! - [`NeighborFlood`]: fixed-count, data-parallel flooding of maxima into
//!   their neighbours. Runs exactly the requested number of iterations.
//! - [`RegionMerge`]: grows marker regions one dilation step at a time and
//!   stops at the first iteration whose marker set does not change.
//! - [`FloodThenMerge`]: flood then merge, seeded with the maxima of the
//!   pass input, repeated until a pass leaves the field unchanged.
//!
//! The two base engines do not agree in general. The flood only stops when
//! its budget runs out and reports whether its last sweep was idle; the merge
//! stops at its own fixed point. Their outputs can differ on the same input
//! and neither is treated as the reference.

mod flood;
mod merge;

pub use flood::NeighborFlood;
pub use merge::RegionMerge;

use log::{debug, info, warn};
use ndarray::{Array3, ArrayView3};

use super::grid::{flatten, validate_field_and_mask, volume_from_vec, Grid};
use super::maxima::local_maxima_flat;
use super::neighborhood::{Connectivity, Neighborhood};
use crate::error::{Result, SegmentError};

/// Smoothed field and the maxima that survived the transform.
#[derive(Debug, Clone)]
pub struct HTransformOutput {
    pub field: Array3<f64>,
    pub maxima: Array3<bool>,
    /// Iterations actually performed.
    pub iterations: usize,
    /// For the flood: the final sweep changed no voxel.
    /// For the merge: the marker set reached a fixed point.
    pub converged: bool,
}

impl HTransformOutput {
    /// Escalate an unconverged result into [`SegmentError::UnconvergedIteration`].
    pub fn require_convergence(self) -> Result<Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(SegmentError::UnconvergedIteration {
                iterations: self.iterations,
            })
        }
    }
}

/// An H-maximum transform engine.
pub trait HTransform {
    /// Smooth `field` within `mask`. The inputs are never modified.
    fn transform(
        &self,
        field: &ArrayView3<f64>,
        mask: &ArrayView3<bool>,
    ) -> Result<HTransformOutput>;
}

/// Pass budget of [`FloodThenMerge::new`].
pub const DEFAULT_HYBRID_PASSES: usize = 10;

/// Neighbour flood followed by a region merge, repeated to a fixed point.
///
/// Each pass floods its input and then merges the flooded field from the
/// maxima of that input, not those left by the flood. Passes repeat until one
/// returns its input unchanged, so the result is its own transform.
#[derive(Debug, Clone)]
pub struct FloodThenMerge {
    pub flood: NeighborFlood,
    pub merge: RegionMerge,
    /// Upper bound on flood-merge passes; running out leaves `converged == false`.
    pub max_passes: usize,
}

impl FloodThenMerge {
    pub fn new(
        h: f64,
        flood_iterations: usize,
        merge_iterations: usize,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            flood: NeighborFlood::new(h, flood_iterations, connectivity),
            merge: RegionMerge::new(h, merge_iterations, connectivity),
            max_passes: DEFAULT_HYBRID_PASSES,
        }
    }

    fn pass(
        &self,
        field: &ArrayView3<f64>,
        mask: &ArrayView3<bool>,
        grid: Grid,
        neighborhood: &Neighborhood,
    ) -> Result<HTransformOutput> {
        let markers = local_maxima_flat(&flatten(field), &flatten(mask), neighborhood);
        let markers = volume_from_vec(grid, markers)?;

        let flooded = self.flood.transform(field, mask)?;
        debug!(
            "neighbour flood finished after {} iterations (idle last sweep: {})",
            flooded.iterations, flooded.converged
        );

        let merged = self
            .merge
            .transform_from_markers(&flooded.field.view(), mask, &markers.view())?;
        Ok(HTransformOutput {
            iterations: flooded.iterations + merged.iterations,
            ..merged
        })
    }
}

impl HTransform for FloodThenMerge {
    fn transform(
        &self,
        field: &ArrayView3<f64>,
        mask: &ArrayView3<bool>,
    ) -> Result<HTransformOutput> {
        validate_budget(self.max_passes, "hybrid pass")?;
        let (grid, _) = validate_field_and_mask(field, mask)?;
        let neighborhood = Neighborhood::new(grid, self.merge.connectivity);

        let mut output = self.pass(field, mask, grid, &neighborhood)?;
        let mut iterations = output.iterations;
        let mut fixed_point = output.field == *field;
        let mut passes = 1;

        while !fixed_point && passes < self.max_passes {
            let next = self.pass(&output.field.view(), mask, grid, &neighborhood)?;
            iterations += next.iterations;
            fixed_point = next.field == output.field;
            output = next;
            passes += 1;
        }

        if fixed_point {
            info!("Flood-merge reached a fixed point after {passes} passes");
        } else {
            warn!(
                "flood-merge did not reach a fixed point within {} passes",
                self.max_passes
            );
        }

        Ok(HTransformOutput {
            iterations,
            converged: fixed_point && output.converged,
            ..output
        })
    }
}

pub(crate) fn validate_height(h: f64) -> Result<()> {
    if !h.is_finite() || h < 0.0 {
        return Err(SegmentError::invalid(format!(
            "h must be finite and non-negative, got {h}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_budget(iterations: usize, what: &str) -> Result<()> {
    if iterations == 0 {
        return Err(SegmentError::invalid(format!(
            "{what} iteration budget must be at least 1"
        )));
    }
    Ok(())
}

/// Shared prologue of the engines: validated grid, neighbourhood and flat copies.
pub(crate) struct Prepared {
    pub grid: Grid,
    pub neighborhood: Neighborhood,
    pub values: Vec<f64>,
    pub mask: Vec<bool>,
}

pub(crate) fn prepare(
    field: &ArrayView3<f64>,
    mask: &ArrayView3<bool>,
    connectivity: Connectivity,
    h: f64,
) -> Result<Prepared> {
    validate_height(h)?;
    let (grid, _) = validate_field_and_mask(field, mask)?;
    Ok(Prepared {
        grid,
        neighborhood: Neighborhood::new(grid, connectivity),
        values: flatten(field),
        mask: flatten(mask),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_require_convergence() {
        let output = HTransformOutput {
            field: Array3::zeros((1, 1, 1)),
            maxima: Array3::from_elem((1, 1, 1), false),
            iterations: 4,
            converged: false,
        };
        assert!(matches!(
            output.clone().require_convergence(),
            Err(SegmentError::UnconvergedIteration { iterations: 4 })
        ));

        let converged = HTransformOutput {
            converged: true,
            ..output
        };
        assert!(converged.require_convergence().is_ok());
    }

    #[test]
    fn test_height_validation() {
        assert!(validate_height(0.0).is_ok());
        assert!(validate_height(-0.1).is_err());
        assert!(validate_height(f64::NAN).is_err());
        assert!(validate_height(f64::INFINITY).is_err());
    }

    #[test]
    fn test_hybrid_on_single_peak() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut field = Array3::from_elem((5, 5, 5), 1.0);
        field[[2, 2, 2]] = 10.0;
        let mask = Array3::from_elem((5, 5, 5), true);

        let engine = FloodThenMerge::new(0.7, 50, 50, Connectivity::Edge);
        let output = engine.transform(&field.view(), &mask.view()).unwrap();
        assert_eq!(output.field, field);
        assert!(output.converged);
        assert_eq!(output.maxima.iter().filter(|&&m| m).count(), 1);
        assert!(output.maxima[[2, 2, 2]]);
        assert_eq!(output.iterations, 50);
    }

    #[test]
    fn test_hybrid_repeats_passes_until_fixed_point() {
        let field = Array3::from_shape_vec((1, 1, 5), vec![2.4, 2.5, 2.6, 2.7, 3.0]).unwrap();
        let mask = Array3::from_elem(field.dim(), true);
        let engine = FloodThenMerge::new(0.7, 2, 50, Connectivity::Face);

        let output = engine.transform(&field.view(), &mask.view()).unwrap();
        assert!(output.converged);
        assert!(output.field.iter().all(|&v| v == 3.0));

        let again = engine
            .transform(&output.field.view(), &mask.view())
            .unwrap();
        assert_eq!(again.field, output.field);
        assert_eq!(again.iterations, 2);
    }

    #[test]
    fn test_hybrid_pass_budget() {
        let field = Array3::from_shape_vec((1, 1, 5), vec![2.4, 2.5, 2.6, 2.7, 3.0]).unwrap();
        let mask = Array3::from_elem(field.dim(), true);
        let mut engine = FloodThenMerge::new(0.7, 1, 1, Connectivity::Face);

        engine.max_passes = 0;
        assert!(matches!(
            engine.transform(&field.view(), &mask.view()),
            Err(SegmentError::InvalidInput(_))
        ));

        engine.max_passes = 1;
        let output = engine.transform(&field.view(), &mask.view()).unwrap();
        assert!(!output.converged);
    }
}
