//! Region-merge H-transform.
//!
//! Marker regions grow one dilation step per iteration. A dilated voxel is
//! admitted when the local maximum around it exceeds its own smoothed value
//! by at most `h`. Admitted regions are relabeled and flattened to the peak
//! of the input field inside each region. Growth stops at the first
//! iteration whose marker set equals the previous one.

use log::{debug, warn};
use ndarray::ArrayView3;

use super::{prepare, validate_budget, HTransform, HTransformOutput, Prepared};
use crate::error::{Result, SegmentError};
use crate::volume_proc::grid::{flatten, volume_from_vec, Grid};
use crate::volume_proc::labeling::{label_flat, RegionArena};
use crate::volume_proc::maxima::local_maxima_flat;
use crate::volume_proc::morphology::{dilate_flat, maximum_filter_flat};
use crate::volume_proc::neighborhood::Connectivity;

/// Region-merge H-transform with a fixed-point stopping rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMerge {
    pub h: f64,
    /// Upper bound on iterations; running out leaves `converged == false`.
    pub max_iterations: usize,
    pub connectivity: Connectivity,
}

impl RegionMerge {
    pub fn new(h: f64, max_iterations: usize, connectivity: Connectivity) -> Self {
        Self {
            h,
            max_iterations,
            connectivity,
        }
    }

    /// Run the merge from caller-supplied markers.
    ///
    /// Markers outside the mask are dropped before the first iteration.
    pub fn transform_from_markers(
        &self,
        field: &ArrayView3<f64>,
        mask: &ArrayView3<bool>,
        markers: &ArrayView3<bool>,
    ) -> Result<HTransformOutput> {
        validate_budget(self.max_iterations, "region merge")?;
        let prepared = prepare(field, mask, self.connectivity, self.h)?;
        if Grid::of(markers) != prepared.grid {
            return Err(SegmentError::invalid(format!(
                "marker shape {:?} does not match field shape {:?}",
                markers.shape(),
                prepared.grid.dims()
            )));
        }
        let markers = flatten(markers)
            .into_iter()
            .zip(&prepared.mask)
            .map(|(marker, &inside)| marker && inside)
            .collect();
        self.run(prepared, markers)
    }

    fn run(&self, prepared: Prepared, mut markers: Vec<bool>) -> Result<HTransformOutput> {
        let Prepared {
            grid,
            neighborhood,
            values,
            mask,
        } = prepared;

        let mut working = values.clone();
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            let grown = dilate_flat(&markers, &neighborhood);
            let peaks = maximum_filter_flat(&working, &neighborhood);
            let candidates: Vec<bool> = (0..grid.len())
                .map(|i| mask[i] && grown[i] && peaks[i] - working[i] <= self.h)
                .collect();

            if candidates == markers {
                converged = true;
                break;
            }

            let (labels, count) = label_flat(&candidates, &neighborhood);
            RegionArena::from_labels(&labels, count).scatter_max(&values, &mut working);
            debug!("region merge iteration {iterations}: {count} regions");

            markers = candidates;
            iterations += 1;
        }

        if converged {
            debug!("region merge reached a fixed point after {iterations} iterations");
        } else {
            warn!(
                "region merge did not reach a fixed point within {} iterations",
                self.max_iterations
            );
        }

        Ok(HTransformOutput {
            field: volume_from_vec(grid, working)?,
            maxima: volume_from_vec(grid, markers)?,
            iterations,
            converged,
        })
    }
}

impl HTransform for RegionMerge {
    /// Seeds the merge with the local maxima of `field`.
    fn transform(
        &self,
        field: &ArrayView3<f64>,
        mask: &ArrayView3<bool>,
    ) -> Result<HTransformOutput> {
        validate_budget(self.max_iterations, "region merge")?;
        let prepared = prepare(field, mask, self.connectivity, self.h)?;
        let markers = local_maxima_flat(&prepared.values, &prepared.mask, &prepared.neighborhood);
        self.run(prepared, markers)
    }
}
