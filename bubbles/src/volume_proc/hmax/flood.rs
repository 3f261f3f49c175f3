//! Fixed-count neighbour flood.
//!
//! Every iteration has two data-parallel phases separated by a full barrier:
//!
//! 1. **Maxima**: a masked voxel is a maximum when no neighbour exceeds it and
//!    it is not equal to all of its neighbours. All neighbours count here,
//!    masked or not, under the mirror boundary.
//! 2. **Propagation**: a masked voxel takes the largest value among neighbours
//!    that are maxima, exceed it, and lie less than `h` above it.
//!
//! Phase 2 reads one buffer and writes the other; the buffers then swap roles.
//! A last maxima phase after the loop yields the returned maxima.

use log::debug;
use ndarray::ArrayView3;
use rayon::prelude::*;

use super::{prepare, validate_budget, HTransform, HTransformOutput, Prepared};
use crate::error::Result;
use crate::volume_proc::grid::volume_from_vec;
use crate::volume_proc::neighborhood::{Connectivity, Neighborhood};

/// Neighbour flood H-transform.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborFlood {
    pub h: f64,
    /// Exact number of iterations; there is no early exit.
    pub iterations: usize,
    pub connectivity: Connectivity,
}

impl NeighborFlood {
    pub fn new(h: f64, iterations: usize, connectivity: Connectivity) -> Self {
        Self {
            h,
            iterations,
            connectivity,
        }
    }
}

fn flood_maxima(values: &[f64], mask: &[bool], neighborhood: &Neighborhood, maxima: &mut [bool]) {
    maxima.par_iter_mut().enumerate().for_each(|(index, is_max)| {
        *is_max = mask[index] && {
            let value = values[index];
            let mut equal = 0usize;
            let mut dominated = false;
            for n in neighborhood.mirrored(index) {
                let other = values[n];
                if value < other {
                    dominated = true;
                    break;
                }
                if value == other {
                    equal += 1;
                }
            }
            !dominated && equal < neighborhood.len()
        };
    });
}

/// Returns the number of voxels whose value changed.
fn propagate(
    current: &[f64],
    maxima: &[bool],
    mask: &[bool],
    neighborhood: &Neighborhood,
    h: f64,
    next: &mut [f64],
) -> usize {
    next.par_iter_mut()
        .enumerate()
        .map(|(index, slot)| {
            let value = current[index];
            if !mask[index] {
                *slot = value;
                return 0;
            }
            let mut highest = value;
            for n in neighborhood.mirrored(index) {
                let other = current[n];
                if maxima[n] && other > highest && value > other - h {
                    highest = other;
                }
            }
            *slot = highest;
            usize::from(highest != value)
        })
        .sum()
}

impl HTransform for NeighborFlood {
    fn transform(
        &self,
        field: &ArrayView3<f64>,
        mask: &ArrayView3<bool>,
    ) -> Result<HTransformOutput> {
        validate_budget(self.iterations, "flood")?;
        let Prepared {
            grid,
            neighborhood,
            values,
            mask,
        } = prepare(field, mask, self.connectivity, self.h)?;

        let mut current = values;
        let mut next = current.clone();
        let mut maxima = vec![false; grid.len()];
        let mut changed = 0;

        for iteration in 0..self.iterations {
            flood_maxima(&current, &mask, &neighborhood, &mut maxima);
            changed = propagate(&current, &maxima, &mask, &neighborhood, self.h, &mut next);
            std::mem::swap(&mut current, &mut next);
            debug!("flood iteration {iteration}: {changed} voxels changed");
        }
        flood_maxima(&current, &mask, &neighborhood, &mut maxima);

        Ok(HTransformOutput {
            field: volume_from_vec(grid, current)?,
            maxima: volume_from_vec(grid, maxima)?,
            iterations: self.iterations,
            converged: changed == 0,
        })
    }
}
