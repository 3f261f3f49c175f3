//! Exact Euclidean distance transform.
//!
//! Uses the separable lower-envelope algorithm of Felzenszwalb & Huttenlocher:
//! the squared distance is computed one axis at a time, each lane being an
//! independent 1-D problem, so lanes are processed in parallel.

use ndarray::{Array3, ArrayView3, Axis, Zip};

use log::debug;

use super::grid::validate_mask;
use crate::error::Result;

/// 1-D squared distance transform of a sampled function `f`.
///
/// Infinite samples are not parabola sites. A lane with no finite sample
/// stays infinite.
fn squared_distance_1d(f: &[f64], out: &mut [f64], sites: &mut Vec<usize>, bounds: &mut Vec<f64>) {
    sites.clear();
    bounds.clear();

    for q in 0..f.len() {
        if !f[q].is_finite() {
            continue;
        }
        let qf = q as f64;
        loop {
            match sites.last() {
                None => {
                    sites.push(q);
                    bounds.push(f64::NEG_INFINITY);
                    break;
                }
                Some(&p) => {
                    let pf = p as f64;
                    let s = ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf);
                    if bounds.last().is_some_and(|&b| s <= b) {
                        sites.pop();
                        bounds.pop();
                    } else {
                        sites.push(q);
                        bounds.push(s);
                        break;
                    }
                }
            }
        }
    }

    if sites.is_empty() {
        out.fill(f64::INFINITY);
        return;
    }

    let mut k = 0;
    for (p, value) in out.iter_mut().enumerate() {
        let pf = p as f64;
        while k + 1 < sites.len() && bounds[k + 1] < pf {
            k += 1;
        }
        let d = pf - sites[k] as f64;
        *value = d * d + f[sites[k]];
    }
}

/// Distance from each voxel of a fully masked grid to the nearest voxel just
/// outside it. Axes of length 1 carry no faces; a single voxel gets 1.
fn face_distance(dims: [usize; 3]) -> Array3<f64> {
    Array3::from_shape_fn((dims[0], dims[1], dims[2]), |(z, y, x)| {
        [(z, dims[0]), (y, dims[1]), (x, dims[2])]
            .iter()
            .filter(|&&(_, n)| n > 1)
            .map(|&(i, n)| (i + 1).min(n - i) as f64)
            .reduce(f64::min)
            .unwrap_or(1.0)
    })
}

/// Distance from every masked voxel to the nearest unmasked voxel.
///
/// Unmasked voxels get 0. When the mask covers the whole volume the grid
/// faces bound it instead: each voxel gets its distance to the nearest voxel
/// outside the grid. Fails with `InvalidInput` when the mask is empty.
pub fn euclidean_distance_transform(mask: &ArrayView3<bool>) -> Result<Array3<f64>> {
    let masked = validate_mask(mask)?;
    if masked == mask.len() {
        let (nz, ny, nx) = mask.dim();
        debug!("mask has no background, measuring distance to the grid faces");
        return Ok(face_distance([nz, ny, nx]));
    }

    let mut squared = mask.mapv(|inside| if inside { f64::INFINITY } else { 0.0 });

    for axis in 0..3 {
        let n = squared.len_of(Axis(axis));
        if n == 1 {
            continue;
        }
        Zip::from(squared.lanes_mut(Axis(axis))).par_for_each(|mut lane| {
            let input = lane.to_vec();
            let mut output = vec![0.0; n];
            let mut sites = Vec::with_capacity(n);
            let mut bounds = Vec::with_capacity(n);
            squared_distance_1d(&input, &mut output, &mut sites, &mut bounds);
            for (slot, value) in lane.iter_mut().zip(output) {
                *slot = value;
            }
        });
    }

    squared.mapv_inplace(f64::sqrt);
    Ok(squared)
}
