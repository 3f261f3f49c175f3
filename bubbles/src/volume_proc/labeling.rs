//! Connected component labeling and region bookkeeping.
//!
//! ## Connected Components
//! Two-pass labeling with union-find. The first pass scans voxels in raster
//! order and only looks at already-visited neighbours; label equivalences
//! are resolved through the parent table and a second pass rewrites the
//! provisional labels into consecutive ids. Labels are ordered by the first
//! voxel of each component in raster order, so the result is deterministic.
//!
//! ## Region Arena
//! [`RegionArena`] groups member voxel indices per label so that per-region
//! reductions (volume, maximum intensity) are a single pass over the index
//! lists rather than repeated scans of a boolean volume.

use ndarray::{Array3, ArrayView3};

use super::grid::{flatten, volume_from_vec, Grid};
use super::neighborhood::{Connectivity, Neighborhood};
use crate::error::Result;

/// Find the root label in a disjoint-set (union-find) parent table.
fn find_root(parents: &mut [usize], label: usize) -> usize {
    let mut current = label;

    // Path halving: point each visited node at its grandparent
    while current != parents[current] {
        parents[current] = parents[parents[current]];
        current = parents[current];
    }

    current
}

/// Merge two label sets, keeping the smaller root as canonical.
fn union_labels(parents: &mut [usize], label1: usize, label2: usize) -> usize {
    let root1 = find_root(parents, label1);
    let root2 = find_root(parents, label2);

    if root1 < root2 {
        parents[root2] = root1;
        root1
    } else {
        parents[root1] = root2;
        root2
    }
}

/// A labeled volume and the number of labels in it.
#[derive(Debug, Clone)]
pub struct LabeledVolume {
    /// 0 for background, 1..=count for components.
    pub labels: Array3<u32>,
    pub count: usize,
}

/// Label connected components of a binary volume.
pub fn label_components(
    binary: &ArrayView3<bool>,
    connectivity: Connectivity,
) -> Result<LabeledVolume> {
    let grid = Grid::of(binary);
    let neighborhood = Neighborhood::new(grid, connectivity);
    let (labels, count) = label_flat(&flatten(binary), &neighborhood);
    Ok(LabeledVolume {
        labels: volume_from_vec(grid, labels)?,
        count,
    })
}

/// Flat-slice labeling used by the iterative engines.
pub(crate) fn label_flat(binary: &[bool], neighborhood: &Neighborhood) -> (Vec<u32>, usize) {
    let mut labels = vec![0usize; binary.len()];
    let mut parents = vec![0usize];
    let mut neighbor_labels = Vec::with_capacity(13);

    for index in 0..binary.len() {
        if !binary[index] {
            continue;
        }

        neighbor_labels.clear();
        neighbor_labels.extend(
            neighborhood
                .preceding(index)
                .map(|n| labels[n])
                .filter(|&label| label > 0),
        );

        match neighbor_labels.iter().copied().min() {
            None => {
                let label = parents.len();
                parents.push(label);
                labels[index] = label;
            }
            Some(min_label) => {
                labels[index] = min_label;
                for &label in &neighbor_labels {
                    if label != min_label {
                        union_labels(&mut parents, min_label, label);
                    }
                }
            }
        }
    }

    // Resolve every provisional label to its root; roots are always smaller
    // than their members so a forward pass sees each root first.
    let mut relabel = vec![0u32; parents.len()];
    let mut count = 0usize;
    for label in 1..parents.len() {
        let root = find_root(&mut parents, label);
        parents[label] = root;
        if root == label {
            count += 1;
            relabel[label] = count as u32;
        } else {
            relabel[label] = relabel[root];
        }
    }

    let labels = labels.into_iter().map(|label| relabel[label]).collect();
    (labels, count)
}

/// Member voxel indices grouped by label.
#[derive(Debug, Clone, Default)]
pub struct RegionArena {
    regions: Vec<Vec<usize>>,
}

impl RegionArena {
    /// Group a flat label slice whose labels are 1..=count.
    pub fn from_labels(labels: &[u32], count: usize) -> Self {
        let mut regions = vec![Vec::new(); count];
        for (index, &label) in labels.iter().enumerate() {
            if label > 0 {
                regions[label as usize - 1].push(index);
            }
        }
        Self { regions }
    }

    /// Group a label volume; the label count is the largest label present.
    pub fn from_volume(labels: &ArrayView3<u32>) -> Self {
        let flat = flatten(labels);
        let count = flat.iter().copied().max().unwrap_or(0) as usize;
        Self::from_labels(&flat, count)
    }

    /// Number of label slots, including labels with no voxels.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Iterate over non-empty regions as `(label, member indices)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[usize])> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, members)| !members.is_empty())
            .map(|(slot, members)| (slot as u32 + 1, members.as_slice()))
    }

    /// Voxel count of each non-empty region.
    pub fn volumes(&self) -> Vec<usize> {
        self.iter().map(|(_, members)| members.len()).collect()
    }

    /// Set every member voxel in `target` to its region's maximum of `source`.
    pub fn scatter_max(&self, source: &[f64], target: &mut [f64]) {
        for (_, members) in self.iter() {
            let peak = members
                .iter()
                .map(|&index| source[index])
                .fold(f64::NEG_INFINITY, f64::max);
            for &index in members {
                target[index] = peak;
            }
        }
    }
}
