//! Seeded watershed segmentation.
//!
//! Seeds are the connected components of the final maxima. The flood runs
//! over the negated distance field with a priority queue: the lowest surface
//! value is expanded first and equal values leave the queue in insertion
//! order, which makes the result deterministic. A voxel is labeled when it is
//! first pushed, so the first front to touch it owns it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;
use ndarray::{Array3, ArrayView3};

use super::grid::{flatten, validate_field_and_mask, volume_from_vec, Grid};
use super::labeling::label_flat;
use super::maxima::local_maxima_flat;
use super::neighborhood::{Connectivity, Neighborhood};
use crate::error::{Result, SegmentError};

/// Queue entry ordered so that [`BinaryHeap`] pops the lowest priority, then
/// the oldest entry.
#[derive(Debug, Clone, Copy)]
struct FloodItem {
    priority: f64,
    age: u64,
    index: usize,
}

impl PartialEq for FloodItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodItem {}

impl PartialOrd for FloodItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.age.cmp(&self.age))
    }
}

struct Flood<'a> {
    surface: &'a [f64],
    mask: &'a [bool],
    neighborhood: &'a Neighborhood,
    labels: Vec<u32>,
    heap: BinaryHeap<FloodItem>,
    age: u64,
}

impl Flood<'_> {
    fn push(&mut self, index: usize, label: u32) {
        self.labels[index] = label;
        self.heap.push(FloodItem {
            priority: self.surface[index],
            age: self.age,
            index,
        });
        self.age += 1;
    }

    fn drain(&mut self) {
        while let Some(item) = self.heap.pop() {
            let label = self.labels[item.index];
            for n in self.neighborhood.bounded(item.index) {
                if self.mask[n] && self.labels[n] == 0 {
                    self.push(n, label);
                }
            }
        }
    }
}

/// Flood `seeds` over `surface` inside `mask`.
///
/// Seeds are flat labels (0 = none) and are ignored outside the mask. Every
/// masked voxel that no seed can reach gets a fresh label per connected
/// component, numbered after the largest seed label, so the result labels
/// exactly the masked voxels.
pub fn priority_flood(
    surface: &[f64],
    seeds: &[u32],
    mask: &[bool],
    neighborhood: &Neighborhood,
) -> Vec<u32> {
    let mut flood = Flood {
        surface,
        mask,
        neighborhood,
        labels: vec![0; surface.len()],
        heap: BinaryHeap::new(),
        age: 0,
    };

    let mut next_label = 0;
    for (index, &seed) in seeds.iter().enumerate() {
        if seed > 0 && mask[index] {
            flood.push(index, seed);
            next_label = next_label.max(seed);
        }
    }
    flood.drain();

    let mut orphans = 0;
    for index in 0..surface.len() {
        if mask[index] && flood.labels[index] == 0 {
            next_label += 1;
            orphans += 1;
            flood.push(index, next_label);
            flood.drain();
        }
    }
    if orphans > 0 {
        debug!("{orphans} mask components had no seed and received their own label");
    }

    flood.labels
}

/// Result of a watershed segmentation.
#[derive(Debug, Clone)]
pub struct WatershedSegmentation {
    /// Region id per voxel; 0 exactly on unmasked voxels.
    pub labels: Array3<u32>,
    /// Seed labels from the connected maxima.
    pub markers: Array3<u32>,
    /// Distance field the flood ran over.
    pub distance: Array3<f64>,
    /// Masked voxels over total voxels.
    pub filling_fraction: f64,
}

impl WatershedSegmentation {
    pub fn region_count(&self) -> usize {
        self.labels.iter().copied().max().unwrap_or(0) as usize
    }
}

/// Watershed segmenter over a distance field.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatershedSegmenter {
    pub connectivity: Connectivity,
}

impl WatershedSegmenter {
    pub fn new(connectivity: Connectivity) -> Self {
        Self { connectivity }
    }

    /// Seed from the maxima of `smoothed` and flood `-distance`.
    pub fn segment(
        &self,
        distance: &ArrayView3<f64>,
        smoothed: &ArrayView3<f64>,
        mask: &ArrayView3<bool>,
    ) -> Result<WatershedSegmentation> {
        let (grid, _) = validate_field_and_mask(distance, mask)?;
        check_shape(grid, Grid::of(smoothed), "smoothed field")?;
        let neighborhood = Neighborhood::new(grid, self.connectivity);
        let mask_flat = flatten(mask);
        let maxima = local_maxima_flat(&flatten(smoothed), &mask_flat, &neighborhood);
        self.flood(distance, maxima, mask_flat, grid, &neighborhood)
    }

    /// Seed from precomputed maxima and flood `-distance`.
    pub fn segment_from_maxima(
        &self,
        distance: &ArrayView3<f64>,
        maxima: &ArrayView3<bool>,
        mask: &ArrayView3<bool>,
    ) -> Result<WatershedSegmentation> {
        let (grid, _) = validate_field_and_mask(distance, mask)?;
        check_shape(grid, Grid::of(maxima), "maxima")?;
        let neighborhood = Neighborhood::new(grid, self.connectivity);
        self.flood(
            distance,
            flatten(maxima),
            flatten(mask),
            grid,
            &neighborhood,
        )
    }

    fn flood(
        &self,
        distance: &ArrayView3<f64>,
        maxima: Vec<bool>,
        mask: Vec<bool>,
        grid: Grid,
        neighborhood: &Neighborhood,
    ) -> Result<WatershedSegmentation> {
        let maxima: Vec<bool> = maxima.iter().zip(&mask).map(|(&m, &k)| m && k).collect();
        let (seeds, seed_count) = label_flat(&maxima, neighborhood);
        let surface: Vec<f64> = distance.iter().map(|&d| -d).collect();
        let labels = priority_flood(&surface, &seeds, &mask, neighborhood);

        let masked = mask.iter().filter(|&&m| m).count();
        let filling_fraction = masked as f64 / grid.len() as f64;
        debug!("watershed flooded {masked} voxels from {seed_count} seed regions");

        Ok(WatershedSegmentation {
            labels: volume_from_vec(grid, labels)?,
            markers: volume_from_vec(grid, seeds)?,
            distance: distance.to_owned(),
            filling_fraction,
        })
    }
}

fn check_shape(expected: Grid, actual: Grid, what: &str) -> Result<()> {
    if expected != actual {
        return Err(SegmentError::invalid(format!(
            "{what} shape {:?} does not match field shape {:?}",
            actual.dims(),
            expected.dims()
        )));
    }
    Ok(())
}
