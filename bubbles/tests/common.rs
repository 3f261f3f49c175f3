//! Common utilities for bubbles integration tests

#![allow(dead_code)]

use ndarray::Array3;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn full_mask(dims: (usize, usize, usize)) -> Array3<bool> {
    Array3::from_elem(dims, true)
}

pub fn count_true(volume: &Array3<bool>) -> usize {
    volume.iter().filter(|&&v| v).count()
}

/// Smooth field with a handful of shallow ripples on top of broad peaks.
pub fn rippled_field(dims: (usize, usize, usize)) -> Array3<f64> {
    Array3::from_shape_fn(dims, |(z, y, x)| {
        let (z, y, x) = (z as f64, y as f64, x as f64);
        (0.9 * x).sin()
            + (0.7 * y).cos()
            + (0.5 * z + 0.3 * x).sin()
            + 0.25 * (2.3 * x + 1.7 * y + 1.1 * z).sin()
    })
}

/// Every masked voxel carries a positive label and every other voxel 0.
pub fn assert_partition(labels: &Array3<u32>, mask: &Array3<bool>) {
    assert_eq!(labels.dim(), mask.dim());
    for (index, (&label, &inside)) in labels.iter().zip(mask.iter()).enumerate() {
        assert_eq!(
            label > 0,
            inside,
            "voxel {index}: label {label}, masked {inside}"
        );
    }
}
