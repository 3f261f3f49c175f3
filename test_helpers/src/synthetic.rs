//! Synthetic fields for segmentation tests.
//!
//! All generators return `[z, y, x]` volumes. Random generators are seeded
//! with ChaCha8 so every run sees the same data.

use ndarray::Array3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn separation(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f64>()
        .sqrt()
}

/// A ball of ionized voxels.
#[derive(Debug, Clone, Copy)]
pub struct Bubble {
    pub centre: [f64; 3],
    pub radius: f64,
}

impl Bubble {
    pub fn new(centre: [f64; 3], radius: f64) -> Self {
        Self { centre, radius }
    }

    pub fn contains(&self, z: usize, y: usize, x: usize) -> bool {
        let d2: f64 = [z as f64, y as f64, x as f64]
            .iter()
            .zip(&self.centre)
            .map(|(p, c)| (p - c) * (p - c))
            .sum();
        d2 <= self.radius * self.radius
    }
}

/// Cube of side `n` at `background` with a single voxel at `peak` in the centre.
pub fn single_peak_cube(n: usize, peak: f64, background: f64) -> Array3<f64> {
    let mut field = Array3::from_elem((n, n, n), background);
    field[[n / 2, n / 2, n / 2]] = peak;
    field
}

/// Cube of side `n` with `peak` voxels at the two opposite corners.
pub fn corner_peaks(n: usize, peak: f64, background: f64) -> Array3<f64> {
    let mut field = Array3::from_elem((n, n, n), background);
    field[[0, 0, 0]] = peak;
    field[[n - 1, n - 1, n - 1]] = peak;
    field
}

/// Ionization box: 1.0 inside any bubble, 0.0 elsewhere.
pub fn bubble_box(dims: (usize, usize, usize), bubbles: &[Bubble]) -> Array3<f64> {
    Array3::from_shape_fn(dims, |(z, y, x)| {
        if bubbles.iter().any(|b| b.contains(z, y, x)) {
            1.0
        } else {
            0.0
        }
    })
}

/// `count` non-overlapping bubbles with radii in `[r_min, r_max)` placed at
/// random inside the box, at least one voxel apart.
pub fn random_bubbles(
    dims: (usize, usize, usize),
    count: usize,
    r_min: f64,
    r_max: f64,
    seed: u64,
) -> Vec<Bubble> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let extent = [dims.0 as f64, dims.1 as f64, dims.2 as f64];
    let mut bubbles: Vec<Bubble> = Vec::with_capacity(count);

    for _ in 0..count * 200 {
        if bubbles.len() == count {
            break;
        }
        let radius = rng.gen_range(r_min..r_max);
        if extent.iter().any(|&e| e <= 2.0 * radius + 2.0) {
            continue;
        }
        let centre = [
            rng.gen_range(radius + 1.0..extent[0] - radius - 1.0),
            rng.gen_range(radius + 1.0..extent[1] - radius - 1.0),
            rng.gen_range(radius + 1.0..extent[2] - radius - 1.0),
        ];
        let clear = bubbles
            .iter()
            .all(|b| separation(&b.centre, &centre) > b.radius + radius + 2.0);
        if clear {
            bubbles.push(Bubble::new(centre, radius));
        }
    }
    bubbles
}

/// Uniform noise in `[0, 1)`.
pub fn random_field(dims: (usize, usize, usize), seed: u64) -> Array3<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array3::from_shape_fn(dims, |_| rng.gen::<f64>())
}

/// Mask with each voxel set independently with probability `fraction`.
pub fn random_mask(dims: (usize, usize, usize), fraction: f64, seed: u64) -> Array3<bool> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array3::from_shape_fn(dims, |_| rng.gen_bool(fraction))
}
