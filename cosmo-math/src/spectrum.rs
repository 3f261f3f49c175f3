//! Dimensionless power spectra.
//!
//! `Δ²(k) = k³ P(k) / 2π²` is the variance contributed per `ln k`, which is
//! the form every integral in [`crate::variance`] consumes.

use serde::{Deserialize, Serialize};

use crate::error::{CosmoError, Result};

/// A dimensionless power spectrum `Δ²(k)`, `k` in inverse length units.
pub trait PowerSpectrum: Send + Sync {
    fn delta_squared(&self, k: f64) -> f64;
}

/// `Δ²(k) = amplitude · k^index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLaw {
    pub amplitude: f64,
    pub index: f64,
}

impl PowerLaw {
    pub fn new(amplitude: f64, index: f64) -> Self {
        Self { amplitude, index }
    }

    /// Same slope with the amplitude multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.amplitude * factor, self.index)
    }
}

impl PowerSpectrum for PowerLaw {
    fn delta_squared(&self, k: f64) -> f64 {
        self.amplitude * k.powf(self.index)
    }
}

/// Spectrum sampled on a grid, interpolated linearly in `ln k`, `ln Δ²`.
///
/// Zero outside the sampled range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulatedSpectrum {
    ln_k: Vec<f64>,
    ln_delta_squared: Vec<f64>,
}

impl TabulatedSpectrum {
    /// Build from `(k, Δ²)` samples with strictly increasing positive `k`
    /// and positive `Δ²`.
    pub fn new(k: &[f64], delta_squared: &[f64]) -> Result<Self> {
        if k.len() != delta_squared.len() {
            return Err(CosmoError::InvalidInput(format!(
                "spectrum table lengths differ: {} k values, {} Δ² values",
                k.len(),
                delta_squared.len()
            )));
        }
        if k.len() < 2 {
            return Err(CosmoError::InvalidInput(
                "spectrum table needs at least 2 samples".to_string(),
            ));
        }
        let invalid = |v: &f64| *v <= 0.0 || !v.is_finite();
        if k.iter().chain(delta_squared).any(invalid) {
            return Err(CosmoError::InvalidInput(
                "spectrum samples must be positive and finite".to_string(),
            ));
        }
        if k.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(CosmoError::InvalidInput(
                "spectrum k values must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            ln_k: k.iter().map(|v| v.ln()).collect(),
            ln_delta_squared: delta_squared.iter().map(|v| v.ln()).collect(),
        })
    }

    /// Same table with every `Δ²` multiplied by `factor > 0`.
    pub fn scaled(&self, factor: f64) -> Self {
        let shift = factor.ln();
        Self {
            ln_k: self.ln_k.clone(),
            ln_delta_squared: self.ln_delta_squared.iter().map(|v| v + shift).collect(),
        }
    }

    /// Sampled `k` range.
    pub fn k_range(&self) -> (f64, f64) {
        (self.ln_k[0].exp(), self.ln_k[self.ln_k.len() - 1].exp())
    }
}

impl PowerSpectrum for TabulatedSpectrum {
    fn delta_squared(&self, k: f64) -> f64 {
        if k.is_nan() || k <= 0.0 {
            return 0.0;
        }
        let x = k.ln();
        let xs = &self.ln_k;
        let last = xs.len() - 1;
        if x < xs[0] || x > xs[last] {
            return 0.0;
        }

        // partition_point returns the index of the first element > x
        let idx = xs.partition_point(|&val| val <= x);
        if idx == 0 {
            return self.ln_delta_squared[0].exp();
        }
        if idx > last {
            return self.ln_delta_squared[last].exp();
        }

        let (x1, x2) = (xs[idx - 1], xs[idx]);
        let (y1, y2) = (self.ln_delta_squared[idx - 1], self.ln_delta_squared[idx]);
        (y1 + (x - x1) * (y2 - y1) / (x2 - x1)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_power_law() {
        let spectrum = PowerLaw::new(2.0, 1.5);
        assert_relative_eq!(spectrum.delta_squared(4.0), 16.0);
        assert_relative_eq!(spectrum.scaled(0.5).delta_squared(4.0), 8.0);
    }

    #[test]
    fn test_tabulated_matches_power_law_between_nodes() {
        let k: Vec<f64> = (0..10)
            .map(|i| 10f64.powf(-2.0 + 0.5 * i as f64))
            .collect();
        let truth = PowerLaw::new(3.0, 0.7);
        let d2: Vec<f64> = k.iter().map(|&k| truth.delta_squared(k)).collect();
        let table = TabulatedSpectrum::new(&k, &d2).unwrap();

        for k in [0.013, 0.5, 7.0, 250.0] {
            assert_relative_eq!(
                table.delta_squared(k),
                truth.delta_squared(k),
                max_relative = 1e-10
            );
        }
        assert_eq!(table.delta_squared(1e-3), 0.0);
        assert_eq!(table.delta_squared(1e4), 0.0);
        assert_relative_eq!(table.delta_squared(k[9]), d2[9], max_relative = 1e-12);
    }

    #[test]
    fn test_tabulated_validation() {
        assert!(TabulatedSpectrum::new(&[1.0, 2.0], &[1.0]).is_err());
        assert!(TabulatedSpectrum::new(&[1.0], &[1.0]).is_err());
        assert!(TabulatedSpectrum::new(&[2.0, 1.0], &[1.0, 1.0]).is_err());
        assert!(TabulatedSpectrum::new(&[1.0, 2.0], &[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_tabulated_scaling() {
        let table = TabulatedSpectrum::new(&[1.0, 10.0], &[2.0, 20.0]).unwrap();
        let doubled = table.scaled(2.0);
        assert_relative_eq!(
            doubled.delta_squared(3.0),
            2.0 * table.delta_squared(3.0),
            max_relative = 1e-12
        );
        assert_eq!(doubled.k_range(), table.k_range());
    }
}
