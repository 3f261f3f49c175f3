//! Variance integrals of a power spectrum.
//!
//! Every quantity is an integral over `ln k` of `Δ²(k)` times a product of
//! windows:
//!
//! ```text
//! σ²(R)        = ∫ Δ² W(kR)²                  dln k
//! S_X(R_L, R_0) = ∫ Δ² W(kR_L) W(kR_0)         dln k
//! σ²_G,j(R_L)  = ∫ Δ² k^2j W_G(k R_G)²        dln k
//! σ_1m(R_L)    = ∫ Δ² k² W_G(k R_G) W(kR_L)    dln k
//! σ_1mX(R_L,R_0)= ∫ Δ² k² W_G(k R_G) W(kR_0)   dln k
//! ```
//!
//! with `R_G = 0.46 R_L`. Limits are the outermost points of the grid
//! `ln k ∈ [-20, 20)` (step 0.1) where the integrand exceeds `1e-4` of its
//! peak. A composite Simpson rule is tried first; a non-finite or
//! non-positive result is retried with adaptive Simpson.

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cosmology::CosmologyParams;
use crate::error::{CosmoError, Result};
use crate::quadrature::{adaptive_simpson, simpson};
use crate::spectrum::PowerSpectrum;
use crate::window::{gaussian, gaussian_radius, top_hat};

const LN_K_MIN: f64 = -20.0;
const LN_K_STEP: f64 = 0.1;
const LN_K_SAMPLES: usize = 400;

/// Knobs of the two integration paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureSettings {
    /// Simpson intervals of the fast path.
    pub fast_intervals: usize,
    /// Tolerance of the adaptive path, relative to `peak × (ln k range)`.
    pub relative_tolerance: f64,
    /// Bisection depth limit of the adaptive path.
    pub max_depth: usize,
    /// Fraction of the integrand peak that bounds the integration range.
    pub limit_factor: f64,
    /// Conditional variance factors at or below this are recomputed with
    /// the adaptive path.
    pub q_epsilon: f64,
}

impl Default for QuadratureSettings {
    fn default() -> Self {
        Self {
            fast_intervals: 400,
            relative_tolerance: 1e-10,
            max_depth: 40,
            limit_factor: 1e-4,
            q_epsilon: 1e-4,
        }
    }
}

/// Integration range in `ln k` and the sampled integrand peak.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Limits {
    lo: f64,
    hi: f64,
    peak: f64,
}

fn k_limits<F: Fn(f64) -> f64>(integrand: &F, factor: f64, quantity: &str) -> Result<Limits> {
    let samples: Vec<(f64, f64)> = (0..LN_K_SAMPLES)
        .map(|i| {
            let ln_k = LN_K_MIN + LN_K_STEP * i as f64;
            (ln_k, integrand(ln_k))
        })
        .collect();

    let peak = samples
        .iter()
        .map(|&(_, v)| v)
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if peak <= 0.0 {
        return Err(CosmoError::NumericDegeneracy {
            quantity: format!("{quantity} integrand peak"),
            value: peak,
        });
    }

    let threshold = peak * factor;
    let mut above = samples
        .iter()
        .filter(|&&(_, v)| v.is_finite() && v > threshold)
        .map(|&(ln_k, _)| ln_k);
    // peak > threshold, so at least one sample passes
    let first = above.next().unwrap_or(LN_K_MIN);
    let last = above.next_back().unwrap_or(first);

    let (lo, hi) = if first == last {
        (first - LN_K_STEP, last + LN_K_STEP)
    } else {
        (first, last)
    };
    Ok(Limits { lo, hi, peak })
}

fn check_radius(radius: f64, name: &str) -> Result<()> {
    if radius > 0.0 && radius.is_finite() {
        Ok(())
    } else {
        Err(CosmoError::InvalidInput(format!(
            "{name} must be positive and finite, got {radius}"
        )))
    }
}

/// Evaluates variance integrals of one spectrum.
#[derive(Debug, Clone)]
pub struct VarianceIntegrator<P> {
    spectrum: P,
    settings: QuadratureSettings,
}

impl<P: PowerSpectrum> VarianceIntegrator<P> {
    pub fn new(spectrum: P) -> Self {
        Self::with_settings(spectrum, QuadratureSettings::default())
    }

    pub fn with_settings(spectrum: P, settings: QuadratureSettings) -> Self {
        Self { spectrum, settings }
    }

    pub fn spectrum(&self) -> &P {
        &self.spectrum
    }

    pub fn settings(&self) -> &QuadratureSettings {
        &self.settings
    }

    fn check_settings(&self) -> Result<()> {
        let s = &self.settings;
        if s.fast_intervals == 0 {
            return Err(CosmoError::InvalidInput("fast_intervals must be at least 1".to_string()));
        }
        let tolerance_ok = s.relative_tolerance > 0.0;
        let factor_ok = s.limit_factor > 0.0 && s.limit_factor < 1.0;
        if !tolerance_ok || !factor_ok {
            return Err(CosmoError::InvalidInput(format!(
                "relative_tolerance must be positive and limit_factor in (0, 1), got {} and {}",
                s.relative_tolerance, s.limit_factor
            )));
        }
        Ok(())
    }

    /// Fast Simpson with an adaptive retry.
    fn integrate<F: Fn(f64) -> f64>(&self, quantity: &str, integrand: F) -> Result<f64> {
        self.check_settings()?;
        let limits = k_limits(&integrand, self.settings.limit_factor, quantity)?;
        let fast = simpson(
            &integrand,
            limits.lo,
            limits.hi,
            self.settings.fast_intervals,
        )?;
        if fast.is_finite() && fast > 0.0 {
            return Ok(fast);
        }
        warn!("{quantity}: fast quadrature gave {fast}, retrying adaptively");
        self.adaptive(quantity, &integrand, limits)
    }

    /// Adaptive Simpson only.
    fn integrate_precise<F: Fn(f64) -> f64>(&self, quantity: &str, integrand: F) -> Result<f64> {
        self.check_settings()?;
        let limits = k_limits(&integrand, self.settings.limit_factor, quantity)?;
        self.adaptive(quantity, &integrand, limits)
    }

    fn adaptive<F: Fn(f64) -> f64>(
        &self,
        quantity: &str,
        integrand: &F,
        limits: Limits,
    ) -> Result<f64> {
        let tolerance = self.settings.relative_tolerance * limits.peak * (limits.hi - limits.lo);
        let value = adaptive_simpson(
            integrand,
            limits.lo,
            limits.hi,
            tolerance,
            self.settings.max_depth,
        )?;
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(CosmoError::NumericDegeneracy {
                quantity: quantity.to_string(),
                value,
            })
        }
    }

    fn delta_squared_ln(&self, ln_k: f64) -> (f64, f64) {
        let k = ln_k.exp();
        (k, self.spectrum.delta_squared(k))
    }

    fn top_hat_integrand(&self, radius: f64) -> impl Fn(f64) -> f64 + '_ {
        move |ln_k| {
            let (k, d2) = self.delta_squared_ln(ln_k);
            let w = top_hat(k * radius);
            d2 * w * w
        }
    }

    fn cross_integrand(&self, r_l: f64, r_0: f64) -> impl Fn(f64) -> f64 + '_ {
        move |ln_k| {
            let (k, d2) = self.delta_squared_ln(ln_k);
            d2 * top_hat(k * r_l) * top_hat(k * r_0)
        }
    }

    /// Mass variance `σ²(R)` in a top-hat sphere of radius `radius`.
    pub fn sigma_squared(&self, radius: f64) -> Result<f64> {
        check_radius(radius, "radius")?;
        self.integrate("sigma_squared", self.top_hat_integrand(radius))
    }

    /// `σ(R)`.
    pub fn sigma(&self, radius: f64) -> Result<f64> {
        Ok(self.sigma_squared(radius)?.sqrt())
    }

    /// Cross variance `S_X(R_L, R_0)` of two concentric top-hats.
    pub fn cross_variance(&self, r_l: f64, r_0: f64) -> Result<f64> {
        check_radius(r_l, "r_l")?;
        check_radius(r_0, "r_0")?;
        self.integrate("cross_variance", self.cross_integrand(r_l, r_0))
    }

    /// Gaussian-filtered spectral moment `σ²_G,j(R_L)`, filter radius
    /// `0.46 R_L`.
    pub fn gaussian_moment(&self, r_l: f64, j: u32) -> Result<f64> {
        check_radius(r_l, "r_l")?;
        let r_g = gaussian_radius(r_l);
        let power = 2 * j as i32;
        self.integrate("gaussian_moment", move |ln_k| {
            let (k, d2) = self.delta_squared_ln(ln_k);
            let w = gaussian(k * r_g);
            d2 * k.powi(power) * w * w
        })
    }

    /// Mixed moment `σ_1m(R_L)`: Gaussian and top-hat at the same scale.
    pub fn mixed_moment(&self, r_l: f64) -> Result<f64> {
        self.mixed_cross_moment(r_l, r_l)
    }

    /// Mixed cross moment `σ_1mX(R_L, R_0)`: Gaussian at `R_L`, top-hat at
    /// `R_0`.
    pub fn mixed_cross_moment(&self, r_l: f64, r_0: f64) -> Result<f64> {
        check_radius(r_l, "r_l")?;
        check_radius(r_0, "r_0")?;
        let r_g = gaussian_radius(r_l);
        self.integrate("mixed_moment", move |ln_k| {
            let (k, d2) = self.delta_squared_ln(ln_k);
            d2 * k * k * gaussian(k * r_g) * top_hat(k * r_0)
        })
    }

    /// Conditional variance factor `Q = 1 - S_X² / (σ²(r) σ²(r0))`.
    ///
    /// At or below `q_epsilon` all three integrals are redone on the
    /// adaptive path and `1e-12` is added. A factor that is still not
    /// positive is a [`CosmoError::NumericDegeneracy`].
    pub fn conditional_variance_factor(&self, r: f64, r0: f64) -> Result<f64> {
        check_radius(r, "r")?;
        check_radius(r0, "r0")?;

        let s = self.sigma_squared(r)?;
        let s0 = self.sigma_squared(r0)?;
        let sx = self.cross_variance(r, r0)?;
        let q = 1.0 - (sx / s) * (sx / s0);
        if q > self.settings.q_epsilon {
            return Ok(q);
        }

        debug!(
            "Q = {q} <= {} for r = {r}, r0 = {r0}; recomputing adaptively",
            self.settings.q_epsilon
        );
        let s = self.integrate_precise("sigma_squared", self.top_hat_integrand(r))?;
        let s0 = self.integrate_precise("sigma_squared", self.top_hat_integrand(r0))?;
        let sx = self.integrate_precise("cross_variance", self.cross_integrand(r, r0))?;
        let q = 1.0 - (sx / s) * (sx / s0) + 1e-12;
        if q > 0.0 {
            Ok(q)
        } else {
            Err(CosmoError::NumericDegeneracy {
                quantity: "conditional variance factor".to_string(),
                value: q,
            })
        }
    }

    /// `σ²(R)` for every radius, evaluated in parallel.
    pub fn variance_curve(&self, radii: &[f64]) -> Result<Vec<f64>> {
        radii.par_iter().map(|&r| self.sigma_squared(r)).collect()
    }

    /// Factor that rescales this spectrum to the `σ_8` of `cosmology`.
    pub fn sigma_8_factor(&self, cosmology: &CosmologyParams) -> Result<f64> {
        cosmology.validate()?;
        let current = self.sigma_squared(cosmology.sigma_8_radius())?;
        Ok(cosmology.sigma_8 * cosmology.sigma_8 / current)
    }
}
