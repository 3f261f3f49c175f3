//! Background cosmology parameters.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{CosmoError, Result};

/// Critical density today in units of h² M☉ Mpc⁻³.
pub const CRITICAL_DENSITY_H2: f64 = 2.775e11;

/// Flat ΛCDM parameters.
///
/// Passed explicitly to every routine that needs them; there is no global
/// cosmology.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmologyParams {
    pub omega_m: f64,
    pub omega_b: f64,
    pub omega_lambda: f64,
    /// Primordial spectral index.
    pub n_s: f64,
    pub sigma_8: f64,
    /// Dimensionless Hubble parameter.
    pub h: f64,
}

impl Default for CosmologyParams {
    /// Planck 2015.
    fn default() -> Self {
        Self {
            omega_m: 0.315,
            omega_b: 0.0487,
            omega_lambda: 0.685,
            n_s: 0.96,
            sigma_8: 0.829,
            h: 0.673,
        }
    }
}

impl CosmologyParams {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("omega_m", self.omega_m),
            ("sigma_8", self.sigma_8),
            ("h", self.h),
        ];
        for (name, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(CosmoError::InvalidInput(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if !(0.0..=self.omega_m).contains(&self.omega_b) {
            return Err(CosmoError::InvalidInput(format!(
                "omega_b must lie in [0, omega_m], got {}",
                self.omega_b
            )));
        }
        Ok(())
    }

    /// Mean comoving matter density in M☉ Mpc⁻³.
    pub fn mean_matter_density(&self) -> f64 {
        self.omega_m * CRITICAL_DENSITY_H2 * self.h * self.h
    }

    /// Mass in M☉ enclosed by a top-hat sphere of radius `radius` Mpc.
    pub fn radius_to_mass(&self, radius: f64) -> f64 {
        4.0 / 3.0 * PI * radius.powi(3) * self.mean_matter_density()
    }

    /// Radius in Mpc of the top-hat sphere enclosing `mass` M☉.
    pub fn mass_to_radius(&self, mass: f64) -> f64 {
        (3.0 * mass / (4.0 * PI * self.mean_matter_density())).cbrt()
    }

    /// The `8 h⁻¹ Mpc` normalization scale in Mpc.
    pub fn sigma_8_radius(&self) -> f64 {
        8.0 / self.h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mass_radius_roundtrip() {
        let cosmology = CosmologyParams::default();
        for radius in [0.04, 1.0, 50.0] {
            let mass = cosmology.radius_to_mass(radius);
            assert_relative_eq!(cosmology.mass_to_radius(mass), radius, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_mean_density() {
        let cosmology = CosmologyParams::default();
        assert_relative_eq!(
            cosmology.mean_matter_density(),
            0.315 * 2.775e11 * 0.673 * 0.673,
            max_relative = 1e-12
        );
        // one Mpc sphere holds about 1.66e11 solar masses
        let mass = cosmology.radius_to_mass(1.0);
        assert!(mass > 1e11 && mass < 3e11, "{mass}");
        assert_relative_eq!(cosmology.mass_to_radius(mass), 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_validation_and_partial_json() {
        assert!(CosmologyParams::default().validate().is_ok());
        let bad = CosmologyParams {
            h: 0.0,
            ..CosmologyParams::default()
        };
        assert!(bad.validate().is_err());

        let parsed: CosmologyParams = serde_json::from_str(r#"{ "sigma_8": 0.8 }"#).unwrap();
        assert_eq!(parsed.sigma_8, 0.8);
        assert_eq!(parsed.h, 0.673);
    }
}
