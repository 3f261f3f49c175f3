//! cosmo-math - Structure-formation statistics for reionization analysis
//!
//! This crate provides the numerical pieces used alongside the bubble
//! segmentation:
//!
//! - **Cosmology** - immutable parameter set, mean matter density, mass ↔ radius
//! - **Spectrum** - dimensionless power spectra Δ²(k): power law and tabulated
//! - **Window** - spherical top-hat and Gaussian filters in Fourier space
//! - **Quadrature** - composite and adaptive Simpson rules
//! - **Variance** - σ²(R), cross variances, Gaussian and mixed moments
//!
//! # Example
//!
//! ```text
//! use cosmo_math::{CosmologyParams, PowerLaw, VarianceIntegrator};
//!
//! let cosmology = CosmologyParams::default();
//! let integrator = VarianceIntegrator::new(PowerLaw::new(1.0, 1.0));
//! let sigma = integrator.sigma(cosmology.mass_to_radius(1e10))?;
//! ```

pub mod cosmology;
pub mod error;
pub mod quadrature;
pub mod spectrum;
pub mod variance;
pub mod window;

pub use cosmology::CosmologyParams;
pub use error::{CosmoError, Result};
pub use quadrature::{adaptive_simpson, simpson, trapezoid};
pub use spectrum::{PowerLaw, PowerSpectrum, TabulatedSpectrum};
pub use variance::{QuadratureSettings, VarianceIntegrator};
pub use window::{gaussian, gaussian_radius, top_hat};
