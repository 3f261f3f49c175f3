//! Bubble size distribution.
//!
//! Each labeled region is reduced to the radius of the sphere (or disc, for
//! planar labelings) with the same voxel count. The log-binned distribution
//! is the volume-weighted probability density in `ln r`:
//!
//! ```text
//! dP/dln r  ∝  dn/dln r · 4π r³ / (3 Q)
//! ```
//!
//! normalized so that `Σ density · Δln r = 1`.

use std::f64::consts::PI;

use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};

use super::histogram::Histogram;
use crate::error::{Result, SegmentError};
use crate::volume_proc::{Grid, RegionArena};

/// Histogram layout for [`size_distribution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Binning {
    /// Bins evenly spaced in `ln r`, volume weighted.
    Log { bins: usize },
    /// Bins evenly spaced in `r`, plain number density.
    Linear { bins: usize },
}

impl Default for Binning {
    fn default() -> Self {
        Binning::Log { bins: 19 }
    }
}

impl Binning {
    pub fn bins(&self) -> usize {
        match *self {
            Binning::Log { bins } | Binning::Linear { bins } => bins,
        }
    }
}

/// A normalized size distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeDistribution {
    /// Bin centres in length units: `exp` of the log-bin midpoints, or the
    /// linear-bin midpoints.
    pub radii: Vec<f64>,
    pub density: Vec<f64>,
    /// Edges in `ln r` for log binning, in `r` for linear binning.
    pub bin_edges: Vec<f64>,
    pub binning: Binning,
}

impl SizeDistribution {
    /// `Σ density · Δedge`; 1 up to rounding for every successful build.
    pub fn integral(&self) -> f64 {
        self.density
            .iter()
            .zip(self.bin_edges.windows(2))
            .map(|(d, pair)| d * (pair[1] - pair[0]))
            .sum()
    }
}

/// Radius of the sphere (rank 3) or disc (rank 2) of `voxels` unit cells.
pub fn equivalent_radius(voxels: usize, rank: usize) -> f64 {
    let volume = voxels as f64;
    if rank == 2 {
        (volume / PI).sqrt()
    } else {
        (3.0 * volume / (4.0 * PI)).cbrt()
    }
}

/// Equivalent radius of every non-empty region, in label order.
///
/// `scale` is the length of one voxel edge.
pub fn region_radii(labels: &ArrayView3<u32>, scale: f64) -> Result<Vec<f64>> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(SegmentError::invalid(format!(
            "voxel scale must be positive and finite, got {scale}"
        )));
    }
    let rank = Grid::of(labels).rank();
    Ok(RegionArena::from_volume(labels)
        .volumes()
        .into_iter()
        .map(|voxels| scale * equivalent_radius(voxels, rank))
        .collect())
}

/// Build the size distribution of a labeling.
pub fn size_distribution(
    labels: &ArrayView3<u32>,
    filling_fraction: f64,
    scale: f64,
    binning: Binning,
) -> Result<SizeDistribution> {
    if binning.bins() == 0 {
        return Err(SegmentError::invalid("size distribution needs at least 1 bin"));
    }
    if filling_fraction.is_nan() || filling_fraction <= 0.0 || filling_fraction > 1.0 {
        return Err(SegmentError::invalid(format!(
            "filling fraction must lie in (0, 1], got {filling_fraction}"
        )));
    }
    let radii = region_radii(labels, scale)?;
    if radii.is_empty() {
        return Err(SegmentError::EmptyDistribution);
    }

    match binning {
        Binning::Log { bins } => log_distribution(&radii, filling_fraction, bins, binning),
        Binning::Linear { bins } => linear_distribution(&radii, bins, binning),
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn log_distribution(
    radii: &[f64],
    filling_fraction: f64,
    bins: usize,
    binning: Binning,
) -> Result<SizeDistribution> {
    let log_radii: Vec<f64> = radii.iter().map(|r| r.ln()).collect();
    let (lo, hi) = min_max(&log_radii);

    let mut hist = Histogram::new_equal_bins(lo - 1.0, hi + 1.0, bins)?;
    hist.add_all(log_radii.iter().copied());

    let centres: Vec<f64> = hist.centers().into_iter().map(f64::exp).collect();
    let mut density: Vec<f64> = hist
        .density()
        .into_iter()
        .zip(&centres)
        .map(|(d, r)| d * 4.0 * PI * r.powi(3) / (3.0 * filling_fraction))
        .collect();

    let norm: f64 = density.iter().zip(hist.widths()).map(|(d, w)| d * w).sum();
    if !norm.is_finite() || norm <= 0.0 {
        return Err(SegmentError::NumericDegeneracy(format!(
            "size distribution normalization is {norm}"
        )));
    }
    density.iter_mut().for_each(|d| *d /= norm);

    Ok(SizeDistribution {
        radii: centres,
        density,
        bin_edges: hist.bin_edges().to_vec(),
        binning,
    })
}

fn linear_distribution(radii: &[f64], bins: usize, binning: Binning) -> Result<SizeDistribution> {
    let (mut lo, mut hi) = min_max(radii);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let mut hist = Histogram::new_equal_bins(lo, hi, bins)?;
    hist.add_all(radii.iter().copied());

    Ok(SizeDistribution {
        radii: hist.centers(),
        density: hist.density(),
        bin_edges: hist.bin_edges().to_vec(),
        binning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn two_region_labels() -> Array3<u32> {
        let mut labels = Array3::<u32>::zeros((4, 4, 4));
        labels[[0, 0, 0]] = 1;
        for z in 2..4 {
            for y in 2..4 {
                for x in 2..4 {
                    labels[[z, y, x]] = 2;
                }
            }
        }
        labels
    }

    #[test]
    fn test_equivalent_radius() {
        assert_relative_eq!(equivalent_radius(1, 3), (3.0 / (4.0 * PI)).cbrt());
        assert_relative_eq!(equivalent_radius(4, 2), (4.0 / PI).sqrt());
        let sphere = (4.0 / 3.0 * PI * 27.0).round() as usize;
        assert_relative_eq!(equivalent_radius(sphere, 3), 3.0, epsilon = 1e-2);
    }

    #[test]
    fn test_region_radii_scaled() {
        let labels = two_region_labels();
        let radii = region_radii(&labels.view(), 2.0).unwrap();
        assert_eq!(radii.len(), 2);
        assert_relative_eq!(radii[1], 2.0 * equivalent_radius(8, 3));
        assert!(region_radii(&labels.view(), 0.0).is_err());
    }

    #[test]
    fn test_log_distribution_is_normalized() {
        let labels = two_region_labels();
        let dist = size_distribution(&labels.view(), 0.3, 1.5, Binning::default()).unwrap();
        assert_eq!(dist.density.len(), 19);
        assert_eq!(dist.bin_edges.len(), 20);
        assert_relative_eq!(dist.integral(), 1.0, epsilon = 1e-12);
        assert!(dist.density.iter().all(|&d| d >= 0.0));
    }

    #[test]
    fn test_linear_distribution() {
        let labels = two_region_labels();
        let dist =
            size_distribution(&labels.view(), 1.0, 1.0, Binning::Linear { bins: 100 }).unwrap();
        assert_eq!(dist.density.len(), 100);
        assert_relative_eq!(dist.integral(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_region_linear_range() {
        let mut labels = Array3::<u32>::zeros((2, 2, 2));
        labels[[0, 0, 0]] = 1;
        let dist =
            size_distribution(&labels.view(), 0.5, 1.0, Binning::Linear { bins: 4 }).unwrap();
        let r = equivalent_radius(1, 3);
        assert_relative_eq!(dist.bin_edges[0], r - 0.5);
        assert_relative_eq!(dist.integral(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_failures() {
        let empty = Array3::<u32>::zeros((2, 2, 2));
        assert!(matches!(
            size_distribution(&empty.view(), 0.5, 1.0, Binning::default()),
            Err(SegmentError::EmptyDistribution)
        ));

        let labels = two_region_labels();
        for q in [0.0, 1.5, f64::NAN] {
            assert!(matches!(
                size_distribution(&labels.view(), q, 1.0, Binning::default()),
                Err(SegmentError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            size_distribution(&labels.view(), 0.5, 1.0, Binning::Log { bins: 0 }),
            Err(SegmentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_binning_serde() {
        let json = serde_json::to_string(&Binning::Log { bins: 19 }).unwrap();
        assert_eq!(json, r#"{"kind":"log","bins":19}"#);
        let parsed: Binning = serde_json::from_str(r#"{"kind":"linear","bins":50}"#).unwrap();
        assert_eq!(parsed, Binning::Linear { bins: 50 });
    }
}
