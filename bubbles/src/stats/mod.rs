//! Region statistics.
//!
//! - **histogram**: fixed-edge histograms with density normalization
//! - **size_distribution**: equivalent radii and the bubble size distribution

pub mod histogram;
pub mod size_distribution;

pub use histogram::Histogram;
pub use size_distribution::{region_radii, size_distribution, Binning, SizeDistribution};
