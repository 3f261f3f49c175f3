//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs to name the values it
//! changes:
//!
//! ```json
//! { "smoothing": { "mode": "hmax", "strategy": "region_merge" }, "hmax": { "h": 0.5 } }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};
use crate::stats::Binning;
use crate::volume_proc::hmax::{FloodThenMerge, HTransform, NeighborFlood, RegionMerge};
use crate::volume_proc::Connectivity;

/// Which H-transform engine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NeighborFlood,
    RegionMerge,
    #[default]
    FloodThenMerge,
}

/// How the distance field is smoothed before seeding the watershed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Smoothing {
    /// H-maximum transform with the given engine.
    #[serde(rename = "hmax")]
    HMax {
        #[serde(default)]
        strategy: Strategy,
    },
    /// Grow the raw maxima by dilation until the region count is stable.
    Dilation,
    /// Seed directly from the raw maxima.
    None,
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::HMax {
            strategy: Strategy::default(),
        }
    }
}

/// Parameters shared by the H-transform engines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HTransformConfig {
    /// Height tolerance below which maxima merge.
    pub h: f64,
    /// Exact iteration count of the neighbour flood.
    pub flood_iterations: usize,
    /// Iteration cap of the region merge.
    pub merge_iterations: usize,
}

impl Default for HTransformConfig {
    fn default() -> Self {
        Self {
            h: 0.7,
            flood_iterations: 50,
            merge_iterations: 50,
        }
    }
}

impl HTransformConfig {
    /// Instantiate the engine for `strategy`.
    pub fn engine(&self, strategy: Strategy, connectivity: Connectivity) -> Box<dyn HTransform> {
        match strategy {
            Strategy::NeighborFlood => Box::new(NeighborFlood::new(
                self.h,
                self.flood_iterations,
                connectivity,
            )),
            Strategy::RegionMerge => Box::new(RegionMerge::new(
                self.h,
                self.merge_iterations,
                connectivity,
            )),
            Strategy::FloodThenMerge => Box::new(FloodThenMerge::new(
                self.h,
                self.flood_iterations,
                self.merge_iterations,
                connectivity,
            )),
        }
    }
}

/// Configuration of [`crate::BubblePipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Voxels at or above this value are ionized.
    pub ionized_threshold: f64,
    /// Replace every value `v` by `1 - v` before thresholding.
    pub invert: bool,
    /// Ionized components smaller than this are dropped before segmentation.
    pub min_object_size: usize,
    pub connectivity: Connectivity,
    pub smoothing: Smoothing,
    pub hmax: HTransformConfig,
    pub binning: Binning,
    /// Escalate an unconverged region merge into an error.
    pub require_convergence: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ionized_threshold: 1.0,
            invert: false,
            min_object_size: 3,
            connectivity: Connectivity::Edge,
            smoothing: Smoothing::default(),
            hmax: HTransformConfig::default(),
            binning: Binning::default(),
            require_convergence: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.ionized_threshold.is_finite() {
            return Err(SegmentError::invalid("ionized_threshold must be finite"));
        }
        if !self.hmax.h.is_finite() || self.hmax.h < 0.0 {
            return Err(SegmentError::invalid(format!(
                "hmax.h must be finite and non-negative, got {}",
                self.hmax.h
            )));
        }
        if self.hmax.flood_iterations == 0 || self.hmax.merge_iterations == 0 {
            return Err(SegmentError::invalid("hmax iteration budgets must be at least 1"));
        }
        if self.binning.bins() == 0 {
            return Err(SegmentError::invalid("binning needs at least 1 bin"));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.hmax.h, 0.7);
        assert_eq!(config.hmax.flood_iterations, 50);
        assert_eq!(config.min_object_size, 3);
        assert_eq!(config.connectivity, Connectivity::Edge);
        assert_eq!(
            config.smoothing,
            Smoothing::HMax {
                strategy: Strategy::FloodThenMerge
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "smoothing": { "mode": "hmax", "strategy": "region_merge" }, "hmax": { "h": 0.5 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.hmax.h, 0.5);
        assert_eq!(config.hmax.merge_iterations, 50);
        assert_eq!(
            config.smoothing,
            Smoothing::HMax {
                strategy: Strategy::RegionMerge
            }
        );

        let dilation: PipelineConfig =
            serde_json::from_str(r#"{ "smoothing": { "mode": "dilation" } }"#).unwrap();
        assert_eq!(dilation.smoothing, Smoothing::Dilation);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let negative_h = PipelineConfig {
            hmax: HTransformConfig {
                h: -1.0,
                ..HTransformConfig::default()
            },
            ..PipelineConfig::default()
        };
        assert!(negative_h.validate().is_err());

        let no_budget = PipelineConfig {
            hmax: HTransformConfig {
                merge_iterations: 0,
                ..HTransformConfig::default()
            },
            ..PipelineConfig::default()
        };
        assert!(no_budget.validate().is_err());

        let nan_threshold = PipelineConfig {
            ionized_threshold: f64::NAN,
            ..PipelineConfig::default()
        };
        assert!(nan_threshold.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let config = PipelineConfig {
            invert: true,
            smoothing: Smoothing::None,
            ..PipelineConfig::default()
        };

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = PipelineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
