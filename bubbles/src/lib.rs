//! Ionized-bubble segmentation for reionization simulation boxes.
//!
//! This crate turns a 3-D (or 2-D) ionization field into a partition of its
//! ionized region into bubbles and derives the bubble size distribution.
//! The processing chain follows the usual H-maximum / watershed recipe:
//!
//! - **volume_proc**: grid bookkeeping, neighbourhoods, labeling, morphology,
//!   distance transform, maxima detection, H-transform and watershed
//! - **stats**: region size distribution and density histograms
//! - **pipeline**: end-to-end batch flow from a raw box to labels
//! - **io**: raw box readers and JSON archives
//! - **config**: serializable pipeline configuration
//!
//! All arrays are `ndarray::Array3` indexed `[z, y, x]`. Planar images are
//! carried as volumes of depth 1.

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod stats;
pub mod volume_proc;

pub use config::{HTransformConfig, PipelineConfig, Smoothing, Strategy};
pub use error::{Result, SegmentError};
pub use io::{read_raw_box, write_raw_box, FieldArchive, SegmentationArchive};
pub use pipeline::{BubblePipeline, PipelineOutput};
pub use stats::size_distribution::{region_radii, size_distribution, Binning, SizeDistribution};
pub use volume_proc::{
    euclidean_distance_transform, find_local_maxima, label_components, Connectivity, FloodThenMerge,
    Grid, HTransform, HTransformOutput, LabeledVolume, NeighborFlood, Neighborhood, RegionArena,
    RegionMerge, WatershedSegmentation, WatershedSegmenter,
};
