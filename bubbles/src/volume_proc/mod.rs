//! Volume processing algorithms for bubble segmentation.
//!
//! # Module Organization
//!
//! - **grid**: shape bookkeeping and flat-index conversion
//! - **neighborhood**: connectivity and mirror-boundary neighbour tables
//! - **labeling**: connected components and region arenas
//! - **morphology**: dilation, maximum filter, small-object removal
//! - **distance**: exact Euclidean distance transform
//! - **maxima**: local maxima within a mask
//! - **hmax**: H-maximum transform strategies
//! - **watershed**: seeded priority-flood segmentation
//!
//! Internally every algorithm works on row-major flat slices; the public
//! functions accept and return `ndarray` volumes.

pub mod distance;
pub mod grid;
pub mod hmax;
pub mod labeling;
pub mod maxima;
pub mod morphology;
pub mod neighborhood;
pub mod watershed;

pub use distance::euclidean_distance_transform;
pub use grid::Grid;
pub use hmax::{FloodThenMerge, HTransform, HTransformOutput, NeighborFlood, RegionMerge};
pub use labeling::{label_components, LabeledVolume, RegionArena};
pub use maxima::find_local_maxima;
pub use morphology::{binary_dilation, maximum_filter, remove_small_objects};
pub use neighborhood::{Connectivity, Neighborhood};
pub use watershed::{priority_flood, WatershedSegmentation, WatershedSegmenter};
