//! End-to-end bubble segmentation of an ionization box.
//!
//! Stages, in order:
//! 1. optional inversion `v -> 1 - v` and thresholding into an ionized mask
//! 2. filling fraction from the raw mask
//! 3. removal of small ionized components (face connectivity)
//! 4. Euclidean distance transform of the cleaned mask
//! 5. smoothing of the distance field (H-transform, dilation or none)
//! 6. seeded watershed of the negated distance field

use log::{debug, info};
use ndarray::{Array3, ArrayView3};

use crate::config::{PipelineConfig, Smoothing};
use crate::error::{Result, SegmentError};
use crate::stats::{size_distribution, Binning, SizeDistribution};
use crate::volume_proc::grid::{flatten, validate_mask, volume_from_vec, Grid};
use crate::volume_proc::labeling::label_flat;
use crate::volume_proc::maxima::local_maxima_flat;
use crate::volume_proc::morphology::dilate_flat;
use crate::volume_proc::{
    euclidean_distance_transform, remove_small_objects, Connectivity, Neighborhood,
    WatershedSegmentation, WatershedSegmenter,
};

/// Segmentation products of one box.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub labels: Array3<u32>,
    pub markers: Array3<u32>,
    pub distance: Array3<f64>,
    /// Ionized fraction of the box before small-object removal.
    pub filling_fraction: f64,
}

impl PipelineOutput {
    pub fn region_count(&self) -> usize {
        self.labels.iter().copied().max().unwrap_or(0) as usize
    }

    /// Size distribution of the labeled regions; `scale` is length per voxel.
    pub fn size_distribution(&self, scale: f64, binning: Binning) -> Result<SizeDistribution> {
        size_distribution(&self.labels.view(), self.filling_fraction, scale, binning)
    }
}

/// Batch segmentation driver.
#[derive(Debug, Clone)]
pub struct BubblePipeline {
    config: PipelineConfig,
}

impl BubblePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Voxels counted as ionized, after the optional inversion.
    pub fn ionized_mask(&self, field: &ArrayView3<f64>) -> Array3<bool> {
        let threshold = self.config.ionized_threshold;
        if self.config.invert {
            field.mapv(|v| 1.0 - v >= threshold)
        } else {
            field.mapv(|v| v >= threshold)
        }
    }

    /// Threshold `field` and segment the ionized voxels.
    pub fn run(&self, field: &ArrayView3<f64>) -> Result<PipelineOutput> {
        self.segment_mask(&self.ionized_mask(field).view())
    }

    /// Like [`Self::run`], restricted to the voxels where `region` is set.
    pub fn run_masked(
        &self,
        field: &ArrayView3<f64>,
        region: &ArrayView3<bool>,
    ) -> Result<PipelineOutput> {
        if field.shape() != region.shape() {
            return Err(SegmentError::invalid(format!(
                "mask shape {:?} does not match field shape {:?}",
                region.shape(),
                field.shape()
            )));
        }
        let mut ionized = self.ionized_mask(field);
        ionized.zip_mut_with(region, |v, &inside| *v &= inside);
        self.segment_mask(&ionized.view())
    }

    /// Segment an already thresholded ionized mask.
    pub fn segment_mask(&self, ionized: &ArrayView3<bool>) -> Result<PipelineOutput> {
        let config = &self.config;
        let ionized_count = validate_mask(ionized)?;
        let filling_fraction = ionized_count as f64 / ionized.len() as f64;
        info!(
            "Box {:?}: {} ionized voxels, filling fraction {:.4}",
            ionized.shape(),
            ionized_count,
            filling_fraction
        );

        let mask = remove_small_objects(ionized, config.min_object_size, Connectivity::Face)?;
        let distance = euclidean_distance_transform(&mask.view())?;
        info!("Distance transform done");

        let segmenter = WatershedSegmenter::new(config.connectivity);
        let segmentation = match config.smoothing {
            Smoothing::HMax { strategy } => {
                let engine = config.hmax.engine(strategy, config.connectivity);
                let mut smoothed = engine.transform(&distance.view(), &mask.view())?;
                if config.require_convergence {
                    smoothed = smoothed.require_convergence()?;
                }
                info!(
                    "H-transform ({:?}, h = {}) finished after {} iterations",
                    strategy, config.hmax.h, smoothed.iterations
                );
                segmenter.segment(&distance.view(), &smoothed.field.view(), &mask.view())?
            }
            Smoothing::Dilation => {
                let maxima = dilate_maxima(&distance.view(), &mask.view(), config.connectivity)?;
                segmenter.segment_from_maxima(&distance.view(), &maxima.view(), &mask.view())?
            }
            Smoothing::None => {
                segmenter.segment(&distance.view(), &distance.view(), &mask.view())?
            }
        };

        let WatershedSegmentation {
            labels,
            markers,
            distance,
            ..
        } = segmentation;
        let output = PipelineOutput {
            labels,
            markers,
            distance,
            filling_fraction,
        };
        info!("Watershed produced {} regions", output.region_count());
        Ok(output)
    }
}

/// Grow the raw maxima of `distance` inside `mask` one dilation step at a
/// time until the number of connected maxima regions stops changing.
fn dilate_maxima(
    distance: &ArrayView3<f64>,
    mask: &ArrayView3<bool>,
    connectivity: Connectivity,
) -> Result<Array3<bool>> {
    let grid = Grid::of(distance);
    let neighborhood = Neighborhood::new(grid, connectivity);
    let mask = flatten(mask);
    let mut maxima = local_maxima_flat(&flatten(distance), &mask, &neighborhood);

    let mut previous = 0;
    loop {
        maxima = dilate_flat(&maxima, &neighborhood)
            .into_iter()
            .zip(&mask)
            .map(|(grown, &inside)| grown && inside)
            .collect();
        let (_, regions) = label_flat(&maxima, &neighborhood);
        debug!("dilation smoothing: {regions} regions");
        if regions == previous {
            break;
        }
        previous = regions;
    }
    volume_from_vec(grid, maxima)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;

    fn two_spheres() -> Array3<f64> {
        let centres = [[6.0, 6.0, 6.0], [6.0, 6.0, 15.0]];
        Array3::from_shape_fn((12, 12, 22), |(z, y, x)| {
            let p = [z as f64, y as f64, x as f64];
            let inside = centres.iter().any(|c| {
                let d2: f64 = p.iter().zip(c).map(|(a, b)| (a - b) * (a - b)).sum();
                d2 <= 16.0
            });
            if inside {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_two_spheres_every_mode() {
        let _ = env_logger::builder().is_test(true).try_init();
        let field = two_spheres();
        for smoothing in [
            Smoothing::HMax {
                strategy: Strategy::FloodThenMerge,
            },
            Smoothing::HMax {
                strategy: Strategy::NeighborFlood,
            },
            Smoothing::HMax {
                strategy: Strategy::RegionMerge,
            },
            Smoothing::Dilation,
            Smoothing::None,
        ] {
            let config = PipelineConfig {
                smoothing,
                ..PipelineConfig::default()
            };
            let pipeline = BubblePipeline::new(config).unwrap();
            let output = pipeline.run(&field.view()).unwrap();
            assert_eq!(output.region_count(), 2, "{smoothing:?}");
            let ionized = field.iter().filter(|&&v| v >= 1.0).count();
            assert_eq!(output.labels.iter().filter(|&&l| l > 0).count(), ionized);
            assert!((output.filling_fraction - ionized as f64 / field.len() as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn test_inversion() {
        let field = two_spheres().mapv(|v| 1.0 - v);
        let config = PipelineConfig {
            invert: true,
            ..PipelineConfig::default()
        };
        let pipeline = BubblePipeline::new(config).unwrap();
        let output = pipeline.run(&field.view()).unwrap();
        assert_eq!(output.region_count(), 2);
    }

    #[test]
    fn test_no_ionized_voxels() {
        let field = Array3::<f64>::zeros((4, 4, 4));
        let pipeline = BubblePipeline::new(PipelineConfig::default()).unwrap();
        assert!(matches!(
            pipeline.run(&field.view()),
            Err(SegmentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fully_ionized_box_is_one_region() {
        let pipeline = BubblePipeline::new(PipelineConfig::default()).unwrap();
        for dims in [(5, 5, 5), (4, 6, 8)] {
            let field = Array3::from_elem(dims, 1.0);
            let output = pipeline.run(&field.view()).unwrap();
            assert_eq!(output.region_count(), 1, "{dims:?}");
            assert!(output.labels.iter().all(|&l| l == 1), "{dims:?}");
            assert_eq!(output.filling_fraction, 1.0);
            assert!(output.distance.iter().all(|&d| d >= 1.0));
        }
    }

    #[test]
    fn test_run_masked_drops_outside_voxels() {
        let field = two_spheres();
        let mut region = Array3::from_elem(field.dim(), true);
        region.slice_mut(ndarray::s![.., .., 11..]).fill(false);
        let pipeline = BubblePipeline::new(PipelineConfig::default()).unwrap();

        let output = pipeline.run_masked(&field.view(), &region.view()).unwrap();
        assert_eq!(output.region_count(), 1);
        let outside = output.labels.slice(ndarray::s![.., .., 11..]);
        assert!(outside.iter().all(|&l| l == 0));

        let wrong = Array3::from_elem((2, 2, 2), true);
        assert!(pipeline.run_masked(&field.view(), &wrong.view()).is_err());
    }

    #[test]
    fn test_small_objects_do_not_count_as_regions() {
        let mut field = two_spheres();
        field[[0, 0, 0]] = 1.0;
        let output = BubblePipeline::new(PipelineConfig::default())
            .unwrap()
            .run(&field.view())
            .unwrap();
        assert_eq!(output.region_count(), 2);
        assert_eq!(output.labels[[0, 0, 0]], 0);
    }
}
