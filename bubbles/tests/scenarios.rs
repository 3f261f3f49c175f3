//! Reference scenarios for the H-transform and watershed chain

mod common;

use bubbles::{
    find_local_maxima, Connectivity, FloodThenMerge, HTransform, NeighborFlood, RegionMerge,
    SegmentError, WatershedSegmenter,
};
use common::{count_true, full_mask, init_logging};
use ndarray::Array3;
use test_helpers::synthetic::{corner_peaks, single_peak_cube};

fn engines(h: f64) -> Vec<(&'static str, Box<dyn HTransform>)> {
    let flood: Box<dyn HTransform> = Box::new(NeighborFlood::new(h, 50, Connectivity::Edge));
    let merge: Box<dyn HTransform> = Box::new(RegionMerge::new(h, 50, Connectivity::Edge));
    let hybrid: Box<dyn HTransform> =
        Box::new(FloodThenMerge::new(h, 50, 50, Connectivity::Edge));
    vec![("flood", flood), ("merge", merge), ("hybrid", hybrid)]
}

#[test]
fn test_single_central_peak() {
    init_logging();
    let field = single_peak_cube(5, 10.0, 1.0);
    let mask = full_mask(field.dim());

    for (name, engine) in engines(0.7) {
        let output = engine.transform(&field.view(), &mask.view()).unwrap();
        assert_eq!(output.field, field, "{name}");
        assert!(output.converged, "{name}");
        assert_eq!(count_true(&output.maxima), 1, "{name}");
        assert!(output.maxima[[2, 2, 2]], "{name}");

        let segmentation = WatershedSegmenter::new(Connectivity::Edge)
            .segment(&field.view(), &output.field.view(), &mask.view())
            .unwrap();
        assert_eq!(segmentation.region_count(), 1, "{name}");
        assert_eq!(segmentation.labels.iter().filter(|&&l| l == 1).count(), 125);
        assert_eq!(segmentation.filling_fraction, 1.0);
    }
}

#[test]
fn test_two_opposite_corner_peaks() {
    init_logging();
    let field = corner_peaks(10, 10.0, 1.0);
    let mask = full_mask(field.dim());

    for (name, engine) in engines(0.5) {
        let output = engine.transform(&field.view(), &mask.view()).unwrap();
        assert_eq!(count_true(&output.maxima), 2, "{name}");
        assert!(
            output.maxima[[0, 0, 0]] && output.maxima[[9, 9, 9]],
            "{name}"
        );

        let segmentation = WatershedSegmenter::new(Connectivity::Edge)
            .segment(&field.view(), &output.field.view(), &mask.view())
            .unwrap();
        assert_eq!(segmentation.region_count(), 2, "{name}");

        let first = segmentation.labels.iter().filter(|&&l| l == 1).count();
        let second = segmentation.labels.iter().filter(|&&l| l == 2).count();
        assert_eq!(first + second, 1000);
        assert!((350..=650).contains(&first), "{name}: {first} / {second}");
        assert_eq!(segmentation.labels[[0, 0, 0]], 1);
        assert_eq!(segmentation.labels[[9, 9, 9]], 2);
    }
}

#[test]
fn test_empty_mask_is_rejected_everywhere() {
    let field = single_peak_cube(5, 10.0, 1.0);
    let mask = Array3::from_elem(field.dim(), false);

    assert!(matches!(
        find_local_maxima(&field.view(), &mask.view(), Connectivity::Edge),
        Err(SegmentError::InvalidInput(_))
    ));
    for (name, engine) in engines(0.7) {
        assert!(
            matches!(
                engine.transform(&field.view(), &mask.view()),
                Err(SegmentError::InvalidInput(_))
            ),
            "{name}"
        );
    }
    assert!(matches!(
        WatershedSegmenter::default().segment(&field.view(), &field.view(), &mask.view()),
        Err(SegmentError::InvalidInput(_))
    ));
}

#[test]
fn test_negative_height_is_rejected() {
    let field = single_peak_cube(3, 2.0, 1.0);
    let mask = full_mask(field.dim());
    for (name, engine) in engines(-0.1) {
        assert!(
            matches!(
                engine.transform(&field.view(), &mask.view()),
                Err(SegmentError::InvalidInput(_))
            ),
            "{name}"
        );
    }
}
