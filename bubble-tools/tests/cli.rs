use std::process::Command;

use bubbles::{write_raw_box, SegmentationArchive};
use tempfile::tempdir;
use test_helpers::synthetic::{bubble_box, Bubble};

fn two_bubble_box() -> ndarray::Array3<f64> {
    bubble_box(
        (16, 16, 28),
        &[
            Bubble::new([8.0, 8.0, 7.0], 4.5),
            Bubble::new([8.0, 8.0, 20.0], 3.5),
        ],
    )
}

#[test]
fn test_bubble_sizes_then_size_hist() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("box.raw");
    let archive = dir.path().join("segmentation.json");
    let distribution = dir.path().join("distribution.json");
    write_raw_box(&raw, &two_bubble_box().view()).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_bubble_sizes"))
        .arg(&raw)
        .args(["--dims", "16,16,28"])
        .args(["--box-size", "56"])
        .args(["--strategy", "region-merge"])
        .arg("--output")
        .arg(&archive)
        .arg("--distribution")
        .arg(&distribution)
        .status()
        .unwrap();
    assert!(status.success());

    let saved = SegmentationArchive::load_from_file(&archive).unwrap();
    assert_eq!(saved.labels.iter().copied().max(), Some(2));
    assert_eq!(saved.scale, 2.0);
    assert!(distribution.exists());

    let output = Command::new(env!("CARGO_BIN_EXE_size_hist"))
        .arg(&archive)
        .args(["--bins", "5", "--linear"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("2 regions"), "{stdout}");
}

#[test]
fn test_bubble_sizes_rejects_raw_without_dims() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("box.raw");
    write_raw_box(&raw, &two_bubble_box().view()).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_bubble_sizes"))
        .arg(&raw)
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn test_variance_table_is_normalized() {
    let dir = tempdir().unwrap();
    let table = dir.path().join("sigma.json");

    let status = Command::new(env!("CARGO_BIN_EXE_variance_table"))
        .args(["--r-min", "1", "--r-max", "20", "--count", "8"])
        .arg("--output")
        .arg(&table)
        .status()
        .unwrap();
    assert!(status.success());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&table).unwrap()).unwrap();
    let sigma: Vec<f64> = serde_json::from_value(json["sigma"].clone()).unwrap();
    let radius: Vec<f64> = serde_json::from_value(json["radius"].clone()).unwrap();
    assert_eq!(sigma.len(), 8);
    assert!((radius[0] - 1.0).abs() < 1e-12 && (radius[7] - 20.0).abs() < 1e-9);
    assert!(sigma.windows(2).all(|pair| pair[0] > pair[1]));
}
