//! Box readers and JSON archives.
//!
//! Raw boxes are flat little-endian `f32` dumps in `[z, y, x]` order, the
//! layout written by 21cmFAST. Everything else round-trips through
//! `serde_json` using ndarray's serde support.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};
use crate::pipeline::PipelineOutput;

/// Read a raw little-endian `f32` box of shape `dims`.
pub fn read_raw_box<P: AsRef<Path>>(path: P, dims: [usize; 3]) -> Result<Array3<f64>> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    let expected = dims.iter().product::<usize>() * 4;
    if bytes.len() != expected {
        return Err(SegmentError::invalid(format!(
            "{} holds {} bytes, expected {} for a {:?} f32 box",
            path.display(),
            bytes.len(),
            expected,
            dims
        )));
    }

    let values = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64)
        .collect();
    debug!("read {:?} box from {}", dims, path.display());
    Ok(Array3::from_shape_vec((dims[0], dims[1], dims[2]), values)?)
}

/// Write a box as raw little-endian `f32`.
pub fn write_raw_box<P: AsRef<Path>>(path: P, field: &ArrayView3<f64>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for &value in field.iter() {
        writer.write_all(&(value as f32).to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn load_json<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// A field with an optional explicit mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldArchive {
    pub field: Array3<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Array3<bool>>,
}

impl FieldArchive {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_json(self, path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let archive: Self = load_json(path)?;
        if let Some(mask) = &archive.mask {
            if mask.shape() != archive.field.shape() {
                return Err(SegmentError::invalid(format!(
                    "archived mask shape {:?} does not match field shape {:?}",
                    mask.shape(),
                    archive.field.shape()
                )));
            }
        }
        Ok(archive)
    }
}

/// Segmentation products kept for later statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationArchive {
    pub labels: Array3<u32>,
    pub markers: Array3<u32>,
    pub distance: Array3<f64>,
    pub filling_fraction: f64,
    /// Length of one voxel edge.
    pub scale: f64,
}

impl SegmentationArchive {
    pub fn from_output(output: PipelineOutput, scale: f64) -> Self {
        Self {
            labels: output.labels,
            markers: output.markers,
            distance: output.distance,
            filling_fraction: output.filling_fraction,
            scale,
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_json(self, path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_raw_box_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("box.raw");
        let field = Array3::from_shape_fn((2, 3, 4), |(z, y, x)| (z * 12 + y * 4 + x) as f64 * 0.5);
        write_raw_box(&path, &field.view()).unwrap();

        let loaded = read_raw_box(&path, [2, 3, 4]).unwrap();
        assert_eq!(loaded, field);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 96);
    }

    #[test]
    fn test_raw_box_size_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.raw");
        std::fs::write(&path, [0u8; 10]).unwrap();
        assert!(matches!(
            read_raw_box(&path, [2, 2, 2]),
            Err(SegmentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_field_archive_mask_shape_checked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("field.json");
        let archive = FieldArchive {
            field: Array3::zeros((2, 2, 2)),
            mask: Some(Array3::from_elem((2, 2, 1), true)),
        };
        archive.save_to_file(&path).unwrap();
        assert!(FieldArchive::load_from_file(&path).is_err());

        let unmasked = FieldArchive {
            field: Array3::zeros((2, 2, 2)),
            mask: None,
        };
        unmasked.save_to_file(&path).unwrap();
        assert_eq!(FieldArchive::load_from_file(&path).unwrap(), unmasked);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            SegmentationArchive::load_from_file(dir.path().join("missing.json")),
            Err(SegmentError::Io(_))
        ));
    }
}
