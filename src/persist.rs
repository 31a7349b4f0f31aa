//! Voxel record assembly and persistence.
//!
//! Converts buffered (position, image) tuples into per-voxel files with
//! embedded spatial metadata. Coordinates are converted from millimeters to
//! fixed-point micrometer integers and baked into the file name, so
//! re-running an identical scan produces identically named outputs. An
//! existing file at the same name is silently overwritten.
//!
//! A failed write is reported per file and does not stop the remaining
//! records from being written.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::error::PersistError;
use crate::traits::camera::Image;
use crate::traits::writer::{ImageMetadata, ImageWriter, PlanePosition};

/// One voxel position in device units (millimeters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelCoordinate {
    /// Middle-axis position.
    pub x: f64,
    /// Inner-axis position.
    pub y: f64,
    /// Outer-axis position.
    pub z: f64,
}

/// A captured image tagged with the stage position it was taken at.
///
/// Created at capture time and immutable afterward; owned by the session
/// buffer until persisted.
#[derive(Debug, Clone)]
pub struct VoxelRecord {
    /// Stage position actually reached for this capture.
    pub coordinate: VoxelCoordinate,
    /// The captured frame.
    pub image: Image,
    /// Spacing between adjacent Z planes, in millimeters.
    pub z_step: f64,
}

/// Millimeters to fixed-point micrometers.
pub fn to_micrometers(millimeters: f64) -> i64 {
    (millimeters * 1000.0).round() as i64
}

/// Deterministic voxel file name from micrometer coordinates.
pub fn voxel_file_name(z_um: i64, x_um: i64, y_um: i64) -> String {
    format!("Z{z_um}_X{x_um}_Y{y_um}.ome.tif")
}

/// Streams session buffers to the image persistence layer.
pub struct VoxelWriter {
    writer: Arc<dyn ImageWriter>,
}

impl VoxelWriter {
    /// Wrap a persistence backend.
    pub fn new(writer: Arc<dyn ImageWriter>) -> Self {
        Self { writer }
    }

    /// Persist spatially tagged voxel records into `directory`.
    ///
    /// Returns the number of records successfully written. Individual write
    /// failures are logged and skipped.
    ///
    /// # Errors
    /// [`PersistError::CreateDir`] when the output directory cannot be
    /// created; per-record failures do not error out.
    pub async fn persist(
        &self,
        records: &[VoxelRecord],
        directory: &Path,
    ) -> Result<usize, PersistError> {
        ensure_directory(directory)?;
        let mut written = 0;
        for record in records {
            let x_um = to_micrometers(record.coordinate.x);
            let y_um = to_micrometers(record.coordinate.y);
            let z_um = to_micrometers(record.coordinate.z);
            let path = directory.join(voxel_file_name(z_um, x_um, y_um));
            let metadata = ImageMetadata {
                axes: "YX".to_string(),
                spacing: record.z_step * 1000.0,
                unit: "µm".to_string(),
                plane: Some(PlanePosition::micrometers(x_um, y_um, z_um)),
            };
            match self.writer.write(&path, &record.image, Some(&metadata)).await {
                Ok(()) => written += 1,
                Err(err) => warn!("failed to write {}: {err:#}", path.display()),
            }
        }
        info!(
            "persisted {written}/{} voxel records to {}",
            records.len(),
            directory.display()
        );
        Ok(written)
    }

    /// Persist an untagged image series as `{index}.tif`, numbering from
    /// `first_index`.
    ///
    /// # Errors
    /// [`PersistError::CreateDir`] when the output directory cannot be
    /// created; per-image failures do not error out.
    pub async fn persist_sequence(
        &self,
        images: &[Image],
        directory: &Path,
        first_index: usize,
    ) -> Result<usize, PersistError> {
        ensure_directory(directory)?;
        let mut written = 0;
        for (offset, image) in images.iter().enumerate() {
            let path = directory.join(format!("{}.tif", first_index + offset));
            match self.writer.write(&path, image, None).await {
                Ok(()) => written += 1,
                Err(err) => warn!("failed to write {}: {err:#}", path.display()),
            }
        }
        info!(
            "persisted {written}/{} frames to {}",
            images.len(),
            directory.display()
        );
        Ok(written)
    }
}

fn ensure_directory(directory: &Path) -> Result<(), PersistError> {
    std::fs::create_dir_all(directory).map_err(|source| PersistError::CreateDir {
        path: PathBuf::from(directory),
        source,
    })
}
