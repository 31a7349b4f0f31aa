//! Image persistence trait and metadata schema.
//!
//! The persistence layer is an external collaborator: the orchestrator hands
//! it a path, the captured frame, and unit-tagged spatial metadata, and the
//! implementation decides the on-disk format (OME-TIFF in the production
//! system).

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::traits::camera::Image;

/// Per-plane position metadata, in fixed-point micrometers.
///
/// Every spatial field carries an explicit unit tag so downstream readers
/// never have to guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlanePosition {
    /// X position in micrometers.
    pub position_x: i64,
    /// Y position in micrometers.
    pub position_y: i64,
    /// Z position in micrometers.
    pub position_z: i64,
    /// Unit tag for X, always `"µm"`.
    pub position_x_unit: String,
    /// Unit tag for Y, always `"µm"`.
    pub position_y_unit: String,
    /// Unit tag for Z, always `"µm"`.
    pub position_z_unit: String,
}

impl PlanePosition {
    /// Build a unit-tagged plane position from micrometer integers.
    pub fn micrometers(x: i64, y: i64, z: i64) -> Self {
        Self {
            position_x: x,
            position_y: y,
            position_z: z,
            position_x_unit: "µm".to_string(),
            position_y_unit: "µm".to_string(),
            position_z_unit: "µm".to_string(),
        }
    }
}

/// Metadata embedded in a persisted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Axis order of the pixel data, e.g. `"YX"`.
    pub axes: String,
    /// Plane spacing along Z, in micrometers.
    pub spacing: f64,
    /// Unit tag for the spacing field.
    pub unit: String,
    /// Stage position of this plane; absent for sequential burst frames.
    #[serde(rename = "Plane", skip_serializing_if = "Option::is_none")]
    pub plane: Option<PlanePosition>,
}

/// Image persistence capability.
#[async_trait]
pub trait ImageWriter: Send + Sync {
    /// Write one image to `path`. An existing file at the same path is
    /// silently overwritten.
    ///
    /// # Errors
    /// - Filesystem or format errors from the backing store
    async fn write(&self, path: &Path, image: &Image, metadata: Option<&ImageMetadata>)
        -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_position_serializes_with_unit_tags() {
        let plane = PlanePosition::micrometers(4000, 0, 8000);
        let json = serde_json::to_value(&plane).expect("serialize");
        assert_eq!(json["PositionX"], 4000);
        assert_eq!(json["PositionZ"], 8000);
        assert_eq!(json["PositionYUnit"], "µm");
    }

    #[test]
    fn test_metadata_omits_absent_plane() {
        let metadata = ImageMetadata {
            axes: "YX".to_string(),
            spacing: 20.0,
            unit: "µm".to_string(),
            plane: None,
        };
        let json = serde_json::to_value(&metadata).expect("serialize");
        assert!(json.get("Plane").is_none());
        assert_eq!(json["unit"], "µm");
    }
}
