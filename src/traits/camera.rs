//! Camera driver trait.
//!
//! Hardware-agnostic interface for single-frame acquisition. Implementations
//! handle SDK-specific details; the orchestrator only snaps frames and
//! configures the region of interest and exposure before a scan.

use anyhow::Result;
use async_trait::async_trait;

/// Region of Interest configuration, in sensor pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    /// Top-left X coordinate (pixel).
    pub x: u32,
    /// Top-left Y coordinate (pixel).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RegionOfInterest {
    /// ROI anchored at the sensor origin.
    pub fn at_origin(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

impl Default for RegionOfInterest {
    /// The scan default: a 1000x1000 window at the sensor origin.
    fn default() -> Self {
        Self::at_origin(1000, 1000)
    }
}

/// A single captured frame.
///
/// Pixel data is 16-bit monochrome, row-major, `width * height` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major pixel values.
    pub pixels: Vec<u16>,
}

/// Camera capability used by the scan controllers.
///
/// `snap` is a blocking call from the orchestrator's perspective: it
/// resolves once the frame is available.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Acquire a single frame with the current settings.
    ///
    /// # Errors
    /// - Hardware not connected
    /// - Timeout waiting for the frame
    async fn snap(&self) -> Result<Image>;

    /// Configure the region of interest for subsequent frames.
    ///
    /// # Errors
    /// - ROI out of sensor bounds
    async fn set_roi(&self, roi: RegionOfInterest) -> Result<()>;

    /// Set the exposure time in milliseconds.
    ///
    /// # Errors
    /// - Exposure outside the hardware range
    async fn set_exposure_ms(&self, exposure_ms: f64) -> Result<()>;

    /// Select which physical camera subsequent calls address, by device
    /// name. Systems with a single camera may ignore this.
    ///
    /// # Errors
    /// - Unknown device name
    async fn set_active_device(&self, name: &str) -> Result<()>;
}
