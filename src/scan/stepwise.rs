//! Stepwise serpentine scan: the 3-axis step-settle-capture orchestrator.
//!
//! Walks the voxel grid with Z outer, X middle, and Y inner, reversing the
//! inner axis on odd X rows so the fast axis never flies back across its
//! whole travel. Every voxel is captured only after the inner axis settles;
//! the outer and middle axes are re-verified on the first inner visit of
//! each (Z, X) cell, which guards against controller drift during the
//! previous sweep without paying the verification cost on every voxel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{ConfigError, ScanError};
use crate::persist::{VoxelCoordinate, VoxelRecord, VoxelWriter};
use crate::scan::bounds::ScanBounds;
use crate::scan::serpentine::SerpentineIter;
use crate::scan::session::{CancelToken, ScanOutcome, ScanSession, ScanStatus};
use crate::sequencer::{AxisSequencer, MoveMode};
use crate::traits::camera::{Camera, RegionOfInterest};

/// Stage velocity applied to the outer and middle axes before a scan, in
/// device units per second.
pub const DEFAULT_STAGE_VELOCITY: f64 = 1.5;

/// Which driver axis plays which role in the scan.
///
/// The defaults match the production daisy chain: the first controller
/// carries Z and the third and fourth carry X and Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageAxes {
    /// Outer-loop axis identifier.
    pub z: u8,
    /// Middle-loop axis identifier.
    pub x: u8,
    /// Inner-loop axis identifier.
    pub y: u8,
}

impl Default for StageAxes {
    fn default() -> Self {
        Self { z: 1, x: 3, y: 4 }
    }
}

/// Parameters for a stepwise serpentine scan.
#[derive(Debug, Clone)]
pub struct StepwiseScanRequest {
    /// Per-axis (start, end, step) bounds.
    pub bounds: ScanBounds,
    /// Axis role assignment on the driver chain.
    pub axes: StageAxes,
    /// Directory the voxel files are written into.
    pub output_dir: PathBuf,
    /// Camera region of interest, configured before motion begins.
    pub roi: RegionOfInterest,
    /// Optional exposure override, in milliseconds.
    pub exposure_ms: Option<f64>,
    /// Optional camera device to select before the scan.
    pub camera_device: Option<String>,
    /// Velocity applied to the outer and middle axes. The inner axis is
    /// left at the driver default, which settles faster.
    pub stage_velocity: f64,
    /// Per-settle deadline; `None` blocks indefinitely.
    pub settle_timeout: Option<Duration>,
}

impl StepwiseScanRequest {
    /// A request with production defaults for everything but the bounds
    /// and output directory.
    pub fn new(bounds: ScanBounds, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            bounds,
            axes: StageAxes::default(),
            output_dir: output_dir.into(),
            roi: RegionOfInterest::default(),
            exposure_ms: None,
            camera_device: None,
            stage_velocity: DEFAULT_STAGE_VELOCITY,
            settle_timeout: None,
        }
    }

    /// Validate before any hardware motion; rejected requests have no side
    /// effects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        if self.stage_velocity <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "stage_velocity",
                value: self.stage_velocity,
            });
        }
        if let Some(exposure) = self.exposure_ms {
            if exposure <= 0.0 {
                return Err(ConfigError::NonPositive {
                    field: "exposure_ms",
                    value: exposure,
                });
            }
        }
        Ok(())
    }
}

/// Run the scan to completion, then persist the session buffer.
///
/// Abort and cancellation paths still persist whatever was captured; the
/// outcome carries the terminal status and the persisted count.
pub(crate) async fn run(
    sequencer: &AxisSequencer,
    camera: &Arc<dyn Camera>,
    writer: &VoxelWriter,
    request: &StepwiseScanRequest,
    session: &mut ScanSession<VoxelRecord>,
    cancel: &CancelToken,
) -> ScanOutcome {
    info!(
        "stepwise scan {} started: {} voxels into {}",
        session.id(),
        request.bounds.voxel_count(),
        request.output_dir.display()
    );

    let status = match acquire(sequencer, camera, request, session, cancel).await {
        Ok(status) => status,
        Err(err) => {
            warn!("stepwise scan {} aborted: {err}", session.id());
            ScanStatus::Aborted(err.to_string())
        }
    };

    let persisted = match writer.persist(session.records(), &request.output_dir).await {
        Ok(written) => written,
        Err(err) => {
            warn!("stepwise scan {} persistence failed: {err}", session.id());
            return ScanOutcome {
                status: match status {
                    ScanStatus::Completed => ScanStatus::Aborted(err.to_string()),
                    other => other,
                },
                persisted: 0,
            };
        }
    };
    session.mark_completed();

    info!(
        "stepwise scan {} finished: {status:?}, {persisted} records persisted",
        session.id()
    );
    ScanOutcome { status, persisted }
}

async fn acquire(
    sequencer: &AxisSequencer,
    camera: &Arc<dyn Camera>,
    request: &StepwiseScanRequest,
    session: &mut ScanSession<VoxelRecord>,
    cancel: &CancelToken,
) -> Result<ScanStatus, ScanError> {
    let axes = request.axes;
    let timeout = request.settle_timeout;

    if let Some(device) = &request.camera_device {
        camera
            .set_active_device(device)
            .await
            .map_err(ScanError::camera)?;
    }
    if let Some(exposure) = request.exposure_ms {
        camera
            .set_exposure_ms(exposure)
            .await
            .map_err(ScanError::camera)?;
    }
    camera.set_roi(request.roi).await.map_err(ScanError::camera)?;

    sequencer.set_velocity(axes.z, request.stage_velocity).await?;
    sequencer.set_velocity(axes.x, request.stage_velocity).await?;

    let z_positions = request.bounds.z.positions();
    let x_positions = request.bounds.x.positions();
    let y_positions = request.bounds.y.positions();
    let z_step = request.bounds.z.step.abs();

    // Launch all three axes toward their starting values, then verify each
    // in turn. Capture must never begin before every axis has arrived.
    sequencer
        .issue_move(axes.z, z_positions[0], MoveMode::Absolute)
        .await?;
    sequencer
        .issue_move(axes.x, x_positions[0], MoveMode::Absolute)
        .await?;
    sequencer
        .issue_move(axes.y, y_positions[0], MoveMode::Absolute)
        .await?;
    sequencer.wait_settled(axes.z, timeout).await?;
    sequencer.wait_settled(axes.x, timeout).await?;
    sequencer.wait_settled(axes.y, timeout).await?;

    let mut previous: Option<(usize, usize)> = None;
    let walk = SerpentineIter::new(
        z_positions.len(),
        x_positions.len(),
        y_positions.len(),
    );
    for point in walk {
        if cancel.is_cancelled() {
            info!("stepwise scan {} cancelled at voxel {}", session.id(), session.len());
            return Ok(ScanStatus::Cancelled);
        }

        let z_changed = previous.map_or(true, |(z, _)| z != point.z);
        let x_changed = z_changed || previous.map_or(true, |(_, x)| x != point.x);
        if z_changed {
            sequencer
                .issue_move(axes.z, z_positions[point.z], MoveMode::Absolute)
                .await?;
        }
        if x_changed {
            debug!("entering cell z={} x={}", point.z, point.x);
            sequencer
                .issue_move(axes.x, x_positions[point.x], MoveMode::Absolute)
                .await?;
        }

        sequencer
            .move_and_settle(axes.y, y_positions[point.y], MoveMode::Absolute, timeout)
            .await?;
        if point.row_start {
            sequencer.wait_settled(axes.z, timeout).await?;
            sequencer.wait_settled(axes.x, timeout).await?;
        }

        let image = camera.snap().await.map_err(ScanError::camera)?;
        session.push(VoxelRecord {
            coordinate: VoxelCoordinate {
                x: x_positions[point.x],
                y: y_positions[point.y],
                z: z_positions[point.z],
            },
            image,
            z_step,
        });
        previous = Some((point.z, point.x));
    }

    Ok(ScanStatus::Completed)
}
