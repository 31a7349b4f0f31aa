//! Swept scan: discrete sweep-axis stepping between captures.
//!
//! A slower sibling of the burst mode: instead of a hardware-clocked
//! waveform, the sweep actuator is stepped through evenly spaced voltages
//! with immediate single-sample writes, one capture per step. Gains exact
//! per-frame sweep positions at the cost of throughput; frames are still
//! persisted as an untagged sequential series.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::error::{ConfigError, ScanError};
use crate::persist::VoxelWriter;
use crate::scan::bounds::{linspace, DepthSpan};
use crate::scan::session::{CancelToken, ScanOutcome, ScanSession, ScanStatus};
use crate::sequencer::{AxisSequencer, MoveMode};
use crate::traits::camera::{Camera, Image};
use crate::traits::waveform::WaveformOutput;

/// Parameters for a swept (galvo-stepped) scan.
#[derive(Debug, Clone)]
pub struct SweptScanRequest {
    /// Depth planes to step through.
    pub depth: DepthSpan,
    /// First sweep voltage.
    pub sweep_start: f64,
    /// Last sweep voltage.
    pub sweep_stop: f64,
    /// Number of sweep steps per plane, at least one.
    pub sweep_count: usize,
    /// Directory the frame series is written into.
    pub output_dir: PathBuf,
    /// Depth axis identifier on the driver chain.
    pub depth_axis: u8,
    /// Analog output range, in volts.
    pub output_range_volts: (f64, f64),
    /// Per-settle deadline for the depth axis; `None` blocks indefinitely.
    pub settle_timeout: Option<Duration>,
}

impl SweptScanRequest {
    /// A request with production defaults for the depth axis and output
    /// range.
    pub fn new(
        depth: DepthSpan,
        sweep_start: f64,
        sweep_stop: f64,
        sweep_count: usize,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            depth,
            sweep_start,
            sweep_stop,
            sweep_count,
            output_dir: output_dir.into(),
            depth_axis: 1,
            output_range_volts: crate::scan::burst::DEFAULT_OUTPUT_RANGE,
            settle_timeout: None,
        }
    }

    /// Validate before any hardware is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.depth.validate()?;
        if self.sweep_count == 0 {
            return Err(ConfigError::ZeroCount {
                field: "sweep_count",
            });
        }
        if !(self.sweep_start.is_finite() && self.sweep_stop.is_finite()) {
            return Err(ConfigError::InvalidBounds {
                axis: "sweep",
                reason: "bounds must be finite".to_string(),
            });
        }
        Ok(())
    }
}

/// Run the swept scan, release the output channel, then persist the frame
/// series (numbered from 1, matching the production file layout for this
/// mode).
pub(crate) async fn run(
    sequencer: &AxisSequencer,
    camera: &Arc<dyn Camera>,
    waveform: &Arc<dyn WaveformOutput>,
    writer: &VoxelWriter,
    request: &SweptScanRequest,
    session: &mut ScanSession<Image>,
    cancel: &CancelToken,
) -> ScanOutcome {
    info!(
        "swept scan {} started: {} planes x {} steps into {}",
        session.id(),
        request.depth.plane_count,
        request.sweep_count,
        request.output_dir.display()
    );

    let status = match acquire(sequencer, camera, waveform, request, session, cancel).await {
        Ok(status) => status,
        Err(err) => {
            warn!("swept scan {} aborted: {err}", session.id());
            ScanStatus::Aborted(err.to_string())
        }
    };

    if let Err(err) = waveform.stop().await {
        warn!("failed to stop sweep output: {err:#}");
    }
    if let Err(err) = waveform.clear().await {
        warn!("failed to clear sweep output: {err:#}");
    }

    let persisted = match writer
        .persist_sequence(session.records(), &request.output_dir, 1)
        .await
    {
        Ok(written) => written,
        Err(err) => {
            warn!("swept scan {} persistence failed: {err}", session.id());
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
        "swept scan {} finished: {status:?}, {persisted} frames persisted",
        session.id()
    );
    ScanOutcome { status, persisted }
}

async fn acquire(
    sequencer: &AxisSequencer,
    camera: &Arc<dyn Camera>,
    waveform: &Arc<dyn WaveformOutput>,
    request: &SweptScanRequest,
    session: &mut ScanSession<Image>,
    cancel: &CancelToken,
) -> Result<ScanStatus, ScanError> {
    let (min_volts, max_volts) = request.output_range_volts;
    waveform
        .configure_channel(min_volts, max_volts, None)
        .await
        .map_err(ScanError::waveform)?;

    let sweep_values = linspace(request.sweep_start, request.sweep_stop, request.sweep_count);

    for plane in request.depth.positions() {
        sequencer
            .move_and_settle(
                request.depth_axis,
                plane,
                MoveMode::Absolute,
                request.settle_timeout,
            )
            .await?;

        for value in &sweep_values {
            if cancel.is_cancelled() {
                info!("swept scan {} cancelled at frame {}", session.id(), session.len());
                return Ok(ScanStatus::Cancelled);
            }
            waveform
                .write_sample(*value)
                .await
                .map_err(ScanError::waveform)?;
            let image = camera.snap().await.map_err(ScanError::camera)?;
            session.push(image);
        }
    }

    Ok(ScanStatus::Completed)
}
