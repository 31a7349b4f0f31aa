//! Burst scan: waveform-driven sweep with hardware-clocked triggering.
//!
//! One axis is driven open-loop by a precomputed sine buffer while a counter
//! channel paces the trigger chain; the depth axis is stepped and settled
//! between planes. The sweep axis is never polled for settlement mid-burst:
//! its motion follows the buffer, which is acceptable only because the
//! sweep amplitude and frequency are pre-validated against the actuator
//! bandwidth.
//!
//! Hardware task lifecycle: the waveform buffer is armed first, the clock
//! task starts second, and both are stopped and cleared on every exit path
//! so the device is never left armed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{ConfigError, ScanError};
use crate::persist::VoxelWriter;
use crate::scan::bounds::DepthSpan;
use crate::scan::session::{CancelToken, ScanOutcome, ScanSession, ScanStatus};
use crate::sequencer::{AxisSequencer, MoveMode};
use crate::traits::camera::{Camera, Image};
use crate::traits::waveform::{PulseGenerator, TimingMode, TriggerSource, WaveformOutput};
use crate::waveform::{generate_sine, PulseTiming};

/// Default analog output range for the sweep actuator, in volts.
pub const DEFAULT_OUTPUT_RANGE: (f64, f64) = (-10.0, 10.0);

/// Carrier multiplier: the sweep oscillates at ten times the base frequency
/// over the burst duration.
const CARRIER_MULTIPLIER: f64 = 10.0;

/// Parameters for a waveform-driven burst scan.
#[derive(Debug, Clone)]
pub struct BurstScanRequest {
    /// Depth planes to step through between bursts.
    pub depth: DepthSpan,
    /// Sweep waveform start value, in volts.
    pub sweep_start: f64,
    /// Sweep waveform end value, in volts.
    pub sweep_stop: f64,
    /// Base frequency of the sweep, in hertz.
    pub frequency: f64,
    /// Analog samples per sine period; with `frequency` this fixes the
    /// sample clock rate.
    pub samples_per_period: usize,
    /// Burst duration, in seconds.
    pub duration: f64,
    /// Hardware terminal the start trigger and sample clock are tied to.
    pub trigger_terminal: String,
    /// Directory the frame series is written into.
    pub output_dir: PathBuf,
    /// Depth axis identifier on the driver chain.
    pub depth_axis: u8,
    /// Depth axis velocity, in device units per second.
    pub depth_velocity: f64,
    /// Analog output range, in volts.
    pub output_range_volts: (f64, f64),
    /// Per-settle deadline for the depth axis; `None` blocks indefinitely.
    pub settle_timeout: Option<Duration>,
}

impl BurstScanRequest {
    /// A request with production defaults for the depth axis, velocity, and
    /// output range.
    pub fn new(
        depth: DepthSpan,
        sweep_start: f64,
        sweep_stop: f64,
        frequency: f64,
        samples_per_period: usize,
        duration: f64,
        trigger_terminal: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            depth,
            sweep_start,
            sweep_stop,
            frequency,
            samples_per_period,
            duration,
            trigger_terminal: trigger_terminal.into(),
            output_dir: output_dir.into(),
            depth_axis: 1,
            depth_velocity: crate::scan::stepwise::DEFAULT_STAGE_VELOCITY,
            output_range_volts: DEFAULT_OUTPUT_RANGE,
            settle_timeout: None,
        }
    }

    /// Sample clock rate: `samples_per_period * frequency`, in hertz.
    pub fn sample_rate(&self) -> f64 {
        self.samples_per_period as f64 * self.frequency
    }

    /// Validate before any hardware is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.depth.validate()?;
        if self.frequency <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "frequency",
                value: self.frequency,
            });
        }
        if self.samples_per_period == 0 {
            return Err(ConfigError::ZeroCount {
                field: "samples_per_period",
            });
        }
        if self.duration <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "duration",
                value: self.duration,
            });
        }
        let (min, max) = self.output_range_volts;
        if min >= max {
            return Err(ConfigError::InvalidBounds {
                axis: "sweep",
                reason: format!("output range [{min}, {max}] is empty"),
            });
        }
        Ok(())
    }
}

/// Run the burst to completion, tear down the hardware tasks, then persist
/// the frame series.
pub(crate) async fn run(
    sequencer: &AxisSequencer,
    camera: &Arc<dyn Camera>,
    waveform: &Arc<dyn WaveformOutput>,
    clock: &Arc<dyn PulseGenerator>,
    writer: &VoxelWriter,
    request: &BurstScanRequest,
    session: &mut ScanSession<Image>,
    cancel: &CancelToken,
) -> ScanOutcome {
    info!(
        "burst scan {} started: {} planes into {}",
        session.id(),
        request.depth.plane_count,
        request.output_dir.display()
    );

    let status = match acquire(sequencer, camera, waveform, clock, request, session, cancel).await
    {
        Ok(status) => status,
        Err(err) => {
            warn!("burst scan {} aborted: {err}", session.id());
            ScanStatus::Aborted(err.to_string())
        }
    };

    // The tasks must never stay armed, whatever happened above.
    teardown(waveform, clock).await;

    let persisted = match writer
        .persist_sequence(session.records(), &request.output_dir, 0)
        .await
    {
        Ok(written) => written,
        Err(err) => {
            warn!("burst scan {} persistence failed: {err}", session.id());
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
        "burst scan {} finished: {status:?}, {persisted} frames persisted",
        session.id()
    );
    ScanOutcome { status, persisted }
}

async fn acquire(
    sequencer: &AxisSequencer,
    camera: &Arc<dyn Camera>,
    waveform: &Arc<dyn WaveformOutput>,
    clock: &Arc<dyn PulseGenerator>,
    request: &BurstScanRequest,
    session: &mut ScanSession<Image>,
    cancel: &CancelToken,
) -> Result<ScanStatus, ScanError> {
    let trigger = TriggerSource::rising(&request.trigger_terminal);
    let sample_rate = request.sample_rate();
    let (min_volts, max_volts) = request.output_range_volts;

    waveform
        .configure_channel(min_volts, max_volts, Some(trigger.clone()))
        .await
        .map_err(ScanError::waveform)?;
    clock
        .configure(PulseTiming::from_sample_rate(sample_rate), Some(trigger))
        .await
        .map_err(ScanError::waveform)?;

    let sweep = generate_sine(
        request.sweep_start,
        request.sweep_stop,
        request.frequency * CARRIER_MULTIPLIER,
        request.duration,
        sample_rate,
    )
    .extended_for_trigger_latency();
    debug!(
        "sweep buffer: {} samples at {sample_rate} Hz",
        sweep.len()
    );
    waveform
        .write_buffer(&sweep, TimingMode::Continuous)
        .await
        .map_err(ScanError::waveform)?;

    sequencer
        .set_velocity(request.depth_axis, request.depth_velocity)
        .await?;
    sequencer
        .move_and_settle(
            request.depth_axis,
            request.depth.start,
            MoveMode::Absolute,
            request.settle_timeout,
        )
        .await?;

    // Buffer armed above; only now may the shared clock begin ticking.
    waveform.start().await.map_err(ScanError::waveform)?;
    clock.start().await.map_err(ScanError::waveform)?;

    for (index, plane) in request.depth.positions().into_iter().enumerate() {
        if cancel.is_cancelled() {
            info!("burst scan {} cancelled at plane {index}", session.id());
            return Ok(ScanStatus::Cancelled);
        }
        sequencer
            .move_and_settle(
                request.depth_axis,
                plane,
                MoveMode::Absolute,
                request.settle_timeout,
            )
            .await?;
        debug!("capturing plane {index} at depth {plane}");
        let image = camera.snap().await.map_err(ScanError::camera)?;
        session.push(image);
    }

    Ok(ScanStatus::Completed)
}

async fn teardown(waveform: &Arc<dyn WaveformOutput>, clock: &Arc<dyn PulseGenerator>) {
    if let Err(err) = waveform.stop().await {
        warn!("failed to stop waveform task: {err:#}");
    }
    if let Err(err) = clock.stop().await {
        warn!("failed to stop clock task: {err:#}");
    }
    if let Err(err) = waveform.clear().await {
        warn!("failed to clear waveform task: {err:#}");
    }
    if let Err(err) = clock.clear().await {
        warn!("failed to clear clock task: {err:#}");
    }
}
