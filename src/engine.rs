//! The scan engine: device ownership and scan task lifecycle.
//!
//! The engine holds the hardware seams for the whole system and enforces
//! the shared-resource policy: at most one scan session in flight, and no
//! other caller may drive the devices while a session holds them. Starting
//! a scan validates the request (fail fast, no partial side effects),
//! claims the single scan slot, and spawns the controller as a background
//! task so the calling context stays responsive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::error::{ConcurrencyError, ScanError, ScanResult};
use crate::persist::VoxelWriter;
use crate::scan::session::{ActiveGuard, CancelToken, ScanHandle, ScanSession};
use crate::scan::{burst, stepwise, swept, BurstScanRequest, StepwiseScanRequest, SweptScanRequest};
use crate::sequencer::{AxisSequencer, BURST_SETTLE_POLL};
use crate::traits::{Camera, ImageWriter, MotionAxes, PulseGenerator, WaveformOutput};

/// Owns the scan hardware and runs one scan session at a time.
pub struct ScanEngine {
    motion: Arc<dyn MotionAxes>,
    camera: Arc<dyn Camera>,
    waveform: Arc<dyn WaveformOutput>,
    sweep_clock: Arc<dyn PulseGenerator>,
    writer: Arc<dyn ImageWriter>,
    active: Arc<AtomicBool>,
}

impl ScanEngine {
    /// Assemble an engine over the five hardware seams.
    pub fn new(
        motion: Arc<dyn MotionAxes>,
        camera: Arc<dyn Camera>,
        waveform: Arc<dyn WaveformOutput>,
        sweep_clock: Arc<dyn PulseGenerator>,
        writer: Arc<dyn ImageWriter>,
    ) -> Self {
        Self {
            motion,
            camera,
            waveform,
            sweep_clock,
            writer,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a scan session is currently in flight.
    pub fn is_scanning(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a stepwise serpentine scan as a background task.
    ///
    /// # Errors
    /// - [`crate::error::ConfigError`] on invalid bounds or parameters
    /// - [`ConcurrencyError::ScanAlreadyRunning`] when a session is in
    ///   flight; the running scan is untouched
    pub fn start_stepwise(&self, request: StepwiseScanRequest) -> ScanResult<ScanHandle> {
        request.validate()?;
        let slot = ActiveGuard::acquire(&self.active)?;

        let session_id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let sequencer = AxisSequencer::new(Arc::clone(&self.motion));
        let camera = Arc::clone(&self.camera);
        let writer = VoxelWriter::new(Arc::clone(&self.writer));
        let task_cancel = cancel.clone();

        info!("accepted stepwise scan request as session {session_id}");
        let join = tokio::spawn(async move {
            let _slot = slot;
            let mut session = ScanSession::new(session_id);
            stepwise::run(
                &sequencer,
                &camera,
                &writer,
                &request,
                &mut session,
                &task_cancel,
            )
            .await
        });
        Ok(ScanHandle::new(session_id, cancel, join))
    }

    /// Start a waveform-driven burst scan as a background task.
    ///
    /// # Errors
    /// Same classes as [`ScanEngine::start_stepwise`].
    pub fn start_burst(&self, request: BurstScanRequest) -> ScanResult<ScanHandle> {
        request.validate()?;
        let slot = ActiveGuard::acquire(&self.active)?;

        let session_id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let sequencer =
            AxisSequencer::new(Arc::clone(&self.motion)).with_poll_interval(BURST_SETTLE_POLL);
        let camera = Arc::clone(&self.camera);
        let waveform = Arc::clone(&self.waveform);
        let clock = Arc::clone(&self.sweep_clock);
        let writer = VoxelWriter::new(Arc::clone(&self.writer));
        let task_cancel = cancel.clone();

        info!("accepted burst scan request as session {session_id}");
        let join = tokio::spawn(async move {
            let _slot = slot;
            let mut session = ScanSession::new(session_id);
            burst::run(
                &sequencer,
                &camera,
                &waveform,
                &clock,
                &writer,
                &request,
                &mut session,
                &task_cancel,
            )
            .await
        });
        Ok(ScanHandle::new(session_id, cancel, join))
    }

    /// Start a swept (galvo-stepped) scan as a background task.
    ///
    /// # Errors
    /// Same classes as [`ScanEngine::start_stepwise`].
    pub fn start_swept(&self, request: SweptScanRequest) -> ScanResult<ScanHandle> {
        request.validate()?;
        let slot = ActiveGuard::acquire(&self.active)?;

        let session_id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let sequencer =
            AxisSequencer::new(Arc::clone(&self.motion)).with_poll_interval(BURST_SETTLE_POLL);
        let camera = Arc::clone(&self.camera);
        let waveform = Arc::clone(&self.waveform);
        let writer = VoxelWriter::new(Arc::clone(&self.writer));
        let task_cancel = cancel.clone();

        info!("accepted swept scan request as session {session_id}");
        let join = tokio::spawn(async move {
            let _slot = slot;
            let mut session = ScanSession::new(session_id);
            swept::run(
                &sequencer,
                &camera,
                &waveform,
                &writer,
                &request,
                &mut session,
                &task_cancel,
            )
            .await
        });
        Ok(ScanHandle::new(session_id, cancel, join))
    }

    /// Park the sweep actuator at a fixed voltage with an immediate
    /// single-sample write. Refused while a scan session holds the
    /// hardware.
    ///
    /// # Errors
    /// - [`ConcurrencyError::ScanAlreadyRunning`] while a scan is in flight
    /// - Device rejections surface as [`ScanError::Waveform`]
    pub async fn park_sweep(&self, volts: f64) -> ScanResult<()> {
        if self.is_scanning() {
            return Err(ConcurrencyError::ScanAlreadyRunning.into());
        }
        self.waveform
            .write_sample(volts)
            .await
            .map_err(ScanError::waveform)
    }
}
