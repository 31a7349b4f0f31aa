//! Mock hardware for tests.
//!
//! In-memory stand-ins for every capability trait, with enough call
//! recording to assert on motion order, trigger-chain lifecycle, and
//! persisted output without any hardware attached. Failure injection is
//! deliberate and deterministic: a specific move index, a specific snap
//! index, or a path substring.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::traits::camera::{Camera, Image, RegionOfInterest};
use crate::traits::motion::MotionAxes;
use crate::traits::waveform::{PulseGenerator, TimingMode, TriggerSource, WaveformOutput};
use crate::traits::writer::{ImageMetadata, ImageWriter};
use crate::waveform::{PulseTiming, WaveformBuffer};

/// Shared, ordered record of device calls across several mocks.
///
/// Hand the same journal to a [`MockWaveformDevice`] and a
/// [`MockPulseClock`] to assert on cross-device ordering (buffer armed
/// before the clock starts, teardown on every path).
pub type EventJournal = Arc<Mutex<Vec<String>>>;

/// A fresh, empty event journal.
pub fn event_journal() -> EventJournal {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Default)]
struct StageState {
    positions: HashMap<u8, f64>,
    velocities: HashMap<u8, f64>,
    pending_polls: HashMap<u8, u32>,
    settle_queries: HashMap<u8, u32>,
    moves: Vec<(u8, f64)>,
}

/// Mock multi-axis stage.
///
/// Every move lands instantly but the axis reports unsettled for
/// `settle_polls` status queries afterwards, which exercises the polling
/// loop deterministically.
#[derive(Default)]
pub struct MockStage {
    state: Mutex<StageState>,
    settle_polls: u32,
    stuck_axes: HashSet<u8>,
    fault_on_move: Option<usize>,
}

impl MockStage {
    /// A stage that settles on the first status query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report unsettled for this many queries after each move.
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    /// Make one axis never report settled.
    pub fn with_stuck_axis(mut self, axis: u8) -> Self {
        self.stuck_axes.insert(axis);
        self
    }

    /// Fail the n-th move command (1-based) with a driver fault.
    pub fn with_fault_on_move(mut self, move_index: usize) -> Self {
        self.fault_on_move = Some(move_index);
        self
    }

    /// Every move issued so far, as (axis, absolute target).
    pub async fn moves(&self) -> Vec<(u8, f64)> {
        self.state.lock().await.moves.clone()
    }

    /// Absolute targets issued to one axis, in order.
    pub async fn moves_for(&self, axis: u8) -> Vec<f64> {
        self.state
            .lock()
            .await
            .moves
            .iter()
            .filter(|(a, _)| *a == axis)
            .map(|(_, target)| *target)
            .collect()
    }

    /// Number of settle queries an axis has received.
    pub async fn settle_queries(&self, axis: u8) -> u32 {
        *self
            .state
            .lock()
            .await
            .settle_queries
            .get(&axis)
            .unwrap_or(&0)
    }

    /// Last velocity set on an axis, if any.
    pub async fn velocity_of(&self, axis: u8) -> Option<f64> {
        self.state.lock().await.velocities.get(&axis).copied()
    }

    async fn record_move(&self, axis: u8, target: f64) -> Result<()> {
        let mut state = self.state.lock().await;
        if self.fault_on_move == Some(state.moves.len() + 1) {
            bail!("simulated driver fault");
        }
        state.moves.push((axis, target));
        state.positions.insert(axis, target);
        state.pending_polls.insert(axis, self.settle_polls);
        Ok(())
    }
}

#[async_trait]
impl MotionAxes for MockStage {
    fn num_axes(&self) -> u8 {
        4
    }

    async fn set_velocity(&self, axis: u8, velocity: f64) -> Result<()> {
        self.state.lock().await.velocities.insert(axis, velocity);
        Ok(())
    }

    async fn move_absolute(&self, axis: u8, position: f64) -> Result<()> {
        self.record_move(axis, position).await
    }

    async fn move_relative(&self, axis: u8, delta: f64) -> Result<()> {
        let current = {
            let state = self.state.lock().await;
            state.positions.get(&axis).copied().unwrap_or(0.0)
        };
        self.record_move(axis, current + delta).await
    }

    async fn is_settled(&self, axis: u8) -> Result<bool> {
        let mut state = self.state.lock().await;
        *state.settle_queries.entry(axis).or_insert(0) += 1;
        if self.stuck_axes.contains(&axis) {
            return Ok(false);
        }
        let pending = state.pending_polls.entry(axis).or_insert(0);
        if *pending > 0 {
            *pending -= 1;
            Ok(false)
        } else {
            Ok(true)
        }
    }

    async fn get_position(&self, axis: u8) -> Result<f64> {
        Ok(self
            .state
            .lock()
            .await
            .positions
            .get(&axis)
            .copied()
            .unwrap_or(0.0))
    }
}

type SnapHook = Box<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct CameraState {
    snaps: u64,
    roi: Option<RegionOfInterest>,
    exposure_ms: Option<f64>,
    active_device: Option<String>,
}

/// Mock camera producing small frames stamped with the snap counter.
#[derive(Default)]
pub struct MockCamera {
    state: Mutex<CameraState>,
    fail_on_snap: Option<u64>,
    on_snap: Option<SnapHook>,
}

impl MockCamera {
    /// A camera that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th snap (1-based).
    pub fn with_fail_on_snap(mut self, snap_index: u64) -> Self {
        self.fail_on_snap = Some(snap_index);
        self
    }

    /// Invoke a hook after each successful snap, with the 1-based snap
    /// count. Lets a test cancel a scan at an exact voxel.
    pub fn with_snap_hook(mut self, hook: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_snap = Some(Box::new(hook));
        self
    }

    /// Frames snapped so far.
    pub async fn snap_count(&self) -> u64 {
        self.state.lock().await.snaps
    }

    /// Last configured ROI.
    pub async fn roi(&self) -> Option<RegionOfInterest> {
        self.state.lock().await.roi
    }

    /// Last configured exposure.
    pub async fn exposure_ms(&self) -> Option<f64> {
        self.state.lock().await.exposure_ms
    }

    /// Last selected device name.
    pub async fn active_device(&self) -> Option<String> {
        self.state.lock().await.active_device.clone()
    }
}

#[async_trait]
impl Camera for MockCamera {
    async fn snap(&self) -> Result<Image> {
        let count = {
            let mut state = self.state.lock().await;
            state.snaps += 1;
            state.snaps
        };
        if self.fail_on_snap == Some(count) {
            bail!("simulated camera fault");
        }
        if let Some(hook) = &self.on_snap {
            hook(count);
        }
        Ok(Image {
            width: 8,
            height: 8,
            pixels: vec![count as u16; 64],
        })
    }

    async fn set_roi(&self, roi: RegionOfInterest) -> Result<()> {
        self.state.lock().await.roi = Some(roi);
        Ok(())
    }

    async fn set_exposure_ms(&self, exposure_ms: f64) -> Result<()> {
        self.state.lock().await.exposure_ms = Some(exposure_ms);
        Ok(())
    }

    async fn set_active_device(&self, name: &str) -> Result<()> {
        self.state.lock().await.active_device = Some(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct WaveformState {
    channel: Option<(f64, f64, Option<TriggerSource>)>,
    buffers: Vec<(usize, f64, TimingMode)>,
    samples: Vec<f64>,
    starts: u32,
    stops: u32,
    clears: u32,
}

/// Mock buffered analog output task.
#[derive(Default)]
pub struct MockWaveformDevice {
    state: Mutex<WaveformState>,
    journal: Option<EventJournal>,
}

impl MockWaveformDevice {
    /// A device with no journal attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls into a shared journal under the `ao.` prefix.
    pub fn with_journal(mut self, journal: EventJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Buffers written so far, as (length, sample rate, timing mode).
    pub async fn buffers(&self) -> Vec<(usize, f64, TimingMode)> {
        self.state.lock().await.buffers.clone()
    }

    /// Immediate single-sample writes so far.
    pub async fn samples(&self) -> Vec<f64> {
        self.state.lock().await.samples.clone()
    }

    /// Last configured channel as (min, max, trigger).
    pub async fn channel(&self) -> Option<(f64, f64, Option<TriggerSource>)> {
        self.state.lock().await.channel.clone()
    }

    /// (starts, stops, clears) counters.
    pub async fn lifecycle_counts(&self) -> (u32, u32, u32) {
        let state = self.state.lock().await;
        (state.starts, state.stops, state.clears)
    }

    async fn journal(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().await.push(entry.to_string());
        }
    }
}

#[async_trait]
impl WaveformOutput for MockWaveformDevice {
    async fn configure_channel(
        &self,
        min_volts: f64,
        max_volts: f64,
        trigger: Option<TriggerSource>,
    ) -> Result<()> {
        self.state.lock().await.channel = Some((min_volts, max_volts, trigger));
        self.journal("ao.configure").await;
        Ok(())
    }

    async fn write_buffer(&self, buffer: &WaveformBuffer, mode: TimingMode) -> Result<()> {
        self.state
            .lock()
            .await
            .buffers
            .push((buffer.len(), buffer.sample_rate(), mode));
        self.journal("ao.write_buffer").await;
        Ok(())
    }

    async fn write_sample(&self, volts: f64) -> Result<()> {
        self.state.lock().await.samples.push(volts);
        self.journal("ao.write_sample").await;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.state.lock().await.starts += 1;
        self.journal("ao.start").await;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.state.lock().await.stops += 1;
        self.journal("ao.stop").await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.state.lock().await.clears += 1;
        self.journal("ao.clear").await;
        Ok(())
    }
}

#[derive(Default)]
struct PulseState {
    timing: Option<PulseTiming>,
    trigger: Option<TriggerSource>,
    starts: u32,
    stops: u32,
    clears: u32,
}

/// Mock counter/pulse output task.
#[derive(Default)]
pub struct MockPulseClock {
    state: Mutex<PulseState>,
    journal: Option<EventJournal>,
}

impl MockPulseClock {
    /// A clock with no journal attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls into a shared journal under the `clock.` prefix.
    pub fn with_journal(mut self, journal: EventJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Last configured pulse timing.
    pub async fn timing(&self) -> Option<PulseTiming> {
        self.state.lock().await.timing
    }

    /// Last configured start trigger.
    pub async fn trigger(&self) -> Option<TriggerSource> {
        self.state.lock().await.trigger.clone()
    }

    /// (starts, stops, clears) counters.
    pub async fn lifecycle_counts(&self) -> (u32, u32, u32) {
        let state = self.state.lock().await;
        (state.starts, state.stops, state.clears)
    }

    async fn journal(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().await.push(entry.to_string());
        }
    }
}

#[async_trait]
impl PulseGenerator for MockPulseClock {
    async fn configure(&self, timing: PulseTiming, trigger: Option<TriggerSource>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.timing = Some(timing);
        state.trigger = trigger;
        drop(state);
        self.journal("clock.configure").await;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.state.lock().await.starts += 1;
        self.journal("clock.start").await;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.state.lock().await.stops += 1;
        self.journal("clock.stop").await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.state.lock().await.clears += 1;
        self.journal("clock.clear").await;
        Ok(())
    }
}

/// In-memory image persistence for tests.
#[derive(Default)]
pub struct MemoryImageWriter {
    entries: Mutex<Vec<(PathBuf, Image, Option<ImageMetadata>)>>,
    fail_on: Option<String>,
}

impl MemoryImageWriter {
    /// A writer that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail writes whose path contains the given fragment.
    pub fn with_failure_on(mut self, path_fragment: impl Into<String>) -> Self {
        self.fail_on = Some(path_fragment.into());
        self
    }

    /// Everything written so far.
    pub async fn entries(&self) -> Vec<(PathBuf, Image, Option<ImageMetadata>)> {
        self.entries.lock().await.clone()
    }

    /// File names written so far, in write order.
    pub async fn file_names(&self) -> Vec<String> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(path, _, _)| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }
}

#[async_trait]
impl ImageWriter for MemoryImageWriter {
    async fn write(
        &self,
        path: &Path,
        image: &Image,
        metadata: Option<&ImageMetadata>,
    ) -> Result<()> {
        if let Some(fragment) = &self.fail_on {
            if path.to_string_lossy().contains(fragment.as_str()) {
                bail!("simulated write failure");
            }
        }
        self.entries
            .lock()
            .await
            .push((path.to_path_buf(), image.clone(), metadata.cloned()));
        Ok(())
    }
}
