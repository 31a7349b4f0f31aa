//! Analog waveform output and counter pulse traits.
//!
//! Models the two hardware task kinds the burst scan arms: a buffered
//! analog-output channel driving the sweep actuator, and a counter/pulse
//! channel that paces the trigger chain. Both are armed against the same
//! start-trigger terminal so a single rising edge releases the whole chain.
//!
//! Tasks must always reach `stop()` + `clear()` on every exit path; leaving
//! a device armed corrupts the next session's trigger timing.

use anyhow::Result;
use async_trait::async_trait;

use crate::waveform::{PulseTiming, WaveformBuffer};

/// Edge polarity for digital start triggers and sample clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEdge {
    /// Trigger on the rising edge.
    Rising,
    /// Trigger on the falling edge.
    Falling,
}

/// A hardware trigger line plus the edge to arm on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSource {
    /// Device terminal name, e.g. `"/Dev1/PFI12"`.
    pub terminal: String,
    /// Edge polarity.
    pub edge: TriggerEdge,
}

impl TriggerSource {
    /// Rising-edge trigger on the given terminal.
    pub fn rising(terminal: &str) -> Self {
        Self {
            terminal: terminal.to_string(),
            edge: TriggerEdge::Rising,
        }
    }
}

/// Buffer regeneration mode for analog output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingMode {
    /// Regenerate the buffer continuously until stopped.
    Continuous,
    /// Play the buffer once.
    Finite,
}

/// Buffered analog output channel capability.
#[async_trait]
pub trait WaveformOutput: Send + Sync {
    /// Configure the output voltage range and, optionally, a digital start
    /// trigger. The sample clock is derived from the buffer handed to
    /// [`WaveformOutput::write_buffer`].
    ///
    /// # Errors
    /// - Range outside hardware capability
    /// - Unknown trigger terminal
    async fn configure_channel(
        &self,
        min_volts: f64,
        max_volts: f64,
        trigger: Option<TriggerSource>,
    ) -> Result<()>;

    /// Load a waveform into the device buffer. The task is not started;
    /// arming and starting are separate so the buffer is pre-loaded before
    /// the shared clock begins ticking.
    ///
    /// # Errors
    /// - Buffer exceeds device memory
    /// - Channel not configured
    async fn write_buffer(&self, buffer: &WaveformBuffer, mode: TimingMode) -> Result<()>;

    /// Immediately output a single sample and hold it. Used to park the
    /// sweep actuator or to step it between captures.
    ///
    /// # Errors
    /// - Value outside the configured range
    async fn write_sample(&self, volts: f64) -> Result<()>;

    /// Start the armed task.
    async fn start(&self) -> Result<()>;

    /// Stop the running task.
    async fn stop(&self) -> Result<()>;

    /// Release the task and its hardware resources.
    async fn clear(&self) -> Result<()>;
}

/// Counter/pulse output channel capability.
#[async_trait]
pub trait PulseGenerator: Send + Sync {
    /// Configure the pulse train timing and, optionally, a digital start
    /// trigger. The train runs continuously once started.
    ///
    /// # Errors
    /// - Timing outside counter resolution
    /// - Unknown trigger terminal
    async fn configure(&self, timing: PulseTiming, trigger: Option<TriggerSource>) -> Result<()>;

    /// Start the pulse train (or arm it, when a trigger is configured).
    async fn start(&self) -> Result<()>;

    /// Stop the pulse train.
    async fn stop(&self) -> Result<()>;

    /// Release the counter resources.
    async fn clear(&self) -> Result<()>;
}
