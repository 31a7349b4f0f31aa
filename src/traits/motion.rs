//! Motion axis driver trait.
//!
//! Hardware-agnostic interface for a chain of settle-able positioning
//! actuators. Implementations handle protocol-specific details (multi-drop
//! daisy-chained stage controllers, piezo drivers, etc.); the orchestrator
//! treats every axis as an opaque actuator that can be commanded and asked
//! whether it has reached its target.

use anyhow::Result;
use async_trait::async_trait;

/// Multi-axis motion driver capability.
///
/// ## Position Units
/// - Positions and velocities are in device units (typically millimeters
///   and millimeters/second); the driver adapter defines the mapping.
///
/// ## Axis Addressing
/// - Axes are addressed by a 1-based identifier, matching how daisy-chained
///   controllers are enumerated on the bus.
///
/// ## Settling
/// - `is_settled` reflects the driver-level "on target" query. Moves return
///   as soon as the command is issued; higher layers poll for settlement.
#[async_trait]
pub trait MotionAxes: Send + Sync {
    /// Number of axes on this driver chain.
    fn num_axes(&self) -> u8;

    /// Set the closed-loop velocity for an axis, in units/second.
    ///
    /// Must be called before a scan begins on axes participating in timed
    /// capture, because capture cadence assumes a known traversal velocity.
    ///
    /// # Errors
    /// - Axis out of range
    /// - Velocity rejected by the controller
    /// - Hardware communication error
    async fn set_velocity(&self, axis: u8, velocity: f64) -> Result<()>;

    /// Command an absolute move. Returns once the command is issued; the
    /// motion continues asynchronously.
    ///
    /// # Errors
    /// - Axis out of range
    /// - Target exceeds travel limits
    /// - Hardware communication error
    async fn move_absolute(&self, axis: u8, position: f64) -> Result<()>;

    /// Command a relative move by `delta` device units.
    ///
    /// # Errors
    /// Same conditions as [`MotionAxes::move_absolute`].
    async fn move_relative(&self, axis: u8, delta: f64) -> Result<()>;

    /// Query whether the axis reports motion complete ("on target").
    ///
    /// # Errors
    /// - Axis out of range
    /// - Hardware communication error
    async fn is_settled(&self, axis: u8) -> Result<bool>;

    /// Read the current position of an axis, in device units.
    ///
    /// # Errors
    /// - Axis out of range
    /// - Hardware communication error
    async fn get_position(&self, axis: u8) -> Result<f64>;
}
