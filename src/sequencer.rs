//! Axis motion sequencing: move, then poll until settled.
//!
//! Wraps the motion driver with a uniform "move and block until settled"
//! contract. The settle wait is a fixed-interval polling loop; the interval
//! is 5 ms in stepwise scans and coarser in burst mode, where the depth
//! axis settles between long hardware-paced sweeps.
//!
//! The driver guarantees eventual settlement on healthy hardware, so the
//! default is to block indefinitely; callers in automated contexts should
//! always pass a timeout.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::error::MotionError;
use crate::traits::MotionAxes;

/// Settle-poll interval used by the stepwise scan controller.
pub const DEFAULT_SETTLE_POLL: Duration = Duration::from_millis(5);

/// Settle-poll interval used by the burst scan controller.
pub const BURST_SETTLE_POLL: Duration = Duration::from_millis(50);

/// Whether a move target is absolute or relative to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    /// Target is an absolute position in device units.
    Absolute,
    /// Target is a delta from the current position.
    Relative,
}

/// Blocking move-and-settle wrapper around a motion driver.
pub struct AxisSequencer {
    axes: Arc<dyn MotionAxes>,
    poll_interval: Duration,
}

impl AxisSequencer {
    /// Wrap a motion driver with the default 5 ms settle poll.
    pub fn new(axes: Arc<dyn MotionAxes>) -> Self {
        Self {
            axes,
            poll_interval: DEFAULT_SETTLE_POLL,
        }
    }

    /// Override the settle-poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Velocity pass-through to the driver.
    ///
    /// # Errors
    /// Driver rejections surface as [`MotionError::DriverFault`].
    pub async fn set_velocity(&self, axis: u8, velocity: f64) -> Result<(), MotionError> {
        self.axes
            .set_velocity(axis, velocity)
            .await
            .map_err(|err| driver_fault(axis, err))
    }

    /// Issue a move command without waiting for settlement.
    ///
    /// # Errors
    /// Driver rejections surface as [`MotionError::DriverFault`].
    pub async fn issue_move(
        &self,
        axis: u8,
        target: f64,
        mode: MoveMode,
    ) -> Result<(), MotionError> {
        let result = match mode {
            MoveMode::Absolute => self.axes.move_absolute(axis, target).await,
            MoveMode::Relative => self.axes.move_relative(axis, target).await,
        };
        result.map_err(|err| driver_fault(axis, err))
    }

    /// Poll `is_settled` at the configured interval until the axis reports
    /// on-target or the timeout elapses. `None` blocks indefinitely.
    ///
    /// # Errors
    /// - [`MotionError::Timeout`] when the deadline passes unsettled
    /// - [`MotionError::DriverFault`] on a failed status query
    pub async fn wait_settled(
        &self,
        axis: u8,
        timeout: Option<Duration>,
    ) -> Result<(), MotionError> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            if self
                .axes
                .is_settled(axis)
                .await
                .map_err(|err| driver_fault(axis, err))?
            {
                return Ok(());
            }
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    debug!("axis {axis} unsettled at deadline");
                    return Err(MotionError::Timeout {
                        axis,
                        timeout_ms: timeout.unwrap_or_default().as_millis() as u64,
                    });
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Issue the move, then block until the axis settles.
    ///
    /// # Errors
    /// See [`AxisSequencer::issue_move`] and [`AxisSequencer::wait_settled`].
    pub async fn move_and_settle(
        &self,
        axis: u8,
        target: f64,
        mode: MoveMode,
        timeout: Option<Duration>,
    ) -> Result<(), MotionError> {
        self.issue_move(axis, target, mode).await?;
        self.wait_settled(axis, timeout).await
    }
}

fn driver_fault(axis: u8, err: anyhow::Error) -> MotionError {
    MotionError::DriverFault {
        axis,
        message: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStage;

    #[tokio::test(start_paused = true)]
    async fn test_settle_after_a_few_polls() {
        let stage = Arc::new(MockStage::new().with_settle_polls(3));
        let sequencer = AxisSequencer::new(stage.clone());
        sequencer
            .move_and_settle(1, 12.0, MoveMode::Absolute, Some(Duration::from_secs(1)))
            .await
            .expect("settles");
        assert_eq!(stage.moves_for(1).await, vec![12.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_on_stuck_axis() {
        let stage = Arc::new(MockStage::new().with_stuck_axis(4));
        let sequencer = AxisSequencer::new(stage.clone());
        let err = sequencer
            .move_and_settle(4, 1.0, MoveMode::Absolute, Some(Duration::from_millis(50)))
            .await
            .expect_err("stuck axis must time out");
        match err {
            MotionError::Timeout { axis, timeout_ms } => {
                assert_eq!(axis, 4);
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // 50 ms deadline at a 5 ms poll: at most ~11 status queries.
        let polls = stage.settle_queries(4).await;
        assert!(polls >= 10 && polls <= 12, "polled {polls} times");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_blocks_until_settled() {
        let stage = Arc::new(MockStage::new().with_settle_polls(40));
        let sequencer = AxisSequencer::new(stage);
        sequencer
            .move_and_settle(2, -3.5, MoveMode::Absolute, None)
            .await
            .expect("settles eventually");
    }

    #[tokio::test(start_paused = true)]
    async fn test_relative_move_offsets_position() {
        let stage = Arc::new(MockStage::new());
        let sequencer = AxisSequencer::new(stage.clone());
        sequencer
            .move_and_settle(1, 5.0, MoveMode::Absolute, None)
            .await
            .expect("absolute move");
        sequencer
            .move_and_settle(1, -1.5, MoveMode::Relative, None)
            .await
            .expect("relative move");
        assert_eq!(stage.moves_for(1).await, vec![5.0, 3.5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_fault_propagates() {
        let stage = Arc::new(MockStage::new().with_fault_on_move(1));
        let sequencer = AxisSequencer::new(stage);
        let err = sequencer
            .move_and_settle(1, 2.0, MoveMode::Absolute, None)
            .await
            .expect_err("fault propagates");
        assert!(matches!(err, MotionError::DriverFault { axis: 1, .. }));
    }
}
