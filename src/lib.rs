//! Scan orchestration for a volumetric scanning microscope.
//!
//! Coordinates a three-axis motorized stage, an analog-driven sweep
//! actuator, and a camera to acquire spatially tagged image volumes. Two
//! acquisition regimes are supported: a stepwise serpentine scan that
//! settles every axis before each capture, and a burst scan where the sweep
//! actuator follows a precomputed waveform paced by a hardware clock.
//!
//! Hardware is reached only through the capability traits in [`traits`];
//! the [`engine::ScanEngine`] owns those seams, enforces the single-scan
//! policy, and runs each session as a background tokio task.
//!
//! # Example
//!
//! ```no_run
//! use voxscan::scan::{AxisSpan, ScanBounds, StepwiseScanRequest};
//! use voxscan::ScanEngine;
//!
//! # async fn demo(engine: ScanEngine) {
//! let bounds = ScanBounds {
//!     x: AxisSpan::new(12.0, 12.5, 0.1),
//!     y: AxisSpan::new(10.0, 11.5, 0.1),
//!     z: AxisSpan::new(15.0, 15.04, 0.02),
//! };
//! let handle = engine
//!     .start_stepwise(StepwiseScanRequest::new(bounds, "volumes/sample_a"))
//!     .expect("scan slot free");
//! let outcome = handle.wait().await;
//! println!("{:?}: {} voxels persisted", outcome.status, outcome.persisted);
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod mock;
pub mod persist;
pub mod scan;
pub mod sequencer;
pub mod traits;
pub mod waveform;

pub use engine::ScanEngine;
pub use error::{
    ConcurrencyError, ConfigError, MotionError, PersistError, ScanError, ScanResult,
};
pub use scan::{
    AxisSpan, BurstScanRequest, CancelToken, DepthSpan, ScanBounds, ScanHandle, ScanOutcome,
    ScanStatus, StageAxes, StepwiseScanRequest, SweptScanRequest,
};
