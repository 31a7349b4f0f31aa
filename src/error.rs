//! Error types for the scan orchestrator.
//!
//! Each subsystem gets its own `thiserror` enum so callers can match on the
//! failure class that matters to them: motion faults, rejected configuration,
//! persistence problems, or a scan slot that is already taken. `ScanError`
//! consolidates all of them for APIs that can fail in more than one way.
//!
//! Configuration errors are produced during validation, before any hardware
//! is touched. Motion errors abort a running scan but still trigger a
//! best-effort persistence of the records captured so far.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the orchestrator error type.
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Failures reported while commanding or settling a motion axis.
#[derive(Error, Debug)]
pub enum MotionError {
    /// The axis kept reporting "not on target" past the caller's deadline.
    #[error("axis {axis} did not settle within {timeout_ms} ms")]
    Timeout {
        /// Axis identifier (1-based, as addressed on the controller chain).
        axis: u8,
        /// The deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The motion driver returned an error; propagated immediately, no retry.
    #[error("motion driver fault on axis {axis}: {message}")]
    DriverFault {
        /// Axis identifier the command was addressed to.
        axis: u8,
        /// Driver-reported failure description.
        message: String,
    },
}

/// Scan parameters rejected during validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A bounds field does not describe a usable sample axis.
    #[error("invalid bounds on {axis} axis: {reason}")]
    InvalidBounds {
        /// Which logical axis the bounds belong to.
        axis: &'static str,
        /// Why the bounds were rejected.
        reason: String,
    },

    /// A scalar parameter that must be strictly positive was not.
    #[error("{field} must be positive (got {value})")]
    NonPositive {
        /// Parameter name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A count parameter that must be at least one was zero.
    #[error("{field} must be at least 1")]
    ZeroCount {
        /// Parameter name.
        field: &'static str,
    },
}

/// Failures while persisting captured records.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A single record failed to write. Reported per file; remaining records
    /// are still written.
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        /// Destination file.
        path: PathBuf,
        /// Underlying writer error.
        #[source]
        source: anyhow::Error,
    },
}

/// Violations of the one-scan-at-a-time resource policy.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// A scan session is already in flight; the new request is rejected,
    /// not queued.
    #[error("a scan session is already running")]
    ScanAlreadyRunning,
}

/// Top-level error for scan orchestration entry points.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Motion subsystem failure.
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Rejected scan configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persistence failure.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Scan slot already occupied.
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Camera driver failure.
    #[error("camera error: {0}")]
    Camera(String),

    /// Waveform or pulse hardware failure.
    #[error("waveform device error: {0}")]
    Waveform(String),
}

impl ScanError {
    pub(crate) fn camera(err: anyhow::Error) -> Self {
        ScanError::Camera(format!("{err:#}"))
    }

    pub(crate) fn waveform(err: anyhow::Error) -> Self {
        ScanError::Waveform(format!("{err:#}"))
    }
}
