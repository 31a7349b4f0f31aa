//! Scan planning and the acquisition controllers.
//!
//! [`bounds`] and [`serpentine`] are pure planning: sample grids and
//! traversal order, independently testable with no hardware. [`session`]
//! owns the per-scan lifecycle. The three controllers ([`stepwise`],
//! [`burst`], [`swept`]) map a traversal plan onto motion, trigger, and
//! capture calls.

pub mod bounds;
pub mod burst;
pub mod serpentine;
pub mod session;
pub mod stepwise;
pub mod swept;

pub use bounds::{AxisSpan, DepthSpan, ScanBounds};
pub use burst::BurstScanRequest;
pub use serpentine::{GridPoint, SerpentineIter};
pub use session::{CancelToken, ScanHandle, ScanOutcome, ScanSession, ScanStatus};
pub use stepwise::{StageAxes, StepwiseScanRequest};
pub use swept::SweptScanRequest;
