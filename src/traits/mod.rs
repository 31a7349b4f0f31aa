//! Hardware capability traits.
//!
//! Each external collaborator of the orchestrator is reached through one of
//! these seams: the motion axis driver, the camera, the analog/pulse output
//! hardware, and the image persistence layer. Implementations handle
//! protocol-specific details (GCS serial chains, DAQmx tasks, camera SDKs);
//! the orchestrator only sees settle-able axes, snapshot-able cameras, and
//! armable output tasks.
//!
//! For the duration of a scan each of these resources is single-owner: no
//! other component may issue commands through them while a session holds
//! them.

pub mod camera;
pub mod motion;
pub mod waveform;
pub mod writer;

pub use camera::{Camera, Image, RegionOfInterest};
pub use motion::MotionAxes;
pub use waveform::{PulseGenerator, TimingMode, TriggerEdge, TriggerSource, WaveformOutput};
pub use writer::{ImageMetadata, ImageWriter, PlanePosition};
