//! End-to-end detector: multiscale scan, clustering and score gate.
//!
//! Modules
//! - [`params`] – detector-wide configuration.
//! - `pipeline` – the [`FaceDetector`] implementation.

pub mod params;
mod pipeline;

pub use params::DetectorParams;
pub use pipeline::FaceDetector;
