#![doc = include_str!("../README.md")]

// Core pipeline: cascade model, multiscale scan, clustering.
pub mod cascade;
pub mod cluster;
pub mod scan;

// Orchestration and results.
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod types;

// Tool support (file formats, JSON config).
pub mod config;

// --- High-level re-exports -------------------------------------------------

pub use crate::cascade::{load, Cascade, Classification, Classifier, FormatError};
pub use crate::cluster::{cluster_detections, cluster_with_members, iou, merge_overlapping, IouThreshold};
pub use crate::detector::{DetectorParams, FaceDetector};
pub use crate::diagnostics::DetectionReport;
pub use crate::error::DetectError;
pub use crate::image::ImageU8;
pub use crate::scan::{scan, InvalidParams, ScanParams};
#[cfg(feature = "parallel")]
pub use crate::scan::scan_parallel;
pub use crate::types::{BoundingBox, Cluster, Detection, Window};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use cascade_detector::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("facefinder.cscd")?;
/// let cascade = Cascade::from_bytes(&bytes)?;
///
/// let (nrows, ncols) = (480usize, 640usize);
/// let gray = vec![0u8; nrows * ncols];
/// let image = ImageU8::new(&gray, nrows, ncols, ncols)?;
///
/// let detector = FaceDetector::new(cascade, DetectorParams::default())?;
/// let report = detector.detect(&image);
/// for d in report.detections() {
///     println!("r={:.1} c={:.1} s={:.1} q={:.2}", d.row, d.col, d.size, d.score);
/// }
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::ImageU8;
    pub use crate::{Cascade, Detection, DetectorParams, FaceDetector, ScanParams};
}
