//! Structured report returned by [`crate::FaceDetector::detect`].
use crate::image::{ImageU8, ImageView};
use crate::types::{BoundingBox, Detection};
use serde::{Deserialize, Serialize};

/// Timing entry describing a single stage of the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Aggregated timing trace for one detector run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming::new(label, elapsed_ms));
    }
}

/// Shape and brightness of the scanned image.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub nrows: usize,
    pub ncols: usize,
    pub ldim: usize,
    pub mean_intensity: f32,
}

impl InputDescriptor {
    pub fn from_image(image: &ImageU8<'_>) -> Self {
        let sum: u64 = if let Some(slice) = image.as_slice() {
            slice.iter().map(|&p| p as u64).sum()
        } else {
            image
                .rows()
                .map(|r| r.iter().map(|&p| p as u64).sum::<u64>())
                .sum()
        };
        let denom = (image.nrows() * image.ncols()).max(1) as f64;
        Self {
            nrows: image.nrows(),
            ncols: image.ncols(),
            ldim: image.ldim(),
            mean_intensity: (sum as f64 / denom) as f32,
        }
    }
}

/// Final detection together with its box, as handed to annotation layers.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    pub bbox: BoundingBox,
    /// Number of raw detections merged into this one.
    pub support: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub input: InputDescriptor,
    /// Windows evaluated by the scan.
    pub windows: usize,
    /// Windows accepted by the classifier.
    pub raw_count: usize,
    /// Clusters before the score gate.
    pub cluster_count: usize,
    pub detections: Vec<ReportedDetection>,
    pub timing: TimingBreakdown,
}

impl DetectionReport {
    /// Plain `(r, c, s, q)` tuples of the final detections.
    pub fn detections(&self) -> Vec<Detection> {
        self.detections.iter().map(|d| d.detection).collect()
    }
}
