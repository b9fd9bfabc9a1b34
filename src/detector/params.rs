//! Parameters of the end-to-end detector.
//!
//! Defaults follow the reference face cascade: 10% window shift, sizes from
//! 20 to 1000 px growing by 10% per scale, clustering at IoU 0.2, and a final
//! score gate of 5.0. Other cascades usually need a different `min_score`.

use crate::scan::params::validate_iou_threshold;
use crate::scan::{InvalidParams, ScanParams};
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub scan: ScanParams,
    /// Clusters are formed from detections overlapping above this IoU.
    pub iou_threshold: f32,
    /// Clusters scoring below this value are dropped.
    pub min_score: f32,
    /// Spread the scan over the rayon pool (requires the `parallel` feature).
    pub parallel: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scan: ScanParams::default(),
            iou_threshold: 0.2,
            min_score: 5.0,
            parallel: true,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<(), InvalidParams> {
        self.scan.validate()?;
        validate_iou_threshold(self.iou_threshold)
    }
}
