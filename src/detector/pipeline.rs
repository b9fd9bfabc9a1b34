use super::params::DetectorParams;
use crate::cascade::{Cascade, Classifier};
use crate::cluster::{merge_overlapping, IouThreshold};
use crate::diagnostics::{DetectionReport, InputDescriptor, ReportedDetection, TimingBreakdown};
use crate::error::DetectError;
use crate::image::ImageU8;
use crate::scan::ScanPlan;
use crate::types::Detection;
use log::{debug, warn};
use std::time::Instant;

/// Cascade plus parameters: scan, cluster and score-gate in one call.
///
/// The detector holds no per-image state, so one instance can serve many
/// images, also from several threads.
#[derive(Clone, Debug)]
pub struct FaceDetector<C = Cascade> {
    classifier: C,
    params: DetectorParams,
    iou_threshold: IouThreshold,
}

impl FaceDetector<Cascade> {
    /// Parse a native cascade blob and build a detector around it.
    pub fn from_bytes(bytes: &[u8], params: DetectorParams) -> Result<Self, DetectError> {
        let cascade = Cascade::from_bytes(bytes)?;
        Self::new(cascade, params)
    }
}

impl<C> FaceDetector<C>
where
    C: Classifier + Sync,
{
    /// Validates `params` up front; `detect` itself cannot fail.
    pub fn new(classifier: C, params: DetectorParams) -> Result<Self, DetectError> {
        params.validate()?;
        let iou_threshold = IouThreshold::new(params.iou_threshold)?;
        Ok(Self {
            classifier,
            params,
            iou_threshold,
        })
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Raw detections: one per accepted window, in scan order.
    pub fn scan(&self, image: &ImageU8<'_>) -> Vec<Detection> {
        let plan = ScanPlan::new(image.nrows(), image.ncols(), &self.params.scan);
        self.run_plan(&plan, image)
    }

    /// Scan, cluster and filter, returning detections with diagnostics.
    pub fn detect(&self, image: &ImageU8<'_>) -> DetectionReport {
        let total_start = Instant::now();
        let mut timing = TimingBreakdown::default();

        let scan_start = Instant::now();
        let plan = ScanPlan::new(image.nrows(), image.ncols(), &self.params.scan);
        if plan.scale_count() == 0 {
            warn!(
                "FaceDetector::detect: no scale fits a {}x{} image",
                image.nrows(), image.ncols()
            );
        }
        let raw = self.run_plan(&plan, image);
        timing.push("scan", elapsed_ms(scan_start));

        let cluster_start = Instant::now();
        let clusters = merge_overlapping(&raw, self.iou_threshold);
        timing.push("cluster", elapsed_ms(cluster_start));

        let cluster_count = clusters.len();
        let detections: Vec<ReportedDetection> = clusters
            .into_iter()
            .filter(|c| c.detection.score >= self.params.min_score)
            .map(|c| ReportedDetection {
                detection: c.detection,
                bbox: c.detection.bbox(),
                support: c.members.len(),
            })
            .collect();
        timing.total_ms = elapsed_ms(total_start);

        debug!(
            "FaceDetector::detect {}x{}: windows={} raw={} clusters={} kept={} in {:.3} ms",
            image.nrows(),
            image.ncols(),
            plan.window_count(),
            raw.len(),
            cluster_count,
            detections.len(),
            timing.total_ms
        );

        DetectionReport {
            input: InputDescriptor::from_image(image),
            windows: plan.window_count(),
            raw_count: raw.len(),
            cluster_count,
            detections,
            timing,
        }
    }

    fn run_plan(&self, plan: &ScanPlan, image: &ImageU8<'_>) -> Vec<Detection> {
        #[cfg(feature = "parallel")]
        {
            if self.params.parallel {
                plan.run_parallel(image, &self.classifier)
            } else {
                plan.run(image, &self.classifier)
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            plan.run(image, &self.classifier)
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
