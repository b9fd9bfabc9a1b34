//! Multiscale sliding-window scan.
//!
//! Overview
//! - Window sizes run from `min_size` to `max_size` in a geometric sequence.
//! - At each size the window center visits a grid with spacing
//!   `max(1, round(shift_factor · size))`, starting at `ceil(size/2)` and
//!   stopping before the window would cross the image border. Windows that do
//!   not fit are never generated, so no error is ever raised for them.
//! - Every window is passed to a [`Classifier`]; accepted windows become
//!   [`Detection`]s `(r, c, s, q)`.
//!
//! Output order is deterministic: increasing size outermost, then row-major.
//! [`scan_parallel`] partitions the same plan across the rayon pool and
//! returns the identical sequence.

pub mod params;
pub mod plan;

pub use params::{InvalidParams, ScanParams};
pub use plan::{AxisPositions, ScanPlan, ScanTask};

use crate::cascade::Classifier;
use crate::image::ImageU8;
use crate::types::Detection;
use log::{debug, warn};

/// Scan `image` with `classifier` on the calling thread.
pub fn scan<C>(
    image: &ImageU8<'_>,
    classifier: &C,
    params: &ScanParams,
) -> Result<Vec<Detection>, InvalidParams>
where
    C: Classifier + ?Sized,
{
    let plan = prepare(image, params)?;
    let detections = plan.run(image, classifier);
    debug!("scan: {} raw detections", detections.len());
    Ok(detections)
}

/// Same result as [`scan`], computed on the rayon thread pool.
#[cfg(feature = "parallel")]
pub fn scan_parallel<C>(
    image: &ImageU8<'_>,
    classifier: &C,
    params: &ScanParams,
) -> Result<Vec<Detection>, InvalidParams>
where
    C: Classifier + Sync + ?Sized,
{
    let plan = prepare(image, params)?;
    let detections = plan.run_parallel(image, classifier);
    debug!("scan_parallel: {} raw detections", detections.len());
    Ok(detections)
}

fn prepare(image: &ImageU8<'_>, params: &ScanParams) -> Result<ScanPlan, InvalidParams> {
    params.validate()?;
    let plan = ScanPlan::new(image.nrows(), image.ncols(), params);
    if plan.scale_count() == 0 {
        warn!(
            "no window of size >= {} fits a {}x{} image",
            params.min_size, image.nrows(), image.ncols()
        );
    }
    debug!(
        "scan plan: {}x{} image, {} scales, {} tasks, {} windows",
        image.nrows(),
        image.ncols(),
        plan.scale_count(),
        plan.tasks().len(),
        plan.window_count()
    );
    Ok(plan)
}
