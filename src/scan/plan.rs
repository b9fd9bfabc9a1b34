//! Partitioning of the scan space into independent tasks.
//!
//! A [`ScanPlan`] lists every (scale, row band) pair that has at least one
//! admissible window. Tasks only read the image and the classifier and write
//! to their own buffer, so they can run in any order or in parallel; the
//! results are concatenated in task order, which reproduces the sequential
//! ordering (scale outermost, then row-major).

use super::ScanParams;
use crate::cascade::Classifier;
use crate::image::ImageU8;
use crate::types::{Detection, Window};

/// Row positions per task unless configured otherwise.
pub const DEFAULT_BAND_ROWS: usize = 16;

/// Evenly spaced window centers along one image axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisPositions {
    pub first: usize,
    pub step: usize,
    pub count: usize,
}

impl AxisPositions {
    /// Centers `p = ceil(s/2) + k·step` with `p + s/2 <= extent`.
    pub fn new(extent: usize, size: f32, step: usize) -> Self {
        let half = 0.5 * size;
        let first = half.ceil() as usize;
        let count = if first as f32 + half <= extent as f32 {
            // Largest admissible center, then count the steps up to it.
            let last = (extent as f32 - half).floor() as usize;
            (last - first) / step + 1
        } else {
            0
        };
        Self { first, step, count }
    }

    #[inline]
    pub fn get(&self, k: usize) -> usize {
        self.first + k * self.step
    }
}

/// One band of consecutive row positions at a single scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanTask {
    pub scale_index: usize,
    pub size: f32,
    pub rows: AxisPositions,
    pub cols: AxisPositions,
    /// Index of the first row position covered by this task.
    pub row_begin: usize,
    pub row_end: usize,
}

impl ScanTask {
    pub fn window_count(&self) -> usize {
        (self.row_end - self.row_begin) * self.cols.count
    }

    /// Evaluate every window of the task, appending accepted ones to `out`.
    pub fn run<C>(&self, image: &ImageU8<'_>, classifier: &C, out: &mut Vec<Detection>)
    where
        C: Classifier + ?Sized,
    {
        for i in self.row_begin..self.row_end {
            let r = self.rows.get(i) as i32;
            for j in 0..self.cols.count {
                let window = Window::new(r, self.cols.get(j) as i32, self.size);
                let res = classifier.classify(image, &window);
                if res.pass {
                    out.push(Detection::from_window(&window, res.score));
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScanPlan {
    scales: usize,
    tasks: Vec<ScanTask>,
}

impl ScanPlan {
    /// Plan a scan of an `nrows × ncols` image. `params` must be valid.
    pub fn new(nrows: usize, ncols: usize, params: &ScanParams) -> Self {
        Self::with_band_rows(nrows, ncols, params, DEFAULT_BAND_ROWS)
    }

    pub fn with_band_rows(nrows: usize, ncols: usize, params: &ScanParams, band_rows: usize) -> Self {
        let band_rows = band_rows.max(1);
        let mut tasks = Vec::new();
        let mut scales = 0;
        let sizes = params.sizes_within(nrows.min(ncols));
        for (scale_index, size) in sizes.into_iter().enumerate() {
            let step = params.step_for(size);
            let rows = AxisPositions::new(nrows, size, step);
            let cols = AxisPositions::new(ncols, size, step);
            if rows.count == 0 || cols.count == 0 {
                continue;
            }
            scales += 1;
            let mut row_begin = 0;
            while row_begin < rows.count {
                let row_end = (row_begin + band_rows).min(rows.count);
                tasks.push(ScanTask {
                    scale_index,
                    size,
                    rows,
                    cols,
                    row_begin,
                    row_end,
                });
                row_begin = row_end;
            }
        }
        Self { scales, tasks }
    }

    pub fn tasks(&self) -> &[ScanTask] {
        &self.tasks
    }

    /// Number of scales with at least one admissible window.
    pub fn scale_count(&self) -> usize {
        self.scales
    }

    pub fn window_count(&self) -> usize {
        self.tasks.iter().map(ScanTask::window_count).sum()
    }

    /// Run all tasks on the calling thread.
    pub fn run<C>(&self, image: &ImageU8<'_>, classifier: &C) -> Vec<Detection>
    where
        C: Classifier + ?Sized,
    {
        let mut out = Vec::new();
        for task in &self.tasks {
            task.run(image, classifier, &mut out);
        }
        out
    }

    /// Run tasks on the rayon pool; output order matches [`ScanPlan::run`].
    #[cfg(feature = "parallel")]
    pub fn run_parallel<C>(&self, image: &ImageU8<'_>, classifier: &C) -> Vec<Detection>
    where
        C: Classifier + Sync + ?Sized,
    {
        use rayon::prelude::*;

        let parts: Vec<Vec<Detection>> = self
            .tasks
            .par_iter()
            .map(|task| {
                let mut buf = Vec::new();
                task.run(image, classifier, &mut buf);
                buf
            })
            .collect();
        parts.into_iter().flatten().collect()
    }
}
