use serde::{Deserialize, Serialize};

/// Square scan window: integer center plus side length in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub row: i32,
    pub col: i32,
    pub size: f32,
}

impl Window {
    pub fn new(row: i32, col: i32, size: f32) -> Self {
        Self { row, col, size }
    }

    /// True when `center ± size/2` lies within `[0, nrows] × [0, ncols]`.
    pub fn fits(&self, nrows: usize, ncols: usize) -> bool {
        let half = 0.5 * self.size;
        let (r, c) = (self.row as f32, self.col as f32);
        r - half >= 0.0 && c - half >= 0.0 && r + half <= nrows as f32 && c + half <= ncols as f32
    }
}

/// A detection `(r, c, s, q)`: window center, side length and cascade score.
///
/// Raw detections carry integer centers; clustered ones may be fractional.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub row: f32,
    pub col: f32,
    pub size: f32,
    pub score: f32,
}

impl Detection {
    pub fn new(row: f32, col: f32, size: f32, score: f32) -> Self {
        Self {
            row,
            col,
            size,
            score,
        }
    }

    pub fn from_window(window: &Window, score: f32) -> Self {
        Self::new(window.row as f32, window.col as f32, window.size, score)
    }

    /// Axis-aligned box `(x = c - s/2, y = r - s/2, w = s, h = s)`.
    pub fn bbox(&self) -> BoundingBox {
        let half = 0.5 * self.size;
        BoundingBox {
            x: self.col - half,
            y: self.row - half,
            w: self.size,
            h: self.size,
        }
    }

    /// Total order used wherever output must not depend on input order:
    /// score descending, then row, column and size ascending.
    pub(crate) fn canonical_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.row.total_cmp(&other.row))
            .then(self.col.total_cmp(&other.col))
            .then(self.size.total_cmp(&other.size))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Result of merging overlapping detections.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cluster {
    pub detection: Detection,
    /// Indices into the clustered input, ascending.
    pub members: Vec<usize>,
}
