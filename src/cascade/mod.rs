//! Pixel-comparison decision-tree cascade.
//!
//! A [`Cascade`] is an ordered ensemble of fixed-depth binary trees. Every
//! internal node compares the intensities of two pixels whose positions are
//! given relative to the window center, normalised to a unit window:
//! offsets in `[-127, 127]` are scaled by `size / 256`. A leaf contributes a
//! score delta. After each tree the running score is checked against that
//! tree's rejection threshold, and evaluation stops as soon as it drops below
//! it. Most background windows are rejected by the first few trees.
//!
//! Offsets are resolved in fixed point (`size` in Q8.8, positions in Q16.16)
//! with floor division. For any window satisfying [`Window::fits`] every
//! sample then falls strictly inside the window, so evaluation never reads
//! outside the image.
//!
//! Modules
//! - [`format`] – native versioned binary layout (reader and writer).
//! - [`legacy`] – reader for the legacy pico `facefinder` layout.

pub mod format;
pub mod legacy;

pub use format::{load, FormatError, Precision};

use crate::image::ImageU8;
use crate::types::Window;

/// Deepest tree accepted by the loaders (65535 internal nodes).
pub const MAX_TREE_DEPTH: u8 = 16;

/// Outcome of evaluating a classifier on one window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub pass: bool,
    /// Final score when `pass`, otherwise the running score at rejection.
    pub score: f32,
}

impl Classification {
    pub fn accept(score: f32) -> Self {
        Self { pass: true, score }
    }

    pub fn reject(score: f32) -> Self {
        Self { pass: false, score }
    }
}

/// Anything that can accept or reject a square window of an image.
///
/// Implemented by [`Cascade`] and by plain closures, which keeps the scanner
/// testable with hand-written stubs.
pub trait Classifier {
    fn classify(&self, image: &ImageU8<'_>, window: &Window) -> Classification;
}

impl<F> Classifier for F
where
    F: Fn(&ImageU8<'_>, &Window) -> Classification,
{
    fn classify(&self, image: &ImageU8<'_>, window: &Window) -> Classification {
        self(image, window)
    }
}

/// Pair of pixel offsets `(r1, c1)` and `(r2, c2)` compared at a split node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    pub r1: i8,
    pub c1: i8,
    pub r2: i8,
    pub c2: i8,
}

impl Node {
    pub fn new(r1: i8, c1: i8, r2: i8, c2: i8) -> Self {
        Self { r1, c1, r2, c2 }
    }

    pub(crate) fn from_bytes(b: [u8; 4]) -> Self {
        Self::new(b[0] as i8, b[1] as i8, b[2] as i8, b[3] as i8)
    }

    pub(crate) fn to_bytes(self) -> [u8; 4] {
        [self.r1 as u8, self.c1 as u8, self.r2 as u8, self.c2 as u8]
    }

    fn in_range(&self) -> bool {
        [self.r1, self.c1, self.r2, self.c2]
            .iter()
            .all(|&v| v != i8::MIN)
    }
}

/// Complete binary tree of depth `depth` stored in heap order.
///
/// `nodes[i - 1]` is the split at heap index `i` (root = 1); the leaf reached
/// at heap index `i` after `depth` splits is `leaves[i - 2^depth]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    depth: u8,
    nodes: Vec<Node>,
    leaves: Vec<f32>,
    threshold: f32,
}

impl Tree {
    pub fn new(
        depth: u8,
        nodes: Vec<Node>,
        leaves: Vec<f32>,
        threshold: f32,
    ) -> Result<Self, FormatError> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(FormatError::DepthOutOfRange {
                tree: 0,
                depth: depth as i64,
            });
        }
        let nleaves = 1usize << depth;
        if nodes.len() != nleaves - 1 || leaves.len() != nleaves {
            return Err(FormatError::ShapeMismatch {
                depth,
                nodes: nodes.len(),
                leaves: leaves.len(),
            });
        }
        if let Some(node) = nodes.iter().position(|n| !n.in_range()) {
            return Err(FormatError::OffsetOutOfRange { tree: 0, node });
        }
        if !threshold.is_finite() || leaves.iter().any(|v| !v.is_finite()) {
            return Err(FormatError::NonFiniteValue { tree: 0 });
        }
        Ok(Self {
            depth,
            nodes,
            leaves,
            threshold,
        })
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn leaves(&self) -> &[f32] {
        &self.leaves
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Walk the tree for the window at Q16.16 center `(r16, c16)` with Q8.8
    /// size `s8`, returning the leaf value.
    #[inline]
    fn leaf_value(&self, image: &ImageU8<'_>, r16: i64, c16: i64, s8: i64) -> f32 {
        let sample = |dr: i8, dc: i8| -> u8 {
            let r = ((r16 + dr as i64 * s8) >> 16) as usize;
            let c = ((c16 + dc as i64 * s8) >> 16) as usize;
            image.get(r, c)
        };
        let mut idx = 1usize;
        for _ in 0..self.depth {
            let n = &self.nodes[idx - 1];
            let bit = (sample(n.r1, n.c1) <= sample(n.r2, n.c2)) as usize;
            idx = 2 * idx + bit;
        }
        self.leaves[idx - (1usize << self.depth)]
    }
}

/// Immutable ensemble of trees; cheap to share across threads by reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Cascade {
    trees: Vec<Tree>,
}

impl Cascade {
    pub fn new(trees: Vec<Tree>) -> Result<Self, FormatError> {
        if trees.is_empty() {
            return Err(FormatError::EmptyCascade);
        }
        Ok(Self { trees })
    }

    /// Parse the native versioned layout, see [`format`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        format::read_cascade(bytes)
    }

    /// Parse the legacy pico `facefinder` layout, see [`legacy`].
    pub fn from_pico_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        legacy::read_pico_cascade(bytes)
    }

    /// Serialise in the native layout with `f32` values.
    pub fn to_bytes(&self) -> Vec<u8> {
        format::write_cascade(self, Precision::Float32)
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Evaluate every tree without the early exit.
    ///
    /// Rejects iff some prefix score is below its tree's threshold, exactly as
    /// [`Classifier::classify`] does; the score is always the full sum. Mainly
    /// useful for checking the short-circuit and for score diagnostics.
    pub fn classify_exhaustive(&self, image: &ImageU8<'_>, window: &Window) -> Classification {
        if !window.fits(image.nrows(), image.ncols()) {
            return Classification::reject(f32::NEG_INFINITY);
        }
        let (r16, c16, s8) = fixed_point(window);
        let mut score = 0.0f32;
        let mut pass = true;
        for tree in &self.trees {
            score += tree.leaf_value(image, r16, c16, s8);
            if score < tree.threshold {
                pass = false;
            }
        }
        Classification { pass, score }
    }
}

impl Classifier for Cascade {
    fn classify(&self, image: &ImageU8<'_>, window: &Window) -> Classification {
        // Out-of-bounds windows are filtered, never evaluated.
        if !window.fits(image.nrows(), image.ncols()) {
            return Classification::reject(f32::NEG_INFINITY);
        }
        let (r16, c16, s8) = fixed_point(window);
        let mut score = 0.0f32;
        for tree in &self.trees {
            score += tree.leaf_value(image, r16, c16, s8);
            if score < tree.threshold {
                return Classification::reject(score);
            }
        }
        Classification::accept(score)
    }
}

#[inline]
fn fixed_point(window: &Window) -> (i64, i64, i64) {
    let r16 = (window.row as i64) << 16;
    let c16 = (window.col as i64) << 16;
    let s8 = (window.size * 256.0).floor() as i64;
    (r16, c16, s8)
}
