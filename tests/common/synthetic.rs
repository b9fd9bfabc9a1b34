use cascade_detector::cascade::{Cascade, Node, Tree};
use cascade_detector::Detection;

/// Deterministic linear congruential generator for reproducible fixtures.
pub struct Lcg(u32);

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self(seed)
    }

    /// Uniform sample in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (self.0 >> 8) as f32 / (1u32 << 24) as f32
    }

    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    pub fn offset(&mut self) -> i8 {
        ((self.next_f32() * 255.0) as i32 - 127) as i8
    }
}

/// Random cascade whose trees add `[-0.5, 1.5)` per stage against
/// thresholds rising by `step` per tree.
pub fn random_cascade(seed: u32, ntrees: usize, depth: u8, step: f32) -> Cascade {
    let mut rng = Lcg::new(seed);
    let nleaves = 1usize << depth;
    let trees = (0..ntrees)
        .map(|i| {
            let nodes = (0..nleaves - 1)
                .map(|_| Node::new(rng.offset(), rng.offset(), rng.offset(), rng.offset()))
                .collect();
            let leaves = (0..nleaves).map(|_| rng.range(-0.5, 1.5)).collect();
            Tree::new(depth, nodes, leaves, step * (i + 1) as f32).expect("valid tree")
        })
        .collect();
    Cascade::new(trees).expect("non-empty cascade")
}

/// Row-major image with a smooth gradient plus pseudo-random texture.
pub fn textured_u8(nrows: usize, ncols: usize, seed: u32) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut img = vec![0u8; nrows * ncols];
    for r in 0..nrows {
        for c in 0..ncols {
            let base = (r * 3 + c * 2) as f32 % 160.0;
            img[r * ncols + c] = (base + rng.range(0.0, 95.0)) as u8;
        }
    }
    img
}

/// Image of `value` everywhere.
pub fn uniform_u8(nrows: usize, ncols: usize, value: u8) -> Vec<u8> {
    vec![value; nrows * ncols]
}

/// Jittered detections around well separated group centers.
pub fn grouped_detections(seed: u32, groups: &[(f32, f32, f32)], per_group: usize) -> Vec<Detection> {
    let mut rng = Lcg::new(seed);
    let mut out = Vec::new();
    for &(r, c, s) in groups {
        for _ in 0..per_group {
            out.push(Detection::new(
                r + rng.range(-0.2, 0.2) * s,
                c + rng.range(-0.2, 0.2) * s,
                s * rng.range(0.85, 1.15),
                rng.range(0.5, 3.0),
            ));
        }
    }
    out
}

/// `count` detections crowded into an `extent × extent` square, so that
/// overlaps chain across most of them.
pub fn scattered_detections(seed: u32, count: usize, extent: f32) -> Vec<Detection> {
    let mut rng = Lcg::new(seed);
    (0..count)
        .map(|_| {
            Detection::new(
                rng.range(0.0, extent),
                rng.range(0.0, extent),
                rng.range(4.0, 13.0),
                rng.range(0.0, 1.1),
            )
        })
        .collect()
}
