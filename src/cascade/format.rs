//! Native cascade layout, version 1.
//!
//! All integers are little-endian.
//!
//! ```text
//! header (12 bytes)
//!   0   [u8; 4]  magic "CSCD"
//!   4   u8       version (1)
//!   5   u8       precision: 0 = f32 values, 1 = Q16.16 fixed-point i32
//!   6   u16      reserved, must be 0
//!   8   u32      tree count
//! per tree
//!   u8                depth d in 1..=16
//!   [i8; 4] × (2^d-1) split offsets r1 c1 r2 c2, heap order, each in [-127, 127]
//!   value × 2^d       leaf values
//!   value             rejection threshold
//! ```
//!
//! Counts are checked against the remaining input before anything is
//! allocated, and trailing bytes after the last tree are rejected.

use super::{Cascade, Node, Tree, MAX_TREE_DEPTH};

pub const MAGIC: [u8; 4] = *b"CSCD";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 12;

/// Smallest possible tree record (depth 1, 4-byte values).
const MIN_TREE_LEN: usize = 1 + 4 + 2 * 4 + 4;

/// Numeric encoding of leaf values and thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    Float32,
    /// Signed Q16.16 stored as `i32`.
    Fixed16,
}

impl Precision {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Precision::Float32),
            1 => Some(Precision::Fixed16),
            _ => None,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Precision::Float32 => 0,
            Precision::Fixed16 => 1,
        }
    }
}

/// Reasons a byte sequence is not a valid cascade.
#[derive(Clone, Debug, PartialEq)]
pub enum FormatError {
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    BadMagic([u8; 4]),
    UnsupportedVersion(u8),
    UnsupportedPrecision(u8),
    ReservedNonZero(u16),
    EmptyCascade,
    CountExceedsData {
        declared: usize,
        max_possible: usize,
    },
    DepthOutOfRange {
        tree: usize,
        depth: i64,
    },
    ShapeMismatch {
        depth: u8,
        nodes: usize,
        leaves: usize,
    },
    OffsetOutOfRange {
        tree: usize,
        node: usize,
    },
    NonFiniteValue {
        tree: usize,
    },
    TrailingBytes(usize),
}

impl FormatError {
    /// Attach the index of the tree being parsed.
    pub(crate) fn in_tree(self, index: usize) -> Self {
        match self {
            FormatError::DepthOutOfRange { depth, .. } => FormatError::DepthOutOfRange {
                tree: index,
                depth,
            },
            FormatError::OffsetOutOfRange { node, .. } => {
                FormatError::OffsetOutOfRange { tree: index, node }
            }
            FormatError::NonFiniteValue { .. } => FormatError::NonFiniteValue { tree: index },
            other => other,
        }
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated cascade at byte {offset} (need {needed}, have {available})"
            ),
            FormatError::BadMagic(m) => write!(f, "bad cascade magic {m:02x?}"),
            FormatError::UnsupportedVersion(v) => write!(f, "unsupported cascade version {v}"),
            FormatError::UnsupportedPrecision(p) => write!(f, "unknown value precision tag {p}"),
            FormatError::ReservedNonZero(v) => write!(f, "reserved header field is {v:#06x}"),
            FormatError::EmptyCascade => write!(f, "cascade has no trees"),
            FormatError::CountExceedsData {
                declared,
                max_possible,
            } => write!(
                f,
                "declared {declared} trees but data holds at most {max_possible}"
            ),
            FormatError::DepthOutOfRange { tree, depth } => write!(
                f,
                "tree {tree}: depth {depth} outside 1..={MAX_TREE_DEPTH}"
            ),
            FormatError::ShapeMismatch {
                depth,
                nodes,
                leaves,
            } => write!(
                f,
                "depth {depth} tree needs {} nodes and {} leaves, got {nodes} and {leaves}",
                (1usize << depth) - 1,
                1usize << depth
            ),
            FormatError::OffsetOutOfRange { tree, node } => {
                write!(f, "tree {tree}: node {node} has an offset of -128")
            }
            FormatError::NonFiniteValue { tree } => {
                write!(f, "tree {tree}: non-finite leaf or threshold")
            }
            FormatError::TrailingBytes(n) => write!(f, "{n} unexpected bytes after last tree"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Parse a cascade in the native layout.
pub fn load(bytes: &[u8]) -> Result<Cascade, FormatError> {
    read_cascade(bytes)
}

pub(crate) fn read_cascade(bytes: &[u8]) -> Result<Cascade, FormatError> {
    let mut rd = ByteReader::new(bytes);
    // Check the full header length first so short inputs report truncation.
    rd.ensure(HEADER_LEN)?;
    let magic = rd.array::<4>()?;
    if magic != MAGIC {
        return Err(FormatError::BadMagic(magic));
    }
    let version = rd.u8()?;
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let tag = rd.u8()?;
    let precision = Precision::from_tag(tag).ok_or(FormatError::UnsupportedPrecision(tag))?;
    let reserved = u16::from_le_bytes(rd.array::<2>()?);
    if reserved != 0 {
        return Err(FormatError::ReservedNonZero(reserved));
    }
    let ntrees = rd.u32()? as usize;
    if ntrees == 0 {
        return Err(FormatError::EmptyCascade);
    }
    let max_possible = rd.remaining() / MIN_TREE_LEN;
    if ntrees > max_possible {
        return Err(FormatError::CountExceedsData {
            declared: ntrees,
            max_possible,
        });
    }

    let mut trees = Vec::with_capacity(ntrees);
    for index in 0..ntrees {
        let depth = rd.u8()?;
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(FormatError::DepthOutOfRange {
                tree: index,
                depth: depth as i64,
            });
        }
        let tree = read_tree_body(&mut rd, depth, |rd| rd.value(precision))
            .map_err(|e| e.in_tree(index))?;
        trees.push(tree);
    }
    if rd.remaining() != 0 {
        return Err(FormatError::TrailingBytes(rd.remaining()));
    }
    Cascade::new(trees)
}

/// Read node offsets, leaves and threshold of a tree whose depth is known.
pub(crate) fn read_tree_body<'a>(
    rd: &mut ByteReader<'a>,
    depth: u8,
    mut value: impl FnMut(&mut ByteReader<'a>) -> Result<f32, FormatError>,
) -> Result<Tree, FormatError> {
    let nleaves = 1usize << depth;
    rd.ensure(4 * (nleaves - 1) + 4 * nleaves + 4)?;
    let mut nodes = Vec::with_capacity(nleaves - 1);
    for _ in 0..nleaves - 1 {
        nodes.push(Node::from_bytes(rd.array::<4>()?));
    }
    let mut leaves = Vec::with_capacity(nleaves);
    for _ in 0..nleaves {
        leaves.push(value(rd)?);
    }
    let threshold = value(rd)?;
    Tree::new(depth, nodes, leaves, threshold)
}

/// Serialise `cascade` in the native layout.
pub fn write_cascade(cascade: &Cascade, precision: Precision) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + cascade.len() * MIN_TREE_LEN);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.push(precision.tag());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(cascade.len() as u32).to_le_bytes());
    let put = |out: &mut Vec<u8>, v: f32| match precision {
        Precision::Float32 => out.extend_from_slice(&v.to_le_bytes()),
        Precision::Fixed16 => {
            let q = (v as f64 * 65536.0).round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            out.extend_from_slice(&q.to_le_bytes())
        }
    };
    for tree in cascade.trees() {
        out.push(tree.depth());
        for node in tree.nodes() {
            out.extend_from_slice(&node.to_bytes());
        }
        for &leaf in tree.leaves() {
            put(&mut out, leaf);
        }
        put(&mut out, tree.threshold());
    }
    out
}

/// Bounds-checked little-endian cursor.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn ensure(&self, needed: usize) -> Result<(), FormatError> {
        if needed > self.remaining() {
            return Err(FormatError::Truncated {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.array::<4>()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, FormatError> {
        Ok(i32::from_le_bytes(self.array::<4>()?))
    }

    pub(crate) fn f32(&mut self) -> Result<f32, FormatError> {
        Ok(f32::from_le_bytes(self.array::<4>()?))
    }

    fn value(&mut self, precision: Precision) -> Result<f32, FormatError> {
        match precision {
            Precision::Float32 => self.f32(),
            Precision::Fixed16 => Ok((self.i32()? as f64 / 65536.0) as f32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_tree_cascade() -> Cascade {
        let tree = Tree::new(
            2,
            vec![
                Node::new(-10, 0, 10, 0),
                Node::new(0, -10, 0, 10),
                Node::new(5, 5, -5, -5),
            ],
            vec![-1.0, 0.5, 1.25, 2.0],
            -0.75,
        )
        .unwrap();
        Cascade::new(vec![tree]).unwrap()
    }

    #[test]
    fn layout_matches_documented_sizes() {
        let bytes = one_tree_cascade().to_bytes();
        assert_eq!(&bytes[..4], b"CSCD");
        assert_eq!(bytes[4], VERSION);
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 1);
        // depth byte + 3 nodes + 4 leaves + threshold
        assert_eq!(bytes.len(), HEADER_LEN + 1 + 12 + 16 + 4);
        assert_eq!(bytes[HEADER_LEN + 1] as i8, -10);
    }

    #[test]
    fn fixed_point_values_decode() {
        let cascade = one_tree_cascade();
        let bytes = write_cascade(&cascade, Precision::Fixed16);
        assert_eq!(bytes[5], 1);
        // All test values are exact in Q16.16.
        assert_eq!(load(&bytes).unwrap(), cascade);
    }

    #[test]
    fn short_header_is_truncation() {
        let bytes = one_tree_cascade().to_bytes();
        for len in 0..HEADER_LEN {
            assert!(matches!(
                load(&bytes[..len]),
                Err(FormatError::Truncated { offset: 0, .. })
            ));
        }
    }

    #[test]
    fn every_truncation_fails() {
        let bytes = one_tree_cascade().to_bytes();
        for len in 0..bytes.len() {
            assert!(load(&bytes[..len]).is_err(), "accepted {len} bytes");
        }
    }

    #[test]
    fn header_fields_are_checked() {
        let good = one_tree_cascade().to_bytes();

        let mut bad = good.clone();
        bad[0] = b'X';
        assert!(matches!(load(&bad), Err(FormatError::BadMagic(_))));

        let mut bad = good.clone();
        bad[4] = 2;
        assert_eq!(load(&bad), Err(FormatError::UnsupportedVersion(2)));

        let mut bad = good.clone();
        bad[5] = 9;
        assert_eq!(load(&bad), Err(FormatError::UnsupportedPrecision(9)));

        let mut bad = good.clone();
        bad[6] = 1;
        assert_eq!(load(&bad), Err(FormatError::ReservedNonZero(1)));

        let mut bad = good.clone();
        bad[8..12].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(load(&bad), Err(FormatError::EmptyCascade));
    }

    #[test]
    fn huge_tree_count_is_rejected_before_allocation() {
        let mut bad = one_tree_cascade().to_bytes();
        bad[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            load(&bad),
            Err(FormatError::CountExceedsData { max_possible: 1, .. })
        ));
    }

    #[test]
    fn body_errors_name_the_tree() {
        let good = one_tree_cascade().to_bytes();

        let mut bad = good.clone();
        bad[HEADER_LEN] = 17;
        assert_eq!(
            load(&bad),
            Err(FormatError::DepthOutOfRange { tree: 0, depth: 17 })
        );

        let mut bad = good.clone();
        bad[HEADER_LEN + 5] = 0x80;
        assert_eq!(
            load(&bad),
            Err(FormatError::OffsetOutOfRange { tree: 0, node: 1 })
        );

        let mut bad = good.clone();
        let thr = bad.len() - 4;
        bad[thr..].copy_from_slice(&f32::NAN.to_le_bytes());
        assert_eq!(load(&bad), Err(FormatError::NonFiniteValue { tree: 0 }));

        let mut bad = good;
        bad.push(0);
        assert_eq!(load(&bad), Err(FormatError::TrailingBytes(1)));
    }
}
