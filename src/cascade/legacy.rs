//! Reader for cascades in the legacy pico layout (e.g. `facefinder`).
//!
//! ```text
//! [u8; 8]   opaque (version and training metadata), ignored
//! i32       tree depth, shared by all trees
//! i32       tree count
//! per tree: [i8; 4] × (2^d-1) offsets, f32 × 2^d leaves, f32 threshold
//! ```
//!
//! There is no magic number, so this layout is only read when the caller asks
//! for it explicitly.

use super::format::{read_tree_body, ByteReader, FormatError};
use super::{Cascade, MAX_TREE_DEPTH};

pub const LEGACY_HEADER_LEN: usize = 16;

pub fn read_pico_cascade(bytes: &[u8]) -> Result<Cascade, FormatError> {
    let mut rd = ByteReader::new(bytes);
    rd.ensure(LEGACY_HEADER_LEN)?;
    rd.skip(8)?;
    let depth = rd.i32()?;
    if depth < 1 || depth > MAX_TREE_DEPTH as i32 {
        return Err(FormatError::DepthOutOfRange {
            tree: 0,
            depth: depth as i64,
        });
    }
    let ntrees = rd.i32()?;
    if ntrees <= 0 {
        return Err(FormatError::EmptyCascade);
    }
    let ntrees = ntrees as usize;
    let depth = depth as u8;
    // Every tree record has the same size: 4(2^d - 1) + 4·2^d + 4.
    let tree_len = 8usize << depth;
    let max_possible = rd.remaining() / tree_len;
    if ntrees > max_possible {
        return Err(FormatError::CountExceedsData {
            declared: ntrees,
            max_possible,
        });
    }

    let mut trees = Vec::with_capacity(ntrees);
    for index in 0..ntrees {
        let tree = read_tree_body(&mut rd, depth, |rd| rd.f32()).map_err(|e| e.in_tree(index))?;
        trees.push(tree);
    }
    if rd.remaining() != 0 {
        return Err(FormatError::TrailingBytes(rd.remaining()));
    }
    Cascade::new(trees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{Node, Tree};

    fn pico_blob(depth: i32, trees: &[(Vec<[i8; 4]>, Vec<f32>, f32)]) -> Vec<u8> {
        let mut out = vec![0xAB; 8];
        out.extend_from_slice(&depth.to_le_bytes());
        out.extend_from_slice(&(trees.len() as i32).to_le_bytes());
        for (nodes, leaves, thr) in trees {
            for n in nodes {
                out.extend(n.iter().map(|&v| v as u8));
            }
            for l in leaves {
                out.extend_from_slice(&l.to_le_bytes());
            }
            out.extend_from_slice(&thr.to_le_bytes());
        }
        out
    }

    #[test]
    fn reads_shared_depth_trees() {
        let blob = pico_blob(
            1,
            &[
                (vec![[1, 2, 3, 4]], vec![0.5, -0.5], -1.0),
                (vec![[-4, -3, -2, -1]], vec![1.0, 2.0], 0.0),
            ],
        );
        let cascade = read_pico_cascade(&blob).unwrap();
        assert_eq!(cascade.len(), 2);
        let expected = Tree::new(1, vec![Node::new(-4, -3, -2, -1)], vec![1.0, 2.0], 0.0).unwrap();
        assert_eq!(cascade.trees()[1], expected);
        assert_eq!(Cascade::from_pico_bytes(&blob).unwrap(), cascade);
    }

    #[test]
    fn rejects_bad_counts_and_truncation() {
        let blob = pico_blob(2, &[(vec![[0; 4]; 3], vec![0.0; 4], 0.0)]);
        assert!(matches!(
            read_pico_cascade(&blob[..LEGACY_HEADER_LEN - 1]),
            Err(FormatError::Truncated { .. })
        ));
        assert!(matches!(
            read_pico_cascade(&blob[..blob.len() - 1]),
            Err(FormatError::CountExceedsData { .. })
        ));

        let mut bad = blob.clone();
        bad[8..12].copy_from_slice(&(-3i32).to_le_bytes());
        assert!(matches!(
            read_pico_cascade(&bad),
            Err(FormatError::DepthOutOfRange { depth: -3, .. })
        ));

        let mut bad = blob;
        bad[12..16].copy_from_slice(&0i32.to_le_bytes());
        assert_eq!(read_pico_cascade(&bad), Err(FormatError::EmptyCascade));
    }

    #[test]
    fn native_loader_refuses_pico_layout() {
        let blob = pico_blob(1, &[(vec![[1, 2, 3, 4]], vec![0.5, -0.5], -1.0)]);
        assert!(matches!(
            crate::cascade::load(&blob),
            Err(FormatError::BadMagic(_))
        ));
    }
}
