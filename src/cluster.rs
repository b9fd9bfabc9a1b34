//! Merging of overlapping detections.
//!
//! Two groups of detections are linked by the larger of
//! - the highest IoU between a member of one and a member of the other, and
//! - the IoU of the two groups' merged detections.
//!
//! Starting from one group per detection, the pair with the strongest link is
//! merged as long as that link is strictly greater than the threshold. A
//! group becomes one detection:
//! - position and size are the score-weighted mean of the members, with
//!   weights `max(q, 0)` (plain mean when every weight is zero);
//! - the score is the sum of member scores;
//! - a group with a single member is passed through unchanged.
//!
//! The merge sequence itself never looks at the threshold, only the point
//! where it stops does. A lower threshold runs the same sequence further, so
//! its partition coarsens the one of any higher threshold. Once merging stops
//! no member pair and no pair of outputs overlaps above the threshold: every
//! connected component of the IoU graph sits inside one cluster, and
//! clustering the output again returns it unchanged.
//!
//! Equally strong links are ordered by the member detections themselves and
//! members are accumulated in a canonical order, so the result does not
//! depend on the order of the input.

use crate::scan::params::{validate_iou_threshold, InvalidParams};
use crate::types::{Cluster, Detection};
use log::debug;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Intersection over union of two square windows `center ± size/2`.
pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let overlap = |ca: f32, cb: f32| {
        let lo = (ca - 0.5 * a.size).max(cb - 0.5 * b.size);
        let hi = (ca + 0.5 * a.size).min(cb + 0.5 * b.size);
        (hi - lo).max(0.0)
    };
    let inter = overlap(a.row, b.row) * overlap(a.col, b.col);
    let union = a.size * a.size + b.size * b.size - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// IoU threshold known to lie in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct IouThreshold(f32);

impl IouThreshold {
    pub fn new(value: f32) -> Result<Self, InvalidParams> {
        validate_iou_threshold(value)?;
        Ok(Self(value))
    }

    #[inline]
    pub fn get(self) -> f32 {
        self.0
    }
}

/// Cluster `detections`, returning one detection per cluster.
pub fn cluster_detections(
    detections: &[Detection],
    iou_threshold: f32,
) -> Result<Vec<Detection>, InvalidParams> {
    Ok(cluster_with_members(detections, iou_threshold)?
        .into_iter()
        .map(|c| c.detection)
        .collect())
}

/// Cluster `detections`, also reporting which inputs formed each cluster.
pub fn cluster_with_members(
    detections: &[Detection],
    iou_threshold: f32,
) -> Result<Vec<Cluster>, InvalidParams> {
    Ok(merge_overlapping(detections, IouThreshold::new(iou_threshold)?))
}

/// [`cluster_with_members`] for an already validated threshold.
pub fn merge_overlapping(detections: &[Detection], threshold: IouThreshold) -> Vec<Cluster> {
    let mut merger = Agglomeration::new(detections, threshold.get());
    let mut merges = 0;
    while let Some((a, b)) = merger.next_pair() {
        merger.merge(a, b);
        merges += 1;
    }

    let mut clusters = merger.into_clusters();
    clusters.sort_by(|a, b| {
        a.detection
            .canonical_cmp(&b.detection)
            .then_with(|| a.members.cmp(&b.members))
    });
    debug!(
        "cluster: {} detections -> {} clusters (iou > {}, {merges} merges)",
        detections.len(),
        clusters.len(),
        threshold.get()
    );
    clusters
}

/// `members` must be in canonical order.
fn merge_members(detections: &[Detection], members: &[usize]) -> Detection {
    if let [only] = members {
        return detections[*only];
    }
    let weight_sum: f64 = members
        .iter()
        .map(|&i| detections[i].score.max(0.0) as f64)
        .sum();
    let uniform = !(weight_sum > 0.0);
    let (mut r, mut c, mut s, mut q, mut w_total) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for d in members.iter().map(|&i| &detections[i]) {
        let w = if uniform { 1.0 } else { d.score.max(0.0) as f64 };
        r += w * d.row as f64;
        c += w * d.col as f64;
        s += w * d.size as f64;
        q += d.score as f64;
        w_total += w;
    }
    Detection::new(
        (r / w_total) as f32,
        (c / w_total) as f32,
        (s / w_total) as f32,
        q as f32,
    )
}

/// Merge candidate between groups `a < b`.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    link: f32,
    a: usize,
    b: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Strongest link on top of the max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        self.link.total_cmp(&other.link)
    }
}

struct Group {
    /// Input indices, sorted by their detections' canonical order.
    members: Vec<usize>,
    detection: Detection,
    /// Highest member-to-member IoU with each neighbouring group, kept only
    /// above the threshold.
    links: BTreeMap<usize, f32>,
    alive: bool,
}

/// Greedy strongest-link merging. Groups are never modified: a merge retires
/// both inputs and appends a new group, so heap entries only go stale.
struct Agglomeration<'a> {
    detections: &'a [Detection],
    threshold: f32,
    groups: Vec<Group>,
    queue: BinaryHeap<Candidate>,
}

impl<'a> Agglomeration<'a> {
    fn new(detections: &'a [Detection], threshold: f32) -> Self {
        let mut groups: Vec<Group> = detections
            .iter()
            .enumerate()
            .map(|(i, &detection)| Group {
                members: vec![i],
                detection,
                links: BTreeMap::new(),
                alive: true,
            })
            .collect();
        let mut queue = BinaryHeap::new();
        for i in 0..detections.len() {
            for j in i + 1..detections.len() {
                let link = iou(&detections[i], &detections[j]);
                if link > threshold {
                    groups[i].links.insert(j, link);
                    groups[j].links.insert(i, link);
                    queue.push(Candidate { link, a: i, b: j });
                }
            }
        }
        Self {
            detections,
            threshold,
            groups,
            queue,
        }
    }

    fn is_live(&self, c: &Candidate) -> bool {
        self.groups[c.a].alive && self.groups[c.b].alive
    }

    /// Live pair with the strongest link above the threshold.
    fn next_pair(&mut self) -> Option<(usize, usize)> {
        let mut best = loop {
            let c = self.queue.pop()?;
            if self.is_live(&c) {
                break c;
            }
        };
        let mut tied = Vec::new();
        while let Some(&c) = self.queue.peek() {
            if c.link.total_cmp(&best.link).is_ne() {
                break;
            }
            self.queue.pop();
            if !self.is_live(&c) {
                continue;
            }
            if self.pair_cmp(&c, &best).is_lt() {
                tied.push(best);
                best = c;
            } else {
                tied.push(c);
            }
        }
        self.queue.extend(tied);
        Some((best.a, best.b))
    }

    /// Order of two groups by their member detections.
    fn content_cmp(&self, a: usize, b: usize) -> Ordering {
        let (ma, mb) = (&self.groups[a].members, &self.groups[b].members);
        for (&x, &y) in ma.iter().zip(mb) {
            let ord = self.detections[x].canonical_cmp(&self.detections[y]);
            if ord.is_ne() {
                return ord;
            }
        }
        ma.len().cmp(&mb.len())
    }

    /// Total order on equally linked candidates. Group ids only decide
    /// between groups with identical members, which merge to the same value.
    fn pair_cmp(&self, p: &Candidate, q: &Candidate) -> Ordering {
        let ordered = |c: &Candidate| {
            if self.content_cmp(c.a, c.b).is_gt() {
                (c.b, c.a)
            } else {
                (c.a, c.b)
            }
        };
        let (p0, p1) = ordered(p);
        let (q0, q1) = ordered(q);
        self.content_cmp(p0, q0)
            .then_with(|| self.content_cmp(p1, q1))
            .then_with(|| (p0, p1).cmp(&(q0, q1)))
    }

    fn merge(&mut self, a: usize, b: usize) {
        let id = self.groups.len();
        let detections = self.detections;

        let mut members = std::mem::take(&mut self.groups[a].members);
        members.append(&mut self.groups[b].members);
        members.sort_by(|&x, &y| detections[x].canonical_cmp(&detections[y]).then(x.cmp(&y)));
        let detection = merge_members(detections, &members);

        let mut links = std::mem::take(&mut self.groups[a].links);
        for (k, v) in std::mem::take(&mut self.groups[b].links) {
            let slot = links.entry(k).or_insert(v);
            *slot = slot.max(v);
        }
        links.remove(&a);
        links.remove(&b);
        self.groups[a].alive = false;
        self.groups[b].alive = false;
        for (&k, &v) in &links {
            let neighbour = &mut self.groups[k].links;
            neighbour.remove(&a);
            neighbour.remove(&b);
            neighbour.insert(id, v);
        }

        for (k, group) in self.groups.iter().enumerate() {
            if !group.alive {
                continue;
            }
            let member_link = links.get(&k).copied().unwrap_or(0.0);
            let link = member_link.max(iou(&detection, &group.detection));
            if link > self.threshold {
                self.queue.push(Candidate { link, a: k, b: id });
            }
        }
        self.groups.push(Group {
            members,
            detection,
            links,
            alive: true,
        });
    }

    fn into_clusters(self) -> Vec<Cluster> {
        self.groups
            .into_iter()
            .filter(|g| g.alive)
            .map(|g| {
                let mut members = g.members;
                members.sort_unstable();
                Cluster {
                    detection: g.detection,
                    members,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(r: f32, c: f32, s: f32, q: f32) -> Detection {
        Detection::new(r, c, s, q)
    }

    #[test]
    fn iou_of_square_windows() {
        let a = det(10.0, 10.0, 4.0, 1.0);
        assert_eq!(iou(&a, &a), 1.0);
        // Shifted by half a side: overlap 2x4 = 8, union 32 - 8 = 24.
        let b = det(10.0, 12.0, 4.0, 1.0);
        assert!((iou(&a, &b) - 8.0 / 24.0).abs() < 1e-6);
        // Touching edges do not overlap.
        let c = det(10.0, 14.0, 4.0, 1.0);
        assert_eq!(iou(&a, &c), 0.0);
        // Nested window: 4 / 16.
        let d = det(10.0, 10.0, 2.0, 1.0);
        assert!((iou(&a, &d) - 0.25).abs() < 1e-6);
        assert_eq!(iou(&det(0.0, 0.0, 0.0, 1.0), &det(0.0, 0.0, 0.0, 1.0)), 0.0);
    }

    #[test]
    fn chain_forms_one_component() {
        // a-b and b-c overlap, a-c do not: still one cluster.
        let dets = [
            det(10.0, 10.0, 4.0, 1.0),
            det(10.0, 11.0, 4.0, 1.0),
            det(10.0, 12.5, 4.0, 1.0),
        ];
        assert!(iou(&dets[0], &dets[2]) < 0.3);
        let clusters = cluster_with_members(&dets, 0.3).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1, 2]);
        assert!((clusters[0].detection.score - 3.0).abs() < 1e-6);
    }

    #[test]
    fn merged_position_is_score_weighted() {
        let dets = [det(10.0, 10.0, 4.0, 3.0), det(10.0, 11.0, 4.0, 1.0)];
        let out = cluster_detections(&dets, 0.1).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0].col - 10.25).abs() < 1e-6);
        assert_eq!(out[0].row, 10.0);
        assert_eq!(out[0].size, 4.0);
        assert_eq!(out[0].score, 4.0);
    }

    #[test]
    fn zero_scores_fall_back_to_plain_mean() {
        let dets = [det(10.0, 10.0, 4.0, 0.0), det(10.0, 11.0, 4.0, 0.0)];
        let out = cluster_detections(&dets, 0.1).unwrap();
        assert_eq!(out, vec![det(10.0, 10.5, 4.0, 0.0)]);
    }

    #[test]
    fn dense_overlaps_reach_a_fixed_point() {
        // Small LCG so the layout is fixed but irregular.
        let mut state = 12345u32;
        let mut next = || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as f32 / 65536.0
        };
        let dets: Vec<Detection> = (0..80)
            .map(|_| det(20.0 * next(), 20.0 * next(), 3.0 + 6.0 * next(), 0.5 + next()))
            .collect();
        for t in [0.0, 0.1, 0.3, 0.5] {
            let once = cluster_detections(&dets, t).unwrap();
            for i in 0..once.len() {
                for j in i + 1..once.len() {
                    assert!(iou(&once[i], &once[j]) <= t);
                }
            }
            assert_eq!(cluster_detections(&once, t).unwrap(), once);
        }
    }

    #[test]
    fn threshold_one_never_merges() {
        let dets = [det(5.0, 5.0, 4.0, 1.0), det(5.0, 5.0, 4.0, 2.0)];
        let out = cluster_detections(&dets, 1.0).unwrap();
        assert_eq!(out, vec![dets[1], dets[0]]);
    }

    #[test]
    fn lower_threshold_only_coarsens() {
        let dets = [
            det(19.66, 6.35, 9.07, 0.137),
            det(10.52, 8.90, 12.69, 0.255),
            det(1.67, 15.90, 12.75, 0.867),
            det(11.44, 19.35, 5.57, 0.516),
            det(3.72, 7.52, 4.35, 1.053),
        ];
        let partition = |t: f32| -> Vec<Vec<usize>> {
            let mut groups: Vec<Vec<usize>> = cluster_with_members(&dets, t)
                .unwrap()
                .into_iter()
                .map(|c| c.members)
                .collect();
            groups.sort();
            groups
        };
        let mut finer = partition(1.0);
        assert_eq!(finer.len(), dets.len());
        for step in (0..20).rev() {
            let t = step as f32 / 20.0;
            let coarser = partition(t);
            assert!(coarser.len() <= finer.len(), "threshold {t}");
            for group in &finer {
                assert!(
                    coarser.iter().any(|g| group.iter().all(|i| g.contains(i))),
                    "threshold {t} split {group:?}"
                );
            }
            finer = coarser;
        }
    }

    #[test]
    fn validated_threshold_matches_checked_entry_point() {
        let dets = [det(10.0, 10.0, 4.0, 1.0), det(10.0, 11.0, 4.0, 2.0)];
        let t = IouThreshold::new(0.2).unwrap();
        assert_eq!(t.get(), 0.2);
        assert_eq!(merge_overlapping(&dets, t), cluster_with_members(&dets, 0.2).unwrap());
        assert!(matches!(
            IouThreshold::new(f32::NAN),
            Err(InvalidParams::IouThreshold(_))
        ));
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        assert_eq!(
            cluster_detections(&[], 1.5),
            Err(InvalidParams::IouThreshold(1.5))
        );
        assert_eq!(cluster_detections(&[], 0.5), Ok(Vec::new()));
    }
}
