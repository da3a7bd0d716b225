//! A k-nearest-neighbour index over path waypoints.

use crate::math::Point2d;
use smallvec::SmallVec;

/// A waypoint returned from a nearest-neighbour query.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor {
    /// The waypoint's position.
    pub point: Point2d,
    /// The waypoint's index in the path it was built from.
    pub id: usize,
}

/// A node of the 2-d tree, stored in a flat arena.
#[derive(Clone, Debug)]
struct Node {
    point: Point2d,
    id: usize,
    /// The splitting axis: 0 for x, 1 for y.
    axis: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A 2-d tree over the waypoints of a path.
///
/// The control policy queries the two waypoints nearest the car and
/// picks between them by heading alignment, tolerating positional
/// noise that a strictly sequential cursor would not.
#[derive(Clone, Debug, Default)]
pub struct WaypointIndex {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl WaypointIndex {
    /// Builds an index over the given waypoints. Each entry is tagged
    /// with its index in `points`.
    pub fn build(points: &[Point2d]) -> Self {
        let mut items: Vec<(Point2d, usize)> =
            points.iter().copied().enumerate().map(|(i, p)| (p, i)).collect();
        let mut index = Self {
            nodes: Vec::with_capacity(items.len()),
            root: None,
        };
        index.root = index.build_node(&mut items, 0);
        index
    }

    fn build_node(&mut self, items: &mut [(Point2d, usize)], depth: u8) -> Option<usize> {
        if items.is_empty() {
            return None;
        }

        let axis = depth % 2;
        let mid = items.len() / 2;
        items.sort_unstable_by(|a, b| coord(a.0, axis).total_cmp(&coord(b.0, axis)));
        let (point, id) = items[mid];

        let slot = self.nodes.len();
        self.nodes.push(Node {
            point,
            id,
            axis,
            left: None,
            right: None,
        });

        let (below, rest) = items.split_at_mut(mid);
        let left = self.build_node(below, depth + 1);
        let right = self.build_node(&mut rest[1..], depth + 1);
        self.nodes[slot].left = left;
        self.nodes[slot].right = right;
        Some(slot)
    }

    /// The number of indexed waypoints. Consumers compare this against
    /// the live path length to detect a stale index.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns up to `k` waypoints closest to `query`, nearest first.
    pub fn k_nearest(&self, query: Point2d, k: usize) -> SmallVec<[Neighbor; 2]> {
        let mut best: SmallVec<[(f64, usize); 2]> = SmallVec::new();
        if k > 0 {
            self.search(self.root, query, k, &mut best);
        }
        best.into_iter()
            .map(|(_, slot)| {
                let node = &self.nodes[slot];
                Neighbor {
                    point: node.point,
                    id: node.id,
                }
            })
            .collect()
    }

    /// Branch-and-bound descent; `best` holds (squared distance, slot)
    /// pairs sorted nearest first, at most `k` of them.
    fn search(
        &self,
        slot: Option<usize>,
        query: Point2d,
        k: usize,
        best: &mut SmallVec<[(f64, usize); 2]>,
    ) {
        let Some(slot) = slot else { return };
        let node = &self.nodes[slot];

        let dx = node.point.x - query.x;
        let dy = node.point.y - query.y;
        let dist2 = dx * dx + dy * dy;
        if best.len() < k {
            let at = best.partition_point(|(d, _)| *d <= dist2);
            best.insert(at, (dist2, slot));
        } else if dist2 < best[k - 1].0 {
            best.pop();
            let at = best.partition_point(|(d, _)| *d <= dist2);
            best.insert(at, (dist2, slot));
        }

        let delta = coord(query, node.axis) - coord(node.point, node.axis);
        let (near, far) = if delta < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.search(near, query, k, best);
        // Only cross the splitting plane if it could hold a closer point.
        if best.len() < k || delta * delta < best[best.len() - 1].0 {
            self.search(far, query, k, best);
        }
    }
}

fn coord(point: Point2d, axis: u8) -> f64 {
    if axis == 0 {
        point.x
    } else {
        point.y
    }
}
