//! Best-first path search over a discretised action space.

use crate::math::{manhattan_dist, rotate_deg, x_to_col, y_to_row, Point2d, Vector2d};
use crate::simulation::Simulation;
use cgmath::prelude::*;
use log::{debug, trace};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// The relative headings a node may branch into, in degrees.
const TURN_ANGLES: [f64; 5] = [-60.0, -30.0, 0.0, 30.0, 60.0];

/// Expansion cap; an unreachable goal fails instead of spinning.
const MAX_EXPANSIONS: usize = 20_000;

/// Pull of a smoothed waypoint toward its raw position.
const SMOOTH_DATA_WEIGHT: f64 = 0.2;

/// Pull of a smoothed waypoint toward its neighbours' midpoint.
const SMOOTH_NEIGHBOUR_WEIGHT: f64 = 0.3;

/// Relaxation passes of the smoothing step.
const SMOOTH_PASSES: usize = 25;

/// A node of the search frontier.
#[derive(Clone, Debug)]
pub struct SearchNode {
    /// The position reached by this node.
    pos: Point2d,
    /// The heading after the last action.
    dir: Vector2d,
    /// Indices into [TURN_ANGLES] of the actions taken from the start.
    actions: Vec<u8>,
    /// The accumulated path cost.
    cost: f64,
    /// The heuristic estimate to the goal.
    heu: f64,
}

impl SearchNode {
    /// The position reached by this node.
    pub fn position(&self) -> Point2d {
        self.pos
    }

    /// The accumulated path cost.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    fn total(&self) -> f64 {
        self.cost + self.heu
    }
}

// `BinaryHeap` is a max-heap; the comparison is inverted so the node
// with the smallest `cost + heu` pops first.
impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other.total().total_cmp(&self.total())
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.total() == other.total()
    }
}

impl Eq for SearchNode {}

/// A best-first search from the host's position to a goal.
pub struct Searcher<'a> {
    sim: &'a Simulation,
    goal: Point2d,
    /// The unit step of one expansion, one tile.
    tile: f64,
}

impl<'a> Searcher<'a> {
    /// Creates a searcher over the given snapshot.
    pub fn new(sim: &'a Simulation, goal: Point2d) -> Self {
        Self {
            sim,
            goal,
            tile: sim.layout().tile_size(),
        }
    }

    /// Runs the search. Returns the terminal node whose reconstructed
    /// path reaches the goal, or `None` when the frontier empties or
    /// the expansion cap is hit.
    pub fn search(&self) -> Option<SearchNode> {
        let host = self.sim.host();
        let start = SearchNode {
            pos: host.position(),
            dir: host.direction(),
            actions: vec![],
            cost: 0.0,
            heu: self.heuristic(host.position()),
        };

        let mut frontier = BinaryHeap::new();
        let mut visited: HashSet<(i64, i64)> = HashSet::new();
        frontier.push(start);

        let mut expansions = 0;
        while let Some(node) = frontier.pop() {
            if self.is_goal(&node) {
                debug!(
                    "search reached goal after {} expansions, cost {}",
                    expansions, node.cost
                );
                return Some(node);
            }

            // Close out the cell; later arrivals cannot beat the unit
            // step cost of the first.
            if !visited.insert(self.cell(node.pos)) {
                continue;
            }

            expansions += 1;
            if expansions >= MAX_EXPANSIONS {
                debug!("search hit expansion cap of {MAX_EXPANSIONS}");
                return None;
            }

            // Successors landing in closed cells are still pushed; the
            // goal check runs on pop, and a goal may sit inside a cell
            // another node closed.
            for succ in self.successors(&node) {
                frontier.push(succ);
            }
        }

        trace!("search frontier exhausted after {expansions} expansions");
        None
    }

    /// Whether the node is within the goal tolerance of one tile.
    pub fn is_goal(&self, node: &SearchNode) -> bool {
        manhattan_dist(node.pos, self.goal) < self.tile
    }

    /// The number of candidate actions per expansion.
    pub fn num_actions(&self) -> usize {
        TURN_ANGLES.len()
    }

    /// Generates the successor nodes of a state: one unit step per
    /// candidate heading, dropping steps that leave the drivable
    /// bounds (conservatively, with the planning margin).
    fn successors(&self, node: &SearchNode) -> SmallVec<[SearchNode; 5]> {
        let mut succs = SmallVec::new();
        for (action, angle) in TURN_ANGLES.iter().enumerate() {
            let dir = rotate_deg(node.dir, *angle).normalize();
            let pos = node.pos + dir * self.tile;
            if !self.sim.in_bounds_larger(pos.x, pos.y) {
                continue;
            }

            let mut actions = node.actions.clone();
            actions.push(action as u8);
            succs.push(SearchNode {
                pos,
                dir,
                actions,
                cost: node.cost + 1.0,
                heu: self.heuristic(pos),
            });
        }
        succs
    }

    /// The Manhattan-distance heuristic, in tiles. Admissible on the
    /// axis-aligned grid; an approximation once angled moves apply.
    fn heuristic(&self, pos: Point2d) -> f64 {
        manhattan_dist(pos, self.goal) / self.tile
    }

    /// Reconstructs the waypoints of a terminal node by replaying its
    /// actions from the start, then smooths them.
    pub fn path(&self, node: &SearchNode) -> Vec<Point2d> {
        let host = self.sim.host();
        let mut pos = host.position();
        let mut dir = host.direction();

        let mut path = Vec::with_capacity(node.actions.len() + 1);
        path.push(pos);
        for action in &node.actions {
            dir = rotate_deg(dir, TURN_ANGLES[*action as usize]).normalize();
            pos += dir * self.tile;
            path.push(pos);
        }

        self.smooth(&mut path);
        path
    }

    /// Iterative weighted relaxation: each interior waypoint is pulled
    /// toward its raw position and toward its neighbours' midpoint.
    /// Endpoints are pinned and any update that would leave the
    /// drivable bounds is skipped.
    fn smooth(&self, path: &mut [Point2d]) {
        if path.len() < 3 {
            return;
        }

        let raw = path.to_vec();
        for _ in 0..SMOOTH_PASSES {
            for i in 1..path.len() - 1 {
                let data_pull = (raw[i] - path[i]) * SMOOTH_DATA_WEIGHT;
                let neighbour_pull =
                    (path[i - 1] - path[i] + (path[i + 1] - path[i])) * SMOOTH_NEIGHBOUR_WEIGHT;
                let candidate = path[i] + data_pull + neighbour_pull;
                if self.sim.in_bounds_larger(candidate.x, candidate.y) {
                    path[i] = candidate;
                }
            }
        }
    }

    fn cell(&self, pos: Point2d) -> (i64, i64) {
        (x_to_col(pos.x, self.tile), y_to_row(pos.y, self.tile))
    }
}
