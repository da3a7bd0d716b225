use crate::math::{Point2d, Vector2d};
use crate::util::Interval;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Margin added around blocks for conservative planning, in world units.
const PLANNING_MARGIN: f64 = 6.0;

/// A compass direction used for spawn headings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    East,
    North,
    West,
    South,
}

impl Direction {
    /// The unit vector pointing in this direction.
    pub fn unit(self) -> Vector2d {
        match self {
            Direction::East => Vector2d::new(1.0, 0.0),
            Direction::North => Vector2d::new(0.0, 1.0),
            Direction::West => Vector2d::new(-1.0, 0.0),
            Direction::South => Vector2d::new(0.0, -1.0),
        }
    }
}

/// An axis-aligned rectangle of static level geometry.
#[derive(Clone, Debug)]
pub struct Block {
    x: Interval<f64>,
    y: Interval<f64>,
}

impl Block {
    /// Creates a block from a `[x1, y1, x2, y2]` rectangle.
    /// The corner order does not matter.
    pub fn from_rect(rect: [f64; 4]) -> Self {
        Self {
            x: Interval::new(rect[0].min(rect[2]), rect[0].max(rect[2])),
            y: Interval::new(rect[1].min(rect[3]), rect[1].max(rect[3])),
        }
    }

    /// Returns true if the point lies inside the block.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.x.contains(x) && self.y.contains(y)
    }

    /// Returns true if the point lies inside the block inflated
    /// by the planning margin.
    pub fn contains_point_larger(&self, x: f64, y: f64) -> bool {
        self.x.inflate(PLANNING_MARGIN).contains(x) && self.y.inflate(PLANNING_MARGIN).contains(y)
    }

    /// The centre of the block.
    pub fn center(&self) -> Point2d {
        Point2d::new(self.x.midpoint(), self.y.midpoint())
    }
}

/// A lane marking, kept as plain geometry for a display collaborator.
#[derive(Clone, Copy, Debug)]
pub struct Line {
    pub start: Point2d,
    pub end: Point2d,
}

impl Line {
    /// Creates a line from a `[x1, y1, x2, y2]` segment.
    pub fn from_segment(seg: [f64; 4]) -> Self {
        Self {
            start: Point2d::new(seg[0], seg[1]),
            end: Point2d::new(seg[2], seg[3]),
        }
    }
}

/// The level data provided by an external layout collaborator,
/// given as plain coordinate lists. Rectangles are `[x1, y1, x2, y2]`.
pub struct LayoutAttributes<'a> {
    /// The width of the drivable area in world units.
    pub width: f64,
    /// The height of the drivable area in world units.
    pub height: f64,
    /// The grid unit used by the search and the belief model.
    pub tile_size: f64,
    /// Impassable block footprints.
    pub blocks: &'a [[f64; 4]],
    /// Lane markings (display only).
    pub lines: &'a [[f64; 4]],
    /// Intersection regions where the right-of-way hold applies.
    pub intersections: &'a [[f64; 4]],
    /// Waypoint-graph cells reachable by the host.
    pub host_graph: &'a [[f64; 4]],
    /// Waypoint-graph cells reachable by the agents.
    pub agent_graph: &'a [[f64; 4]],
    /// The host's starting position.
    pub start: [f64; 2],
    /// The finish region; reaching it wins the game.
    pub finish: [f64; 4],
    /// The host's starting heading.
    pub host_dir: Direction,
    /// Agent spawn positions.
    pub agent_spawns: &'a [[f64; 2]],
}

/// The static geometry of a level.
#[derive(Clone, Debug)]
pub struct Layout {
    width: f64,
    height: f64,
    tile_size: f64,
    blocks: Vec<Block>,
    lines: Vec<Line>,
    intersections: Vec<Block>,
    graph: Vec<Block>,
    finish: Block,
    start: Point2d,
    host_dir: Direction,
    agent_spawns: Vec<Point2d>,
}

impl Layout {
    /// Builds a layout from externally provided coordinate lists.
    pub fn new(attr: &LayoutAttributes) -> Self {
        let blocks = attr.blocks.iter().map(|r| Block::from_rect(*r)).collect();
        let lines = attr.lines.iter().map(|s| Line::from_segment(*s)).collect();
        let intersections: Vec<_> = attr
            .intersections
            .iter()
            .map(|r| Block::from_rect(*r))
            .collect();

        // The combined waypoint graph: host cells, agent cells and intersections.
        let graph = attr
            .host_graph
            .iter()
            .chain(attr.agent_graph)
            .chain(attr.intersections)
            .map(|r| Block::from_rect(*r))
            .collect();

        Self {
            width: attr.width,
            height: attr.height,
            tile_size: attr.tile_size,
            blocks,
            lines,
            intersections,
            graph,
            finish: Block::from_rect(attr.finish),
            start: Point2d::new(attr.start[0], attr.start[1]),
            host_dir: attr.host_dir,
            agent_spawns: attr
                .agent_spawns
                .iter()
                .map(|p| Point2d::new(p[0], p[1]))
                .collect(),
        }
    }

    /// The width of the drivable area.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The height of the drivable area.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// The grid unit used by the search and the belief model.
    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// The impassable blocks.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The lane markings.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// The intersection regions.
    pub fn intersections(&self) -> &[Block] {
        &self.intersections
    }

    /// The combined waypoint graph.
    pub fn graph(&self) -> &[Block] {
        &self.graph
    }

    /// The finish region.
    pub fn finish(&self) -> &Block {
        &self.finish
    }

    /// The host's starting position.
    pub fn start(&self) -> Point2d {
        self.start
    }

    /// The host's starting heading.
    pub fn host_dir(&self) -> Direction {
        self.host_dir
    }

    /// The agent spawn positions.
    pub fn agent_spawns(&self) -> &[Point2d] {
        &self.agent_spawns
    }

    /// The centres of the intersection regions.
    pub fn intersection_centers(&self) -> Vec<Point2d> {
        self.intersections.iter().map(|b| b.center()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn block_containment() {
        let block = Block::from_rect([100.0, 40.0, 60.0, 10.0]);
        assert!(block.contains_point(80.0, 25.0));
        assert!(!block.contains_point(59.0, 25.0));

        // Just outside the strict block, inside the inflated one.
        assert!(!block.contains_point(58.0, 25.0));
        assert!(block.contains_point_larger(58.0, 25.0));
    }

    #[test]
    fn direction_units() {
        assert_eq!(Direction::West.unit(), Vector2d::new(-1.0, 0.0));
        assert_eq!(Direction::North.unit(), Vector2d::new(0.0, 1.0));
    }
}
