//! Oriented-rectangle collision testing via the separating axis theorem.

use crate::math::{rot90, Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// The corner points of an oriented rectangle.
pub type Corners = [Point2d; 4];

/// Projects the corners of a rectangle onto an axis.
pub fn project_onto(corners: &Corners, axis: Vector2d) -> Interval<f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for corner in corners {
        let dot = corner.to_vec().dot(axis);
        min = min.min(dot);
        max = max.max(dot);
    }
    Interval::new(min, max)
}

/// Returns true iff two oriented rectangles overlap.
///
/// Tests the four candidate separating axes: each rectangle's edge
/// direction and its perpendicular. A single axis with disjoint
/// projections proves the rectangles apart; otherwise they overlap.
pub fn obb_overlap(a: &Corners, b: &Corners) -> bool {
    let edge_a = a[0] - a[1];
    let edge_b = b[0] - b[1];
    let axes = [edge_a, rot90(edge_a), edge_b, rot90(edge_b)];

    axes.iter()
        .all(|axis| project_onto(a, *axis).overlaps(&project_onto(b, *axis)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::rotate_deg;

    fn rect(center: Point2d, half_len: f64, half_wid: f64, angle_deg: f64) -> Corners {
        let f = rotate_deg(Vector2d::new(1.0, 0.0), angle_deg) * half_len;
        let p = rot90(f).normalize() * half_wid;
        [center + f + p, center + f - p, center - f + p, center - f - p]
    }

    #[test]
    fn disjoint_rectangles_do_not_overlap() {
        let a = rect(Point2d::new(0.0, 0.0), 20.0, 10.0, 0.0);
        let b = rect(Point2d::new(100.0, 0.0), 20.0, 10.0, 30.0);
        assert!(!obb_overlap(&a, &b));
    }

    #[test]
    fn overlapping_rectangles_overlap() {
        let a = rect(Point2d::new(0.0, 0.0), 20.0, 10.0, 0.0);
        let b = rect(Point2d::new(15.0, 5.0), 20.0, 10.0, 45.0);
        assert!(obb_overlap(&a, &b));
    }

    #[test]
    fn rotated_near_miss() {
        // Two rectangles whose bounding circles overlap but which a
        // diagonal axis separates.
        let a = rect(Point2d::new(0.0, 0.0), 20.0, 2.0, 45.0);
        let b = rect(Point2d::new(14.0, -14.0), 20.0, 2.0, 45.0);
        assert!(!obb_overlap(&a, &b));
    }

    #[test]
    fn overlap_is_symmetric() {
        let cases = [
            (Point2d::new(0.0, 0.0), 0.0, Point2d::new(25.0, 5.0), 60.0),
            (Point2d::new(0.0, 0.0), 30.0, Point2d::new(80.0, 0.0), 0.0),
            (Point2d::new(5.0, 5.0), 15.0, Point2d::new(10.0, -5.0), 75.0),
        ];
        for (ca, ra, cb, rb) in cases {
            let a = rect(ca, 20.0, 10.0, ra);
            let b = rect(cb, 20.0, 10.0, rb);
            assert_eq!(obb_overlap(&a, &b), obb_overlap(&b, &a));
        }
    }
}
