use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Rotates a vector 90 degrees clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Rotates a vector counter-clockwise by an angle given in degrees.
pub fn rotate_deg(vec: Vector2d, deg: f64) -> Vector2d {
    let (sin, cos) = deg.to_radians().sin_cos();
    Vector2d::new(vec.x * cos - vec.y * sin, vec.x * sin + vec.y * cos)
}

/// Computes the signed angle in degrees from `from` to `to`, in `(-180, 180]`.
///
/// The sign follows the cross product, so
/// `rotate_deg(from, signed_angle_deg(from, to))` is parallel to `to`.
pub fn signed_angle_deg(from: Vector2d, to: Vector2d) -> f64 {
    let cross = from.x * to.y - from.y * to.x;
    cross.atan2(from.dot(to)).to_degrees()
}

/// Computes the Manhattan distance between two points.
pub fn manhattan_dist(a: Point2d, b: Point2d) -> f64 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Normalises a vector, or returns `fallback` if its magnitude is zero.
pub fn normalize_or(vec: Vector2d, fallback: Vector2d) -> Vector2d {
    let mag = vec.magnitude();
    if mag > 0.0 {
        vec / mag
    } else {
        fallback
    }
}

/// Converts a world x coordinate to a grid column.
pub fn x_to_col(x: f64, tile: f64) -> i64 {
    (x / tile).floor() as i64
}

/// Converts a world y coordinate to a grid row.
pub fn y_to_row(y: f64, tile: f64) -> i64 {
    (y / tile).floor() as i64
}

/// Gets the world x coordinate of a column's centre.
pub fn col_to_x(col: i64, tile: f64) -> f64 {
    (col as f64 + 0.5) * tile
}

/// Gets the world y coordinate of a row's centre.
pub fn row_to_y(row: i64, tile: f64) -> f64 {
    (row as f64 + 0.5) * tile
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn signed_angles() {
        let east = Vector2d::new(1.0, 0.0);
        let north = Vector2d::new(0.0, 1.0);
        assert_approx_eq!(signed_angle_deg(east, north), 90.0);
        assert_approx_eq!(signed_angle_deg(north, east), -90.0);
        assert_approx_eq!(signed_angle_deg(east, east), 0.0);
    }

    #[test]
    fn rotation_aligns_with_target() {
        let east = Vector2d::new(1.0, 0.0);
        let target = Vector2d::new(3.0, 4.0);
        let rotated = rotate_deg(east, signed_angle_deg(east, target));
        assert_approx_eq!(rotated.x * target.y - rotated.y * target.x, 0.0, 1e-9);
    }

    #[test]
    fn tile_conversions_round_trip() {
        assert_eq!(x_to_col(35.0, 30.0), 1);
        assert_approx_eq!(col_to_x(1, 30.0), 45.0);
        assert_eq!(x_to_col(col_to_x(7, 30.0), 30.0), 7);
    }
}
