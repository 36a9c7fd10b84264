//! Geometry kernel for midline generation
//!
//! Pure functions over 2D points and vectors. Lines are represented by a
//! [`Slope`] and a point on the line; vertical lines are an explicit variant
//! rather than an infinite sentinel so that every caller is forced to handle
//! them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Threshold below which a coordinate difference is treated as zero when
/// computing or comparing slopes.
pub const SLOPE_EPSILON: f64 = 1e-14;

/// Threshold below which two points are considered the same point.
pub const POINT_EPSILON: f64 = 1e-9;

/// Normalised cross product magnitude at or below which two vectors are
/// judged "nearly aligned" and their orientation is indeterminate.
pub const ALIGNMENT_THRESHOLD: f64 = 0.2;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The slope of a line in the track plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slope {
    /// A line with the given finite gradient (dy/dx).
    Finite(f64),

    /// A vertical line, for which no `y = f(x)` form exists.
    Vertical,
}

/// The rotational direction from one vector to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Clockwise,
    CounterClockwise,

    /// The vectors are nearly aligned and no direction can be trusted.
    /// Callers must treat this as "apply no correction", never as one of the
    /// definite directions.
    Indeterminate,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Slope {
    /// Compute the slope of the line through two points.
    pub fn between(p_1: &Point2<f64>, p_2: &Point2<f64>) -> Self {
        if (p_1.x - p_2.x).abs() < SLOPE_EPSILON {
            Slope::Vertical
        }
        else {
            Slope::Finite((p_2.y - p_1.y) / (p_2.x - p_1.x))
        }
    }

    /// Return the slope perpendicular to this one.
    ///
    /// The perpendicular of a zero slope is [`Slope::Vertical`], not a
    /// division by zero.
    pub fn perpendicular(&self) -> Self {
        match *self {
            Slope::Vertical => Slope::Finite(0.0),
            Slope::Finite(m) if m.abs() < SLOPE_EPSILON => Slope::Vertical,
            Slope::Finite(m) => Slope::Finite(-1.0 / m),
        }
    }

    pub fn is_vertical(&self) -> bool {
        matches!(self, Slope::Vertical)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Return the evaluator `y = f(x)` of the line with the given finite slope
/// through the given point.
///
/// Vertical lines have no such form, which is why this takes a raw gradient
/// rather than a [`Slope`]. Callers holding a [`Slope::Vertical`] must
/// special-case on the line point's x instead of evaluating.
pub fn line_through(gradient: f64, point: Point2<f64>) -> impl Fn(f64) -> f64 {
    move |x| gradient * (x - point.x) + point.y
}

/// Find the intersection of two lines, each given by a slope and a point on
/// the line.
///
/// Returns `None` when the lines are parallel (equal finite slopes within
/// [`SLOPE_EPSILON`], or both vertical), in which case there is either no
/// intersection or infinitely many.
pub fn intersection(
    slope_1: Slope,
    point_1: &Point2<f64>,
    slope_2: Slope,
    point_2: &Point2<f64>,
) -> Option<Point2<f64>> {
    match (slope_1, slope_2) {
        (Slope::Vertical, Slope::Vertical) => None,
        (Slope::Vertical, Slope::Finite(m_2)) => {
            let x = point_1.x;
            Some(Point2::new(x, line_through(m_2, *point_2)(x)))
        }
        (Slope::Finite(m_1), Slope::Vertical) => {
            let x = point_2.x;
            Some(Point2::new(x, line_through(m_1, *point_1)(x)))
        }
        (Slope::Finite(m_1), Slope::Finite(m_2)) => {
            if (m_1 - m_2).abs() < SLOPE_EPSILON {
                return None;
            }

            let x = (point_2.y - point_1.y + m_1 * point_1.x - m_2 * point_2.x)
                / (m_1 - m_2);
            let y = m_1 * x + (point_1.y - m_1 * point_1.x);

            Some(Point2::new(x, y))
        }
    }
}

/// Classify the rotational direction from `v_1` to `v_2` using the sign of
/// their cross product.
///
/// When the normalised cross product magnitude is at or below
/// [`ALIGNMENT_THRESHOLD`] the vectors are judged nearly aligned and
/// [`Orientation::Indeterminate`] is returned.
pub fn orientation(v_1: &Vector2<f64>, v_2: &Vector2<f64>) -> Orientation {
    let cross = v_1.x * v_2.y - v_1.y * v_2.x;
    let norm_product = v_1.norm() * v_2.norm();

    if norm_product < SLOPE_EPSILON
        || cross.abs() / norm_product <= ALIGNMENT_THRESHOLD
    {
        return Orientation::Indeterminate;
    }

    if cross < 0.0 {
        Orientation::Clockwise
    }
    else {
        Orientation::CounterClockwise
    }
}

/// Compute the midpoint of the segment between two points.
pub fn midpoint(p_1: &Point2<f64>, p_2: &Point2<f64>) -> Point2<f64> {
    Point2::new((p_1.x + p_2.x) / 2.0, (p_1.y + p_2.y) / 2.0)
}

/// Rotate a point 180 degrees about a pivot.
pub fn rotate_180_about(pivot: &Point2<f64>, point: &Point2<f64>) -> Point2<f64> {
    pivot - (point - pivot)
}

/// Return the perpendicular of a vector (rotated 90 degrees
/// counterclockwise).
pub fn perpendicular(v: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-v.y, v.x)
}

/// True if two points are equal within [`POINT_EPSILON`] on both
/// coordinates.
pub fn points_approx_eq(p_1: &Point2<f64>, p_2: &Point2<f64>) -> bool {
    (p_1.x - p_2.x).abs() <= POINT_EPSILON && (p_1.y - p_2.y).abs() <= POINT_EPSILON
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slope_between() {
        assert_eq!(
            Slope::between(&Point2::new(0.0, 0.0), &Point2::new(10.0, 5.0)),
            Slope::Finite(0.5)
        );

        // Vertical detection must kick in below the epsilon, not only at
        // exactly equal x
        assert!(
            Slope::between(&Point2::new(1.0, 0.0), &Point2::new(1.0 + 1e-15, 8.0))
                .is_vertical()
        );
    }

    #[test]
    fn test_perpendicular_slope() {
        assert_eq!(Slope::Finite(2.0).perpendicular(), Slope::Finite(-0.5));
        assert_eq!(Slope::Finite(0.0).perpendicular(), Slope::Vertical);
        assert_eq!(Slope::Vertical.perpendicular(), Slope::Finite(0.0));
    }

    #[test]
    fn test_line_through() {
        let line = line_through(2.0, Point2::new(1.0, 1.0));
        assert_eq!(line(1.0), 1.0);
        assert_eq!(line(3.0), 5.0);
    }

    #[test]
    fn test_intersection() {
        // Two diagonal lines crossing at the origin
        let p = intersection(
            Slope::Finite(1.0),
            &Point2::new(-1.0, -1.0),
            Slope::Finite(-1.0),
            &Point2::new(1.0, -1.0),
        )
        .unwrap();
        assert!((p.x - 0.0).abs() < 1e-12);
        assert!((p.y - 0.0).abs() < 1e-12);

        // Vertical and horizontal
        let p = intersection(
            Slope::Vertical,
            &Point2::new(3.0, 100.0),
            Slope::Finite(0.0),
            &Point2::new(0.0, 2.0),
        )
        .unwrap();
        assert_eq!(p, Point2::new(3.0, 2.0));

        // Parallel lines have no intersection
        assert!(intersection(
            Slope::Finite(1.0),
            &Point2::new(0.0, 0.0),
            Slope::Finite(1.0),
            &Point2::new(0.0, 1.0),
        )
        .is_none());

        assert!(intersection(
            Slope::Vertical,
            &Point2::new(0.0, 0.0),
            Slope::Vertical,
            &Point2::new(1.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_orientation() {
        // +x rotated towards +y is counterclockwise
        assert_eq!(
            orientation(&Vector2::new(1.0, 0.0), &Vector2::new(0.0, 1.0)),
            Orientation::CounterClockwise
        );
        assert_eq!(
            orientation(&Vector2::new(0.0, 1.0), &Vector2::new(1.0, 0.0)),
            Orientation::Clockwise
        );
    }

    #[test]
    fn test_orientation_nearly_aligned_is_indeterminate() {
        // Normalised cross product of these two is well below the 0.2
        // alignment threshold, so no direction may be reported
        let v_1 = Vector2::new(10.0, 0.0);
        let v_2 = Vector2::new(10.0, 1.0);
        assert_eq!(orientation(&v_1, &v_2), Orientation::Indeterminate);

        // Zero-length vectors are also indeterminate
        assert_eq!(
            orientation(&Vector2::new(0.0, 0.0), &Vector2::new(1.0, 0.0)),
            Orientation::Indeterminate
        );
    }

    #[test]
    fn test_midpoint_and_rotation() {
        assert_eq!(
            midpoint(&Point2::new(0.0, 0.0), &Point2::new(2.0, 4.0)),
            Point2::new(1.0, 2.0)
        );

        let rotated = rotate_180_about(&Point2::new(1.0, 1.0), &Point2::new(2.0, 3.0));
        assert_eq!(rotated, Point2::new(0.0, -1.0));
    }

    #[test]
    fn test_perpendicular_vector() {
        assert_eq!(
            perpendicular(&Vector2::new(1.0, 0.0)),
            Vector2::new(0.0, 1.0)
        );
    }
}
