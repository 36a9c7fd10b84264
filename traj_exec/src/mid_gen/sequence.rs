//! Boundary sequencer
//!
//! Reorders a side's raw boundary window into a spatially coherent sequence
//! by greedy nearest-neighbour chaining from an anchor point. O(n²) in the
//! window length, which is capacity-bounded to tens of points.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Point2;
use ordered_float::NotNan;

// Internal
use super::geom::{self, Slope};
use util::maths::dist_2d;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A dividing line used to constrain the start direction of an ordering.
///
/// The line runs through `point` with the given slope, normally the line
/// joining the two sides' anchor cones.
#[derive(Debug, Clone, Copy)]
pub struct DividingLine {
    pub slope: Slope,
    pub point: Point2<f64>,
}

/// Outcome of a half-plane constrained ordering.
#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    pub points: Vec<Point2<f64>>,

    /// True if no candidate second point satisfied the half-plane
    /// constraint and the ordering fell back to plain nearest-neighbour.
    /// Non-fatal, but worth a warning as it usually means the configured
    /// half-plane selector points at the wrong side of the track.
    pub degenerate_ordering: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The half-plane, relative to a dividing line, in which the second ordered
/// point must lie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfPlane {
    /// Above the line, or at greater x for a vertical line.
    Positive,

    /// Below the line, or at lesser x for a vertical line.
    Negative,
}

/// Errors raised by the sequencer.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("The anchor point is not a member of the point set")]
    InvalidAnchor,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HalfPlane {
    /// Build a half-plane from a +1/-1 selector, `None` for any other value.
    pub fn from_selector(selector: i8) -> Option<Self> {
        match selector {
            1 => Some(HalfPlane::Positive),
            -1 => Some(HalfPlane::Negative),
            _ => None,
        }
    }

    fn sign(&self) -> f64 {
        match self {
            HalfPlane::Positive => 1.0,
            HalfPlane::Negative => -1.0,
        }
    }

    /// True if the candidate point lies in this half-plane relative to the
    /// dividing line.
    fn contains(&self, line: &DividingLine, candidate: &Point2<f64>) -> bool {
        let s = self.sign();
        match line.slope {
            Slope::Finite(m) => {
                let line_y = geom::line_through(m, line.point)(candidate.x);
                line_y * s < candidate.y * s
            }
            Slope::Vertical => line.point.x * s < candidate.x * s,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Order a point set by greedy nearest-neighbour chaining from the anchor.
///
/// The anchor must be a member of the set (within the point epsilon),
/// otherwise [`SequenceError::InvalidAnchor`] is returned. The output is a
/// permutation of the input starting at the anchor. Distance ties are broken
/// by input order.
pub fn reorder(
    points: &[Point2<f64>],
    anchor: &Point2<f64>,
) -> Result<Vec<Point2<f64>>, SequenceError> {
    let anchor_index = points
        .iter()
        .position(|p| geom::points_approx_eq(p, anchor))
        .ok_or(SequenceError::InvalidAnchor)?;

    let mut remaining = points.to_vec();
    let mut ordered = Vec::with_capacity(points.len());
    ordered.push(remaining.remove(anchor_index));

    while !remaining.is_empty() {
        let last = ordered[ordered.len() - 1];
        let nearest = nearest_index(&remaining, &last);
        ordered.push(remaining.remove(nearest));
    }

    Ok(ordered)
}

/// Order a point set by nearest-neighbour chaining, constraining the second
/// point to the requested half-plane relative to the dividing line.
///
/// If no candidate lies in the requested half-plane the ordering falls back
/// to plain nearest-neighbour and the outcome's `degenerate_ordering` flag
/// is raised.
pub fn reorder_half_plane(
    points: &[Point2<f64>],
    anchor: &Point2<f64>,
    line: &DividingLine,
    half_plane: HalfPlane,
) -> Result<SequenceOutcome, SequenceError> {
    let anchor_index = points
        .iter()
        .position(|p| geom::points_approx_eq(p, anchor))
        .ok_or(SequenceError::InvalidAnchor)?;

    let mut remaining = points.to_vec();
    let mut ordered = Vec::with_capacity(points.len());
    ordered.push(remaining.remove(anchor_index));

    let mut degenerate_ordering = false;

    if !remaining.is_empty() {
        // Walk the candidates nearest-first and take the first one inside
        // the requested half-plane as the second point
        let mut candidates: Vec<usize> = (0..remaining.len()).collect();
        candidates.sort_by_key(|&i| dist_key(&remaining[i], &ordered[0]));

        match candidates
            .into_iter()
            .find(|&i| half_plane.contains(line, &remaining[i]))
        {
            Some(i) => {
                ordered.push(remaining.remove(i));
            }
            None => {
                degenerate_ordering = true;
            }
        }
    }

    // The rest of the sequence is plain nearest-neighbour chaining
    while !remaining.is_empty() {
        let last = ordered[ordered.len() - 1];
        let nearest = nearest_index(&remaining, &last);
        ordered.push(remaining.remove(nearest));
    }

    Ok(SequenceOutcome {
        points: ordered,
        degenerate_ordering,
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Index of the point nearest to `to`. The input must be non-empty.
fn nearest_index(points: &[Point2<f64>], to: &Point2<f64>) -> usize {
    // The unwrap here is safe since the caller guarantees a non-empty slice
    points
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| dist_key(p, to))
        .map(|(i, _)| i)
        .unwrap()
}

/// Distance between two points as an orderable key.
fn dist_key(p_1: &Point2<f64>, p_2: &Point2<f64>) -> NotNan<f64> {
    // Observation coordinates are validated finite at ingestion, so the
    // distance cannot be NaN
    NotNan::new(dist_2d(p_1, p_2)).expect("non-finite point in boundary window")
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn points(coords: &[(f64, f64)]) -> Vec<Point2<f64>> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn test_reorder_is_permutation_from_anchor() {
        let input = points(&[(0.0, 0.0), (30.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);

        let ordered = reorder(&input, &input[0]).unwrap();

        assert_eq!(
            ordered,
            points(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)])
        );

        // Every input point appears exactly once
        assert_eq!(ordered.len(), input.len());
        for p in &input {
            assert_eq!(
                ordered.iter().filter(|q| geom::points_approx_eq(p, q)).count(),
                1
            );
        }
    }

    #[test]
    fn test_reorder_invalid_anchor() {
        let input = points(&[(0.0, 0.0), (10.0, 0.0)]);

        assert!(matches!(
            reorder(&input, &Point2::new(5.0, 5.0)),
            Err(SequenceError::InvalidAnchor)
        ));
    }

    #[test]
    fn test_reorder_tie_breaks_by_input_order() {
        // Two candidates equidistant from the anchor, the first-encountered
        // one must be placed first
        let input = points(&[(0.0, 0.0), (1.0, 0.0), (-1.0, 0.0)]);

        let ordered = reorder(&input, &input[0]).unwrap();
        assert_eq!(ordered[1], Point2::new(1.0, 0.0));
    }

    #[test]
    fn test_reorder_half_plane_picks_constrained_second() {
        // Nearest point to the anchor is below the dividing line, but the
        // Positive half-plane forces the ordering to start upwards
        let input = points(&[(0.0, 0.0), (0.0, -1.0), (0.0, 2.0), (0.0, 4.0)]);
        let line = DividingLine {
            slope: Slope::Finite(0.0),
            point: Point2::new(0.0, 0.0),
        };

        let outcome =
            reorder_half_plane(&input, &input[0], &line, HalfPlane::Positive).unwrap();

        assert!(!outcome.degenerate_ordering);
        assert_eq!(outcome.points[1], Point2::new(0.0, 2.0));
    }

    #[test]
    fn test_reorder_half_plane_falls_back_when_unsatisfiable() {
        // All candidates are below the line, Positive cannot be satisfied
        let input = points(&[(0.0, 0.0), (1.0, -1.0), (2.0, -1.0)]);
        let line = DividingLine {
            slope: Slope::Finite(0.0),
            point: Point2::new(0.0, 0.0),
        };

        let outcome =
            reorder_half_plane(&input, &input[0], &line, HalfPlane::Positive).unwrap();

        assert!(outcome.degenerate_ordering);
        // Fallback is plain nearest-neighbour ordering
        assert_eq!(
            outcome.points,
            points(&[(0.0, 0.0), (1.0, -1.0), (2.0, -1.0)])
        );
    }

    #[test]
    fn test_reorder_half_plane_vertical_line() {
        let input = points(&[(0.0, 0.0), (-1.0, 0.5), (1.0, 1.0)]);
        let line = DividingLine {
            slope: Slope::Vertical,
            point: Point2::new(0.0, 0.0),
        };

        let outcome =
            reorder_half_plane(&input, &input[0], &line, HalfPlane::Positive).unwrap();

        assert!(!outcome.degenerate_ordering);
        assert_eq!(outcome.points[1], Point2::new(1.0, 1.0));
    }
}
