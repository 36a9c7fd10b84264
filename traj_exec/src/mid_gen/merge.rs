//! Proximity-based point merging
//!
//! A single left-to-right pass collapses each consecutive pair of points
//! within tolerance into its midpoint. The two-pass wrappers repeat the pass
//! with a reduced tolerance over the first result, which lets a small
//! cluster of originally-close points collapse into one without letting a
//! long chain of moderately-spaced points collapse entirely.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Point2;

// Internal
use super::geom;
use super::stepper::SynthPoint;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Merge consecutive points within `tol_m` into their midpoint, single
/// pass.
///
/// Whenever a pair merges the pass skips past both members; an unmerged
/// trailing point is kept. Empty input yields empty output and a single
/// point is returned unchanged.
pub fn merge(points: &[Point2<f64>], tol_m: f64) -> Vec<Point2<f64>> {
    let mut merged = Vec::with_capacity(points.len());

    let mut i = 0;
    while i < points.len() {
        if i + 1 < points.len() && (points[i + 1] - points[i]).norm() <= tol_m {
            merged.push(geom::midpoint(&points[i], &points[i + 1]));
            i += 2;
        }
        else {
            merged.push(points[i]);
            i += 1;
        }
    }

    merged
}

/// Two merge passes: the full tolerance, then `tol_m / divisor` over the
/// result of the first pass.
pub fn merge_two_pass(points: &[Point2<f64>], tol_m: f64, divisor: f64) -> Vec<Point2<f64>> {
    merge(&merge(points, tol_m), tol_m / divisor)
}

/// Provenance-carrying variant of [`merge`] for trajectory points.
pub fn merge_synth(points: &[SynthPoint], tol_m: f64) -> Vec<SynthPoint> {
    let mut merged = Vec::with_capacity(points.len());

    let mut i = 0;
    while i < points.len() {
        if i + 1 < points.len()
            && (points[i + 1].point_m - points[i].point_m).norm() <= tol_m
        {
            merged.push(collapse_pair(&points[i], &points[i + 1]));
            i += 2;
        }
        else {
            merged.push(points[i]);
            i += 1;
        }
    }

    merged
}

/// Provenance-carrying variant of [`merge_two_pass`].
pub fn merge_synth_two_pass(
    points: &[SynthPoint],
    tol_m: f64,
    divisor: f64,
) -> Vec<SynthPoint> {
    merge_synth(&merge_synth(points, tol_m), tol_m / divisor)
}

/// Collapse two trajectory points into their midpoint.
///
/// The merged point depends on everything either parent consumed, so its
/// provenance is the maximum parent index per side.
pub fn collapse_pair(a: &SynthPoint, b: &SynthPoint) -> SynthPoint {
    SynthPoint::new(
        geom::midpoint(&a.point_m, &b.point_m),
        max_index(a.right_idx, b.right_idx),
        max_index(a.left_idx, b.left_idx),
    )
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn max_index(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
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
    fn test_merge_close_pair_to_midpoint() {
        let merged = merge(&points(&[(0.0, 0.0), (0.5, 0.5)]), 3.1);

        assert_eq!(merged, points(&[(0.25, 0.25)]));
    }

    #[test]
    fn test_merge_trivial_inputs() {
        assert!(merge(&[], 3.0).is_empty());
        assert_eq!(
            merge(&points(&[(1.0, 2.0)]), 3.0),
            points(&[(1.0, 2.0)])
        );
    }

    #[test]
    fn test_merge_never_increases_count() {
        let input = points(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (7.0, 0.0),
            (7.5, 0.0),
            (20.0, 0.0),
        ]);

        for &tol in &[0.0, 0.6, 1.5, 4.0, 100.0] {
            assert!(merge(&input, tol).len() <= input.len());
        }
    }

    #[test]
    fn test_merge_keeps_unmerged_trailing_point() {
        let merged = merge(&points(&[(0.0, 0.0), (1.0, 0.0), (10.0, 0.0)]), 2.0);

        assert_eq!(merged, points(&[(0.5, 0.0), (10.0, 0.0)]));
    }

    #[test]
    fn test_merge_is_identity_on_spread_points() {
        // A sequence with every consecutive gap above tolerance is already
        // merged: re-applying the merger changes nothing
        let spread = points(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);

        let once = merge(&spread, 3.0);
        assert_eq!(once, spread);

        let twice = merge(&once, 3.0);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_two_pass_collapses_small_cluster() {
        // Four points bunched together collapse to a single point across
        // the two passes, the far point survives
        let input = points(&[
            (0.0, 0.0),
            (0.5, 0.0),
            (1.0, 0.0),
            (1.5, 0.0),
            (50.0, 0.0),
        ]);

        let merged = merge_two_pass(&input, 3.1, 2.0);

        assert_eq!(merged, points(&[(0.75, 0.0), (50.0, 0.0)]));
    }

    #[test]
    fn test_merge_synth_takes_max_provenance() {
        let a = SynthPoint::new(Point2::new(0.0, 0.0), Some(2), None);
        let b = SynthPoint::new(Point2::new(1.0, 0.0), Some(1), Some(4));

        let merged = merge_synth(&[a, b], 3.0);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].point_m, Point2::new(0.5, 0.0));
        assert_eq!(merged[0].right_idx, Some(2));
        assert_eq!(merged[0].left_idx, Some(4));
    }
}
