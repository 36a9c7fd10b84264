//! Midline stepper
//!
//! Walks two ordered boundary sequences in tandem, synthesising one
//! trajectory point for every boundary point it advances past. Each step:
//!
//! 1. Picks the side whose next cone gives the smaller combined distance
//!    (distance along the side plus distance from the opposite cone), ties
//!    going to the right side. A side with no points left forces the other.
//! 2. Intersects the line through the last trajectory point parallel to the
//!    advanced boundary segment with the perpendicular through the newly
//!    advanced cone.
//! 3. Rescales the intersection to sit exactly half the minimum track width
//!    from the cone, and flips it 180° about the cone if it landed on the
//!    wrong side of the track.
//!
//! Degenerate steps (parallel lines, candidate coincident with the cone)
//! produce a gap, never a fabricated coordinate. Everything notable that
//! happens is reported as a [`StepEvent`] for the caller to log or count.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};
use serde::Serialize;

// Internal
use super::geom::{self, Orientation, Slope, SLOPE_EPSILON};
use super::params::Params;
use super::sequence;
use comms_if::per::Side;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A synthesised trajectory point together with its boundary provenance.
///
/// The provenance records the highest index consumed from each side's
/// ordered window when the point was produced. It is what lets the
/// incremental session decide whether a retained point is affected by new
/// observations. `None` means the side contributed nothing, or that the
/// consumed data has since been evicted from the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SynthPoint {
    pub point_m: Point2<f64>,
    pub right_idx: Option<usize>,
    pub left_idx: Option<usize>,
}

/// Output of one stepper pass: the freshly synthesised points (excluding a
/// frozen resume point) and the events raised along the way.
#[derive(Debug, Clone)]
pub struct StepperOutput {
    pub points: Vec<SynthPoint>,
    pub events: Vec<StepEvent>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Where a stepper pass starts from.
#[derive(Debug, Clone, Copy)]
pub enum StepStart {
    /// No retained trajectory: derive the start point from the windows.
    Fresh,

    /// Resume from a retained reference point. The reference itself is
    /// frozen and will not appear in (nor be modified through) the output.
    Resume(SynthPoint),
}

/// A notable event during a stepper pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// The stepper advanced the given side to the given window index.
    SideAdvanced { side: Side, index: usize },

    /// The step was geometrically degenerate (parallel lines or a candidate
    /// coincident with its cone); no point was synthesised.
    DegenerateStep { side: Side, index: usize },

    /// The candidate fell on the wrong side of the track and was rotated
    /// 180° about its cone.
    WrongSideRotation { side: Side, index: usize },

    /// The trailing trajectory points were re-ordered by the safety net.
    SafetyNetReorder,

    /// The last two trajectory points were closer than the collapse
    /// threshold and were replaced by their midpoint.
    ProximityCollapse,
}

/// Errors raised by the stepper.
#[derive(Debug, thiserror::Error)]
pub enum StepperError {
    #[error("Both boundary windows are empty")]
    EmptyBoundaries,

    #[error(
        "Cannot derive a start point: need a cone on each side, or at least \
         two cones on one side"
    )]
    UnderDeterminedStart,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SynthPoint {
    pub fn new(point_m: Point2<f64>, right_idx: Option<usize>, left_idx: Option<usize>) -> Self {
        Self {
            point_m,
            right_idx,
            left_idx,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run one stepper pass over the given ordered boundary sequences.
///
/// Both indices advance monotonically from the start position until both
/// sides are exhausted. The returned points are the pending trajectory
/// suffix from the start position onwards.
pub fn run(
    right: &[Point2<f64>],
    left: &[Point2<f64>],
    start: StepStart,
    params: &Params,
) -> Result<StepperOutput, StepperError> {
    let mut events = Vec::new();

    // Seed the working trajectory with the start point and the initial
    // window indices
    let (mut working, frozen_start, mut ri, mut li) = match start {
        StepStart::Resume(reference) => {
            let ri = reference.right_idx.unwrap_or(0);
            let li = reference.left_idx.unwrap_or(0);
            (vec![reference], true, ri, li)
        }
        StepStart::Fresh => (vec![fresh_start(right, left, params)?], false, 0, 0),
    };

    // Clamp resume indices into the current windows, they may have been
    // produced against a longer window
    if !right.is_empty() {
        ri = ri.min(right.len() - 1);
    }
    else {
        ri = 0;
    }
    if !left.is_empty() {
        li = li.min(left.len() - 1);
    }
    else {
        li = 0;
    }

    while ri + 1 < right.len() || li + 1 < left.len() {
        // Side selection: smaller combined distance advances, ties go right.
        // A side with nothing left forces the other.
        let advance_right = if ri + 1 < right.len() && li + 1 < left.len() {
            let dist_r =
                (right[ri + 1] - right[ri]).norm() + (right[ri + 1] - left[li]).norm();
            let dist_l =
                (left[li + 1] - left[li]).norm() + (left[li + 1] - right[ri]).norm();
            dist_r <= dist_l
        }
        else {
            ri + 1 < right.len()
        };

        let (side, index, cone, anchor, other) = if advance_right {
            ri += 1;
            (Side::Right, ri, &right[ri], &right[ri - 1], left.get(li))
        }
        else {
            li += 1;
            (Side::Left, li, &left[li], &left[li - 1], right.get(ri))
        };
        events.push(StepEvent::SideAdvanced { side, index });

        // Intersect the segment's line through the last trajectory point
        // with the perpendicular through the cone
        let seg_slope = Slope::between(anchor, cone);
        let perp_slope = seg_slope.perpendicular();
        let last_point = working[working.len() - 1].point_m;

        let candidate = match geom::intersection(seg_slope, &last_point, perp_slope, cone) {
            Some(p) => p,
            None => {
                events.push(StepEvent::DegenerateStep { side, index });
                continue;
            }
        };

        // Place the candidate exactly half the track width from the cone
        let offset = candidate - cone;
        let offset_norm = offset.norm();
        let candidate = if (offset_norm - params.half_track_width_m).abs() > std::f64::EPSILON {
            if offset_norm < SLOPE_EPSILON {
                // The candidate sits on the cone itself, there is no
                // direction to rescale along
                events.push(StepEvent::DegenerateStep { side, index });
                continue;
            }
            cone + offset * (params.half_track_width_m / offset_norm)
        }
        else {
            candidate
        };

        // Flip the candidate about the cone if it landed outside the track.
        // Right cones must stay clockwise of the candidate, left cones
        // counterclockwise; nearly-aligned vectors apply no correction.
        let candidate = match other {
            Some(other) => {
                let to_cone = cone - other;
                let to_candidate = candidate - other;

                let wrong_side = match geom::orientation(&to_cone, &to_candidate) {
                    Orientation::Indeterminate => false,
                    Orientation::Clockwise => side == Side::Right,
                    Orientation::CounterClockwise => side == Side::Left,
                };

                if wrong_side {
                    events.push(StepEvent::WrongSideRotation { side, index });
                    geom::rotate_180_about(cone, &candidate)
                }
                else {
                    candidate
                }
            }
            None => candidate,
        };

        let right_idx = if right.is_empty() { None } else { Some(ri) };
        let left_idx = if left.is_empty() { None } else { Some(li) };
        working.push(SynthPoint::new(candidate, right_idx, left_idx));

        // Local safety net: re-order the trailing points in case the
        // candidate stepped backwards. Anchored at the first of the window
        // so a frozen resume point is never moved.
        let window = params.safety_net_window;
        if window >= 2 && working.len() >= window {
            let tail_start = working.len() - window;
            if reorder_tail(&mut working[tail_start..]) {
                events.push(StepEvent::SafetyNetReorder);
            }
        }

        // Collapse the last two points into their midpoint if they are too
        // close. Never touches a frozen resume point.
        let min_revisable = if frozen_start { 1 } else { 0 };
        let last = working.len() - 1;
        if last >= min_revisable + 1
            && (working[last].point_m - working[last - 1].point_m).norm()
                < params.collapse_threshold_m
        {
            let merged = super::merge::collapse_pair(&working[last - 1], &working[last]);
            working.truncate(last - 1);
            working.push(merged);
            events.push(StepEvent::ProximityCollapse);
        }
    }

    // A frozen resume point belongs to the caller, not to the output
    if frozen_start {
        working.remove(0);
    }

    Ok(StepperOutput {
        points: working,
        events,
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Derive the first trajectory point from the boundary windows.
///
/// With both sides populated this is the midpoint of the two anchor cones.
/// With a single populated side of at least two cones the start is offset
/// from the first cone by half the track width along the first segment's
/// inward perpendicular.
fn fresh_start(
    right: &[Point2<f64>],
    left: &[Point2<f64>],
    params: &Params,
) -> Result<SynthPoint, StepperError> {
    if !right.is_empty() && !left.is_empty() {
        return Ok(SynthPoint::new(
            geom::midpoint(&right[0], &left[0]),
            Some(0),
            Some(0),
        ));
    }

    if right.len() >= 2 {
        return Ok(SynthPoint::new(
            single_side_start(&right[0], &right[1], Side::Right, params),
            Some(0),
            None,
        ));
    }

    if left.len() >= 2 {
        return Ok(SynthPoint::new(
            single_side_start(&left[0], &left[1], Side::Left, params),
            None,
            Some(0),
        ));
    }

    if right.is_empty() && left.is_empty() {
        Err(StepperError::EmptyBoundaries)
    }
    else {
        Err(StepperError::UnderDeterminedStart)
    }
}

/// Offset the first cone of a single-sided track towards the track interior.
///
/// The interior is to the left of the travel direction for right cones and
/// to the right of it for left cones.
fn single_side_start(
    first: &Point2<f64>,
    second: &Point2<f64>,
    side: Side,
    params: &Params,
) -> Point2<f64> {
    let direction: Vector2<f64> = (second - first).normalize();

    let inward = match side {
        Side::Right => geom::perpendicular(&direction),
        Side::Left => -geom::perpendicular(&direction),
    };

    first + inward * params.half_track_width_m
}

/// Nearest-neighbour re-order of a trailing trajectory slice, anchored at
/// its first element, carrying provenance with the points. Returns true if
/// the order changed.
fn reorder_tail(tail: &mut [SynthPoint]) -> bool {
    let points: Vec<Point2<f64>> = tail.iter().map(|p| p.point_m).collect();

    // The unwrap here is safe since the anchor is taken from the slice
    let ordered = sequence::reorder(&points, &points[0]).unwrap();

    if ordered
        .iter()
        .zip(points.iter())
        .all(|(a, b)| geom::points_approx_eq(a, b))
    {
        return false;
    }

    // Re-attach provenance by matching each re-ordered point back to a not
    // yet used entry of the original tail
    let original = tail.to_vec();
    let mut used = vec![false; original.len()];

    for (slot, point) in tail.iter_mut().zip(ordered.iter()) {
        // The unwrap here is safe since `ordered` is a permutation of the
        // original points
        let source = original
            .iter()
            .enumerate()
            .position(|(i, p)| !used[i] && geom::points_approx_eq(&p.point_m, point))
            .unwrap();
        used[source] = true;
        *slot = original[source];
    }

    true
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

    fn approx(p: &Point2<f64>, x: f64, y: f64) {
        assert!(
            (p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9,
            "expected ({}, {}), got {:?}",
            x,
            y,
            p
        );
    }

    #[test]
    fn test_straight_track_gives_straight_centerline() {
        let right = points(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let left = points(&[(0.0, 3.0), (10.0, 3.0), (20.0, 3.0)]);

        let out = run(&right, &left, StepStart::Fresh, &Params::default()).unwrap();

        assert_eq!(out.points.len(), 3);
        approx(&out.points[0].point_m, 0.0, 1.5);
        approx(&out.points[1].point_m, 10.0, 1.5);
        approx(&out.points[2].point_m, 20.0, 1.5);
    }

    #[test]
    fn test_single_side_produces_offset_points() {
        let right = points(&[(0.0, 0.0), (10.0, 0.0)]);

        let out = run(&right, &[], StepStart::Fresh, &Params::default()).unwrap();

        // Two points, both offset perpendicular to the right boundary by
        // half the track width (towards the interior, +y here)
        assert_eq!(out.points.len(), 2);
        approx(&out.points[0].point_m, 0.0, 1.5);
        approx(&out.points[1].point_m, 10.0, 1.5);
        assert_eq!(out.points[1].right_idx, Some(1));
        assert_eq!(out.points[1].left_idx, None);
    }

    #[test]
    fn test_spacing_invariant() {
        // With the collapse disabled on a regular track no points are
        // merged, dropped or re-ordered, so the i-th advance event pairs
        // with the i-th synthesised point after the start. Every such point
        // must sit exactly half the track width from the cone that
        // triggered it.
        let right = points(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let left = points(&[(0.0, 3.0), (10.0, 3.0), (20.0, 3.0)]);

        let mut params = Params::default();
        params.collapse_threshold_m = 0.0;

        let out = run(&right, &left, StepStart::Fresh, &params).unwrap();

        let advances: Vec<(Side, usize)> = out
            .events
            .iter()
            .filter_map(|e| match e {
                StepEvent::SideAdvanced { side, index } => Some((*side, *index)),
                _ => None,
            })
            .collect();

        // One point per advance plus the start point
        assert_eq!(out.points.len(), advances.len() + 1);

        for ((side, index), point) in advances.iter().zip(out.points[1..].iter()) {
            let cone = match side {
                Side::Right => right[*index],
                Side::Left => left[*index],
            };
            let dist = (point.point_m - cone).norm();
            assert!(
                (dist - 1.5).abs() < 1e-9,
                "spacing violated: {} from cone {:?}",
                dist,
                cone
            );
        }
    }

    #[test]
    fn test_indices_monotonic_and_bounded() {
        let right = points(&[(0.0, 0.0), (8.0, 1.0), (15.0, -1.0), (24.0, 0.0)]);
        let left = points(&[(0.0, 3.0), (7.0, 4.0), (16.0, 2.0)]);

        let out = run(&right, &left, StepStart::Fresh, &Params::default()).unwrap();

        let mut last_ri = 0;
        let mut last_li = 0;
        for event in &out.events {
            if let StepEvent::SideAdvanced { side, index } = event {
                match side {
                    Side::Right => {
                        assert!(*index > last_ri || last_ri == 0);
                        assert!(*index <= right.len() - 1);
                        last_ri = *index;
                    }
                    Side::Left => {
                        assert!(*index > last_li || last_li == 0);
                        assert!(*index <= left.len() - 1);
                        last_li = *index;
                    }
                }
            }
        }

        // Both sequences must be fully consumed
        assert_eq!(last_ri, right.len() - 1);
        assert_eq!(last_li, left.len() - 1);
    }

    #[test]
    fn test_empty_boundaries_is_an_error() {
        assert!(matches!(
            run(&[], &[], StepStart::Fresh, &Params::default()),
            Err(StepperError::EmptyBoundaries)
        ));
    }

    #[test]
    fn test_single_point_single_side_is_underdetermined() {
        let right = points(&[(0.0, 0.0)]);

        assert!(matches!(
            run(&right, &[], StepStart::Fresh, &Params::default()),
            Err(StepperError::UnderDeterminedStart)
        ));
    }

    #[test]
    fn test_resume_does_not_emit_reference() {
        let right = points(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let left = points(&[(0.0, 3.0)]);

        let reference = SynthPoint::new(Point2::new(10.0, 1.5), Some(1), Some(0));
        let out = run(
            &right,
            &left,
            StepStart::Resume(reference),
            &Params::default(),
        )
        .unwrap();

        // Only the point derived from the last right cone is produced, the
        // reference itself is not replayed
        assert_eq!(out.points.len(), 1);
        approx(&out.points[0].point_m, 20.0, 1.5);
    }

    #[test]
    fn test_vertical_track_section() {
        // A track running straight up the y axis exercises the vertical
        // slope paths end to end
        let right = points(&[(3.0, 0.0), (3.0, 10.0), (3.0, 20.0)]);
        let left = points(&[(0.0, 0.0), (0.0, 10.0), (0.0, 20.0)]);

        let out = run(&right, &left, StepStart::Fresh, &Params::default()).unwrap();

        assert_eq!(out.points.len(), 3);
        approx(&out.points[0].point_m, 1.5, 0.0);
        approx(&out.points[1].point_m, 1.5, 10.0);
        approx(&out.points[2].point_m, 1.5, 20.0);
    }
}
