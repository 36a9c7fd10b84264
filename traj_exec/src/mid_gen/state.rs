//! MidGen module state
//!
//! [`MidGen`] is the long-lived owner of everything the midline computation
//! retains between observation batches: the two boundary windows, the frozen
//! trajectory prefix with its reference point, the revisable pending suffix
//! and the eviction counters. External code interacts with it only through
//! [`util::module::State::init`] and [`util::module::State::proc`]; the
//! windows and trajectory are never mutated from outside.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use nalgebra::Point2;
use serde::Serialize;

// Internal
use super::geom::{self, Slope};
use super::merge;
use super::params::Params;
use super::sequence::{self, DividingLine, HalfPlane, SequenceError};
use super::stepper::{self, StepEvent, StepStart, StepperError, SynthPoint};
use comms_if::per::{ConeObs, Side};
use util::{module::State, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The midline generation module.
pub struct MidGen {
    params: Params,

    /// Right boundary window, ordered and deduplicated after every batch
    right: BoundaryWindow,

    /// Left boundary window
    left: BoundaryWindow,

    /// Trajectory points at or before the reference point. These are final:
    /// they are never revised, only flushed out of memory at commit time.
    /// The last element is the reference point.
    frozen: Vec<SynthPoint>,

    /// Trajectory points after the reference point, revisable by later
    /// batches.
    pending: Vec<SynthPoint>,

    /// Number of batches processed so far.
    batch_count: u64,
}

/// One side's capacity-bounded window of retained boundary points.
struct BoundaryWindow {
    side: Side,

    points: Vec<Point2<f64>>,

    /// True once the window has been ordered at least once. The half-plane
    /// constraint only applies to the very first ordering.
    ordered_once: bool,

    /// Front evictions since the last trajectory commit.
    evictions_since_commit: usize,
}

/// Input to one processing cycle: all observations drained from the
/// transport since the previous cycle.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    pub cones: Vec<(Side, Point2<f64>)>,

    /// True when the observation stream has ended; all retained trajectory
    /// points are flushed into the output's committed list.
    pub end_of_stream: bool,
}

/// Output of one processing cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryUpdate {
    /// Points committed by this cycle, in trajectory order. Committed points
    /// are final and will never appear in a later update.
    pub committed_m: Vec<Point2<f64>>,

    /// The retained trajectory: the frozen prefix (ending at the reference
    /// point) followed by the pending points.
    pub trajectory_m: Vec<Point2<f64>>,

    /// Current ordered right boundary window.
    pub right_boundary_m: Vec<Point2<f64>>,

    /// Current ordered left boundary window.
    pub left_boundary_m: Vec<Point2<f64>>,
}

/// Status of one processing cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// First index at which the fresh right ordering diverged from the
    /// previous one.
    pub right_divergence: usize,
    pub left_divergence: usize,

    /// Boundary points evicted from each window this cycle.
    pub right_evictions: usize,
    pub left_evictions: usize,

    /// True if the half-plane constraint could not be satisfied and the
    /// ordering fell back to plain nearest-neighbour.
    pub right_degenerate_ordering: bool,
    pub left_degenerate_ordering: bool,

    /// Retained trajectory points reused unchanged from the previous cycle.
    pub reused_points: usize,

    /// Trajectory points synthesised by this cycle (after merging).
    pub recomputed_points: usize,

    /// Trajectory points committed and flushed by this cycle.
    pub committed_points: usize,

    /// Degenerate (gap) steps encountered by the stepper.
    pub degenerate_steps: usize,

    /// Wrong-side rotations applied by the stepper.
    pub rotations: usize,

    /// Safety-net re-orders applied by the stepper.
    pub safety_net_reorders: usize,

    /// Proximity collapses applied by the stepper.
    pub collapses: usize,

    /// True if the cycle was deferred because no trajectory start point
    /// could be derived yet.
    pub deferred: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MidGen operation.
#[derive(Debug, thiserror::Error)]
pub enum MidGenError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Both boundary windows are empty")]
    EmptyBoundaries,

    #[error("Could not order the {0:?} boundary window: {1}")]
    OrderingError(Side, SequenceError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MidGen {
    fn default() -> Self {
        Self::with_params(Params::default())
    }
}

impl State for MidGen {
    type InitData = &'static str;
    type InitError = MidGenError;

    type InputData = InputData;
    type OutputData = TrajectoryUpdate;
    type StatusReport = StatusReport;
    type ProcError = MidGenError;

    /// Initialise the module.
    ///
    /// Expected init data is the name of the module's parameter file.
    fn init(
        &mut self,
        init_data: Self::InitData,
        _session: &Session,
    ) -> Result<(), Self::InitError> {
        self.params = util::params::load(init_data).map_err(MidGenError::ParamLoadError)?;

        Ok(())
    }

    /// Process one drained observation batch.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.process_batch(input_data)
    }
}

impl MidGen {
    /// Create a new module instance with the given parameters.
    pub fn with_params(params: Params) -> Self {
        Self {
            params,
            right: BoundaryWindow::new(Side::Right),
            left: BoundaryWindow::new(Side::Left),
            frozen: Vec::new(),
            pending: Vec::new(),
            batch_count: 0,
        }
    }

    /// The retained trajectory: frozen prefix followed by pending points.
    pub fn trajectory(&self) -> Vec<Point2<f64>> {
        self.frozen
            .iter()
            .chain(self.pending.iter())
            .map(|p| p.point_m)
            .collect()
    }

    /// Number of batches processed so far.
    pub fn batch_count(&self) -> u64 {
        self.batch_count
    }

    /// Ingest one drained observation batch and advance the trajectory.
    ///
    /// This is the single mutation entry point for all retained state; it is
    /// also exposed through [`util::module::State::proc`].
    pub fn process_batch(
        &mut self,
        input: &InputData,
    ) -> Result<(TrajectoryUpdate, StatusReport), MidGenError> {
        self.batch_count += 1;
        let mut report = StatusReport::default();

        // Split the batch by side, rejecting anything non-finite at this
        // boundary so the geometry below never sees a NaN
        let mut new_right = Vec::new();
        let mut new_left = Vec::new();
        for (side, point) in &input.cones {
            if !point.x.is_finite() || !point.y.is_finite() {
                warn!(
                    "Rejecting non-finite {:?} observation ({}, {})",
                    side, point.x, point.y
                );
                continue;
            }
            match side {
                Side::Right => new_right.push(*point),
                Side::Left => new_left.push(*point),
            }
        }

        // Append to the windows, evicting the oldest points past capacity
        let (evicted_r, prev_right) =
            self.right.append(&new_right, self.params.window_capacity);
        let (evicted_l, prev_left) =
            self.left.append(&new_left, self.params.window_capacity);
        report.right_evictions = evicted_r;
        report.left_evictions = evicted_l;

        if self.right.points.is_empty() && self.left.points.is_empty() {
            return Err(MidGenError::EmptyBoundaries);
        }

        // Eviction shifts every retained provenance index down; indices
        // that fall off the front lose their link to the window entirely
        if evicted_r > 0 || evicted_l > 0 {
            for p in self.frozen.iter_mut().chain(self.pending.iter_mut()) {
                p.right_idx = p.right_idx.and_then(|i| i.checked_sub(evicted_r));
                p.left_idx = p.left_idx.and_then(|i| i.checked_sub(evicted_l));
            }
        }

        // Dividing line through the two anchor cones, for first-time
        // orderings with a configured half-plane selector
        let half_plane = self
            .params
            .half_plane_selector
            .and_then(HalfPlane::from_selector);
        let divider = match (half_plane, self.right.points.first(), self.left.points.first()) {
            (Some(_), Some(r_0), Some(l_0)) => Some(DividingLine {
                slope: Slope::between(r_0, l_0),
                point: *r_0,
            }),
            _ => None,
        };

        // Reorder both windows and find where the new information diverges
        // from the previous ordering
        let (div_r, degen_r) = reorder_window(
            &mut self.right,
            &prev_right,
            new_right.len(),
            evicted_r,
            divider.as_ref(),
            half_plane,
            &self.params,
        )?;
        let (div_l, degen_l) = reorder_window(
            &mut self.left,
            &prev_left,
            new_left.len(),
            evicted_l,
            divider.as_ref(),
            half_plane,
            &self.params,
        )?;
        report.right_divergence = div_r;
        report.left_divergence = div_l;
        report.right_degenerate_ordering = degen_r;
        report.left_degenerate_ordering = degen_l;
        if degen_r || degen_l {
            warn!(
                "Half-plane ordering fell back to plain proximity, check the \
                 half_plane_selector parameter"
            );
        }

        // Survivors: the longest pending prefix whose every consumed index
        // lies before its side's divergence. The last survivor becomes the
        // new reference point and is frozen along with everything before it
        let kept = self
            .pending
            .iter()
            .take_while(|p| {
                index_unaffected(p.right_idx, div_r) && index_unaffected(p.left_idx, div_l)
            })
            .count();
        report.reused_points = kept;

        self.pending.truncate(kept);
        self.frozen.extend(self.pending.drain(..));

        // Resume from the reference, or start fresh with no retained
        // trajectory
        let start = match self.frozen.last() {
            Some(reference) => StepStart::Resume(*reference),
            None => StepStart::Fresh,
        };

        match stepper::run(&self.right.points, &self.left.points, start, &self.params) {
            Ok(output) => {
                for event in &output.events {
                    log_step_event(event, &mut report);
                }

                self.pending = merge::merge_synth_two_pass(
                    &output.points,
                    self.params.traj_merge_tol_m,
                    self.params.merge_divisor,
                );
                report.recomputed_points = self.pending.len();
            }
            Err(StepperError::UnderDeterminedStart) => {
                debug!("Not enough boundary data to start a trajectory yet, deferring");
                report.deferred = true;
            }
            Err(StepperError::EmptyBoundaries) => {
                return Err(MidGenError::EmptyBoundaries);
            }
        }

        // Commit: once eviction has removed boundary data, the trajectory
        // prefix before the reference can never be recomputed, flush it
        let mut committed: Vec<Point2<f64>> = Vec::new();
        if self.right.evictions_since_commit > 0 || self.left.evictions_since_commit > 0 {
            if self.frozen.len() > 1 {
                let flush = self.frozen.len() - 1;
                committed.extend(self.frozen.drain(..flush).map(|p| p.point_m));
            }
            self.right.evictions_since_commit = 0;
            self.left.evictions_since_commit = 0;
        }

        if input.end_of_stream {
            committed.extend(self.frozen.drain(..).map(|p| p.point_m));
            committed.extend(self.pending.drain(..).map(|p| p.point_m));
        }
        report.committed_points = committed.len();

        let update = TrajectoryUpdate {
            committed_m: committed,
            trajectory_m: self.trajectory(),
            right_boundary_m: self.right.points.clone(),
            left_boundary_m: self.left.points.clone(),
        };

        Ok((update, report))
    }
}

impl BoundaryWindow {
    fn new(side: Side) -> Self {
        Self {
            side,
            points: Vec::new(),
            ordered_once: false,
            evictions_since_commit: 0,
        }
    }

    /// Append new points, evicting the oldest past capacity.
    ///
    /// Returns the number of evicted points and the previous window contents
    /// with the evicted count already dropped from the front, ready for the
    /// divergence comparison.
    fn append(
        &mut self,
        new: &[Point2<f64>],
        capacity: usize,
    ) -> (usize, Vec<Point2<f64>>) {
        let prev = self.points.clone();

        self.points.extend_from_slice(new);

        let evicted = self.points.len().saturating_sub(capacity);
        if evicted > 0 {
            self.points.drain(..evicted);
            self.evictions_since_commit += evicted;
        }

        let prev_shifted = if evicted >= prev.len() {
            Vec::new()
        }
        else {
            prev[evicted..].to_vec()
        };

        (evicted, prev_shifted)
    }
}

impl InputData {
    /// Build the input from transport-level observations.
    pub fn from_obs(cones: &[ConeObs], end_of_stream: bool) -> Self {
        Self {
            cones: cones
                .iter()
                .map(|c| (c.side, Point2::new(c.x_m, c.y_m)))
                .collect(),
            end_of_stream,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Reorder a window and compute its divergence index against the previous
/// ordering. The unchanged prefix is kept verbatim, the diverged suffix is
/// smoothed with the boundary merge tolerance.
fn reorder_window(
    window: &mut BoundaryWindow,
    prev_shifted: &[Point2<f64>],
    appended: usize,
    evicted: usize,
    divider: Option<&DividingLine>,
    half_plane: Option<HalfPlane>,
    params: &Params,
) -> Result<(usize, bool), MidGenError> {
    if window.points.is_empty() {
        return Ok((0, false));
    }

    // A quiet side keeps its ordering, and diverges nowhere
    if appended == 0 && evicted == 0 && window.ordered_once {
        return Ok((window.points.len(), false));
    }

    let anchor = window.points[0];

    let (ordered, degenerate) = match (window.ordered_once, divider, half_plane) {
        (false, Some(line), Some(hp)) => {
            let outcome = sequence::reorder_half_plane(&window.points, &anchor, line, hp)
                .map_err(|e| MidGenError::OrderingError(window.side, e))?;
            (outcome.points, outcome.degenerate_ordering)
        }
        _ => (
            sequence::reorder(&window.points, &anchor)
                .map_err(|e| MidGenError::OrderingError(window.side, e))?,
            false,
        ),
    };

    let div = first_differing_index(&ordered, prev_shifted);

    let mut points = ordered[..div].to_vec();
    points.extend(merge::merge(&ordered[div..], params.boundary_merge_tol_m));
    window.points = points;
    window.ordered_once = true;

    trace!(
        "{:?} window reordered, {} points, divergence at {}",
        window.side,
        window.points.len(),
        div
    );

    Ok((div, degenerate))
}

/// First index at which the two orderings differ, point-wise within the
/// point epsilon. Identical prefixes diverge at the shorter length.
fn first_differing_index(a: &[Point2<f64>], b: &[Point2<f64>]) -> usize {
    let min_len = a.len().min(b.len());

    for i in 0..min_len {
        if !geom::points_approx_eq(&a[i], &b[i]) {
            return i;
        }
    }

    min_len
}

/// True if a retained point's provenance index on one side is unaffected by
/// that side's divergence. An absent index means the side contributed
/// nothing (or its data was evicted) and cannot invalidate the point.
fn index_unaffected(index: Option<usize>, divergence: usize) -> bool {
    match index {
        None => true,
        Some(i) => i < divergence,
    }
}

/// Log one stepper event and count it into the status report.
fn log_step_event(event: &StepEvent, report: &mut StatusReport) {
    match event {
        StepEvent::SideAdvanced { side, index } => {
            trace!("Advanced {:?} side to index {}", side, index);
        }
        StepEvent::DegenerateStep { side, index } => {
            report.degenerate_steps += 1;
            debug!(
                "Degenerate step at {:?} index {}, no point synthesised",
                side, index
            );
        }
        StepEvent::WrongSideRotation { side, index } => {
            report.rotations += 1;
            debug!(
                "Candidate at {:?} index {} rotated 180 degrees back into the track",
                side, index
            );
        }
        StepEvent::SafetyNetReorder => {
            report.safety_net_reorders += 1;
            trace!("Safety net re-ordered the trailing trajectory points");
        }
        StepEvent::ProximityCollapse => {
            report.collapses += 1;
            trace!("Collapsed two close trajectory points into their midpoint");
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn input(cones: &[(Side, (f64, f64))]) -> InputData {
        InputData {
            cones: cones
                .iter()
                .map(|&(s, (x, y))| (s, Point2::new(x, y)))
                .collect(),
            end_of_stream: false,
        }
    }

    #[test]
    fn test_incremental_batches_reuse_stable_prefix() {
        let mut mid_gen = MidGen::default();

        // First batch: right side only
        let (update_1, report_1) = mid_gen
            .process_batch(&input(&[
                (Side::Right, (0.0, 0.0)),
                (Side::Right, (10.0, 0.0)),
            ]))
            .unwrap();

        assert!(!report_1.deferred);
        assert_eq!(update_1.trajectory_m.len(), 2);

        // Second batch extends the right side and opens the left side. The
        // points derived purely from the first batch must be reused
        // bitwise, not recomputed
        let (update_2, report_2) = mid_gen
            .process_batch(&input(&[
                (Side::Right, (20.0, 0.0)),
                (Side::Left, (0.0, 3.0)),
            ]))
            .unwrap();

        assert_eq!(report_2.reused_points, 2);
        assert_eq!(update_2.trajectory_m.len(), 3);
        assert_eq!(update_2.trajectory_m[0], update_1.trajectory_m[0]);
        assert_eq!(update_2.trajectory_m[1], update_1.trajectory_m[1]);
    }

    #[test]
    fn test_pure_extension_diverges_at_previous_length() {
        let mut mid_gen = MidGen::default();

        mid_gen
            .process_batch(&input(&[
                (Side::Right, (0.0, 0.0)),
                (Side::Right, (10.0, 0.0)),
                (Side::Left, (0.0, 3.0)),
                (Side::Left, (10.0, 3.0)),
            ]))
            .unwrap();

        let (_, report) = mid_gen
            .process_batch(&input(&[(Side::Right, (20.0, 0.0))]))
            .unwrap();

        // The right ordering is a pure extension, so it diverges exactly at
        // the previous length; the quiet left side diverges at its full
        // length
        assert_eq!(report.right_divergence, 2);
        assert_eq!(report.left_divergence, 2);
    }

    #[test]
    fn test_window_capacity_is_enforced() {
        let mut params = Params::default();
        params.window_capacity = 4;
        let mut mid_gen = MidGen::with_params(params);

        for i in 0..4 {
            mid_gen
                .process_batch(&input(&[
                    (Side::Right, (i as f64 * 10.0, 0.0)),
                    (Side::Left, (i as f64 * 10.0, 3.0)),
                ]))
                .unwrap();
        }

        let (update, report) = mid_gen
            .process_batch(&input(&[
                (Side::Right, (40.0, 0.0)),
                (Side::Left, (40.0, 3.0)),
            ]))
            .unwrap();

        assert_eq!(report.right_evictions, 1);
        assert_eq!(report.left_evictions, 1);
        assert!(update.right_boundary_m.len() <= 4);
        assert!(update.left_boundary_m.len() <= 4);
    }

    #[test]
    fn test_eviction_triggers_commit() {
        let mut params = Params::default();
        params.window_capacity = 3;
        let mut mid_gen = MidGen::with_params(params);

        let mut committed_total = 0;
        for i in 0..6 {
            let (update, _) = mid_gen
                .process_batch(&input(&[
                    (Side::Right, (i as f64 * 10.0, 0.0)),
                    (Side::Left, (i as f64 * 10.0, 3.0)),
                ]))
                .unwrap();
            committed_total += update.committed_m.len();
        }

        // With a 3-point window and 6 batches, eviction must have flushed
        // part of the trajectory out of memory
        assert!(committed_total > 0);

        // The retained trajectory plus what was flushed covers the track
        let retained = mid_gen.trajectory().len();
        assert!(committed_total + retained >= 3);
    }

    #[test]
    fn test_end_of_stream_flushes_everything() {
        let mut mid_gen = MidGen::default();

        mid_gen
            .process_batch(&input(&[
                (Side::Right, (0.0, 0.0)),
                (Side::Right, (10.0, 0.0)),
                (Side::Left, (0.0, 3.0)),
                (Side::Left, (10.0, 3.0)),
            ]))
            .unwrap();

        let mut final_input = input(&[]);
        final_input.end_of_stream = true;

        let (update, report) = mid_gen.process_batch(&final_input).unwrap();

        assert!(report.committed_points > 0);
        assert!(update.trajectory_m.is_empty());
        assert!(mid_gen.trajectory().is_empty());
    }

    #[test]
    fn test_empty_windows_are_fatal() {
        let mut mid_gen = MidGen::default();

        assert!(matches!(
            mid_gen.process_batch(&input(&[])),
            Err(MidGenError::EmptyBoundaries)
        ));
    }

    #[test]
    fn test_single_cone_defers() {
        let mut mid_gen = MidGen::default();

        let (update, report) = mid_gen
            .process_batch(&input(&[(Side::Right, (0.0, 0.0))]))
            .unwrap();

        assert!(report.deferred);
        assert!(update.trajectory_m.is_empty());
        assert_eq!(update.right_boundary_m.len(), 1);

        // The next batch completes the side and the trajectory appears
        let (update, report) = mid_gen
            .process_batch(&input(&[(Side::Right, (10.0, 0.0))]))
            .unwrap();

        assert!(!report.deferred);
        assert_eq!(update.trajectory_m.len(), 2);
    }

    #[test]
    fn test_non_finite_observations_are_rejected() {
        let mut mid_gen = MidGen::default();

        let (update, _) = mid_gen
            .process_batch(&input(&[
                (Side::Right, (0.0, 0.0)),
                (Side::Right, (f64::NAN, 1.0)),
                (Side::Right, (10.0, 0.0)),
                (Side::Left, (0.0, f64::INFINITY)),
            ]))
            .unwrap();

        assert_eq!(update.right_boundary_m.len(), 2);
        assert!(update.left_boundary_m.is_empty());
    }

    #[test]
    fn test_straight_track_over_batches_matches_single_batch() {
        // Feeding the same cones in one batch or over several batches must
        // land on the same centerline for a straight track
        let cones = [
            (Side::Right, (0.0, 0.0)),
            (Side::Left, (0.0, 3.0)),
            (Side::Right, (10.0, 0.0)),
            (Side::Left, (10.0, 3.0)),
            (Side::Right, (20.0, 0.0)),
            (Side::Left, (20.0, 3.0)),
        ];

        let mut one_shot = MidGen::default();
        let (single, _) = one_shot.process_batch(&input(&cones)).unwrap();

        let mut incremental = MidGen::default();
        let mut last = None;
        for chunk in cones.chunks(2) {
            last = Some(incremental.process_batch(&input(chunk)).unwrap().0);
        }
        let incremental_update = last.unwrap();

        assert_eq!(single.trajectory_m.len(), incremental_update.trajectory_m.len());
        for (a, b) in single
            .trajectory_m
            .iter()
            .zip(incremental_update.trajectory_m.iter())
        {
            assert!(
                geom::points_approx_eq(a, b),
                "batched {:?} != incremental {:?}",
                a,
                b
            );
        }
    }
}
