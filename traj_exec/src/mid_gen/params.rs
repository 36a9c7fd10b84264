//! MidGen parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the midline generation module.
///
/// Loaded from `mid_gen.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Maximum number of retained boundary points per side. Once a window
    /// exceeds this the oldest points are evicted.
    pub window_capacity: usize,

    /// Half of the minimum admissible track width in meters. Every
    /// synthesised trajectory point is placed exactly this far from the cone
    /// that triggered it.
    pub half_track_width_m: f64,

    /// Distance below which the stepper collapses the last two trajectory
    /// points into their midpoint, in meters.
    pub collapse_threshold_m: f64,

    /// Number of trailing trajectory points re-ordered by the stepper's
    /// local safety net.
    pub safety_net_window: usize,

    /// Merge tolerance applied to the diverged suffix of each boundary
    /// window, in meters.
    pub boundary_merge_tol_m: f64,

    /// Merge tolerance applied to freshly generated trajectory suffixes, in
    /// meters.
    pub traj_merge_tol_m: f64,

    /// Divisor applied to the trajectory merge tolerance for the second,
    /// finer merge pass.
    pub merge_divisor: f64,

    /// Half-plane selector for the very first ordering of each boundary
    /// window: +1 or -1 relative to the line joining the two anchor cones,
    /// unset to order by plain proximity.
    pub half_plane_selector: Option<i8>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            window_capacity: 20,
            half_track_width_m: 1.5,
            collapse_threshold_m: 2.0,
            safety_net_window: 3,
            boundary_merge_tol_m: 3.0,
            traj_merge_tol_m: 3.1,
            merge_divisor: 2.0,
            half_plane_selector: None,
        }
    }
}
