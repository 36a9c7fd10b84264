//! # Midline generation module
//!
//! MidGen derives a drivable centerline from a stream of noisy, partially
//! ordered, side-labelled track boundary observations (cones). Observations
//! arrive in batches with no ordering guarantee across sides, so on each
//! batch the module:
//!
//! 1. Appends the new cones to a capacity-bounded window per side, evicting
//!    the oldest points once the window is full.
//! 2. Reorders each window into a spatially coherent sequence by
//!    nearest-neighbour chaining from the window's first point.
//! 3. Diffs the fresh ordering against the previous one to find the first
//!    index at which the new information actually changes anything.
//! 4. Resumes the midline stepper from the last trajectory point that is
//!    provably unaffected by the new information, recomputing only the
//!    invalidated suffix.
//! 5. Smooths the recomputed suffix and commits stable points out of memory
//!    once boundary eviction makes them impossible to ever recompute.
//!
//! The stepper itself walks both boundary sequences in tandem, synthesising
//! each trajectory point by intersecting the advanced boundary segment's
//! line through the previous trajectory point with the perpendicular through
//! the newly advanced cone, then correcting spacing and orientation.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod geom;
pub mod merge;
pub mod params;
pub mod sequence;
pub mod state;
pub mod stepper;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::Params;
pub use state::*;
pub use stepper::{StepEvent, SynthPoint};
