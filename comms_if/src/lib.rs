//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Cone observation messages published by the perception executable
pub mod per;

/// Trajectory telemetry messages published by the trajectory executable
pub mod traj;

/// Network module
pub mod net;
