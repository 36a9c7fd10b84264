//! # Trajectory Telemetry Communications Module
//!
//! Defines the telemetry packet published by the trajectory executable after
//! every processed observation batch, for consumption by external plotting
//! or persistence tools.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single trajectory or boundary point in the track frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajPoint {
    pub x_m: f64,
    pub y_m: f64,
}

/// Telemetry packet output after each observation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajTm {
    /// Number of batches processed so far, including this one.
    pub batch_count: u64,

    /// Trajectory points committed and flushed by this batch. Committed
    /// points are final and will never be republished or revised.
    pub committed_m: Vec<TrajPoint>,

    /// The retained trajectory: the reference point followed by the pending
    /// points, which may still be revised by later batches.
    pub trajectory_m: Vec<TrajPoint>,

    /// Current ordered right boundary window.
    pub right_boundary_m: Vec<TrajPoint>,

    /// Current ordered left boundary window.
    pub left_boundary_m: Vec<TrajPoint>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajPoint {
    pub fn new(x_m: f64, y_m: f64) -> Self {
        Self { x_m, y_m }
    }
}

impl TrajTm {
    /// Serialise this packet into a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a packet from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}
