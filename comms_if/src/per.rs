//! # Perception Communications Module
//!
//! Defines the messages published by the perception executable: a stream of
//! side-labelled cone observations, terminated by an explicit end-of-stream
//! marker. Messages are JSON-serialised over the perception PUB socket.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The side of the track a cone observation belongs to.
///
/// The side is fixed by the observation source. Mislabelled cones are an
/// input-data risk which the downstream processing does not detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Right,
    Left,
}

/// A message in the perception stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PerMsg {
    /// A single cone observation.
    Cone(ConeObs),

    /// The observation stream has ended, no further cones will be published.
    EndOfStream,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single cone observation in the track frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConeObs {
    /// Which boundary the cone marks.
    pub side: Side,

    /// X position of the cone in meters.
    pub x_m: f64,

    /// Y position of the cone in meters.
    pub y_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Side {
    /// Return the opposite side.
    pub fn other(&self) -> Self {
        match self {
            Side::Right => Side::Left,
            Side::Left => Side::Right,
        }
    }
}

impl PerMsg {
    /// Serialise this message into a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a message from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_per_msg_json() {
        let msg = PerMsg::Cone(ConeObs {
            side: Side::Left,
            x_m: 12.5,
            y_m: -3.0,
        });

        let json = msg.to_json().unwrap();
        match PerMsg::from_json(&json).unwrap() {
            PerMsg::Cone(obs) => {
                assert_eq!(obs.side, Side::Left);
                assert_eq!(obs.x_m, 12.5);
                assert_eq!(obs.y_m, -3.0);
            }
            _ => panic!("expected a cone message"),
        }

        let eos = PerMsg::EndOfStream.to_json().unwrap();
        assert!(matches!(
            PerMsg::from_json(&eos).unwrap(),
            PerMsg::EndOfStream
        ));
    }
}
