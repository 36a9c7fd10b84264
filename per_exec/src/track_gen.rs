//! # Track Generator
//!
//! Generates a synthetic cone-delimited track one section at a time. The
//! track starts at a fixed pose and grows by alternating straight sections
//! and constant-radius turns, with the track width drifting smoothly between
//! its competition bounds.
//!
//! All pseudo-random choices (section type, lengths, radii, cone spacing,
//! position jitter, cone dropping and local shuffling) are drawn from a
//! Perlin noise field sampled along a moving cursor, so a run is fully
//! reproducible from the starting offset.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Point2, Rotation2, Vector2};
use noise::{NoiseFn, Perlin};
use serde::Serialize;

use util::maths::{clamp, lin_map};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Cursor increment between noise samples. Deliberately off any integer
/// ratio so samples never land on the Perlin lattice, where the field is
/// identically zero.
const NOISE_STEP: f64 = 0.637;

/// Second noise coordinate, fixed off-lattice.
const NOISE_LANE: f64 = 0.383;

/// Bounds on the track width in meters.
const MIN_WIDTH_M: f64 = 3.0;
const MAX_WIDTH_M: f64 = 6.0;

/// Width of the starting box, which the first section must match.
const START_WIDTH_M: f64 = 5.0;

/// Maximum number of consecutive cones dropped when thinning a section.
const MAX_DROPPED_CONES: usize = 2;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Incremental synthetic track generator.
pub struct TrackGen {
    perlin: Perlin,
    cursor: f64,

    /// Current end position of the track.
    pos: Point2<f64>,

    /// Current travel direction, unit length.
    dir: Vector2<f64>,

    /// Current track width.
    width_m: f64,

    sections_generated: u64,
}

/// One generated track section.
#[derive(Debug, Clone, Serialize)]
pub struct TrackSection {
    pub kind: SectionKind,
    pub right: Vec<Point2<f64>>,
    pub left: Vec<Point2<f64>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The geometry of a generated section.
#[derive(Debug, Clone, Serialize)]
pub enum SectionKind {
    Straight { length_m: f64 },

    /// A constant-radius turn; positive angles turn left.
    Turn { radius_m: f64, angle_rad: f64 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrackGen {
    /// Create a generator starting at the given offset into the noise
    /// field. The track begins at (3, 0) heading along +x, matching the
    /// starting box.
    pub fn new(noise_offset: f64) -> Self {
        Self {
            perlin: Perlin::new(),
            cursor: noise_offset,
            pos: Point2::new(3.0, 0.0),
            dir: Vector2::new(1.0, 0.0),
            width_m: START_WIDTH_M,
            sections_generated: 0,
        }
    }

    /// Generate the next track section.
    pub fn next_section(&mut self) -> TrackSection {
        // The width drifts by half-meter steps inside its bounds, except
        // for the first section which must match the starting box
        if self.sections_generated > 0 {
            let mut increment = if self.sample() >= 0.0 { 0.5 } else { -0.5 };
            if self.width_m + increment > MAX_WIDTH_M
                || self.width_m + increment < MIN_WIDTH_M
            {
                increment = -increment;
            }
            self.width_m += increment;
        }

        self.sections_generated += 1;

        if self.sample() >= 0.0 {
            self.gen_straight()
        }
        else {
            self.gen_turn()
        }
    }

    /// Drop some cones from a section, always keeping the first, skipping
    /// at most [`MAX_DROPPED_CONES`] adjacent cones at a time. Models
    /// cones the perception stack failed to detect.
    pub fn thin(&mut self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        if points.is_empty() {
            return Vec::new();
        }

        let mut thinned = vec![points[0]];

        let mut index = 1;
        while index < points.len() {
            let skip =
                self.uniform((0.0, (MAX_DROPPED_CONES + 1) as f64)).floor() as usize;
            index += skip.min(MAX_DROPPED_CONES);
            if index < points.len() {
                thinned.push(points[index]);
            }
            index += 1;
        }

        thinned
    }

    /// Randomly swap adjacent cone pairs, modelling out-of-order delivery
    /// from the perception stack.
    pub fn permute_pairs(&mut self, points: &mut Vec<Point2<f64>>) {
        let mut i = 0;
        while i + 1 < points.len() {
            if self.coin() {
                points.swap(i, i + 1);
            }
            i += 2;
        }
    }

    /// A noise-driven boolean.
    pub fn coin(&mut self) -> bool {
        self.sample() >= 0.0
    }

    /// A noise-driven value in the given range.
    pub fn uniform(&mut self, range: (f64, f64)) -> f64 {
        lin_map((-1.0, 1.0), range, self.sample())
    }

    /// Current end position of the track.
    pub fn position(&self) -> Point2<f64> {
        self.pos
    }

    /// Current travel direction.
    pub fn direction(&self) -> Vector2<f64> {
        self.dir
    }

    // ----------------------------------------------------------------------
    // Generation internals
    // ----------------------------------------------------------------------

    /// Draw the next noise sample in [-1, 1].
    fn sample(&mut self) -> f64 {
        let value = self.perlin.get([self.cursor, NOISE_LANE]);
        self.cursor += NOISE_STEP;
        clamp(&value, &-1.0, &1.0)
    }

    fn gen_straight(&mut self) -> TrackSection {
        let length_m = self.uniform((20.0, 80.0));
        let perp = Vector2::new(-self.dir.y, self.dir.x);
        let half_width = self.width_m / 2.0;

        let mut right = Vec::new();
        let mut left = Vec::new();

        // Cone pairs spaced 3 to 5 meters along the axis, with a small
        // outward jitter per cone
        let mut s = 0.0;
        loop {
            s += self.uniform((3.0, 5.0));
            if s > length_m {
                break;
            }

            let base = self.pos + self.dir * s;
            let left_jitter = self.uniform((0.0, 0.15));
            let right_jitter = self.uniform((0.0, 0.15));

            left.push(base + perp * (half_width + left_jitter));
            right.push(base - perp * (half_width + right_jitter));
        }

        self.pos += self.dir * length_m;

        TrackSection {
            kind: SectionKind::Straight { length_m },
            right,
            left,
        }
    }

    fn gen_turn(&mut self) -> TrackSection {
        // Turn angle in {45, 90, 135, 180} degrees, direction by coin
        let quarter = (self.uniform((0.0, 4.0)).floor() as usize).min(3);
        let angle_rad = (quarter as f64 + 1.0) * std::f64::consts::FRAC_PI_4;
        let orient = if self.coin() { 1.0 } else { -1.0 };
        let radius_m = self.uniform((9.0, 25.0));
        let half_width = self.width_m / 2.0;

        let perp = Vector2::new(-self.dir.y, self.dir.x);
        let inward = perp * orient;
        let centre = self.pos + inward * radius_m;
        let outward = -inward;

        let arc_len = radius_m * angle_rad;
        let mut right = Vec::new();
        let mut left = Vec::new();

        // Cones spaced 1 to 4 meters along the arc
        let mut s = 0.0;
        loop {
            s += self.uniform((1.0, 4.0));
            if s > arc_len {
                break;
            }

            let swept = Rotation2::new((s / radius_m) * orient) * outward;
            let inner_jitter = self.uniform((0.0, 0.1));
            let outer_jitter = self.uniform((0.0, 0.1));

            let inner = centre + swept * (radius_m - half_width + inner_jitter);
            let outer = centre + swept * (radius_m + half_width - outer_jitter);

            // Turning left puts the outer boundary on the right of travel
            if orient > 0.0 {
                right.push(outer);
                left.push(inner);
            }
            else {
                right.push(inner);
                left.push(outer);
            }
        }

        let rotation = Rotation2::new(angle_rad * orient);
        self.pos = centre + (rotation * outward) * radius_m;
        self.dir = rotation * self.dir;

        TrackSection {
            kind: SectionKind::Turn {
                radius_m,
                angle_rad: angle_rad * orient,
            },
            right,
            left,
        }
    }

}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generation_is_reproducible() {
        let mut gen_a = TrackGen::new(17.3);
        let mut gen_b = TrackGen::new(17.3);

        for _ in 0..5 {
            let section_a = gen_a.next_section();
            let section_b = gen_b.next_section();

            assert_eq!(section_a.right, section_b.right);
            assert_eq!(section_a.left, section_b.left);
        }
    }

    #[test]
    fn test_straight_sections_have_sane_spacing() {
        let mut track_gen = TrackGen::new(0.21);

        // Generate until we see a straight section with several cones
        for _ in 0..20 {
            let section = track_gen.next_section();
            if let SectionKind::Straight { .. } = section.kind {
                for pair in section.right.windows(2) {
                    let dist = (pair[1] - pair[0]).norm();
                    assert!(
                        dist > 2.5 && dist < 5.5,
                        "unexpected cone spacing {} on a straight",
                        dist
                    );
                }
                if section.right.len() >= 3 {
                    return;
                }
            }
        }

        panic!("no straight section with enough cones generated");
    }

    #[test]
    fn test_cone_pairs_straddle_straight_sections() {
        // On a straight section left cones must lie on the left of the
        // section axis and right cones on the right
        let mut track_gen = TrackGen::new(5.5);
        let mut checked = false;

        for _ in 0..20 {
            let start = track_gen.position();
            let dir = track_gen.direction();
            let section = track_gen.next_section();

            if let SectionKind::Straight { .. } = section.kind {
                for cone in &section.left {
                    let v = cone - start;
                    assert!(dir.x * v.y - dir.y * v.x > 0.0, "left cone on the right");
                }
                for cone in &section.right {
                    let v = cone - start;
                    assert!(dir.x * v.y - dir.y * v.x < 0.0, "right cone on the left");
                }
                if !section.left.is_empty() {
                    checked = true;
                }
            }
        }

        assert!(checked, "no straight section generated");
    }

    #[test]
    fn test_direction_stays_unit_length() {
        let mut track_gen = TrackGen::new(3.1);

        for _ in 0..10 {
            track_gen.next_section();
            assert!((track_gen.direction().norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_thin_keeps_first_cone_and_never_grows() {
        let mut track_gen = TrackGen::new(9.9);
        let points: Vec<Point2<f64>> =
            (0..10).map(|i| Point2::new(i as f64 * 4.0, 0.0)).collect();

        let thinned = track_gen.thin(&points);

        assert!(!thinned.is_empty());
        assert_eq!(thinned[0], points[0]);
        assert!(thinned.len() <= points.len());
    }

    #[test]
    fn test_permute_pairs_is_a_permutation() {
        let mut track_gen = TrackGen::new(2.7);
        let original: Vec<Point2<f64>> =
            (0..7).map(|i| Point2::new(i as f64, 0.0)).collect();

        let mut shuffled = original.clone();
        track_gen.permute_pairs(&mut shuffled);

        assert_eq!(shuffled.len(), original.len());
        for p in &original {
            assert!(shuffled.contains(p));
        }
        // Swaps are local: a cone moves at most one position
        for (i, p) in shuffled.iter().enumerate() {
            let home = original.iter().position(|q| q == p).unwrap();
            assert!((home as i64 - i as i64).abs() <= 1);
        }
    }
}
