//! Pure layout math for the chord diagram.
//!
//! Angles are radians in screen space (y grows downwards), so increasing
//! angles run clockwise. Nothing here reads a clock or holds RNG state: every
//! value is a function of a digit and a position index.

use crate::digits::DigitSequence;
use core::f64::consts::{FRAC_PI_2, PI, TAU};

/// Number of ring segments, one per digit value.
pub const SEGMENTS: u8 = 10;

/// Angular width of one segment (36°).
pub const SEGMENT_SPAN: f64 = TAU / SEGMENTS as f64;

/// Gap left between neighbouring segments (2°).
pub const SEGMENT_GAP: f64 = PI / 90.0;

/// 12 o'clock.
const TOP: f64 = -FRAC_PI_2;

/// `2^64 / φ`, the Weyl increment of the golden-ratio sequence.
const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Returns `frac(index × φ)` in `[0, 1)`.
///
/// Computed with wrapping integer arithmetic so the result is exact and
/// identical on every platform; successive indices scatter with low
/// discrepancy.
#[inline]
pub fn scatter(index: u64) -> f64 {
    let mixed = index.wrapping_mul(GOLDEN_GAMMA);
    (mixed >> 11) as f64 / (1_u64 << 53) as f64
}

/// Returns the drawable `(start, end)` angles of the segment for `digit`.
#[inline]
pub fn segment_arc(digit: u8) -> (f64, f64) {
    let start = TOP + f64::from(digit % SEGMENTS) * SEGMENT_SPAN;
    (start + SEGMENT_GAP / 2.0, start + SEGMENT_SPAN - SEGMENT_GAP / 2.0)
}

/// Returns the angle at which position `index` anchors inside the segment
/// of `digit`.
#[inline]
pub fn anchor_angle(digit: u8, index: u64) -> f64 {
    let (start, end) = segment_arc(digit);
    start + scatter(index) * (end - start)
}

/// Returns the unit direction halfway between two angles, or `None` when
/// they point in opposite directions.
pub fn bisector(a: f64, b: f64) -> Option<(f64, f64)> {
    let (x, y) = (a.cos() + b.cos(), a.sin() + b.sin());
    let len = x.hypot(y);
    (len > 1e-9).then(|| (x / len, y / len))
}

/// A run of consecutive positions holding the same digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub digit: u8,
    /// First position of the run.
    pub start: u64,
    pub len: u64,
}

impl Cluster {
    /// Marker size tier for this run, `None` for runs shorter than 2.
    pub fn tier(&self) -> Option<usize> {
        match self.len {
            0 | 1 => None,
            2 => Some(0),
            3 => Some(1),
            4 | 5 => Some(2),
            _ => Some(3),
        }
    }
}

/// Splits positions `1..=count` into maximal runs of equal digits.
pub fn clusters(count: u64, digits: &DigitSequence) -> Vec<Cluster> {
    let mut runs: Vec<Cluster> = Vec::new();
    for position in 1..=count {
        let digit = digits.digit_at_position(position);
        match runs.last_mut() {
            Some(run) if run.digit == digit => run.len += 1,
            _ => runs.push(Cluster {
                digit,
                start: position,
                len: 1,
            }),
        }
    }
    runs
}
