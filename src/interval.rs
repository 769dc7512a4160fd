//! Half-open time interval used for program airtimes and tuner occupancy.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::UnixMillis;

/// Continuous range `[start, end)` in epoch-milliseconds.
///
/// Endpoints are half-open: two intervals that merely touch share no instant,
/// so back-to-back programs can occupy the same tuner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: UnixMillis,
    end: UnixMillis,
}

impl Interval {
    /// Creates interval `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    pub fn new(start: UnixMillis, end: UnixMillis) -> Self {
        assert!(start <= end, "Interval start must be <= end");
        Self { start, end }
    }

    pub const fn start(&self) -> UnixMillis {
        self.start
    }

    pub const fn end(&self) -> UnixMillis {
        self.end
    }

    pub const fn duration(&self) -> UnixMillis {
        self.end - self.start
    }

    /// Returns true if `position` ∈ `[start, end)`.
    pub const fn contains(&self, position: UnixMillis) -> bool {
        self.start <= position && position < self.end
    }

    /// Checks if this interval overlaps with another interval.
    ///
    /// Half-open semantics: `[a, b)` and `[b, c)` do not overlap.
    pub const fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
