//! Temporal primitives for TIDE

use crate::error::{Result, TideError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A discrete timestep on the reasoning timeline
pub type TimePoint = usize;

/// Closed discrete range `[start, end]` of timesteps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: TimePoint,
    end: TimePoint,
}

impl Interval {
    /// Create an interval, rejecting `end < start`
    pub fn new(start: TimePoint, end: TimePoint) -> Result<Self> {
        if end < start {
            return Err(TideError::InvalidInterval { start, end });
        }
        Ok(Interval { start, end })
    }

    /// Create a single-timestep interval `[t, t]`
    pub fn point(t: TimePoint) -> Self {
        Interval { start: t, end: t }
    }

    /// Interval start
    pub fn start(&self) -> TimePoint {
        self.start
    }

    /// Interval end
    pub fn end(&self) -> TimePoint {
        self.end
    }

    /// Check whether `t` falls inside the interval
    pub fn contains(&self, t: TimePoint) -> bool {
        self.start <= t && t <= self.end
    }

    /// Restrict the interval to `[0, horizon]`, or `None` if it lies beyond
    pub fn clamp_to(&self, horizon: TimePoint) -> Option<Interval> {
        if self.start > horizon {
            return None;
        }
        Some(Interval {
            start: self.start,
            end: self.end.min(horizon),
        })
    }

    /// Check whether the interval covers the whole `[0, horizon]` timeline
    pub fn spans(&self, horizon: TimePoint) -> bool {
        self.start == 0 && self.end >= horizon
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_containment() {
        let iv = Interval::new(2, 5).unwrap();
        assert!(!iv.contains(1));
        assert!(iv.contains(2));
        assert!(iv.contains(5));
        assert!(!iv.contains(6));
    }

    #[test]
    fn test_interval_rejects_inverted_bounds() {
        let err = Interval::new(5, 2).unwrap_err();
        assert!(matches!(
            err,
            TideError::InvalidInterval { start: 5, end: 2 }
        ));
    }

    #[test]
    fn test_interval_clamp() {
        let iv = Interval::new(3, 10).unwrap();
        let clamped = iv.clamp_to(7).unwrap();
        assert_eq!(clamped.start(), 3);
        assert_eq!(clamped.end(), 7);

        assert!(iv.clamp_to(2).is_none());
    }

    #[test]
    fn test_interval_spans() {
        assert!(Interval::new(0, 10).unwrap().spans(10));
        assert!(Interval::new(0, 12).unwrap().spans(10));
        assert!(!Interval::new(1, 12).unwrap().spans(10));
        assert!(!Interval::new(0, 9).unwrap().spans(10));
    }
}
