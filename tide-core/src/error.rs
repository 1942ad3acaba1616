//! Error types for TIDE

use thiserror::Error;

/// Main error type for TIDE operations
#[derive(Error, Debug)]
pub enum TideError {
    /// Atom text could not be parsed
    #[error("Invalid atom syntax: {0}")]
    InvalidAtom(String),

    /// Rule text or rule structure is malformed
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Fact construction or fact text is malformed
    #[error("Invalid fact: {0}")]
    InvalidFact(String),

    /// Interval end precedes its start
    #[error("Invalid interval: end {end} precedes start {start}")]
    InvalidInterval {
        /// Requested interval start
        start: usize,
        /// Requested interval end
        end: usize,
    },

    /// Reasoning horizon is negative
    #[error("Invalid time range: horizon {0} is negative")]
    InvalidTimeRange(i64),

    /// An engine invariant was violated (indicates a bug)
    #[error("Engine invariant violated: {0}")]
    InvariantViolation(String),

    /// IO error while loading facts
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for TIDE operations
pub type Result<T> = std::result::Result<T, TideError>;
