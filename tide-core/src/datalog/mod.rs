//! Temporal Datalog engines for TIDE
//!
//! This module provides the reasoning core:
//!
//! - **Naive evaluation**: reference fixed-point loop over a dense
//!   per-timestep interpretation
//! - **Semi-naive evaluation**: delta-driven fixed point over the sparse
//!   store, with predicate indexing and optional rule-level parallelism
//! - **Streaming ingestion**: single-fact propagation with observers
//! - **Incremental batches**: reason, add more facts, propagate the delta
//!
//! Evaluation strategy:
//! Rules are interpreted at runtime rather than compiled, so callers can
//! construct and hand over rule sets without recompilation. Facts are only
//! ever added during a run; retraction means recomputing from scratch.

pub mod incremental;
pub mod naive;
pub mod provenance;
pub mod semi_naive;
pub mod streaming;
pub mod types;
pub mod unification;

pub use incremental::IncrementalReasoner;
pub use naive::NaiveReasoner;
pub use provenance::{DerivationInfo, DerivationTree, ProvenanceTracker};
pub use semi_naive::OptimizedReasoner;
pub use streaming::StreamingReasoner;
pub use types::{Atom, Literal, Rule, Substitution, Term};
pub use unification::{
    find_all_substitutions, find_all_substitutions_counted, find_all_substitutions_indexed,
    find_all_substitutions_indexed_counted, ground_atom, unify,
};

use crate::error::{Result, TideError};
use crate::types::TimePoint;
use ahash::AHashSet;
use tracing::warn;

/// Engine tuning knobs shared by the batch reasoners
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// Rule count at which a timestep's rules are evaluated in parallel
    pub parallel_threshold: usize,
    /// Fixed-point iteration safety valve
    pub max_iterations: usize,
    /// Horizon above which a warning is emitted (evaluation proceeds)
    pub horizon_warn_limit: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        ReasonerConfig {
            parallel_threshold: 8,
            max_iterations: 10_000,
            horizon_warn_limit: 10_000,
        }
    }
}

/// Counters describing a reasoning run
#[derive(Debug, Clone, Default)]
pub struct EvaluationStats {
    /// Outer fixed-point iterations until quiescence
    pub iterations: usize,
    /// Facts added by rule application
    pub facts_derived: usize,
    /// Rule evaluations attempted
    pub rule_applications: usize,
    /// Pattern-to-fact unification attempts, successful or not
    pub unification_attempts: usize,
    /// Wall-clock evaluation time
    pub evaluation_time_ns: u64,
}

/// Result of a batch reasoning run
#[derive(Debug)]
pub struct ReasonerResult {
    /// Ground atoms holding at each timestep, indexed by `t`
    pub facts_by_time: Vec<AHashSet<Atom>>,
    /// First-witness derivations for every non-base fact
    pub provenance: ProvenanceTracker,
    /// Run counters
    pub stats: EvaluationStats,
}

impl ReasonerResult {
    /// The timeline bound `T` of this run
    pub fn horizon(&self) -> TimePoint {
        self.facts_by_time.len().saturating_sub(1)
    }

    /// Facts holding at `t`, or `None` past the horizon
    pub fn facts_at(&self, t: TimePoint) -> Option<&AHashSet<Atom>> {
        self.facts_by_time.get(t)
    }
}

/// Validate a caller-supplied horizon, warning when it is unusually large
pub(crate) fn check_horizon(horizon: i64, config: &ReasonerConfig) -> Result<TimePoint> {
    if horizon < 0 {
        return Err(TideError::InvalidTimeRange(horizon));
    }
    let horizon = horizon as TimePoint;
    if horizon > config.horizon_warn_limit {
        warn!(
            horizon,
            limit = config.horizon_warn_limit,
            "large reasoning horizon; evaluation proceeds but may be slow"
        );
    }
    Ok(horizon)
}
