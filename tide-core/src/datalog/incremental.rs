//! Batch incremental reasoning: reason, add more facts, reason again
//!
//! `reason` runs a full semi-naive fixed point and keeps the resulting
//! store; `incremental_reason` propagates only the consequences of facts
//! staged since the last call, the same BFS the streaming engine uses.
//! Retraction recomputes from scratch — partial truth maintenance under
//! deletion is deliberately not attempted.

use super::provenance::ProvenanceTracker;
use super::semi_naive::run_fixed_point;
use super::streaming::propagate;
use super::types::{Atom, Rule};
use super::{check_horizon, EvaluationStats, ReasonerConfig};
use crate::error::Result;
use crate::facts::{SparseStore, TimedFact};
use crate::types::TimePoint;
use ahash::AHashSet;
use std::collections::VecDeque;
use tracing::debug;

/// Reasoner that alternates full fixed points with delta propagation
pub struct IncrementalReasoner {
    rules: Vec<Rule>,
    facts: Vec<TimedFact>,
    pending: Vec<TimedFact>,
    horizon: TimePoint,
    store: SparseStore,
    provenance: ProvenanceTracker,
    generation: u64,
    config: ReasonerConfig,
}

impl IncrementalReasoner {
    /// Create a reasoner over `[0, horizon]` with default configuration
    pub fn new(horizon: i64) -> Result<Self> {
        Self::with_config(horizon, ReasonerConfig::default())
    }

    /// Create a reasoner with the given configuration
    pub fn with_config(horizon: i64, config: ReasonerConfig) -> Result<Self> {
        let horizon = check_horizon(horizon, &config)?;
        Ok(IncrementalReasoner {
            rules: Vec::new(),
            facts: Vec::new(),
            pending: Vec::new(),
            horizon,
            store: SparseStore::new(horizon),
            provenance: ProvenanceTracker::new(),
            generation: 0,
            config,
        })
    }

    /// Append a rule; takes full effect on the next `reason` call
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Stage a fact for the next reasoning call
    pub fn add_fact(&mut self, fact: TimedFact) {
        self.pending.push(fact);
    }

    /// Run a full fixed point over all facts, staged ones included
    pub fn reason(&mut self) -> Result<EvaluationStats> {
        self.facts.append(&mut self.pending);

        self.store = SparseStore::new(self.horizon);
        for fact in &self.facts {
            self.store.load(fact);
        }
        self.provenance = ProvenanceTracker::new();

        let stats = run_fixed_point(&self.store, &self.rules, &mut self.provenance, &self.config)?;
        self.generation += 1;
        debug!(
            generation = self.generation,
            derived = stats.facts_derived,
            "full fixed point"
        );
        Ok(stats)
    }

    /// Propagate only the consequences of facts staged since the last call
    ///
    /// Returns the newly derived `(atom, t)` pairs.
    pub fn incremental_reason(&mut self) -> Result<Vec<(Atom, TimePoint)>> {
        let staged = std::mem::take(&mut self.pending);

        let mut seeds = VecDeque::new();
        for fact in &staged {
            for t in self.store.load(fact) {
                seeds.push_back((fact.atom().clone(), t));
            }
        }
        self.facts.extend(staged);

        let derived = propagate(
            &self.store,
            &self.rules,
            &mut self.provenance,
            seeds,
            |_, _| {},
        );
        self.generation += 1;
        debug!(
            generation = self.generation,
            derived = derived.len(),
            "incremental propagation"
        );
        Ok(derived)
    }

    /// Retract all facts with the given identifier and recompute from scratch
    ///
    /// Returns true when at least one fact was removed.
    pub fn retract_fact(&mut self, id: &str) -> Result<bool> {
        self.facts.append(&mut self.pending);
        let before = self.facts.len();
        self.facts.retain(|fact| fact.id().as_ref() != id);
        if self.facts.len() == before {
            return Ok(false);
        }
        self.reason()?;
        Ok(true)
    }

    /// Facts holding at `t` in the current interpretation
    pub fn facts_at(&self, t: TimePoint) -> AHashSet<Atom> {
        self.store.facts_at(t)
    }

    /// The current provenance map
    pub fn provenance(&self) -> &ProvenanceTracker {
        &self.provenance
    }

    /// The timeline bound
    pub fn horizon(&self) -> TimePoint {
        self.horizon
    }

    /// Number of reasoning calls completed
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
