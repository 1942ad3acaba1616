//! Semi-naive fixed-point evaluation over the sparse store
//!
//! Instead of re-matching every rule against every timestep on every pass,
//! this engine tracks a per-timestep delta of facts that appeared since the
//! last pass and only re-evaluates timesteps whose delta is non-empty.
//!
//! The first delta seeds the FULL fact set at each timestep, statics
//! included. Omitting statics loses every derivation whose body is entirely
//! static; see the static-trigger regression test below.
//!
//! When a timestep has at least `parallel_threshold` eligible rules, they
//! are evaluated with Rayon. The parallel phase only *finds* candidate
//! derivations; inserts and provenance records happen in a sequential merge
//! so "insert if absent, record on first insert" stays atomic per
//! `(atom, tt)` and outputs match a sequential run.

use super::provenance::{DerivationInfo, ProvenanceTracker};
use super::types::{Atom, Rule, Substitution};
use super::unification::{find_all_substitutions_indexed_counted, ground_atom};
use super::{check_horizon, EvaluationStats, ReasonerConfig, ReasonerResult};
use crate::error::{Result, TideError};
use crate::facts::{SparseStore, TimedFact};
use crate::types::TimePoint;
use ahash::AHashSet;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// A rule firing found during evaluation, before insertion
struct Candidate {
    rule_name: Arc<str>,
    head: Atom,
    base: TimePoint,
    offsets: std::ops::RangeInclusive<i64>,
    sources: Vec<(Atom, TimePoint)>,
    substitution: Substitution,
}

/// Semi-naive forward-chaining reasoner over the sparse store
#[derive(Default)]
pub struct OptimizedReasoner {
    rules: Vec<Rule>,
    facts: Vec<TimedFact>,
    config: ReasonerConfig,
}

impl OptimizedReasoner {
    /// Create a reasoner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reasoner with the given configuration
    pub fn with_config(config: ReasonerConfig) -> Self {
        OptimizedReasoner {
            rules: Vec::new(),
            facts: Vec::new(),
            config,
        }
    }

    /// Append a rule
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Append a base fact
    pub fn add_fact(&mut self, fact: TimedFact) {
        self.facts.push(fact);
    }

    /// Current rules
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Compute the least fixed point over `[0, horizon]`
    ///
    /// Produces the same interpretation and provenance key set as
    /// [`super::NaiveReasoner::reason`]; the recorded witness for a fact
    /// derivable by several rules may differ.
    pub fn reason(&self, horizon: i64) -> Result<ReasonerResult> {
        let start = Instant::now();
        let horizon = check_horizon(horizon, &self.config)?;

        let store = SparseStore::new(horizon);
        for fact in &self.facts {
            store.load(fact);
        }

        let mut provenance = ProvenanceTracker::new();
        let mut stats = run_fixed_point(&store, &self.rules, &mut provenance, &self.config)?;

        let facts_by_time = (0..=horizon).map(|t| store.facts_at(t)).collect();
        stats.evaluation_time_ns = start.elapsed().as_nanos() as u64;
        Ok(ReasonerResult {
            facts_by_time,
            provenance,
            stats,
        })
    }
}

/// Drive the store to its least fixed point under `rules`
///
/// Shared by the batch and incremental engines. The store is mutated in
/// place; provenance gains one entry per newly derived `(atom, tt)`.
pub(crate) fn run_fixed_point(
    store: &SparseStore,
    rules: &[Rule],
    provenance: &mut ProvenanceTracker,
    config: &ReasonerConfig,
) -> Result<EvaluationStats> {
    let horizon = store.horizon();
    let mut stats = EvaluationStats::default();

    // seed with the full fact set per timestep, statics included
    let mut delta: Vec<AHashSet<Atom>> = (0..=horizon).map(|t| store.facts_at(t)).collect();

    loop {
        stats.iterations += 1;
        let mut changed = false;

        for t in 0..=horizon {
            if delta[t].is_empty() {
                continue;
            }
            delta[t].clear();

            let eligible: Vec<&Rule> = rules
                .iter()
                .filter(|rule| rule.is_active_at(t) && t + rule.delay <= horizon)
                .collect();
            if eligible.is_empty() {
                continue;
            }
            stats.rule_applications += eligible.len();

            let per_rule: Vec<(Vec<Candidate>, usize)> =
                if eligible.len() >= config.parallel_threshold {
                    eligible
                        .par_iter()
                        .map(|rule| derive_candidates(rule, store, t))
                        .collect()
                } else {
                    eligible
                        .iter()
                        .map(|rule| derive_candidates(rule, store, t))
                        .collect()
                };

            let mut candidates = Vec::new();
            for (rule_candidates, attempts) in per_rule {
                stats.unification_attempts += attempts;
                candidates.extend(rule_candidates);
            }

            for candidate in candidates {
                for dt in candidate.offsets.clone() {
                    let tt = candidate.base as i64 + dt;
                    if tt < 0 || tt as usize > horizon {
                        continue;
                    }
                    let tt = tt as usize;
                    if store.insert_dynamic(candidate.head.clone(), tt) {
                        changed = true;
                        stats.facts_derived += 1;
                        delta[tt].insert(candidate.head.clone());
                        provenance.record(
                            candidate.head.clone(),
                            tt,
                            DerivationInfo {
                                rule_name: candidate.rule_name.clone(),
                                sources: candidate.sources.clone(),
                                substitution: candidate.substitution.clone(),
                            },
                        );
                    }
                }
            }
        }

        debug!(
            iteration = stats.iterations,
            derived = stats.facts_derived,
            "semi-naive pass"
        );
        if !changed {
            break;
        }
        if stats.iterations >= config.max_iterations {
            warn!(
                iterations = stats.iterations,
                "fixed point not reached within iteration limit"
            );
            return Err(TideError::InvariantViolation(format!(
                "fixed point not reached after {} iterations",
                stats.iterations
            )));
        }
    }

    Ok(stats)
}

/// Evaluate one rule at one timestep; reads only, no store mutation
///
/// Returns the candidate derivations paired with the number of unification
/// attempts the search made.
fn derive_candidates(rule: &Rule, store: &SparseStore, t: TimePoint) -> (Vec<Candidate>, usize) {
    let mut attempts = 0;
    let candidates = find_all_substitutions_indexed_counted(&rule.body, store, t, &mut attempts)
        .into_iter()
        .filter_map(|sub| {
            let head = ground_atom(&rule.head, &sub)?;
            let sources = rule
                .body
                .iter()
                .filter(|lit| !lit.negated)
                .filter_map(|lit| ground_atom(&lit.atom, &sub))
                .map(|atom| (atom, t))
                .collect();
            Some(Candidate {
                rule_name: rule.name.clone(),
                head,
                base: t + rule.delay,
                offsets: rule.head_offsets(),
                sources,
                substitution: sub,
            })
        })
        .collect();
    (candidates, attempts)
}
