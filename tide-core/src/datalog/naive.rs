//! Naive fixed-point evaluation over a dense interpretation
//!
//! The reference engine: every rule is re-matched against every timestep's
//! full fact set until nothing changes. Termination is guaranteed because
//! facts are only added and the universe of ground atoms over existing
//! constants is finite. The semi-naive engine must produce identical
//! interpretations; this one exists to keep it honest.

use super::provenance::{DerivationInfo, ProvenanceTracker};
use super::types::{Atom, Rule};
use super::unification::{find_all_substitutions_counted, ground_atom};
use super::{check_horizon, EvaluationStats, ReasonerConfig, ReasonerResult};
use crate::error::{Result, TideError};
use crate::facts::TimedFact;
use ahash::AHashSet;
use std::time::Instant;
use tracing::{trace, warn};

/// Reference forward-chaining reasoner with a dense per-timestep interpretation
#[derive(Default)]
pub struct NaiveReasoner {
    rules: Vec<Rule>,
    facts: Vec<TimedFact>,
    config: ReasonerConfig,
}

impl NaiveReasoner {
    /// Create a reasoner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reasoner with the given configuration
    pub fn with_config(config: ReasonerConfig) -> Self {
        NaiveReasoner {
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
    pub fn reason(&self, horizon: i64) -> Result<ReasonerResult> {
        let start = Instant::now();
        let horizon = check_horizon(horizon, &self.config)?;

        let mut facts_by_time: Vec<AHashSet<Atom>> = vec![AHashSet::new(); horizon + 1];
        for fact in &self.facts {
            for iv in fact.intervals() {
                let Some(clamped) = iv.clamp_to(horizon) else {
                    continue;
                };
                for t in clamped.start()..=clamped.end() {
                    facts_by_time[t].insert(fact.atom().clone());
                }
            }
        }

        let mut provenance = ProvenanceTracker::new();
        let mut stats = EvaluationStats::default();

        loop {
            stats.iterations += 1;
            let mut changed = false;

            for t in 0..=horizon {
                for rule in &self.rules {
                    if !rule.is_active_at(t) {
                        continue;
                    }
                    let base = t + rule.delay;
                    if base > horizon {
                        continue;
                    }
                    stats.rule_applications += 1;

                    let substitutions = find_all_substitutions_counted(
                        &rule.body,
                        &facts_by_time[t],
                        &mut stats.unification_attempts,
                    );
                    for sub in substitutions {
                        let Some(head) = ground_atom(&rule.head, &sub) else {
                            continue;
                        };
                        for dt in rule.head_offsets() {
                            let tt = base as i64 + dt;
                            if tt < 0 || tt as usize > horizon {
                                continue;
                            }
                            let tt = tt as usize;
                            if facts_by_time[tt].insert(head.clone()) {
                                changed = true;
                                stats.facts_derived += 1;
                                let sources = rule
                                    .body
                                    .iter()
                                    .filter(|lit| !lit.negated)
                                    .filter_map(|lit| ground_atom(&lit.atom, &sub))
                                    .map(|atom| (atom, t))
                                    .collect();
                                provenance.record(
                                    head.clone(),
                                    tt,
                                    DerivationInfo {
                                        rule_name: rule.name.clone(),
                                        sources,
                                        substitution: sub.clone(),
                                    },
                                );
                            }
                        }
                    }
                }
            }

            trace!(
                iteration = stats.iterations,
                derived = stats.facts_derived,
                "naive fixed-point pass"
            );
            if !changed {
                break;
            }
            if stats.iterations >= self.config.max_iterations {
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

        stats.evaluation_time_ns = start.elapsed().as_nanos() as u64;
        Ok(ReasonerResult {
            facts_by_time,
            provenance,
            stats,
        })
    }
}
