//! Streaming ingestion: one fact in, its consequences out
//!
//! The streaming reasoner keeps a live sparse store over a timeline fixed
//! at construction and propagates each ingested fact's consequences with a
//! BFS work queue. Mutation is single-writer (a mutex serializes
//! concurrent `add_fact_incremental` calls); reads go straight to the
//! concurrent predicate buckets and never take the writer lock.
//!
//! Observers run synchronously on the writer thread in first-derivation
//! order. A long-running observer therefore applies back-pressure to
//! ingestion; a panicking observer is logged and isolated so it cannot
//! abort propagation.
//!
//! Note: the static-tier classification needs the timeline bound up front,
//! so raising the horizon later requires building a new reasoner and
//! replaying the facts.

use super::provenance::{DerivationInfo, DerivationTree, ProvenanceTracker};
use super::types::{Atom, Rule};
use super::unification::{find_all_substitutions_indexed, ground_atom};
use super::{check_horizon, ReasonerConfig};
use crate::error::Result;
use crate::facts::{SparseStore, TimedFact};
use crate::types::TimePoint;
use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

/// Callback invoked for each newly derived fact
pub type FactObserver = Box<dyn Fn(&Atom, TimePoint) + Send + Sync>;

/// Propagate the consequences of the seeded facts to quiescence
///
/// Pops `(atom, t)` pairs, re-evaluates every eligible rule at `t` against
/// the store, and enqueues whatever lands. Returns the newly derived pairs
/// in first-derivation order; `on_new` fires once per pair.
pub(crate) fn propagate(
    store: &SparseStore,
    rules: &[Rule],
    provenance: &mut ProvenanceTracker,
    mut queue: VecDeque<(Atom, TimePoint)>,
    mut on_new: impl FnMut(&Atom, TimePoint),
) -> Vec<(Atom, TimePoint)> {
    let horizon = store.horizon();
    let mut derived = Vec::new();

    while let Some((_, t)) = queue.pop_front() {
        for rule in rules {
            if !rule.is_active_at(t) {
                continue;
            }
            let base = t + rule.delay;
            if base > horizon {
                continue;
            }

            for sub in find_all_substitutions_indexed(&rule.body, store, t) {
                let Some(head) = ground_atom(&rule.head, &sub) else {
                    continue;
                };
                let sources: Vec<(Atom, TimePoint)> = rule
                    .body
                    .iter()
                    .filter(|lit| !lit.negated)
                    .filter_map(|lit| ground_atom(&lit.atom, &sub))
                    .map(|atom| (atom, t))
                    .collect();

                for dt in rule.head_offsets() {
                    let tt = base as i64 + dt;
                    if tt < 0 || tt as usize > horizon {
                        continue;
                    }
                    let tt = tt as usize;
                    if store.insert_dynamic(head.clone(), tt) {
                        provenance.record(
                            head.clone(),
                            tt,
                            DerivationInfo {
                                rule_name: rule.name.clone(),
                                sources: sources.clone(),
                                substitution: sub.clone(),
                            },
                        );
                        queue.push_back((head.clone(), tt));
                        derived.push((head.clone(), tt));
                        on_new(&head, tt);
                    }
                }
            }
        }
    }
    derived
}

/// Incremental reasoner over a live store, with per-predicate observers
pub struct StreamingReasoner {
    store: SparseStore,
    rules: Vec<Rule>,
    provenance: Mutex<ProvenanceTracker>,
    typed_observers: RwLock<AHashMap<Arc<str>, Vec<FactObserver>>>,
    global_observers: RwLock<Vec<FactObserver>>,
    write_gate: Mutex<()>,
}

impl StreamingReasoner {
    /// Create a streaming reasoner over `[0, horizon]`
    pub fn new(horizon: i64) -> Result<Self> {
        Self::with_config(horizon, ReasonerConfig::default())
    }

    /// Create a streaming reasoner with the given configuration
    pub fn with_config(horizon: i64, config: ReasonerConfig) -> Result<Self> {
        let horizon = check_horizon(horizon, &config)?;
        Ok(StreamingReasoner {
            store: SparseStore::new(horizon),
            rules: Vec::new(),
            provenance: Mutex::new(ProvenanceTracker::new()),
            typed_observers: RwLock::new(AHashMap::new()),
            global_observers: RwLock::new(Vec::new()),
            write_gate: Mutex::new(()),
        })
    }

    /// The fixed timeline bound
    pub fn horizon(&self) -> TimePoint {
        self.store.horizon()
    }

    /// Append a rule; typically done before ingestion starts
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Current rules
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Register an observer for newly derived atoms of one predicate
    pub fn on_new_fact(
        &self,
        predicate: impl Into<String>,
        observer: impl Fn(&Atom, TimePoint) + Send + Sync + 'static,
    ) {
        let predicate: Arc<str> = Arc::from(predicate.into().into_boxed_str());
        self.typed_observers
            .write()
            .entry(predicate)
            .or_default()
            .push(Box::new(observer));
    }

    /// Register an observer for every newly derived atom
    pub fn on_any_new_fact(&self, observer: impl Fn(&Atom, TimePoint) + Send + Sync + 'static) {
        self.global_observers.write().push(Box::new(observer));
    }

    /// Ingest one fact and propagate only its consequences
    ///
    /// Returns the newly derived `(atom, t)` pairs for this call, in
    /// first-derivation order. Concurrent calls are serialized.
    pub fn add_fact_incremental(&self, fact: &TimedFact) -> Result<Vec<(Atom, TimePoint)>> {
        let _gate = self.write_gate.lock();

        let seeds: VecDeque<(Atom, TimePoint)> = self
            .store
            .load(fact)
            .into_iter()
            .map(|t| (fact.atom().clone(), t))
            .collect();
        trace!(fact = %fact.atom(), seeds = seeds.len(), "ingesting fact");

        let mut provenance = self.provenance.lock();
        let derived = propagate(&self.store, &self.rules, &mut provenance, seeds, |atom, t| {
            self.notify(atom, t)
        });
        Ok(derived)
    }

    /// Facts with the given predicate holding at `t`
    pub fn query(&self, predicate: &str, t: TimePoint) -> Vec<Atom> {
        self.store.facts_by_pred_at(predicate, t)
    }

    /// All facts holding at `t`
    pub fn all_facts_at(&self, t: TimePoint) -> AHashSet<Atom> {
        self.store.facts_at(t)
    }

    /// Check whether an atom holds at `t`
    pub fn contains(&self, atom: &Atom, t: TimePoint) -> bool {
        self.store.contains(atom, t)
    }

    /// Check whether `(atom, t)` is a base fact
    pub fn is_base(&self, atom: &Atom, t: TimePoint) -> bool {
        self.provenance.lock().is_base(atom, t)
    }

    /// Materialize the derivation tree for `(atom, t)`
    pub fn derivation_tree(&self, atom: &Atom, t: TimePoint) -> DerivationTree {
        self.provenance.lock().derivation_tree(atom, t)
    }

    /// Human-readable explanation for `(atom, t)`
    pub fn explain(&self, atom: &Atom, t: TimePoint) -> String {
        self.provenance.lock().explain(atom, t)
    }

    fn notify(&self, atom: &Atom, t: TimePoint) {
        {
            let typed = self.typed_observers.read();
            if let Some(observers) = typed.get(atom.predicate.as_ref()) {
                for observer in observers {
                    guarded_call(observer, atom, t);
                }
            }
        }
        for observer in self.global_observers.read().iter() {
            guarded_call(observer, atom, t);
        }
    }
}

/// Invoke an observer, logging and dropping any panic
fn guarded_call(observer: &FactObserver, atom: &Atom, t: TimePoint) {
    if catch_unwind(AssertUnwindSafe(|| observer(atom, t))).is_err() {
        error!(
            predicate = %atom.predicate,
            time = t,
            "fact observer panicked; propagation continues"
        );
    }
}
