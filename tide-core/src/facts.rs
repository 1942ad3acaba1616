//! Timed facts and the sparse two-tier fact store
//!
//! Storage is split by temporal extent:
//! - `static` holds facts whose single interval spans the whole `[0, T]`
//!   timeline; they are stored once and never vary by timestep.
//! - `dynamic` holds per-timestep predicate buckets for everything else.
//!
//! Buckets are concurrent maps so readers never take a global lock; the
//! per-timestep shard makes check-then-insert atomic per `(atom, t)`.

use crate::datalog::types::Atom;
use crate::error::{Result, TideError};
use crate::types::{Interval, TimePoint};
use ahash::{AHashMap, AHashSet};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A ground atom annotated with validity intervals and a caller identifier
///
/// Intervals may overlap; the fact holds at `t` when any interval contains
/// `t`. The identifier is opaque to the engine and used by callers for
/// cross-referencing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedFact {
    atom: Atom,
    id: Arc<str>,
    intervals: Vec<Interval>,
}

impl TimedFact {
    /// Create a timed fact, rejecting non-ground atoms and empty interval lists
    pub fn new(atom: Atom, id: impl Into<String>, intervals: Vec<Interval>) -> Result<Self> {
        if !atom.is_ground() {
            return Err(TideError::InvalidFact(format!(
                "atom {} has variable arguments",
                atom
            )));
        }
        if intervals.is_empty() {
            return Err(TideError::InvalidFact(format!(
                "fact {} has no validity intervals",
                atom
            )));
        }
        Ok(TimedFact {
            atom,
            id: Arc::from(id.into().into_boxed_str()),
            intervals,
        })
    }

    /// The ground atom
    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    /// The caller-supplied identifier
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    /// The validity intervals
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Check whether the fact holds at `t` (disjunction over intervals)
    pub fn holds_at(&self, t: TimePoint) -> bool {
        self.intervals.iter().any(|iv| iv.contains(t))
    }

    /// Check whether the fact qualifies for the static tier of a store
    /// bounded by `horizon`: exactly one interval covering `[0, horizon]`
    pub fn spans(&self, horizon: TimePoint) -> bool {
        self.intervals.len() == 1 && self.intervals[0].spans(horizon)
    }
}

impl fmt::Display for TimedFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.atom, self.id)?;
        for iv in &self.intervals {
            write!(f, " {}", iv)?;
        }
        Ok(())
    }
}

/// Predicate-keyed fact storage over a bounded timeline
pub struct SparseStore {
    horizon: TimePoint,
    /// Facts that hold at every timestep, keyed by predicate
    statics: DashMap<Arc<str>, AHashSet<Atom>>,
    /// Per-timestep predicate buckets for facts confined to a sub-range
    dynamics: DashMap<TimePoint, AHashMap<Arc<str>, AHashSet<Atom>>>,
    /// Version counter for change detection
    version: AtomicU64,
}

impl SparseStore {
    /// Create an empty store over `[0, horizon]`
    pub fn new(horizon: TimePoint) -> Self {
        SparseStore {
            horizon,
            statics: DashMap::new(),
            dynamics: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    /// The store's timeline bound
    pub fn horizon(&self) -> TimePoint {
        self.horizon
    }

    /// Load a timed fact, classifying it into the static or dynamic tier
    ///
    /// Returns the timesteps at which the fact's atom newly holds, in
    /// ascending order.
    pub fn load(&self, fact: &TimedFact) -> Vec<TimePoint> {
        let mut fresh = Vec::new();
        if fact.spans(self.horizon) {
            let newly = {
                let mut bucket = self
                    .statics
                    .entry(fact.atom().predicate.clone())
                    .or_default();
                bucket.insert(fact.atom().clone())
            };
            if newly {
                self.version.fetch_add(1, Ordering::Release);
                for t in 0..=self.horizon {
                    if !self.dynamic_contains(fact.atom(), t) {
                        fresh.push(t);
                    }
                }
            }
        } else {
            for iv in fact.intervals() {
                let Some(clamped) = iv.clamp_to(self.horizon) else {
                    continue;
                };
                for t in clamped.start()..=clamped.end() {
                    if self.insert_dynamic(fact.atom().clone(), t) {
                        fresh.push(t);
                    }
                }
            }
            fresh.sort_unstable();
        }
        fresh
    }

    /// Insert a ground atom at a single timestep
    ///
    /// Returns true on first insert, false when the atom already holds at
    /// `t` (statically or dynamically). The per-timestep shard makes the
    /// check-then-insert atomic.
    pub fn insert_dynamic(&self, atom: Atom, t: TimePoint) -> bool {
        if self.is_static(&atom) {
            return false;
        }
        let inserted = {
            let mut slot = self.dynamics.entry(t).or_default();
            slot.entry(atom.predicate.clone()).or_default().insert(atom)
        };
        if inserted {
            self.version.fetch_add(1, Ordering::Release);
        }
        inserted
    }

    /// Check whether an atom holds at `t`
    pub fn contains(&self, atom: &Atom, t: TimePoint) -> bool {
        self.is_static(atom) || self.dynamic_contains(atom, t)
    }

    /// All facts holding at `t` (statics plus dynamics)
    pub fn facts_at(&self, t: TimePoint) -> AHashSet<Atom> {
        let mut out = AHashSet::new();
        for entry in self.statics.iter() {
            out.extend(entry.value().iter().cloned());
        }
        if let Some(slot) = self.dynamics.get(&t) {
            for set in slot.values() {
                out.extend(set.iter().cloned());
            }
        }
        out
    }

    /// Facts with the given predicate holding at `t`
    pub fn facts_by_pred_at(&self, predicate: &str, t: TimePoint) -> Vec<Atom> {
        let mut out = Vec::new();
        if let Some(bucket) = self.statics.get(predicate) {
            out.extend(bucket.iter().cloned());
        }
        if let Some(slot) = self.dynamics.get(&t) {
            if let Some(set) = slot.get(predicate) {
                out.extend(set.iter().cloned());
            }
        }
        out
    }

    /// Get current version
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Check if store has changed since a given version
    pub fn has_changed_since(&self, version: u64) -> bool {
        self.version() > version
    }

    fn is_static(&self, atom: &Atom) -> bool {
        self.statics
            .get(atom.predicate.as_ref())
            .map(|bucket| bucket.contains(atom))
            .unwrap_or(false)
    }

    fn dynamic_contains(&self, atom: &Atom, t: TimePoint) -> bool {
        self.dynamics
            .get(&t)
            .and_then(|slot| {
                slot.get(atom.predicate.as_ref())
                    .map(|set| set.contains(atom))
            })
            .unwrap_or(false)
    }
}
