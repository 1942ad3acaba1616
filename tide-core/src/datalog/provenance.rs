//! Provenance tracking for temporal derivations
//!
//! Records, per derived `(atom, time)`, the first rule application that
//! produced it: the rule name, the source facts at the trigger timestep,
//! and the substitution. Absence of an entry means the fact is a base fact.
//! Derivation trees are materialized on demand and truncated on revisit so
//! self-supporting entries cannot loop.

use super::types::{Atom, Substitution};
use crate::types::TimePoint;
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// How a derived `(atom, time)` came to hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationInfo {
    /// Name of the rule that fired
    pub rule_name: Arc<str>,
    /// Source facts at the trigger timestep, in body order
    pub sources: Vec<(Atom, TimePoint)>,
    /// The substitution that grounded the rule
    pub substitution: Substitution,
}

/// Write-once map from derived `(atom, time)` to its first derivation
#[derive(Debug, Clone, Default)]
pub struct ProvenanceTracker {
    entries: AHashMap<(Atom, TimePoint), DerivationInfo>,
}

impl ProvenanceTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        ProvenanceTracker {
            entries: AHashMap::new(),
        }
    }

    /// Record a derivation; no-op when `(atom, t)` already has an entry
    ///
    /// Returns true when the entry was recorded, false when an earlier
    /// derivation already owns the key.
    pub fn record(&mut self, atom: Atom, t: TimePoint, info: DerivationInfo) -> bool {
        use std::collections::hash_map::Entry;
        match self.entries.entry((atom, t)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    /// Get the derivation for `(atom, t)`, if any
    pub fn get(&self, atom: &Atom, t: TimePoint) -> Option<&DerivationInfo> {
        self.entries.get(&(atom.clone(), t))
    }

    /// Check whether `(atom, t)` is a base fact (no recorded derivation)
    pub fn is_base(&self, atom: &Atom, t: TimePoint) -> bool {
        !self.entries.contains_key(&(atom.clone(), t))
    }

    /// Number of recorded derivations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no derivations have been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over recorded `(atom, time)` keys
    pub fn keys(&self) -> impl Iterator<Item = &(Atom, TimePoint)> {
        self.entries.keys()
    }

    /// Materialize the derivation tree rooted at `(atom, t)`
    ///
    /// A `(atom, time)` pair already expanded elsewhere in the tree is cut
    /// and marked revisited, so the recursion terminates even when callers
    /// supply rules that derive a fact from itself.
    pub fn derivation_tree(&self, atom: &Atom, t: TimePoint) -> DerivationTree {
        let mut visited = AHashSet::new();
        self.build_tree(atom, t, &mut visited)
    }

    fn build_tree(
        &self,
        atom: &Atom,
        t: TimePoint,
        visited: &mut AHashSet<(Atom, TimePoint)>,
    ) -> DerivationTree {
        let key = (atom.clone(), t);
        if !visited.insert(key.clone()) {
            return DerivationTree {
                atom: atom.clone(),
                time: t,
                info: self.entries.get(&key).cloned(),
                children: Vec::new(),
                revisited: true,
            };
        }

        match self.entries.get(&key) {
            None => DerivationTree {
                atom: atom.clone(),
                time: t,
                info: None,
                children: Vec::new(),
                revisited: false,
            },
            Some(info) => {
                let children = info
                    .sources
                    .iter()
                    .map(|(src_atom, src_t)| self.build_tree(src_atom, *src_t, visited))
                    .collect();
                DerivationTree {
                    atom: atom.clone(),
                    time: t,
                    info: Some(info.clone()),
                    children,
                    revisited: false,
                }
            }
        }
    }

    /// Generate a human-readable explanation for `(atom, t)`
    pub fn explain(&self, atom: &Atom, t: TimePoint) -> String {
        self.derivation_tree(atom, t).to_explanation()
    }

    /// All `(atom, time)` pairs contributing to the derivation of `(atom, t)`
    pub fn contributing_facts(&self, atom: &Atom, t: TimePoint) -> AHashSet<(Atom, TimePoint)> {
        let mut result = AHashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((atom.clone(), t));

        while let Some(key) = queue.pop_front() {
            if !result.insert(key.clone()) {
                continue;
            }
            if let Some(info) = self.entries.get(&key) {
                for source in &info.sources {
                    queue.push_back(source.clone());
                }
            }
        }
        result
    }

    /// Names of all rules used in deriving `(atom, t)`
    pub fn contributing_rules(&self, atom: &Atom, t: TimePoint) -> AHashSet<Arc<str>> {
        let mut rules = AHashSet::new();
        let mut visited = AHashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((atom.clone(), t));

        while let Some(key) = queue.pop_front() {
            if !visited.insert(key.clone()) {
                continue;
            }
            if let Some(info) = self.entries.get(&key) {
                rules.insert(info.rule_name.clone());
                for source in &info.sources {
                    queue.push_back(source.clone());
                }
            }
        }
        rules
    }
}

/// A materialized derivation tree
///
/// Leaves with `info: None` are base facts; nodes carry the derivation that
/// produced them and one child per source.
#[derive(Debug, Clone)]
pub struct DerivationTree {
    /// The explained atom
    pub atom: Atom,
    /// The timestep at which it holds
    pub time: TimePoint,
    /// Its derivation, absent for base facts
    pub info: Option<DerivationInfo>,
    /// Subtrees for each source fact
    pub children: Vec<DerivationTree>,
    /// True when this node was cut because it was already explained
    pub revisited: bool,
}

impl DerivationTree {
    /// Check whether this node is a base-fact leaf
    pub fn is_base_leaf(&self) -> bool {
        self.info.is_none() && !self.revisited
    }

    /// Depth of the tree (a lone leaf has depth 1)
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| child.depth())
            .max()
            .unwrap_or(0)
    }

    /// Total node count, revisit markers included
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| child.node_count())
            .sum::<usize>()
    }

    /// Convert the tree to a human-readable explanation
    pub fn to_explanation(&self) -> String {
        let mut out = String::new();
        self.format_node(&mut out, 0);
        out
    }

    fn format_node(&self, out: &mut String, indent: usize) {
        use fmt::Write;

        let pad = "  ".repeat(indent);
        let _ = write!(out, "{}• {}@{}", pad, self.atom, self.time);
        if self.revisited {
            out.push_str(" (already explained)");
            return;
        }
        match &self.info {
            None => out.push_str(" (base fact)"),
            Some(info) => {
                let _ = write!(out, " (by {})", info.rule_name);
                if !self.children.is_empty() {
                    let _ = write!(out, "\n{}  because:", pad);
                    for child in &self.children {
                        out.push('\n');
                        child.format_node(out, indent + 1);
                    }
                }
            }
        }
    }
}
