//! Core Datalog data structures
//!
//! This module defines the fundamental types for the temporal Datalog engine:
//! - Terms (variables and constants)
//! - Atoms (predicates with terms)
//! - Literals (atoms with optional negation-as-failure)
//! - Rules (Horn clauses with a lookback delay and a head-offset window)
//! - Substitutions (variable bindings)
//!
//! Design principles:
//! - Arc-based symbols for zero-copy sharing
//! - Value-type atoms, hashable by structure, usable as map keys
//! - Immutable after construction, freely shareable across threads

use crate::error::{Result, TideError};
use crate::types::{Interval, TimePoint};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A term in Datalog (variable or constant)
///
/// The textual convention is that a lowercase initial letter marks a
/// variable; anything else marks a constant. That rule is applied only by
/// the parser — once constructed, a term carries its kind in the tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// Variable (e.g., x, person)
    Variable(Arc<str>),
    /// Constant symbol (e.g., Alice, 42, _anon)
    Constant(Arc<str>),
}

impl Term {
    /// Create a variable term
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(Arc::from(name.into().into_boxed_str()))
    }

    /// Create a constant term
    pub fn constant(symbol: impl Into<String>) -> Self {
        Term::Constant(Arc::from(symbol.into().into_boxed_str()))
    }

    /// Check if term is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Check if term is a constant
    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    /// Get variable name if this is a variable
    pub fn as_variable(&self) -> Option<&Arc<str>> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Get the symbol if this is a constant
    pub fn as_constant(&self) -> Option<&Arc<str>> {
        match self {
            Term::Constant(sym) => Some(sym),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "{}", name),
            Term::Constant(sym) => write!(f, "{}", sym),
        }
    }
}

/// An atom: a predicate applied to an ordered sequence of terms
///
/// Two atoms are equal iff predicates match and argument sequences are
/// pointwise equal. An atom is ground iff every argument is a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    /// Predicate name
    pub predicate: Arc<str>,
    /// Terms (arguments)
    pub terms: Vec<Term>,
}

impl Atom {
    /// Create a new atom
    pub fn new(predicate: impl Into<String>, terms: Vec<Term>) -> Self {
        Atom {
            predicate: Arc::from(predicate.into().into_boxed_str()),
            terms,
        }
    }

    /// Get the arity (number of terms)
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Get all variables in this atom
    pub fn variables(&self) -> Vec<&Arc<str>> {
        self.terms.iter().filter_map(|t| t.as_variable()).collect()
    }

    /// Check if atom is ground (no variables)
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(|t| t.is_constant())
    }

    /// Apply substitution to get a new atom
    pub fn apply_substitution(&self, sub: &Substitution) -> Atom {
        Atom {
            predicate: self.predicate.clone(),
            terms: self.terms.iter().map(|t| sub.apply_to_term(t)).collect(),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "{}", self.predicate);
        }
        write!(f, "{}(", self.predicate)?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", term)?;
        }
        write!(f, ")")
    }
}

/// A body literal: an atom, optionally negated
///
/// Positive literals are matched by unification; negated literals use
/// negation-as-failure against the snapshot of facts at the relevant
/// timestep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// The underlying atom
    pub atom: Atom,
    /// Whether the literal is negated
    pub negated: bool,
}

impl Literal {
    /// Create a positive literal
    pub fn positive(atom: Atom) -> Self {
        Literal {
            atom,
            negated: false,
        }
    }

    /// Create a negated literal
    pub fn negative(atom: Atom) -> Self {
        Literal {
            atom,
            negated: true,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "not ")?;
        }
        write!(f, "{}", self.atom)
    }
}

/// A temporal Horn rule
///
/// At trigger timestep `t`, when every body literal is simultaneously
/// satisfied by a substitution over the facts at `t`, the grounded head is
/// asserted at each `tt = t + delay + dt` for `dt` in the head-offset
/// window, clamped to the reasoning timeline. A rule fires at `t` only when
/// `active` is empty or some active interval contains `t`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, supplied separately from the rule text
    pub name: Arc<str>,
    /// Head of the rule (consequent), possibly with variable arguments
    pub head: Atom,
    /// Body of the rule (antecedents), in match order
    pub body: Vec<Literal>,
    /// Lookback delay added to the trigger timestep
    pub delay: usize,
    /// Start of the head-validity offset window
    pub head_start_offset: i64,
    /// End of the head-validity offset window
    pub head_end_offset: i64,
    /// Intervals during which the rule may fire (empty = always active)
    pub active: Vec<Interval>,
}

impl Rule {
    /// Create a rule with delay 0, head window `[0,0]`, always active
    pub fn new(name: impl Into<String>, head: Atom, body: Vec<Literal>) -> Self {
        Rule {
            name: Arc::from(name.into().into_boxed_str()),
            head,
            body,
            delay: 0,
            head_start_offset: 0,
            head_end_offset: 0,
            active: Vec::new(),
        }
    }

    /// Set the lookback delay
    pub fn with_delay(mut self, delay: usize) -> Self {
        self.delay = delay;
        self
    }

    /// Set the head-validity offset window, rejecting `end < start`
    pub fn with_head_window(mut self, start: i64, end: i64) -> Result<Self> {
        if end < start {
            return Err(TideError::InvalidRule(format!(
                "head offset window end {} precedes start {}",
                end, start
            )));
        }
        self.head_start_offset = start;
        self.head_end_offset = end;
        Ok(self)
    }

    /// Restrict the rule to the given activity intervals
    pub fn with_active(mut self, intervals: Vec<Interval>) -> Self {
        self.active = intervals;
        self
    }

    /// Check whether the rule may fire at `t`
    pub fn is_active_at(&self, t: TimePoint) -> bool {
        self.active.is_empty() || self.active.iter().any(|iv| iv.contains(t))
    }

    /// Offsets `dt` at which the grounded head is asserted
    pub fn head_offsets(&self) -> std::ops::RangeInclusive<i64> {
        self.head_start_offset..=self.head_end_offset
    }

    /// Get all variables in the rule
    pub fn variables(&self) -> Vec<Arc<str>> {
        let mut vars: Vec<Arc<str>> = Vec::new();
        for var in self.head.variables() {
            if !vars.contains(var) {
                vars.push(var.clone());
            }
        }
        for lit in &self.body {
            for var in lit.atom.variables() {
                if !vars.contains(var) {
                    vars.push(var.clone());
                }
            }
        }
        vars
    }

    /// Check if rule is safe (all head variables appear in positive body literals)
    pub fn is_safe(&self) -> bool {
        self.head.variables().into_iter().all(|hv| {
            self.body
                .iter()
                .filter(|lit| !lit.negated)
                .any(|lit| lit.atom.variables().contains(&hv))
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.active.is_empty() {
            write!(f, " : ")?;
            for (i, iv) in self.active.iter().enumerate() {
                if i > 0 {
                    write!(f, ";")?;
                }
                write!(f, "{}", iv)?;
            }
        }
        write!(f, " <-{}", self.delay)?;
        if self.head_start_offset != 0 || self.head_end_offset != 0 {
            write!(f, "@[{},{}]", self.head_start_offset, self.head_end_offset)?;
        }
        for (i, lit) in self.body.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", lit)?;
            } else {
                write!(f, ", {}", lit)?;
            }
        }
        Ok(())
    }
}

/// Variable substitution (binding of variables to constant symbols)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: AHashMap<Arc<str>, Arc<str>>,
}

impl Substitution {
    /// Create an empty substitution
    pub fn new() -> Self {
        Substitution {
            bindings: AHashMap::new(),
        }
    }

    /// Add a binding
    pub fn bind(&mut self, variable: Arc<str>, symbol: Arc<str>) {
        self.bindings.insert(variable, symbol);
    }

    /// Get binding for a variable
    pub fn get(&self, variable: &str) -> Option<&Arc<str>> {
        self.bindings.get(variable)
    }

    /// Check if variable is bound
    pub fn contains(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    /// Apply substitution to a term
    pub fn apply_to_term(&self, term: &Term) -> Term {
        match term {
            Term::Variable(name) => {
                if let Some(symbol) = self.bindings.get(name.as_ref()) {
                    Term::Constant(symbol.clone())
                } else {
                    term.clone()
                }
            }
            Term::Constant(_) => term.clone(),
        }
    }

    /// Iterate over the bindings
    pub fn bindings(&self) -> impl Iterator<Item = (&Arc<str>, &Arc<str>)> {
        self.bindings.iter()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if substitution is empty
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, sym)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", var, sym)?;
        }
        write!(f, "}}")
    }
}
