//! Unification and rule-body grounding
//!
//! Implements pattern-to-fact unification under a partial substitution and
//! the depth-first backtracking search that grounds a rule body against the
//! facts at a single timestep. The indexed variant restricts each literal's
//! candidate scan to the store's predicate bucket; all other semantics are
//! identical.

use super::types::{Atom, Literal, Substitution, Term};
use crate::facts::SparseStore;
use crate::types::TimePoint;
use ahash::AHashSet;

/// Unify a pattern atom with a ground fact under a partial substitution
///
/// Fails if predicates or arities differ, or if an existing binding
/// conflicts with the fact. The input substitution is never mutated; on
/// success the extended copy is returned.
pub fn unify(pattern: &Atom, fact: &Atom, sub: &Substitution) -> Option<Substitution> {
    if pattern.predicate != fact.predicate {
        return None;
    }
    if pattern.terms.len() != fact.terms.len() {
        return None;
    }

    let mut extended = sub.clone();
    for (pattern_term, fact_term) in pattern.terms.iter().zip(fact.terms.iter()) {
        let symbol = fact_term.as_constant()?;
        match pattern_term {
            Term::Variable(name) => match extended.get(name.as_ref()) {
                Some(bound) => {
                    if bound != symbol {
                        return None;
                    }
                }
                None => extended.bind(name.clone(), symbol.clone()),
            },
            Term::Constant(sym) => {
                if sym != symbol {
                    return None;
                }
            }
        }
    }
    Some(extended)
}

/// Apply a substitution to an atom, returning it only if fully ground
pub fn ground_atom(atom: &Atom, sub: &Substitution) -> Option<Atom> {
    let grounded = atom.apply_substitution(sub);
    if grounded.is_ground() {
        Some(grounded)
    } else {
        None
    }
}

/// Ground a rule body against a dense snapshot of the facts at one timestep
///
/// Depth-first backtracking over the body literals in given order. Positive
/// literals enumerate unifying facts; negated literals succeed precisely
/// when no fact unifies with the applied pattern, and never extend the
/// substitution.
pub fn find_all_substitutions(body: &[Literal], facts: &AHashSet<Atom>) -> Vec<Substitution> {
    let mut attempts = 0;
    find_all_substitutions_counted(body, facts, &mut attempts)
}

/// Same as [`find_all_substitutions`], counting attempted unifications
///
/// Every pattern-to-fact [`unify`] call adds one to `attempts`, whether or
/// not it succeeds.
pub fn find_all_substitutions_counted(
    body: &[Literal],
    facts: &AHashSet<Atom>,
    attempts: &mut usize,
) -> Vec<Substitution> {
    let mut out = Vec::new();
    search_dense(body, facts, Substitution::new(), &mut out, attempts);
    out
}

fn search_dense(
    body: &[Literal],
    facts: &AHashSet<Atom>,
    sub: Substitution,
    out: &mut Vec<Substitution>,
    attempts: &mut usize,
) {
    let Some((literal, rest)) = body.split_first() else {
        out.push(sub);
        return;
    };

    let pattern = literal.atom.apply_substitution(&sub);
    if literal.negated {
        let mut blocked = false;
        for fact in facts {
            *attempts += 1;
            if unify(&pattern, fact, &sub).is_some() {
                blocked = true;
                break;
            }
        }
        if !blocked {
            search_dense(rest, facts, sub, out, attempts);
        }
    } else {
        for fact in facts {
            *attempts += 1;
            if let Some(extended) = unify(&pattern, fact, &sub) {
                search_dense(rest, facts, extended, out, attempts);
            }
        }
    }
}

/// Ground a rule body against the sparse store's facts at timestep `t`
///
/// Same semantics as [`find_all_substitutions`], with each literal's scan
/// restricted to the predicate bucket (statics plus dynamics at `t`).
pub fn find_all_substitutions_indexed(
    body: &[Literal],
    store: &SparseStore,
    t: TimePoint,
) -> Vec<Substitution> {
    let mut attempts = 0;
    find_all_substitutions_indexed_counted(body, store, t, &mut attempts)
}

/// Same as [`find_all_substitutions_indexed`], counting attempted unifications
///
/// Every pattern-to-fact [`unify`] call adds one to `attempts`, whether or
/// not it succeeds.
pub fn find_all_substitutions_indexed_counted(
    body: &[Literal],
    store: &SparseStore,
    t: TimePoint,
    attempts: &mut usize,
) -> Vec<Substitution> {
    let mut out = Vec::new();
    search_indexed(body, store, t, Substitution::new(), &mut out, attempts);
    out
}

fn search_indexed(
    body: &[Literal],
    store: &SparseStore,
    t: TimePoint,
    sub: Substitution,
    out: &mut Vec<Substitution>,
    attempts: &mut usize,
) {
    let Some((literal, rest)) = body.split_first() else {
        out.push(sub);
        return;
    };

    let pattern = literal.atom.apply_substitution(&sub);
    let candidates = store.facts_by_pred_at(pattern.predicate.as_ref(), t);
    if literal.negated {
        let mut blocked = false;
        for fact in &candidates {
            *attempts += 1;
            if unify(&pattern, fact, &sub).is_some() {
                blocked = true;
                break;
            }
        }
        if !blocked {
            search_indexed(rest, store, t, sub, out, attempts);
        }
    } else {
        for fact in &candidates {
            *attempts += 1;
            if let Some(extended) = unify(&pattern, fact, &sub) {
                search_indexed(rest, store, t, extended, out, attempts);
            }
        }
    }
}
