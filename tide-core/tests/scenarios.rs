//! End-to-end scenarios for the temporal reasoning core
//!
//! Exercises the full pipeline (parser → engines → provenance) and the
//! cross-engine invariants: naive and semi-naive equivalence, sparse-store
//! partition correctness, provenance soundness and well-foundedness.

use ahash::AHashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tide_core::datalog::find_all_substitutions;
use tide_core::{
    load_facts_csv, parse_atom, parse_rule, parse_rules, Atom, IncrementalReasoner, Interval,
    NaiveReasoner, OptimizedReasoner, ReasonerResult, Rule, SparseStore, StreamingReasoner,
    TimedFact,
};

fn atom(text: &str) -> Atom {
    parse_atom(text).unwrap()
}

fn build_engines(rules_text: &str, facts_text: &str) -> (NaiveReasoner, OptimizedReasoner) {
    let mut naive = NaiveReasoner::new();
    let mut optimized = OptimizedReasoner::new();
    for rule in parse_rules("r", rules_text).unwrap() {
        naive.add_rule(rule.clone());
        optimized.add_rule(rule);
    }
    for fact in load_facts_csv(facts_text).unwrap() {
        naive.add_fact(fact.clone());
        optimized.add_fact(fact);
    }
    (naive, optimized)
}

fn assert_equivalent(dense: &ReasonerResult, sparse: &ReasonerResult) {
    assert_eq!(dense.horizon(), sparse.horizon());
    for t in 0..=dense.horizon() {
        assert_eq!(
            dense.facts_at(t).unwrap(),
            sparse.facts_at(t).unwrap(),
            "interpretations diverge at t={}",
            t
        );
    }
    let dense_keys: AHashSet<_> = dense.provenance.keys().cloned().collect();
    let sparse_keys: AHashSet<_> = sparse.provenance.keys().cloned().collect();
    assert_eq!(dense_keys, sparse_keys);
}

#[test]
fn s1_delayed_transitive_closure() {
    let rules = "reach(x,y) <-0 friend(x,y)\nreach(x,z) <-1 reach(x,y), friend(y,z)";
    let facts = "friend(A,B),f1,0,5\nfriend(B,C),f2,0,5";
    let (naive, optimized) = build_engines(rules, facts);

    for result in [naive.reason(5).unwrap(), optimized.reason(5).unwrap()] {
        for t in 0..=5 {
            assert!(result.facts_at(t).unwrap().contains(&atom("reach(A,B)")));
            assert!(result.facts_at(t).unwrap().contains(&atom("reach(B,C)")));
        }
        // one delay hop: reach(A,C) first appears at t=1
        assert!(!result.facts_at(0).unwrap().contains(&atom("reach(A,C)")));
        for t in 1..=5 {
            assert!(result.facts_at(t).unwrap().contains(&atom("reach(A,C)")));
        }
    }
}

#[test]
fn s2_negation_as_failure() {
    let rules = "active(x) <-0 user(x), not suspended(x)";
    let facts = "user(U1),f1,0,0\nuser(U2),f2,0,0\nsuspended(U2),f3,0,0";
    let (naive, optimized) = build_engines(rules, facts);

    for result in [naive.reason(0).unwrap(), optimized.reason(0).unwrap()] {
        let at_zero = result.facts_at(0).unwrap();
        assert!(at_zero.contains(&atom("active(U1)")));
        assert!(!at_zero.contains(&atom("active(U2)")));
    }
}

#[test]
fn s3_head_offset_window() {
    let rules = "alarm(x) <-0@[0,3] spike(x)";
    let facts = "spike(S1),f1,2,2";
    let (naive, optimized) = build_engines(rules, facts);

    for result in [naive.reason(5).unwrap(), optimized.reason(5).unwrap()] {
        for t in 0..=5 {
            let expected = (2..=5).contains(&t);
            assert_eq!(
                result.facts_at(t).unwrap().contains(&atom("alarm(S1)")),
                expected,
                "alarm(S1) at t={}",
                t
            );
        }
    }
}

#[test]
fn s4_semi_naive_static_fact_trigger() {
    // both body facts live in the static tier; the first delta must seed
    // them or the rule never fires
    let rules = "atRisk(p) <-1 disrupted(s), supplies(s,p)";
    let facts = "disrupted(A),f1,0,5\nsupplies(A,E),f2,0,5";
    let (naive, optimized) = build_engines(rules, facts);

    let dense = naive.reason(5).unwrap();
    let sparse = optimized.reason(5).unwrap();
    assert_equivalent(&dense, &sparse);

    assert!(!sparse.facts_at(0).unwrap().contains(&atom("atRisk(E)")));
    for t in 1..=5 {
        assert!(sparse.facts_at(t).unwrap().contains(&atom("atRisk(E)")));
    }
}

#[test]
fn s5_provenance_tree() {
    let rules = "atRisk(p) <-1 disrupted(s), supplies(s,p)";
    let facts = "disrupted(A),f1,0,5\nsupplies(A,E),f2,0,5";
    let (_, optimized) = build_engines(rules, facts);

    let result = optimized.reason(5).unwrap();
    let tree = result.provenance.derivation_tree(&atom("atRisk(E)"), 1);

    assert_eq!(tree.info.as_ref().unwrap().rule_name.as_ref(), "r_0");
    assert_eq!(tree.children.len(), 2);
    let children: Vec<_> = tree
        .children
        .iter()
        .map(|child| (child.atom.clone(), child.time))
        .collect();
    assert!(children.contains(&(atom("disrupted(A)"), 0)));
    assert!(children.contains(&(atom("supplies(A,E)"), 0)));
    assert!(tree.children.iter().all(|child| child.is_base_leaf()));
}

#[test]
fn s6_streaming_observer_counts() {
    let mut reasoner = StreamingReasoner::new(0).unwrap();
    reasoner.add_rule(parse_rule("activation", "active(x) <-0 user(x), not suspended(x)").unwrap());

    let activations = Arc::new(AtomicUsize::new(0));
    let counter = activations.clone();
    reasoner.on_new_fact("active", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let point = |text: &str, id: &str| {
        TimedFact::new(atom(text), id, vec![Interval::point(0)]).unwrap()
    };

    // user(U1) activates; the late suspension does not retract; user(U2)
    // activates again
    reasoner.add_fact_incremental(&point("user(U1)", "f1")).unwrap();
    reasoner.add_fact_incremental(&point("suspended(U1)", "f2")).unwrap();
    reasoner.add_fact_incremental(&point("user(U2)", "f3")).unwrap();

    assert_eq!(activations.load(Ordering::SeqCst), 2);
    assert!(reasoner.contains(&atom("active(U1)"), 0));
    assert!(reasoner.contains(&atom("active(U2)"), 0));
}

#[test]
fn engines_agree_on_mixed_workload() {
    let rules = "\
        reach(x,y) <-0 friend(x,y)\n\
        reach(x,z) <-1 reach(x,y), friend(y,z)\n\
        alarm(x) <-0@[0,2] spike(x)\n\
        quiet(x) : [0,3] <-0 sensor(x), not spike(x)";
    let facts = "\
        friend(A,B),f1,0,8\n\
        friend(B,C),f2,2,6\n\
        friend(C,D),f3,0,8\n\
        spike(S1),f4,3,4\n\
        sensor(S1),f5,0,8\n\
        sensor(S2),f6,1,5";
    let (naive, optimized) = build_engines(rules, facts);

    let dense = naive.reason(8).unwrap();
    let sparse = optimized.reason(8).unwrap();
    assert_equivalent(&dense, &sparse);
}

#[test]
fn provenance_is_sound() {
    let rules_text = "\
        reach(x,y) <-0 friend(x,y)\n\
        reach(x,z) <-1 reach(x,y), friend(y,z)\n\
        alarm(x) <-2@[0,1] spike(x)";
    let facts_text = "friend(A,B),f1,0,6\nfriend(B,C),f2,0,6\nspike(S1),f3,1,2";
    let (_, optimized) = build_engines(rules_text, facts_text);

    let rules: Vec<Rule> = parse_rules("r", rules_text).unwrap();
    let result = optimized.reason(6).unwrap();

    for (derived_atom, tt) in result.provenance.keys() {
        let info = result.provenance.get(derived_atom, *tt).unwrap();
        let rule = rules
            .iter()
            .find(|r| r.name == info.rule_name)
            .expect("witness rule exists");

        // the recorded substitution grounds the rule head to the derived atom
        assert_eq!(&rule.head.apply_substitution(&info.substitution), derived_atom);

        // sources are facts at the trigger timestep
        assert!(!info.sources.is_empty());
        let trigger = info.sources[0].1;
        for (source_atom, source_t) in &info.sources {
            assert_eq!(*source_t, trigger);
            assert!(result.facts_at(*source_t).unwrap().contains(source_atom));
        }

        // the asserted time sits inside the head window relative to the trigger
        let dt = *tt as i64 - (trigger + rule.delay) as i64;
        assert!(rule.head_offsets().contains(&dt));
    }
}

#[test]
fn fixed_point_is_complete() {
    let rules_text = "\
        reach(x,y) <-0 friend(x,y)\n\
        reach(x,z) <-1 reach(x,y), friend(y,z)\n\
        lonely(x) <-0 person(x), not friend(x,x)";
    let facts_text = "\
        friend(A,B),f1,0,6\n\
        friend(B,C),f2,1,5\n\
        person(A),f3,0,6";
    let (_, optimized) = build_engines(rules_text, facts_text);

    let rules: Vec<Rule> = parse_rules("r", rules_text).unwrap();
    let result = optimized.reason(6).unwrap();
    let horizon = result.horizon();

    for t in 0..=horizon {
        for rule in &rules {
            if !rule.is_active_at(t) || t + rule.delay > horizon {
                continue;
            }
            for sub in find_all_substitutions(&rule.body, result.facts_at(t).unwrap()) {
                let head = rule.head.apply_substitution(&sub);
                assert!(head.is_ground());
                for dt in rule.head_offsets() {
                    let tt = (t + rule.delay) as i64 + dt;
                    if tt < 0 || tt as usize > horizon {
                        continue;
                    }
                    assert!(
                        result.facts_at(tt as usize).unwrap().contains(&head),
                        "{} missing at t={}",
                        head,
                        tt
                    );
                }
            }
        }
    }
}

#[test]
fn sparse_store_matches_dense_interpretation() {
    let facts_text = "\
        up(Srv),f1,0,6\n\
        spike(S1),f2,2,4\n\
        spike(S2),f3,5,9\n\
        friend(A,B),f4,1,1";
    let facts = load_facts_csv(facts_text).unwrap();

    let store = SparseStore::new(6);
    let mut naive = NaiveReasoner::new();
    for fact in facts {
        store.load(&fact);
        naive.add_fact(fact);
    }

    let dense = naive.reason(6).unwrap();
    for t in 0..=6 {
        assert_eq!(&store.facts_at(t), dense.facts_at(t).unwrap(), "t={}", t);
    }
}

#[test]
fn derivation_trees_are_well_founded() {
    let rules = "reach(x,y) <-0 friend(x,y)\nreach(x,z) <-1 reach(x,y), friend(y,z)";
    let facts = "friend(A,B),f1,0,6\nfriend(B,C),f2,0,6\nfriend(C,D),f3,0,6";
    let (_, optimized) = build_engines(rules, facts);

    let result = optimized.reason(6).unwrap();
    for (derived_atom, t) in result.provenance.keys() {
        let tree = result.provenance.derivation_tree(derived_atom, *t);
        assert!(tree.depth() <= result.provenance.len() + 1);

        let mut stack = vec![&tree];
        while let Some(node) = stack.pop() {
            if node.children.is_empty() && !node.revisited {
                assert!(
                    node.info.is_none(),
                    "leaf {}@{} should be a base fact",
                    node.atom,
                    node.time
                );
            }
            stack.extend(node.children.iter());
        }
    }
}

#[test]
fn incremental_reasoner_converges_with_batch() {
    let rules = "reach(x,y) <-0 friend(x,y)\nreach(x,z) <-1 reach(x,y), friend(y,z)";

    let mut incremental = IncrementalReasoner::new(5).unwrap();
    for rule in parse_rules("r", rules).unwrap() {
        incremental.add_rule(rule);
    }
    incremental.add_fact(
        TimedFact::new(atom("friend(A,B)"), "f1", vec![Interval::new(0, 5).unwrap()]).unwrap(),
    );
    incremental.reason().unwrap();
    incremental.add_fact(
        TimedFact::new(atom("friend(B,C)"), "f2", vec![Interval::new(0, 5).unwrap()]).unwrap(),
    );
    incremental.incremental_reason().unwrap();

    let (_, optimized) = build_engines(rules, "friend(A,B),f1,0,5\nfriend(B,C),f2,0,5");
    let batch = optimized.reason(5).unwrap();

    for t in 0..=5 {
        assert_eq!(incremental.facts_at(t), *batch.facts_at(t).unwrap(), "t={}", t);
    }
}
