//! Parser for the textual atom, literal, rule, and fact syntax
//!
//! Rule form: `HEAD [: [s1,e1];[s2,e2]] <-DELAY b1, b2, ...`
//! - a lowercase initial letter marks a term as a variable, anything else
//!   as a constant
//! - `<-` with no digits means delay 0; an optional `@[a,b]` immediately
//!   after the delay sets the head-offset window
//! - negation prefix on body literals is `not ` or `~`
//!
//! Fact CSV form: `predicate(args),fact_name,start_time,end_time`, with
//! `#` comments and blank lines ignored.

use crate::datalog::types::{Atom, Literal, Rule, Term};
use crate::error::{Result, TideError};
use crate::facts::TimedFact;
use crate::types::Interval;

/// Split a string by `sep`, but only at the top level (not inside parentheses)
///
/// Returns `None` when parentheses are unbalanced.
fn split_top_level(input: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut current_start = 0;
    let mut depth: i32 = 0;

    for (i, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            c if c == sep && depth == 0 => {
                parts.push(&input[current_start..i]);
                current_start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }

    parts.push(&input[current_start..]);
    Some(parts)
}

/// Classify a trimmed argument: lowercase initial letter means variable
fn parse_term(input: &str) -> Term {
    match input.chars().next() {
        Some(c) if c.is_lowercase() => Term::var(input),
        _ => Term::constant(input),
    }
}

/// Parse an atom from its textual form
///
/// `pred` with no parentheses denotes arity 0; otherwise the trailing `)`
/// is required and the inside is split by top-level commas.
pub fn parse_atom(input: &str) -> Result<Atom> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TideError::InvalidAtom("empty atom".into()));
    }

    let Some(open) = input.find('(') else {
        if input.contains(')') || input.contains(',') {
            return Err(TideError::InvalidAtom(format!(
                "stray punctuation in `{}`",
                input
            )));
        }
        return Ok(Atom::new(input, vec![]));
    };

    if !input.ends_with(')') {
        return Err(TideError::InvalidAtom(format!(
            "missing closing parenthesis in `{}`",
            input
        )));
    }
    let predicate = input[..open].trim();
    if predicate.is_empty() {
        return Err(TideError::InvalidAtom(format!(
            "missing predicate in `{}`",
            input
        )));
    }

    let inside = &input[open + 1..input.len() - 1];
    let mut terms = Vec::new();
    if !inside.trim().is_empty() {
        let parts = split_top_level(inside, ',').ok_or_else(|| {
            TideError::InvalidAtom(format!("unbalanced parentheses in `{}`", input))
        })?;
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                return Err(TideError::InvalidAtom(format!(
                    "empty argument in `{}`",
                    input
                )));
            }
            terms.push(parse_term(part));
        }
    }

    Ok(Atom::new(predicate, terms))
}

/// Parse a literal: a leading `not ` or `~` marks negation
pub fn parse_literal(input: &str) -> Result<Literal> {
    let input = input.trim();
    if let Some(rest) = input.strip_prefix("not ") {
        Ok(Literal::negative(parse_atom(rest)?))
    } else if let Some(rest) = input.strip_prefix('~') {
        Ok(Literal::negative(parse_atom(rest)?))
    } else {
        Ok(Literal::positive(parse_atom(input)?))
    }
}

/// Parse a `[s,e]` interval literal
fn parse_interval_text(input: &str) -> Result<Interval> {
    let input = input.trim();
    let inner = input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| TideError::InvalidRule(format!("malformed interval `{}`", input)))?;

    let (start_text, end_text) = inner
        .split_once(',')
        .ok_or_else(|| TideError::InvalidRule(format!("malformed interval `{}`", input)))?;

    let start = start_text.trim().parse::<usize>().map_err(|_| {
        TideError::InvalidRule(format!("bad interval start in `{}`", input))
    })?;
    let end = end_text
        .trim()
        .parse::<usize>()
        .map_err(|_| TideError::InvalidRule(format!("bad interval end in `{}`", input)))?;

    Interval::new(start, end)
}

/// Parse a `;`-separated list of `[s,e]` intervals
fn parse_intervals(input: &str) -> Result<Vec<Interval>> {
    input
        .split(';')
        .map(parse_interval_text)
        .collect::<Result<Vec<_>>>()
}

/// Parse a rule from its textual form; the name is supplied separately
pub fn parse_rule(name: impl Into<String>, input: &str) -> Result<Rule> {
    let input = input.trim();
    let arrow = input
        .find("<-")
        .ok_or_else(|| TideError::InvalidRule(format!("missing `<-` in `{}`", input)))?;

    let left = input[..arrow].trim();
    let (head_text, active) = match left.find(':') {
        Some(colon) => (left[..colon].trim(), parse_intervals(&left[colon + 1..])?),
        None => (left, Vec::new()),
    };
    let head = parse_atom(head_text)?;

    let mut rest = &input[arrow + 2..];
    let digits_len = rest
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .count();
    let delay = if digits_len == 0 {
        0
    } else {
        rest[..digits_len]
            .parse::<usize>()
            .map_err(|_| TideError::InvalidRule(format!("bad delay in `{}`", input)))?
    };
    rest = &rest[digits_len..];

    let mut window = None;
    if let Some(after_at) = rest.strip_prefix('@') {
        let close = after_at.find(']').ok_or_else(|| {
            TideError::InvalidRule(format!("malformed head offset window in `{}`", input))
        })?;
        let inner = after_at[..=close]
            .strip_prefix('[')
            .and_then(|w| w.strip_suffix(']'))
            .ok_or_else(|| {
                TideError::InvalidRule(format!("malformed head offset window in `{}`", input))
            })?;
        let (start_text, end_text) = inner.split_once(',').ok_or_else(|| {
            TideError::InvalidRule(format!("malformed head offset window in `{}`", input))
        })?;
        let start = start_text.trim().parse::<i64>().map_err(|_| {
            TideError::InvalidRule(format!("bad head offset in `{}`", input))
        })?;
        let end = end_text.trim().parse::<i64>().map_err(|_| {
            TideError::InvalidRule(format!("bad head offset in `{}`", input))
        })?;
        window = Some((start, end));
        rest = &after_at[close + 1..];
    }

    let body_text = rest.trim();
    if body_text.is_empty() {
        return Err(TideError::InvalidRule(format!("empty body in `{}`", input)));
    }
    let body_parts = split_top_level(body_text, ',')
        .ok_or_else(|| TideError::InvalidRule(format!("unbalanced body in `{}`", input)))?;
    let body = body_parts
        .into_iter()
        .map(parse_literal)
        .collect::<Result<Vec<_>>>()?;

    let mut rule = Rule::new(name, head, body).with_delay(delay).with_active(active);
    if let Some((start, end)) = window {
        rule = rule.with_head_window(start, end)?;
    }
    Ok(rule)
}

/// Parse one rule per line; `#` comments and blank lines are ignored
///
/// Rule names are generated as `prefix_0`, `prefix_1`, ... in line order.
pub fn parse_rules(name_prefix: &str, input: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let name = format!("{}_{}", name_prefix, rules.len());
        rules.push(parse_rule(name, line)?);
    }
    Ok(rules)
}

/// Load timed facts from `predicate(args),fact_name,start_time,end_time` lines
pub fn load_facts_csv(input: &str) -> Result<Vec<TimedFact>> {
    let mut facts = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts = split_top_level(line, ',')
            .ok_or_else(|| TideError::InvalidFact(format!("unbalanced fact line `{}`", line)))?;
        if parts.len() != 4 {
            return Err(TideError::InvalidFact(format!(
                "expected `atom,name,start,end` in `{}`",
                line
            )));
        }

        let atom = parse_atom(parts[0])?;
        let name = parts[1].trim();
        let start = parts[2].trim().parse::<usize>().map_err(|_| {
            TideError::InvalidFact(format!("bad start time in `{}`", line))
        })?;
        let end = parts[3]
            .trim()
            .parse::<usize>()
            .map_err(|_| TideError::InvalidFact(format!("bad end time in `{}`", line)))?;

        facts.push(TimedFact::new(atom, name, vec![Interval::new(start, end)?])?);
    }
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_atom() {
        let atom = parse_atom("friend(x, Bob)").unwrap();
        assert_eq!(atom.predicate.as_ref(), "friend");
        assert_eq!(atom.terms.len(), 2);
        assert_eq!(atom.terms[0], Term::var("x"));
        assert_eq!(atom.terms[1], Term::constant("Bob"));
    }

    #[test]
    fn test_parse_arity_zero() {
        let atom = parse_atom("shutdown").unwrap();
        assert_eq!(atom.predicate.as_ref(), "shutdown");
        assert!(atom.terms.is_empty());

        let explicit = parse_atom("shutdown()").unwrap();
        assert!(explicit.terms.is_empty());
    }

    #[test]
    fn test_parse_atom_malformed() {
        assert!(parse_atom("").is_err());
        assert!(parse_atom("friend(x").is_err());
        assert!(parse_atom("(x)").is_err());
        assert!(parse_atom("friend(x,)").is_err());
        assert!(parse_atom("friend(x,,y)").is_err());
    }

    #[test]
    fn test_parse_literal_negation() {
        let lit = parse_literal("not suspended(x)").unwrap();
        assert!(lit.negated);
        assert_eq!(lit.atom.predicate.as_ref(), "suspended");

        let tilde = parse_literal("~suspended(x)").unwrap();
        assert!(tilde.negated);

        let positive = parse_literal("user(x)").unwrap();
        assert!(!positive.negated);
    }

    #[test]
    fn test_parse_rule_defaults() {
        let rule = parse_rule("r0", "reach(x,y) <- friend(x,y)").unwrap();
        assert_eq!(rule.delay, 0);
        assert_eq!(rule.head_start_offset, 0);
        assert_eq!(rule.head_end_offset, 0);
        assert!(rule.active.is_empty());
        assert_eq!(rule.body.len(), 1);
    }

    #[test]
    fn test_parse_rule_with_delay() {
        let rule = parse_rule("r0", "reach(x,z) <-1 reach(x,y), friend(y,z)").unwrap();
        assert_eq!(rule.delay, 1);
        assert_eq!(rule.body.len(), 2);
        assert_eq!(rule.head.predicate.as_ref(), "reach");
    }

    #[test]
    fn test_parse_rule_with_negation() {
        let rule = parse_rule("r0", "active(x) <-0 user(x), not suspended(x)").unwrap();
        assert!(!rule.body[0].negated);
        assert!(rule.body[1].negated);
    }

    #[test]
    fn test_parse_rule_with_active_intervals() {
        let rule = parse_rule("r0", "p(x) : [0,5];[8,9] <-2 q(x)").unwrap();
        assert_eq!(rule.active.len(), 2);
        assert!(rule.is_active_at(3));
        assert!(!rule.is_active_at(6));
        assert!(rule.is_active_at(8));
        assert_eq!(rule.delay, 2);
    }

    #[test]
    fn test_parse_rule_with_head_window() {
        let rule = parse_rule("r0", "alarm(x) <-0@[0,3] spike(x)").unwrap();
        assert_eq!(rule.head_start_offset, 0);
        assert_eq!(rule.head_end_offset, 3);
    }

    #[test]
    fn test_parse_rule_malformed() {
        assert!(parse_rule("r0", "reach(x,y) friend(x,y)").is_err());
        assert!(parse_rule("r0", "reach(x,y) <-1").is_err());
        assert!(parse_rule("r0", "p(x) : [5,2] <-0 q(x)").is_err());
        assert!(parse_rule("r0", "p(x) <-0@[3,1] q(x)").is_err());
    }

    #[test]
    fn test_parse_rules_skips_comments() {
        let text = r#"
            # closure over friendships
            reach(x,y) <-0 friend(x,y)

            reach(x,z) <-1 reach(x,y), friend(y,z)
        "#;
        let rules = parse_rules("closure", text).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name.as_ref(), "closure_0");
        assert_eq!(rules[1].name.as_ref(), "closure_1");
    }

    #[test]
    fn test_load_facts_csv() {
        let text = r#"
            # seed facts
            friend(A,B),f1,0,5
            friend(B,C),f2,0,5
            spike(S1),f3,2,2
        "#;
        let facts = load_facts_csv(text).unwrap();
        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].id().as_ref(), "f1");
        assert!(facts[2].holds_at(2));
        assert!(!facts[2].holds_at(3));
    }

    #[test]
    fn test_load_facts_csv_malformed() {
        assert!(load_facts_csv("friend(A,B),f1,0").is_err());
        assert!(load_facts_csv("friend(A,B),f1,5,2").is_err());
        assert!(load_facts_csv("friend(x,B),f1,0,5").is_err());
        assert!(load_facts_csv("friend(A,B),f1,zero,5").is_err());
    }

    #[test]
    fn test_atom_round_trip() {
        for text in ["friend(A,b)", "alarm", "supplies(A,E,Widget_1)"] {
            let atom = parse_atom(text).unwrap();
            let reparsed = parse_atom(&atom.to_string()).unwrap();
            assert_eq!(atom, reparsed);
        }
    }

    #[test]
    fn test_rule_round_trip() {
        for text in [
            "reach(x,z) <-1 reach(x,y), friend(y,z)",
            "active(x) <-0 user(x), not suspended(x)",
            "p(x) : [0,5];[8,9] <-2 q(x)",
            "alarm(x) <-0@[0,3] spike(x)",
        ] {
            let rule = parse_rule("r", text).unwrap();
            let reparsed = parse_rule("r", &rule.to_string()).unwrap();
            assert_eq!(rule, reparsed);
        }
    }

    mod round_trip_props {
        use super::*;
        use proptest::prelude::*;

        fn ident() -> impl Strategy<Value = String> {
            "[A-Za-z][A-Za-z0-9_]{0,6}"
        }

        proptest! {
            #[test]
            fn atom_parse_render_parse(
                pred in "[a-z][a-z0-9_]{0,6}",
                args in prop::collection::vec(ident(), 0..4),
            ) {
                let text = if args.is_empty() {
                    pred.clone()
                } else {
                    format!("{}({})", pred, args.join(","))
                };
                let atom = parse_atom(&text).unwrap();
                let reparsed = parse_atom(&atom.to_string()).unwrap();
                prop_assert_eq!(atom, reparsed);
            }

            #[test]
            fn rule_parse_render_parse(
                delay in 0usize..5,
                window in (-2i64..3).prop_flat_map(|s| (Just(s), s..4)),
                negations in prop::collection::vec(any::<bool>(), 1..4),
            ) {
                let body: Vec<String> = negations
                    .iter()
                    .enumerate()
                    .map(|(i, neg)| {
                        let atom = format!("b{}(x,C{})", i, i);
                        if *neg { format!("not {}", atom) } else { atom }
                    })
                    .collect();
                let text = format!(
                    "head(x) <-{}@[{},{}] {}",
                    delay, window.0, window.1, body.join(", ")
                );
                let rule = parse_rule("r", &text).unwrap();
                prop_assert_eq!(rule.delay, delay);
                prop_assert_eq!(
                    (rule.head_start_offset, rule.head_end_offset),
                    window
                );
                let reparsed = parse_rule("r", &rule.to_string()).unwrap();
                prop_assert_eq!(rule, reparsed);
            }
        }
    }
}
