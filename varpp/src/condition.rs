//! Presence-condition algebra.
//!
//! A [`PresenceCondition`] is an immutable boolean expression over named
//! atoms. Values are only built through the combinators in this module,
//! which keep every condition in negation normal form and apply local
//! simplifications: constant folding, idempotence, complement, absorption,
//! merging of `(P && X) || (P && !X)` into `P`, and a bounded unit
//! propagation that catches contradictions between directly derived
//! sibling branches. Operands of `&&` and `||` are kept sorted, so
//! conditions that differ only in operand order are the same value. There
//! is no general satisfiability check; two conditions are compared by
//! structural equality.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Node of a presence-condition tree
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum Node {
    /// Holds in every configuration
    True,
    /// Holds in no configuration
    False,
    /// A configuration atom, e.g. `CONFIG_SMP`
    Atom(Arc<str>),
    /// Negation; only ever wraps an atom
    Not(PresenceCondition),
    /// Conjunction of sorted operands
    And(PresenceCondition, PresenceCondition),
    /// Disjunction of sorted operands
    Or(PresenceCondition, PresenceCondition),
}

/// An immutable, simplified boolean formula over configuration atoms
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PresenceCondition(Arc<Node>);

/// Create an atom
pub fn atom(name: &str) -> PresenceCondition {
    PresenceCondition::atom(name)
}

/// Simplifying conjunction
pub fn and(a: &PresenceCondition, b: &PresenceCondition) -> PresenceCondition {
    a.and(b)
}

/// Simplifying disjunction
pub fn or(a: &PresenceCondition, b: &PresenceCondition) -> PresenceCondition {
    a.or(b)
}

/// Simplifying negation
pub fn not(c: &PresenceCondition) -> PresenceCondition {
    c.not()
}

impl PresenceCondition {
    fn from_node(node: Node) -> Self {
        Self(Arc::new(node))
    }

    /// The condition that always holds
    #[must_use]
    pub fn always() -> Self {
        Self::from_node(Node::True)
    }

    /// The condition that never holds
    #[must_use]
    pub fn never() -> Self {
        Self::from_node(Node::False)
    }

    /// `True` or `False`
    #[must_use]
    pub fn constant(value: bool) -> Self {
        if value { Self::always() } else { Self::never() }
    }

    /// The atom `name`
    #[must_use]
    pub fn atom(name: &str) -> Self {
        Self::from_node(Node::Atom(Arc::from(name)))
    }

    /// Underlying tree node
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.0
    }

    /// Whether the condition simplified to `True`
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(*self.0, Node::True)
    }

    /// Whether the condition simplified to `False`
    #[must_use]
    pub fn is_false(&self) -> bool {
        matches!(*self.0, Node::False)
    }

    /// `Some(value)` when the condition is a constant
    #[must_use]
    pub fn as_constant(&self) -> Option<bool> {
        match *self.0 {
            Node::True => Some(true),
            Node::False => Some(false),
            _ => None,
        }
    }

    /// Simplifying conjunction
    #[must_use]
    pub fn and(&self, other: &PresenceCondition) -> PresenceCondition {
        if self.is_false() || other.is_false() {
            return Self::never();
        }
        if self.is_true() {
            return other.clone();
        }
        if other.is_true() || self == other {
            return self.clone();
        }

        let mut conjuncts = Vec::new();
        push_flattened_and(self, &mut conjuncts);
        push_flattened_and(other, &mut conjuncts);
        build_and(conjuncts)
    }

    /// Simplifying disjunction
    #[must_use]
    pub fn or(&self, other: &PresenceCondition) -> PresenceCondition {
        if self.is_true() || other.is_true() {
            return Self::always();
        }
        if self.is_false() {
            return other.clone();
        }
        if other.is_false() || self == other {
            return self.clone();
        }

        let mut disjuncts = Vec::new();
        push_flattened_or(self, &mut disjuncts);
        push_flattened_or(other, &mut disjuncts);
        build_or(disjuncts)
    }

    /// Negation, pushed down to the atoms
    #[must_use]
    pub fn not(&self) -> PresenceCondition {
        match &*self.0 {
            Node::True => Self::never(),
            Node::False => Self::always(),
            Node::Atom(_) => Self::from_node(Node::Not(self.clone())),
            Node::Not(inner) => inner.clone(),
            Node::And(a, b) => a.not().or(&b.not()),
            Node::Or(a, b) => a.not().and(&b.not()),
        }
    }

    /// Conjunction of all conditions (`True` for none)
    pub fn all<'a, I>(conditions: I) -> PresenceCondition
    where
        I: IntoIterator<Item = &'a PresenceCondition>,
    {
        conditions
            .into_iter()
            .fold(Self::always(), |acc, c| acc.and(c))
    }

    /// Disjunction of all conditions (`False` for none)
    pub fn any<'a, I>(conditions: I) -> PresenceCondition
    where
        I: IntoIterator<Item = &'a PresenceCondition>,
    {
        conditions
            .into_iter()
            .fold(Self::never(), |acc, c| acc.or(c))
    }

    /// Best-effort check that both conditions can never hold together
    #[must_use]
    pub fn provably_disjoint(&self, other: &PresenceCondition) -> bool {
        self.and(other).is_false()
    }

    /// Best-effort check that `self` implies `other`
    #[must_use]
    pub fn implies(&self, other: &PresenceCondition) -> bool {
        self.and(&other.not()).is_false()
    }

    /// Three-valued evaluation; `lookup` returns `None` for atoms without a value
    pub fn evaluate<F>(&self, lookup: &F) -> Option<bool>
    where
        F: Fn(&str) -> Option<bool>,
    {
        match &*self.0 {
            Node::True => Some(true),
            Node::False => Some(false),
            Node::Atom(name) => lookup(name.as_ref()),
            Node::Not(inner) => inner.evaluate(lookup).map(|v| !v),
            Node::And(a, b) => match (a.evaluate(lookup), b.evaluate(lookup)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Node::Or(a, b) => match (a.evaluate(lookup), b.evaluate(lookup)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
        }
    }

    /// Substitute the atoms `lookup` knows and simplify the rest
    #[must_use]
    pub fn restrict<F>(&self, lookup: &F) -> PresenceCondition
    where
        F: Fn(&str) -> Option<bool>,
    {
        match &*self.0 {
            Node::True | Node::False => self.clone(),
            Node::Atom(name) => match lookup(name.as_ref()) {
                Some(v) => Self::constant(v),
                None => self.clone(),
            },
            Node::Not(inner) => inner.restrict(lookup).not(),
            Node::And(a, b) => a.restrict(lookup).and(&b.restrict(lookup)),
            Node::Or(a, b) => a.restrict(lookup).or(&b.restrict(lookup)),
        }
    }

    /// Names of all atoms occurring in the condition
    #[must_use]
    pub fn atoms(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut BTreeSet<String>) {
        match &*self.0 {
            Node::True | Node::False => {}
            Node::Atom(name) => {
                out.insert(name.to_string());
            }
            Node::Not(inner) => inner.collect_atoms(out),
            Node::And(a, b) | Node::Or(a, b) => {
                a.collect_atoms(out);
                b.collect_atoms(out);
            }
        }
    }

    fn literal(&self) -> Option<(&str, bool)> {
        match &*self.0 {
            Node::Atom(name) => Some((name.as_ref(), true)),
            Node::Not(inner) => match &*inner.0 {
                Node::Atom(name) => Some((name.as_ref(), false)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Leftmost atom name, the primary sort key of operands
    fn leading_atom(&self) -> &str {
        match &*self.0 {
            Node::True | Node::False => "",
            Node::Atom(name) => name.as_ref(),
            Node::Not(inner) | Node::And(inner, _) | Node::Or(inner, _) => inner.leading_atom(),
        }
    }

    fn rank(&self) -> u8 {
        match &*self.0 {
            Node::True => 0,
            Node::False => 1,
            Node::Atom(_) => 2,
            Node::Not(_) => 3,
            Node::And(..) => 4,
            Node::Or(..) => 5,
        }
    }

    fn precedence(&self) -> u8 {
        match &*self.0 {
            Node::Or(..) => 1,
            Node::And(..) => 2,
            _ => 3,
        }
    }
}

impl Ord for PresenceCondition {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            return Ordering::Equal;
        }
        self.leading_atom()
            .cmp(other.leading_atom())
            .then_with(|| self.rank().cmp(&other.rank()))
            .then_with(|| match (&*self.0, &*other.0) {
                (Node::Atom(a), Node::Atom(b)) => a.cmp(b),
                (Node::Not(a), Node::Not(b)) => a.cmp(b),
                (Node::And(a1, b1), Node::And(a2, b2)) | (Node::Or(a1, b1), Node::Or(a2, b2)) => {
                    a1.cmp(a2).then_with(|| b1.cmp(b2))
                }
                _ => Ordering::Equal,
            })
    }
}

impl PartialOrd for PresenceCondition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn push_flattened_and(c: &PresenceCondition, out: &mut Vec<PresenceCondition>) {
    match c.node() {
        Node::And(a, b) => {
            push_flattened_and(a, out);
            push_flattened_and(b, out);
        }
        Node::True => {}
        _ => {
            if !out.contains(c) {
                out.push(c.clone());
            }
        }
    }
}

fn push_flattened_or(c: &PresenceCondition, out: &mut Vec<PresenceCondition>) {
    match c.node() {
        Node::Or(a, b) => {
            push_flattened_or(a, out);
            push_flattened_or(b, out);
        }
        Node::False => {}
        _ => {
            if !out.contains(c) {
                out.push(c.clone());
            }
        }
    }
}

fn conjuncts_of(c: &PresenceCondition) -> Vec<PresenceCondition> {
    let mut out = Vec::new();
    push_flattened_and(c, &mut out);
    out
}

fn disjuncts_of(c: &PresenceCondition) -> Vec<PresenceCondition> {
    let mut out = Vec::new();
    push_flattened_or(c, &mut out);
    out
}

/// `small` is a subset of `big` (both duplicate-free)
fn is_subset(small: &[PresenceCondition], big: &[PresenceCondition]) -> bool {
    small.len() <= big.len() && small.iter().all(|c| big.contains(c))
}

fn build_and(mut conjuncts: Vec<PresenceCondition>) -> PresenceCondition {
    if conjuncts.iter().any(PresenceCondition::is_false) {
        return PresenceCondition::never();
    }

    // and(a, or(a, x)) = a, and(or(a, b), or(a, b, x)) = or(a, b)
    let disjunct_sets: Vec<Vec<PresenceCondition>> = conjuncts.iter().map(disjuncts_of).collect();
    let mut keep = vec![true; conjuncts.len()];
    for i in 0..conjuncts.len() {
        if disjunct_sets[i].len() < 2 {
            continue;
        }
        for j in 0..conjuncts.len() {
            if i == j || !keep[j] {
                continue;
            }
            if is_subset(&disjunct_sets[j], &disjunct_sets[i]) {
                keep[i] = false;
                break;
            }
        }
    }
    let mut idx = 0;
    conjuncts.retain(|_| {
        idx += 1;
        keep[idx - 1]
    });

    strip_refuted(&mut conjuncts, true);
    if conjuncts.iter().any(PresenceCondition::is_false) || propagate(&conjuncts).is_none() {
        return PresenceCondition::never();
    }
    rebuild(conjuncts, PresenceCondition::always(), |a, b| Node::And(a, b))
}

fn build_or(mut disjuncts: Vec<PresenceCondition>) -> PresenceCondition {
    if disjuncts.iter().any(PresenceCondition::is_true) {
        return PresenceCondition::always();
    }

    loop {
        let before = disjuncts.len();
        strip_refuted(&mut disjuncts, false);
        if disjuncts.iter().any(PresenceCondition::is_true) {
            return PresenceCondition::always();
        }
        absorb_disjuncts(&mut disjuncts);
        merge_complements(&mut disjuncts);
        if disjuncts.iter().any(PresenceCondition::is_true) {
            return PresenceCondition::always();
        }
        if disjuncts.len() == before {
            break;
        }
    }

    let negated: Vec<PresenceCondition> = disjuncts.iter().map(PresenceCondition::not).collect();
    let mut flat = Vec::new();
    for n in &negated {
        push_flattened_and(n, &mut flat);
    }
    if flat.iter().any(PresenceCondition::is_false) || propagate(&flat).is_none() {
        return PresenceCondition::always();
    }
    rebuild(disjuncts, PresenceCondition::never(), |a, b| Node::Or(a, b))
}

/// Drop literals refuted by a sibling literal: and(a, or(!a, x)) = and(a, x)
/// in a conjunction, or(a, and(!a, x)) = or(a, x) in a disjunction
fn strip_refuted(items: &mut Vec<PresenceCondition>, conjunction: bool) {
    loop {
        let units: Vec<(String, bool)> = items
            .iter()
            .filter_map(|c| c.literal().map(|(n, v)| (n.to_string(), v)))
            .collect();
        let refuted = |c: &PresenceCondition| {
            c.literal()
                .is_some_and(|(n, v)| units.iter().any(|(u, uv)| u == n && *uv != v))
        };

        let mut changed = false;
        for item in items.iter_mut() {
            if item.literal().is_some() {
                continue;
            }
            let parts = if conjunction {
                disjuncts_of(item)
            } else {
                conjuncts_of(item)
            };
            if parts.len() < 2 || !parts.iter().any(|p| refuted(p)) {
                continue;
            }
            let kept = parts.iter().filter(|p| !refuted(p));
            *item = if conjunction {
                PresenceCondition::any(kept)
            } else {
                PresenceCondition::all(kept)
            };
            changed = true;
        }
        if !changed {
            return;
        }

        let mut flat = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            if conjunction {
                push_flattened_and(&item, &mut flat);
            } else {
                push_flattened_or(&item, &mut flat);
            }
        }
        *items = flat;
    }
}

/// or(a, and(a, x)) = a
fn absorb_disjuncts(disjuncts: &mut Vec<PresenceCondition>) {
    let conjunct_sets: Vec<Vec<PresenceCondition>> = disjuncts.iter().map(conjuncts_of).collect();
    let mut keep = vec![true; disjuncts.len()];
    for i in 0..disjuncts.len() {
        for j in 0..disjuncts.len() {
            if i == j || !keep[j] || conjunct_sets[j].len() >= conjunct_sets[i].len() {
                continue;
            }
            if is_subset(&conjunct_sets[j], &conjunct_sets[i]) {
                keep[i] = false;
                break;
            }
        }
    }
    let mut idx = 0;
    disjuncts.retain(|_| {
        idx += 1;
        keep[idx - 1]
    });
}

/// (P && X) || (P && !X) = P
fn merge_complements(disjuncts: &mut Vec<PresenceCondition>) {
    'outer: loop {
        for i in 0..disjuncts.len() {
            let left = conjuncts_of(&disjuncts[i]);
            for j in (i + 1)..disjuncts.len() {
                let right = conjuncts_of(&disjuncts[j]);
                if left.len() != right.len() {
                    continue;
                }
                let only_left: Vec<&PresenceCondition> =
                    left.iter().filter(|c| !right.contains(c)).collect();
                let only_right: Vec<&PresenceCondition> =
                    right.iter().filter(|c| !left.contains(c)).collect();
                if only_left.len() != 1 || only_right.len() != 1 {
                    continue;
                }
                if only_left[0].not() != *only_right[0] {
                    continue;
                }
                let common: Vec<PresenceCondition> =
                    left.iter().filter(|c| right.contains(c)).cloned().collect();
                let merged = if common.is_empty() {
                    PresenceCondition::always()
                } else {
                    build_and(common)
                };
                disjuncts.remove(j);
                disjuncts[i] = merged;
                let mut deduped: Vec<PresenceCondition> = Vec::with_capacity(disjuncts.len());
                for d in disjuncts.drain(..) {
                    if !deduped.contains(&d) {
                        deduped.push(d);
                    }
                }
                *disjuncts = deduped;
                continue 'outer;
            }
        }
        break;
    }
}

/// Fold sorted, duplicate-free operands into a left-leaning tree
fn rebuild<F>(mut parts: Vec<PresenceCondition>, empty: PresenceCondition, node: F) -> PresenceCondition
where
    F: Fn(PresenceCondition, PresenceCondition) -> Node,
{
    parts.sort();
    parts.dedup();
    let mut iter = parts.into_iter();
    let Some(first) = iter.next() else {
        return empty;
    };
    iter.fold(first, |acc, c| PresenceCondition::from_node(node(acc, c)))
}

/// Unit propagation over a conjunction. Returns `None` when the conjuncts
/// are contradictory, otherwise the literals forced by them.
fn propagate(conjuncts: &[PresenceCondition]) -> Option<Vec<(String, bool)>> {
    let mut literals: Vec<(String, bool)> = Vec::new();
    let mut pending: Vec<PresenceCondition> = Vec::new();

    fn assign(literals: &mut Vec<(String, bool)>, name: &str, value: bool) -> Option<bool> {
        match literals.iter().find(|(n, _)| n == name) {
            Some((_, v)) if *v != value => None,
            Some(_) => Some(false),
            None => {
                literals.push((name.to_string(), value));
                Some(true)
            }
        }
    }

    let mut queue: Vec<PresenceCondition> = conjuncts.to_vec();
    while let Some(c) = queue.pop() {
        match c.node() {
            Node::False => return None,
            Node::True => {}
            Node::And(..) => queue.extend(conjuncts_of(&c)),
            _ => match c.literal() {
                Some((name, value)) => {
                    assign(&mut literals, name, value)?;
                }
                None => pending.push(c),
            },
        }
    }

    loop {
        let mut changed = false;
        let mut i = 0;
        while i < pending.len() {
            let lookup = |name: &str| {
                literals
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| *v)
            };
            match pending[i].evaluate(&lookup) {
                Some(false) => return None,
                Some(true) => {
                    pending.swap_remove(i);
                    changed = true;
                    continue;
                }
                None => {}
            }
            let open: Vec<PresenceCondition> = disjuncts_of(&pending[i])
                .into_iter()
                .filter(|d| d.evaluate(&lookup) != Some(false))
                .collect();
            if open.len() == 1 {
                pending.swap_remove(i);
                let mut forced = Vec::new();
                push_flattened_and(&open[0], &mut forced);
                for f in forced {
                    match f.literal() {
                        Some((name, value)) => {
                            assign(&mut literals, name, value)?;
                        }
                        None => pending.push(f),
                    }
                }
                changed = true;
                continue;
            }
            i += 1;
        }
        if !changed {
            break;
        }
    }
    Some(literals)
}

impl fmt::Display for PresenceCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child = |f: &mut fmt::Formatter<'_>, c: &PresenceCondition, min: u8| {
            if c.precedence() < min {
                write!(f, "({c})")
            } else {
                write!(f, "{c}")
            }
        };
        match &*self.0 {
            Node::True => f.write_str("1"),
            Node::False => f.write_str("0"),
            Node::Atom(name) => f.write_str(name),
            Node::Not(inner) => {
                f.write_str("!")?;
                child(f, inner, 3)
            }
            Node::And(a, b) => {
                child(f, a, 2)?;
                f.write_str(" && ")?;
                child(f, b, 2)
            }
            Node::Or(a, b) => {
                child(f, a, 1)?;
                f.write_str(" || ")?;
                child(f, b, 1)
            }
        }
    }
}

impl fmt::Debug for PresenceCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PresenceCondition({self})")
    }
}

/// Error parsing a serialized presence condition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed presence condition at offset {offset}: {message}")]
pub struct ConditionParseError {
    /// Byte offset into the parsed text
    pub offset: usize,
    /// What was expected
    pub message: String,
}

#[derive(Debug, PartialEq)]
enum CondToken<'a> {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Word(&'a str),
}

fn tokenize_condition(input: &str) -> Vec<(usize, CondToken<'_>)> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let rest = &input[i..];
        let (token, len) = if c == b'(' {
            (CondToken::LParen, 1)
        } else if c == b')' {
            (CondToken::RParen, 1)
        } else if rest.starts_with("&&") {
            (CondToken::And, 2)
        } else if rest.starts_with("||") {
            (CondToken::Or, 2)
        } else if c == b'!' {
            (CondToken::Not, 1)
        } else {
            let mut end = i;
            while end < bytes.len() {
                let b = bytes[end];
                if b.is_ascii_whitespace()
                    || b == b'('
                    || b == b')'
                    || input[end..].starts_with("&&")
                    || input[end..].starts_with("||")
                {
                    break;
                }
                end += 1;
            }
            (CondToken::Word(&input[i..end]), end - i)
        };
        tokens.push((i, token));
        i += len;
    }
    tokens
}

struct ConditionParser<'a> {
    tokens: Vec<(usize, CondToken<'a>)>,
    pos: usize,
    len: usize,
}

impl<'a> ConditionParser<'a> {
    fn error(&self, message: &str) -> ConditionParseError {
        let offset = self.tokens.get(self.pos).map_or(self.len, |(o, _)| *o);
        ConditionParseError {
            offset,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&CondToken<'a>> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn parse_or(&mut self) -> Result<PresenceCondition, ConditionParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&CondToken::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = left.or(&right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<PresenceCondition, ConditionParseError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&CondToken::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = left.and(&right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<PresenceCondition, ConditionParseError> {
        if self.peek() == Some(&CondToken::Not) {
            self.pos += 1;
            return Ok(self.parse_unary()?.not());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<PresenceCondition, ConditionParseError> {
        match self.peek() {
            Some(CondToken::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                if self.peek() != Some(&CondToken::RParen) {
                    return Err(self.error("expected )"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(CondToken::Word(word)) => {
                let word = *word;
                self.pos += 1;
                match word {
                    "1" | "true" => Ok(PresenceCondition::always()),
                    "0" | "false" => Ok(PresenceCondition::never()),
                    "defined" | "definedEx" if self.peek() == Some(&CondToken::LParen) => {
                        self.pos += 1;
                        let Some(CondToken::Word(name)) = self.peek() else {
                            return Err(self.error("expected atom name"));
                        };
                        let name = *name;
                        self.pos += 1;
                        if self.peek() != Some(&CondToken::RParen) {
                            return Err(self.error("expected )"));
                        }
                        self.pos += 1;
                        Ok(PresenceCondition::atom(name))
                    }
                    _ => Ok(PresenceCondition::atom(word)),
                }
            }
            Some(_) => Err(self.error("expected atom, constant or (")),
            None => Err(self.error("unexpected end of condition")),
        }
    }
}

impl FromStr for PresenceCondition {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = ConditionParser {
            tokens: tokenize_condition(s),
            pos: 0,
            len: s.len(),
        };
        let cond = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(cond)
    }
}

impl Serialize for PresenceCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PresenceCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
