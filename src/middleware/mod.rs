//! The middleware holds the value types the proof tree is built from: terms with free
//! variables, binding maps, truth values, facts and the rule boundary.

pub mod bindings;
pub mod rule;
pub mod serialization;

use std::{cmp::Ordering, collections::BTreeSet, fmt};

pub use bindings::{BindingConflict, BindingMap};
pub use rule::{DirectResult, Rule, RuleKind, RuleProvider, RuleRef, RuleSet};
use serde::{Deserialize, Serialize};

/// Head used to pack a target together with its argument targets into one term.
pub(crate) const TUPLE_HEAD: &str = "#";

/// A placeholder variable. Displayed as `?name`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// An immutable labeled tree which may contain free variables.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    Var(Variable),
    Sym(String),
    App(String, Vec<Term>),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(Variable::new(name))
    }

    pub fn sym(name: impl Into<String>) -> Self {
        Term::Sym(name.into())
    }

    pub fn app(head: impl Into<String>, args: impl IntoIterator<Item = Term>) -> Self {
        Term::App(head.into(), args.into_iter().collect())
    }

    pub(crate) fn tuple(items: Vec<Term>) -> Self {
        Term::App(TUPLE_HEAD.to_string(), items)
    }

    pub fn as_var(&self) -> Option<&Variable> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn head(&self) -> Option<&str> {
        match self {
            Term::Var(_) => None,
            Term::Sym(s) | Term::App(s, _) => Some(s),
        }
    }

    pub fn args(&self) -> &[Term] {
        match self {
            Term::App(_, args) => args,
            _ => &[],
        }
    }

    pub fn is_ground(&self) -> bool {
        match self {
            Term::Var(_) => false,
            Term::Sym(_) => true,
            Term::App(_, args) => args.iter().all(Term::is_ground),
        }
    }

    pub fn contains_var(&self, var: &Variable) -> bool {
        match self {
            Term::Var(v) => v == var,
            Term::Sym(_) => false,
            Term::App(_, args) => args.iter().any(|a| a.contains_var(var)),
        }
    }

    /// Distinct variables in order of first occurrence.
    pub fn vars(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    pub(crate) fn collect_vars(&self, out: &mut Vec<Variable>) {
        match self {
            Term::Var(v) => {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Term::Sym(_) => {}
            Term::App(_, args) => args.iter().for_each(|a| a.collect_vars(out)),
        }
    }

    pub fn var_set(&self) -> BTreeSet<Variable> {
        self.vars().into_iter().collect()
    }

    pub fn free_variable_count(&self) -> usize {
        self.vars().len()
    }

    /// Simultaneous substitution: bound variables are replaced once, the
    /// replacement terms are not substituted again.
    pub fn substitute(&self, bindings: &BindingMap) -> Term {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            Term::Var(v) => bindings.get(v).cloned().unwrap_or_else(|| self.clone()),
            Term::Sym(_) => self.clone(),
            Term::App(h, args) => {
                Term::App(h.clone(), args.iter().map(|a| a.substitute(bindings)).collect())
            }
        }
    }

    /// One-way matching of `self` (the pattern) against `instance`, extending
    /// `bindings`. Variables of `instance` are treated as constants.
    pub fn match_term(&self, instance: &Term, bindings: &BindingMap) -> Option<BindingMap> {
        let mut out = bindings.clone();
        let mut stack = vec![(self, instance)];
        while let Some((pattern, term)) = stack.pop() {
            match pattern {
                Term::Var(v) => match out.get(v) {
                    Some(bound) if bound != term => return None,
                    Some(_) => {}
                    None => out.insert(v.clone(), term.clone()),
                },
                Term::Sym(s) => match term {
                    Term::Sym(s2) if s == s2 => {}
                    _ => return None,
                },
                Term::App(h, args) => match term {
                    Term::App(h2, args2) if h == h2 && args.len() == args2.len() => {
                        stack.extend(args.iter().zip(args2.iter()))
                    }
                    _ => return None,
                },
            }
        }
        Some(out)
    }

    /// Syntactic unification with occurs check. `bindings` must be idempotent;
    /// the returned map is idempotent too. When both sides are variables the
    /// variable of `self` is bound.
    pub fn unify(&self, other: &Term, bindings: &BindingMap) -> Option<BindingMap> {
        let mut out = bindings.clone();
        let mut stack = vec![(self.clone(), other.clone())];
        while let Some((l, r)) = stack.pop() {
            let l = walk(&l, &out).clone();
            let r = walk(&r, &out).clone();
            match (l, r) {
                (l, r) if l == r => {}
                (Term::Var(v), r) => {
                    if resolve(&r, &out).contains_var(&v) {
                        return None;
                    }
                    out.insert(v, r);
                }
                (l, Term::Var(v)) => {
                    if resolve(&l, &out).contains_var(&v) {
                        return None;
                    }
                    out.insert(v, l);
                }
                (Term::App(h1, a1), Term::App(h2, a2)) if h1 == h2 && a1.len() == a2.len() => {
                    stack.extend(a1.into_iter().zip(a2).rev())
                }
                _ => return None,
            }
        }
        Some(out.map_values(|t| resolve(t, &out)))
    }

    /// Renames every variable of `self` to a fresh one, recording the renaming.
    pub fn rename_apart(&self, fresh: &mut FreshVars, renaming: &mut BindingMap) -> Term {
        for v in self.vars() {
            if renaming.get(&v).is_none() {
                renaming.insert(v, Term::Var(fresh.fresh()));
            }
        }
        self.substitute(renaming)
    }

    /// Alpha-canonical form: variables renamed by order of first occurrence.
    /// Returns the canonical term and the map from own variables to canonical ones.
    pub fn canonicalize(&self) -> (Term, BindingMap) {
        let renaming: BindingMap = self
            .vars()
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, Term::var(format!("_c{}", i))))
            .collect();
        (self.substitute(&renaming), renaming)
    }

    /// Replaces each constant at a top-level argument position by a fresh
    /// placeholder. The returned map sends the placeholders back to the constants.
    pub fn generalize_constants(&self, fresh: &mut FreshVars) -> (Term, BindingMap) {
        let mut placeholders = BindingMap::new();
        let general = match self {
            Term::App(h, args) => Term::App(
                h.clone(),
                args.iter()
                    .map(|a| match a {
                        Term::Sym(_) => {
                            let v = fresh.fresh();
                            placeholders.insert(v.clone(), a.clone());
                            Term::Var(v)
                        }
                        _ => a.clone(),
                    })
                    .collect(),
            ),
            _ => self.clone(),
        };
        (general, placeholders)
    }
}

fn walk<'a>(mut term: &'a Term, bindings: &'a BindingMap) -> &'a Term {
    while let Term::Var(v) = term {
        match bindings.get(v) {
            Some(next) if next != term => term = next,
            _ => break,
        }
    }
    term
}

fn resolve(term: &Term, bindings: &BindingMap) -> Term {
    match walk(term, bindings) {
        Term::App(h, args) => {
            Term::App(h.clone(), args.iter().map(|a| resolve(a, bindings)).collect())
        }
        t => t.clone(),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{}", v),
            Term::Sym(s) => write!(f, "{}", s),
            Term::App(h, args) => {
                write!(f, "{}(", h)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Source of fresh variables. Names are `<prefix><n>`.
#[derive(Clone, Debug)]
pub struct FreshVars {
    prefix: String,
    next: usize,
}

impl FreshVars {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn fresh(&mut self) -> Variable {
        let v = Variable(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        v
    }
}

impl Default for FreshVars {
    fn default() -> Self {
        Self::new("_v")
    }
}

/// Strength and confidence, both in `[0, 1]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TruthValue {
    pub strength: f32,
    pub confidence: f32,
}

impl TruthValue {
    pub const CERTAIN: TruthValue = TruthValue {
        strength: 1.0,
        confidence: 1.0,
    };

    pub fn new(strength: f32, confidence: f32) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self::CERTAIN
    }
}

impl PartialEq for TruthValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TruthValue {}

impl PartialOrd for TruthValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TruthValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.confidence
            .total_cmp(&other.confidence)
            .then(self.strength.total_cmp(&other.strength))
    }
}

impl fmt::Display for TruthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:.2}, {:.2}>", self.strength, self.confidence)
    }
}

/// A value produced by a rule: a term together with its truth value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    pub term: Term,
    pub tv: TruthValue,
}

impl Fact {
    pub fn new(term: Term, tv: TruthValue) -> Self {
        Self { term, tv }
    }

    pub fn certain(term: Term) -> Self {
        Self::new(term, TruthValue::CERTAIN)
    }

    pub fn confidence(&self) -> f32 {
        self.tv.confidence
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.term, self.tv)
    }
}

pub(crate) fn join_facts(facts: &[Fact]) -> String {
    facts
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
