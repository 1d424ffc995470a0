//! The rule boundary. Concrete rules are plugged in by the surrounding system;
//! the proof tree only relies on the capabilities listed on [`Rule`].

use std::{fmt, sync::Arc};

use super::{join_facts, BindingMap, Fact, FreshVars, Term};
use crate::error::{BitError, Result};

pub type RuleRef = Arc<dyn Rule>;

/// Generators produce results with no sub-goals; composers need one child per argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum RuleKind {
    Generator,
    Composer,
}

/// A value produced by a generator, with the bindings of the target's
/// variables that were needed to produce it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectResult {
    pub fact: Fact,
    pub bindings: BindingMap,
}

pub trait Rule: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Number of arguments `compute` takes.
    fn arity(&self) -> usize;

    fn kind(&self) -> RuleKind {
        RuleKind::Composer
    }

    /// Cheap discovery hint: false if the rule can certainly not produce `target`.
    fn may_produce(&self, _target: &Term) -> bool {
        true
    }

    /// Whether `compute` may be called at all.
    fn is_computable(&self) -> bool {
        true
    }

    /// The argument targets that would produce `output`, one vector per
    /// alternative. Variables that are new to the rule come from `fresh`.
    fn input_requirements(&self, output: &Term, fresh: &mut FreshVars) -> Vec<Vec<Term>>;

    /// Computes the output from a full vector of concrete arguments.
    /// `None` means the rule does not apply to these arguments.
    fn compute(&self, args: &[Fact]) -> Option<Fact>;

    /// Results for `target` that need no sub-goals. Only generators return any.
    fn direct_results(&self, _target: &Term) -> Vec<DirectResult> {
        Vec::new()
    }
}

/// Rule discovery: given a target, the candidate rules in priority order.
pub trait RuleProvider {
    fn rules_for(&self, target: &Term) -> Vec<RuleRef>;
}

/// A fixed list of rules, offered in insertion order to every target they
/// may produce.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<RuleRef>,
}

impl RuleSet {
    pub fn new(rules: Vec<RuleRef>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: RuleRef) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[RuleRef] {
        &self.rules
    }
}

impl RuleProvider for RuleSet {
    fn rules_for(&self, target: &Term) -> Vec<RuleRef> {
        self.rules
            .iter()
            .filter(|r| r.may_produce(target))
            .cloned()
            .collect()
    }
}

/// A well-formed rule never returns an output with placeholder variables left in it.
pub(crate) fn validate_output(rule: &str, output: &Fact, args: &[Fact]) -> Result<()> {
    if output.term.is_ground() {
        Ok(())
    } else {
        Err(BitError::malformed_rule_output(
            rule,
            output.term.clone(),
            join_facts(args),
        ))
    }
}
