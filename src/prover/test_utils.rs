use std::sync::Arc;

use super::{BitConfig, BitRoot, InferenceMetrics, MetricsLevel};
use crate::{
    lang::{parse_program, parse_term},
    middleware::{
        BindingMap, DirectResult, Fact, FreshVars, Rule, RuleKind, RuleRef, RuleSet, Term,
        Variable,
    },
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn term(s: &str) -> Term {
    parse_term(s).unwrap()
}

/// A tree for `query` over the knowledge base in `source`.
pub fn tree(source: &str, query: &str) -> BitRoot {
    tree_with_config(source, query, BitConfig::default())
}

pub fn tree_with_config(source: &str, query: &str, config: BitConfig) -> BitRoot {
    init_logger();
    let program = parse_program(source).unwrap();
    BitRoot::with_config(term(query), program.rule_set(), config)
}

pub fn counting() -> InferenceMetrics {
    InferenceMetrics::new(MetricsLevel::Counts)
}

/// Runs `budget` expansions with no abort threshold.
pub fn run(root: &mut BitRoot, budget: usize, metrics: &mut InferenceMetrics) -> Vec<Term> {
    root.infer(budget, 0.0, 2.0, metrics)
        .results
        .into_keys()
        .collect()
}

/// A composer that claims two inputs but only ever asks for one.
#[derive(Debug)]
pub struct BrokenArity;

impl Rule for BrokenArity {
    fn name(&self) -> &str {
        "broken_arity"
    }

    fn arity(&self) -> usize {
        2
    }

    fn input_requirements(&self, output: &Term, _fresh: &mut FreshVars) -> Vec<Vec<Term>> {
        vec![vec![output.clone()]]
    }

    fn compute(&self, _args: &[Fact]) -> Option<Fact> {
        None
    }
}

/// Provider with the fact lookup and Horn rules of `source` plus `extra`.
pub fn rules_with(source: &str, extra: RuleRef) -> RuleSet {
    let mut rules = parse_program(source).unwrap().rule_set();
    rules.push(extra);
    rules
}

pub fn broken_arity() -> RuleRef {
    Arc::new(BrokenArity)
}

/// A generator for `Q(?X)` whose second answer comes with a binding that
/// contradicts the value.
#[derive(Debug)]
pub struct Misreporting;

impl Rule for Misreporting {
    fn name(&self) -> &str {
        "misreporting"
    }

    fn arity(&self) -> usize {
        0
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Generator
    }

    fn input_requirements(&self, _output: &Term, _fresh: &mut FreshVars) -> Vec<Vec<Term>> {
        Vec::new()
    }

    fn compute(&self, _args: &[Fact]) -> Option<Fact> {
        None
    }

    fn direct_results(&self, _target: &Term) -> Vec<DirectResult> {
        let x = Variable::new("X");
        vec![
            DirectResult {
                fact: Fact::certain(term("Q(a)")),
                bindings: BindingMap::singleton(x.clone(), term("a")),
            },
            DirectResult {
                fact: Fact::certain(term("Q(c)")),
                bindings: BindingMap::singleton(x, term("b")),
            },
        ]
    }
}
