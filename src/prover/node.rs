use std::collections::{BTreeMap, BTreeSet};

use super::types::{Derivation, NodeId, NodeState, ParametrizedNode, ParentLink, SlotResult};
use crate::middleware::{BindingMap, Fact, FreshVars, Rule, RuleKind, RuleRef, Term};

/// One argument position of a node's rule: the candidate subtrees that could
/// fill it and the values they have produced so far.
#[derive(Clone, Debug, Default)]
pub struct ArgSlot {
    pub children: BTreeSet<ParametrizedNode>,
    pub results: BTreeSet<SlotResult>,
}

/// A partially expanded inference goal: a target, the rule tried on it and
/// one argument slot per rule input.
#[derive(Clone, Debug)]
pub struct BitNode {
    pub(crate) id: NodeId,
    pub(crate) raw_target: Term,
    pub(crate) raw_args: Vec<Term>,
    pub(crate) pre_bindings: BindingMap,
    pub(crate) bound_target: Term,
    pub(crate) bound_args: Vec<Term>,
    pub(crate) rule: RuleRef,
    pub(crate) kind: RuleKind,
    pub(crate) slots: Vec<ArgSlot>,
    pub(crate) direct_results: BTreeSet<Fact>,
    pub(crate) results: BTreeMap<Term, Derivation>,
    pub(crate) parents: BTreeSet<ParentLink>,
    pub(crate) depth: usize,
    pub(crate) state: NodeState,
    pub(crate) my_bdrum: f32,
    free_vars: usize,
}

impl BitNode {
    pub(crate) fn new(
        id: NodeId,
        rule: RuleRef,
        raw_target: Term,
        raw_args: Vec<Term>,
        pre_bindings: BindingMap,
        depth: usize,
    ) -> Self {
        let bound_target = raw_target.substitute(&pre_bindings);
        let bound_args: Vec<Term> = raw_args.iter().map(|a| a.substitute(&pre_bindings)).collect();
        let free_vars = bound_target.free_variable_count();
        Self {
            id,
            raw_target,
            slots: vec![ArgSlot::default(); raw_args.len()],
            raw_args,
            pre_bindings,
            bound_target,
            bound_args,
            kind: rule.kind(),
            rule,
            direct_results: BTreeSet::new(),
            results: BTreeMap::new(),
            parents: BTreeSet::new(),
            depth,
            state: NodeState::Dummy,
            my_bdrum: 0.0,
            free_vars,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn rule(&self) -> &RuleRef {
        &self.rule
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn raw_target(&self) -> &Term {
        &self.raw_target
    }

    pub fn target(&self) -> &Term {
        &self.bound_target
    }

    pub fn args(&self) -> &[Term] {
        &self.bound_args
    }

    pub fn pre_bindings(&self) -> &BindingMap {
        &self.pre_bindings
    }

    pub fn slots(&self) -> &[ArgSlot] {
        &self.slots
    }

    pub fn direct_results(&self) -> &BTreeSet<Fact> {
        &self.direct_results
    }

    pub fn results(&self) -> impl Iterator<Item = &Derivation> {
        self.results.values()
    }

    pub fn derivation(&self, term: &Term) -> Option<&Derivation> {
        self.results.get(term)
    }

    pub fn parents(&self) -> &BTreeSet<ParentLink> {
        &self.parents
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn bdrum(&self) -> f32 {
        self.my_bdrum
    }

    /// Pool priority: `(1 + bdrum) / (1 + free variables of the bound target)`.
    pub fn fitness(&self) -> f32 {
        (1.0 + self.my_bdrum) / (1.0 + self.free_vars as f32)
    }

    /// Tuple of the bound target and arguments, the shape recycling compares.
    pub(crate) fn bound_tuple(&self) -> Term {
        Term::tuple(
            std::iter::once(self.bound_target.clone())
                .chain(self.bound_args.iter().cloned())
                .collect(),
        )
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.state == NodeState::Exhausted
    }
}

/// The rule of the top node: its single argument is the query itself.
#[derive(Debug)]
pub(crate) struct TargetRule;

impl Rule for TargetRule {
    fn name(&self) -> &str {
        "target"
    }

    fn arity(&self) -> usize {
        1
    }

    fn input_requirements(&self, output: &Term, _fresh: &mut FreshVars) -> Vec<Vec<Term>> {
        vec![vec![output.clone()]]
    }

    fn compute(&self, args: &[Fact]) -> Option<Fact> {
        match args {
            [fact] => Some(fact.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::lang::parse_term;

    #[test]
    fn test_fitness_prefers_ground_targets() {
        let rule: RuleRef = Arc::new(TargetRule);
        let open = parse_term("P(?X, ?Y)").unwrap();
        let mut general = BitNode::new(
            NodeId(0),
            rule.clone(),
            open.clone(),
            vec![open.clone()],
            BindingMap::new(),
            0,
        );
        let pre = BindingMap::singleton(crate::middleware::Variable::new("X"), Term::sym("a"));
        let special = BitNode::new(NodeId(1), rule, open.clone(), vec![open], pre, 0);
        assert_eq!(special.target(), &parse_term("P(a, ?Y)").unwrap());
        assert!(special.fitness() > general.fitness());
        general.my_bdrum = 1.0;
        assert!(general.fitness() > special.fitness());
        assert_eq!(general.slots().len(), 1);
    }
}
