use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use serde::Serialize;

use super::{node::TargetRule, types::Derivation, BitRoot, NodeId};
use crate::{
    error::Result,
    middleware::{join_facts, Fact, RuleKind, Term},
    rules::{ArgProvider, RuleApplication},
};

/// One rule application in a justification trail.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanStep {
    pub node: NodeId,
    pub rule: String,
    pub inputs: Vec<Fact>,
    pub output: Fact,
}

/// The steps that derived a result, premises before conclusions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Plan {
    pub conclusion: Fact,
    pub steps: Vec<PlanStep>,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.conclusion)?;
        for (i, step) in self.steps.iter().enumerate() {
            if step.inputs.is_empty() {
                writeln!(f, "  {}. {} {}: {}", i + 1, step.node, step.rule, step.output)?;
            } else {
                writeln!(
                    f,
                    "  {}. {} {}: {} => {}",
                    i + 1,
                    step.node,
                    step.rule,
                    join_facts(&step.inputs),
                    step.output
                )?;
            }
        }
        Ok(())
    }
}

impl BitRoot {
    /// Derivations below the top node that led to `term`, in post-order.
    fn derivation_order(&self, term: &Term) -> Option<Vec<(NodeId, &Derivation)>> {
        let root = self.nodes[self.top.0].derivation(term)?;
        let mut order = Vec::new();
        let mut done = BTreeSet::new();
        let mut stack = Vec::new();
        self.push_premises(root, &mut stack);
        while let Some((id, d, visited)) = stack.pop() {
            let key = (id, d.fact.term.clone());
            if visited {
                if done.insert(key) {
                    order.push((id, d));
                }
                continue;
            }
            if done.contains(&key) {
                continue;
            }
            stack.push((id, d, true));
            self.push_premises(d, &mut stack);
        }
        Some(order)
    }

    fn push_premises<'a>(&'a self, d: &Derivation, stack: &mut Vec<(NodeId, &'a Derivation, bool)>) {
        for p in d.premises.iter().rev() {
            if let Some(pd) = self.nodes[p.source.0].derivation(&p.fact.term) {
                stack.push((p.source, pd, false));
            }
        }
    }

    /// The justification trail for a result of the top node.
    pub fn extract_plan(&self, term: &Term) -> Option<Plan> {
        let conclusion = self.nodes[self.top.0].derivation(term)?.fact.clone();
        let steps = self
            .derivation_order(term)?
            .into_iter()
            .map(|(id, d)| PlanStep {
                node: id,
                rule: self.nodes[id.0].rule.name().to_string(),
                inputs: d.premises.iter().map(|p| p.fact.clone()).collect(),
                output: d.fact.clone(),
            })
            .collect();
        Some(Plan { conclusion, steps })
    }

    /// The derivation of `term` as a fully bound rule application whose
    /// `compute()` reproduces the value. Generator results become concrete
    /// arguments.
    pub fn pathway(&self, term: &Term) -> Result<Option<RuleApplication>> {
        let Some(order) = self.derivation_order(term) else {
            return Ok(None);
        };
        let mut built: BTreeMap<(NodeId, Term), ArgProvider> = BTreeMap::new();
        for (id, d) in order {
            let node = &self.nodes[id.0];
            let provider = if node.kind == RuleKind::Generator {
                ArgProvider::Value(d.fact.clone())
            } else {
                let mut app = RuleApplication::new(node.rule.clone());
                for (slot, p) in d.premises.iter().enumerate() {
                    let arg = built
                        .get(&(p.source, p.fact.term.clone()))
                        .cloned()
                        .unwrap_or_else(|| ArgProvider::Value(p.fact.clone()));
                    app.bind(slot, arg)?;
                }
                ArgProvider::Pathway(Box::new(app))
            };
            built.insert((id, d.fact.term.clone()), provider);
        }

        let root = self.nodes[self.top.0].derivation(term);
        let Some(premise) = root.and_then(|d| d.premises.first()) else {
            return Ok(None);
        };
        match built.remove(&(premise.source, premise.fact.term.clone())) {
            Some(ArgProvider::Pathway(app)) => Ok(Some(*app)),
            Some(ArgProvider::Value(fact)) => {
                let mut app = RuleApplication::new(Arc::new(TargetRule));
                app.bind(0, ArgProvider::Value(fact))?;
                Ok(Some(app))
            }
            None => Ok(None),
        }
    }
}
