//! Result propagation. A new value in an argument slot is combined with the
//! values already present in the other slots; every combination with
//! consistent bindings is computed, checked, recorded and lifted into the
//! parents' slots. Propagation runs on a FIFO worklist.

use std::collections::VecDeque;

use itertools::Itertools;
use log::{trace, warn};

use super::{
    metrics::Counter,
    types::{Derivation, SlotResult},
    BitRoot, InferenceMetrics, NodeId,
};
use crate::middleware::{rule::validate_output, BindingMap, Fact};

pub(crate) type Pending = VecDeque<(NodeId, usize, SlotResult)>;

impl BitRoot {
    pub(crate) fn record_and_propagate(
        &mut self,
        id: NodeId,
        derivation: Derivation,
        metrics: &mut InferenceMetrics,
    ) {
        let mut pending = Pending::new();
        self.record(id, derivation, &mut pending, metrics);
        self.drain(pending, metrics);
    }

    pub(crate) fn drain(&mut self, mut pending: Pending, metrics: &mut InferenceMetrics) {
        while let Some((id, slot, result)) = pending.pop_front() {
            self.evaluate(id, slot, &result, &mut pending, metrics);
        }
    }

    /// Applies the node's rule to every argument tuple that uses `new_result`
    /// in `slot` and already available results elsewhere.
    pub(crate) fn evaluate(
        &mut self,
        id: NodeId,
        slot: usize,
        new_result: &SlotResult,
        pending: &mut Pending,
        metrics: &mut InferenceMetrics,
    ) {
        let node = &self.nodes[id.0];
        if !node.rule.is_computable() {
            return;
        }
        let candidates: Vec<Vec<&SlotResult>> = node
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if i == slot {
                    vec![new_result]
                } else {
                    s.results.iter().collect()
                }
            })
            .collect();
        if candidates.iter().any(Vec::is_empty) {
            return;
        }
        let rule = node.rule.clone();
        let target = node.bound_target.clone();
        let target_vars = target.var_set();

        let mut derived = Vec::new();
        for combo in candidates
            .iter()
            .map(|c| c.iter().copied())
            .multi_cartesian_product()
        {
            let union = match combo
                .iter()
                .try_fold(BindingMap::new(), |acc, r| acc.union(&r.bindings))
            {
                Ok(union) => union,
                Err(conflict) => {
                    trace!("{}: skipping combination, {}", id, conflict);
                    metrics.count(Counter::BindingConflicts);
                    continue;
                }
            };
            let args: Vec<Fact> = combo.iter().map(|r| r.fact.clone()).collect();
            let Some(output) = rule.compute(&args) else {
                continue;
            };
            if let Err(e) = validate_output(rule.name(), &output, &args) {
                warn!("{}: {}", id, e);
                metrics.count(Counter::MalformedResults);
                continue;
            }
            let Some(rest) = target
                .substitute(&union)
                .match_term(&output.term, &BindingMap::new())
            else {
                trace!("{}: {} does not fit {}", id, output.term, target);
                continue;
            };
            let Ok(bindings) = union.union(&rest) else {
                continue;
            };
            derived.push(Derivation {
                fact: output,
                bindings: bindings.restrict(|v| target_vars.contains(v)),
                premises: combo.into_iter().cloned().collect(),
            });
        }
        for d in derived {
            self.record(id, d, pending, metrics);
        }
    }

    /// Stores a result unless the node already has it with at least the same
    /// truth value, then lifts it to every parent.
    fn record(
        &mut self,
        id: NodeId,
        derivation: Derivation,
        pending: &mut Pending,
        metrics: &mut InferenceMetrics,
    ) {
        let top = self.top;
        let node = &mut self.nodes[id.0];
        let term = derivation.fact.term.clone();
        if let Some(existing) = node.results.get(&term) {
            if existing.fact.tv >= derivation.fact.tv {
                return;
            }
        }
        let fact = derivation.fact.clone();
        let derived = !derivation.premises.is_empty();
        let first = node.results.insert(term.clone(), derivation).is_none();
        let links: Vec<_> = node.parents.iter().cloned().collect();
        trace!("{} has {}", id, fact);
        if first {
            if derived {
                metrics.count(Counter::DerivedResults);
            }
            metrics.node_result(id, &term);
            if id != top {
                self.sources.entry(term).or_insert(id);
            }
        }
        for link in links {
            self.lift(id, link.parent, link.slot, &fact, pending);
        }
    }

    /// Offers a child's value to one slot of a parent.
    pub(crate) fn lift(
        &mut self,
        child: NodeId,
        parent: NodeId,
        slot: usize,
        fact: &Fact,
        pending: &mut Pending,
    ) {
        let node = &mut self.nodes[parent.0];
        let Some(bindings) = node.bound_args[slot].match_term(&fact.term, &BindingMap::new())
        else {
            trace!("{} slot {}: {} from {} does not fit", parent, slot, fact.term, child);
            return;
        };
        let result = SlotResult {
            fact: fact.clone(),
            bindings,
            source: child,
        };
        if node.slots[slot].results.insert(result.clone()) {
            pending.push_back((parent, slot, result));
        }
    }
}
