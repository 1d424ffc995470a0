//! The backward-chaining inference tree.
//!
//! A [`BitRoot`] owns every node in an arena and drives best-first expansion:
//! each step picks the fittest node of the execution pool, asks the rule
//! provider which rules could produce each of its argument targets and creates
//! (or recycles) one child per rule. Results flow upwards through parent links
//! as soon as they become derivable.

pub mod evaluation;
pub mod expansion;
pub mod metrics;
pub mod node;
pub mod plan;
pub mod recycling;
pub mod types;
pub mod usage;
pub mod visualization;

#[cfg(test)]
pub mod test_utils;

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
    time::Instant,
};

use log::{debug, info};
pub use metrics::{Counter, InferenceMetrics, MetricsLevel};
pub use node::{ArgSlot, BitNode};
pub use plan::{Plan, PlanStep};
use recycling::TemplateCache;
use serde::Serialize;
pub use types::{
    BitConfig, Derivation, InferParams, NodeId, NodeState, ParametrizedNode, ParentLink,
    SlotResult, SpawnMode,
};
use usage::UsageGraph;

use crate::{
    error::{BitError, Result},
    middleware::{
        serialization::display_keyed_map, BindingMap, FreshVars, RuleProvider, Term, TruthValue,
        Variable,
    },
};

/// What one call to [`BitRoot::infer`] produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InferOutcome {
    #[serde(serialize_with = "display_keyed_map")]
    pub results: BTreeMap<Term, TruthValue>,
    pub remaining: usize,
    pub steps: usize,
    pub pool_exhausted: bool,
    pub aborted: bool,
}

pub struct BitRoot {
    pub(crate) nodes: Vec<BitNode>,
    top: NodeId,
    provider: Box<dyn RuleProvider>,
    config: BitConfig,
    pool: BTreeSet<NodeId>,
    templates: TemplateCache,
    usage: UsageGraph,
    var_owner: BTreeMap<Variable, BTreeSet<NodeId>>,
    fresh: FreshVars,
    results: BTreeMap<Term, TruthValue>,
    sources: BTreeMap<Term, NodeId>,
    spawned: BTreeSet<(NodeId, BindingMap)>,
    deferred: BTreeMap<(NodeId, Variable), VecDeque<(BindingMap, f32)>>,
    active_spawn: BTreeMap<(NodeId, Variable), NodeId>,
}

impl BitRoot {
    pub fn new(target: Term, provider: impl RuleProvider + 'static) -> Self {
        Self::with_config(target, provider, BitConfig::default())
    }

    pub fn with_config(target: Term, provider: impl RuleProvider + 'static, config: BitConfig) -> Self {
        let top = NodeId(0);
        let node = BitNode::new(
            top,
            Arc::new(node::TargetRule),
            target.clone(),
            vec![target.clone()],
            BindingMap::new(),
            0,
        );
        let var_owner = target
            .vars()
            .into_iter()
            .map(|v| (v, BTreeSet::from([top])))
            .collect();
        Self {
            nodes: vec![node],
            top,
            provider: Box::new(provider),
            config,
            pool: BTreeSet::new(),
            templates: TemplateCache::default(),
            usage: UsageGraph::default(),
            var_owner,
            fresh: FreshVars::default(),
            results: BTreeMap::new(),
            sources: BTreeMap::new(),
            spawned: BTreeSet::new(),
            deferred: BTreeMap::new(),
            active_spawn: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &BitConfig {
        &self.config
    }

    /// Best-first expansion until the budget is spent, the pool runs dry or a
    /// stored result reaches `min_confidence_to_abort`. One budget unit per
    /// expansion. Can be called again to continue with a fresh budget.
    pub fn infer(
        &mut self,
        budget: usize,
        min_confidence_to_store: f32,
        min_confidence_to_abort: f32,
        metrics: &mut InferenceMetrics,
    ) -> InferOutcome {
        let start = Instant::now();
        info!(
            "infer {} with budget {}",
            self.nodes[self.top.0].target(),
            budget
        );
        self.create(self.top, metrics);

        let mut remaining = budget;
        let mut steps = 0;
        let mut pool_exhausted = false;
        let mut aborted = false;
        loop {
            self.collect_results(min_confidence_to_store);
            if self
                .results
                .values()
                .any(|tv| tv.confidence >= min_confidence_to_abort)
            {
                aborted = true;
                break;
            }
            if remaining == 0 {
                break;
            }
            self.release_deferred_spawns(metrics);
            let Some(id) = self.fittest() else {
                pool_exhausted = true;
                break;
            };
            self.expand(id, metrics);
            remaining -= 1;
            steps += 1;
        }

        metrics.add_elapsed(start.elapsed());
        info!(
            "infer finished after {} steps: {} results, {} nodes, {} pooled",
            steps,
            self.results.len(),
            self.nodes.len(),
            self.pool.len()
        );
        InferOutcome {
            results: self.results.clone(),
            remaining,
            steps,
            pool_exhausted,
            aborted,
        }
    }

    pub fn infer_with(&mut self, params: &InferParams, metrics: &mut InferenceMetrics) -> InferOutcome {
        self.infer(
            params.budget,
            params.min_confidence_to_store,
            params.min_confidence_to_abort,
            metrics,
        )
    }

    fn collect_results(&mut self, min_confidence_to_store: f32) {
        for d in self.nodes[self.top.0].results() {
            if d.fact.tv.confidence < min_confidence_to_store {
                continue;
            }
            let stored = self
                .results
                .entry(d.fact.term.clone())
                .or_insert(d.fact.tv);
            if *stored < d.fact.tv {
                *stored = d.fact.tv;
            }
        }
    }

    /// The pool node with the highest fitness; the lower id on ties.
    pub fn fittest(&self) -> Option<NodeId> {
        self.pool.iter().copied().max_by(|a, b| {
            self.nodes[a.0]
                .fitness()
                .total_cmp(&self.nodes[b.0].fitness())
                .then(b.cmp(a))
        })
    }

    /// Breadth-first alternative to [`BitRoot::fittest`]: expands every pooled
    /// node of the shallowest depth present in the pool, ignoring fitness.
    /// Nodes created on the way wait for the next level. Returns the number
    /// of expansions.
    pub fn expand_next_level(&mut self, metrics: &mut InferenceMetrics) -> usize {
        self.create(self.top, metrics);
        self.release_deferred_spawns(metrics);
        let Some(depth) = self.pool.iter().map(|id| self.nodes[id.0].depth).min() else {
            return 0;
        };
        let level: Vec<NodeId> = self
            .pool
            .iter()
            .copied()
            .filter(|id| self.nodes[id.0].depth == depth)
            .collect();
        debug!("expanding level {} ({} nodes)", depth, level.len());
        level
            .into_iter()
            .filter(|id| self.expand(*id, metrics))
            .count()
    }

    pub fn results(&self) -> &BTreeMap<Term, TruthValue> {
        &self.results
    }

    pub fn top(&self) -> NodeId {
        self.top
    }

    pub fn node(&self, id: NodeId) -> Option<&BitNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[BitNode] {
        &self.nodes
    }

    pub fn pool(&self) -> &BTreeSet<NodeId> {
        &self.pool
    }

    pub fn users_of(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.usage.users_of(id).cloned().unwrap_or_default()
    }

    /// Nodes that own `var`, i.e. introduced it.
    pub fn owners_of(&self, var: &Variable) -> BTreeSet<NodeId> {
        self.var_owner.get(var).cloned().unwrap_or_default()
    }

    /// The node that first derived `term`.
    pub fn source_of(&self, term: &Term) -> Option<NodeId> {
        self.sources.get(term).copied()
    }

    /// Whether `ancestor` is reachable from `id` by following parent links.
    pub fn has_ancestor(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut seen = BTreeSet::new();
        let mut worklist: Vec<NodeId> = match self.nodes.get(id.0) {
            Some(n) => n.parents.iter().map(|l| l.parent).collect(),
            None => return false,
        };
        while let Some(n) = worklist.pop() {
            if n == ancestor {
                return true;
            }
            if seen.insert(n) {
                worklist.extend(self.nodes[n.0].parents.iter().map(|l| l.parent));
            }
        }
        false
    }

    /// Fails with the first node found to be its own ancestor.
    pub fn loop_check(&self) -> Result<()> {
        for node in &self.nodes {
            if self.has_ancestor(node.id, node.id) {
                return Err(BitError::cycle(node.id));
            }
        }
        Ok(())
    }

    /// Checks that parent links and slot entries mirror each other.
    pub fn check_links(&self) -> Result<()> {
        for child in &self.nodes {
            for link in &child.parents {
                let parent = self
                    .nodes
                    .get(link.parent.0)
                    .ok_or_else(|| BitError::unknown_node(link.parent))?;
                let listed = parent
                    .slots
                    .get(link.slot)
                    .is_some_and(|s| s.children.contains(&link.child_entry(child.id)));
                if !listed {
                    return Err(BitError::broken_link(child.id, link.parent, link.slot));
                }
            }
        }
        for parent in &self.nodes {
            for (slot, s) in parent.slots.iter().enumerate() {
                for entry in &s.children {
                    let child = self
                        .nodes
                        .get(entry.node.0)
                        .ok_or_else(|| BitError::unknown_node(entry.node))?;
                    let link = ParentLink {
                        parent: parent.id,
                        slot,
                        bindings: entry.bindings.clone(),
                    };
                    if !child.parents.contains(&link) {
                        return Err(BitError::broken_link(entry.node, parent.id, slot));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn total_children(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.slots.iter())
            .map(|s| s.children.len())
            .sum()
    }

    fn raise_bdrum(&mut self, id: NodeId, value: f32) {
        let mut worklist = vec![id];
        while let Some(n) = worklist.pop() {
            let node = &mut self.nodes[n.0];
            if value > node.my_bdrum {
                node.my_bdrum = value;
                worklist.extend(node.parents.iter().map(|l| l.parent));
            }
        }
    }

    /// Marks expanded nodes whose children are all exhausted, walking upwards.
    fn refresh_exhaustion(&mut self, id: NodeId) {
        let mut worklist = vec![id];
        while let Some(n) = worklist.pop() {
            let node = &self.nodes[n.0];
            if node.state != NodeState::Expanded {
                continue;
            }
            let done = node
                .slots
                .iter()
                .flat_map(|s| s.children.iter())
                .all(|c| self.nodes[c.node.0].is_exhausted());
            if done {
                debug!("{} exhausted", n);
                let node = &mut self.nodes[n.0];
                node.state = NodeState::Exhausted;
                worklist.extend(node.parents.iter().map(|l| l.parent));
            }
        }
    }

    /// An exhausted node that gains a live child is live again, and so are
    /// its exhausted ancestors.
    fn reopen(&mut self, id: NodeId) {
        let mut worklist = vec![id];
        while let Some(n) = worklist.pop() {
            let node = &mut self.nodes[n.0];
            if node.state == NodeState::Exhausted && !node.slots.is_empty() {
                node.state = NodeState::Expanded;
                worklist.extend(node.parents.iter().map(|l| l.parent));
            }
        }
    }
}
