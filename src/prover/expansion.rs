//! Node creation, expansion, direct results and specialized clones.

use std::collections::{BTreeSet, VecDeque};

use log::{debug, warn};

use super::{
    metrics::Counter,
    node::BitNode,
    recycling::TemplateKey,
    types::{Derivation, NodeState, ParentLink},
    BitRoot, InferenceMetrics, NodeId, ParametrizedNode, SpawnMode,
};
use crate::{
    error::{BitError, InnerError, Result},
    middleware::{
        rule::validate_output, BindingMap, DirectResult, RuleKind, RuleRef, Term, Variable,
    },
};

impl BitRoot {
    /// Finishes construction of a dummy node: generators and zero-argument
    /// rules produce their direct results right away and are exhausted,
    /// everything else enters the pool. Returns false if the node was
    /// already created.
    pub fn create(&mut self, id: NodeId, metrics: &mut InferenceMetrics) -> bool {
        let Some(node) = self.nodes.get(id.0) else {
            return false;
        };
        if node.state != NodeState::Dummy {
            return false;
        }
        let rule = node.rule.clone();
        let target = node.bound_target.clone();
        let arity = node.slots.len();
        let kind = node.kind;
        self.nodes[id.0].state = NodeState::Created;
        metrics.count(Counter::NodesCreated);
        debug!("created {} {} via {}", id, target, rule.name());

        match kind {
            RuleKind::Generator => {
                let found = rule.direct_results(&target);
                self.nodes[id.0].state = NodeState::Exhausted;
                self.add_direct_result(id, found, self.config.spawn_mode, metrics);
            }
            RuleKind::Composer if arity == 0 => {
                self.nodes[id.0].state = NodeState::Exhausted;
                if rule.is_computable() {
                    if let Some(fact) = rule.compute(&[]) {
                        let found = vec![DirectResult {
                            fact,
                            bindings: BindingMap::new(),
                        }];
                        self.add_direct_result(id, found, self.config.spawn_mode, metrics);
                    }
                }
            }
            RuleKind::Composer => {
                self.pool.insert(id);
            }
        }
        if self.nodes[id.0].is_exhausted() {
            let parents: Vec<NodeId> = self.nodes[id.0].parents.iter().map(|l| l.parent).collect();
            for p in parents {
                self.refresh_exhaustion(p);
            }
        }
        true
    }

    /// Expands a created node: for every argument slot, asks the provider for
    /// the rules that could produce the slot's target and creates or recycles
    /// one child per rule and requirement set. A no-op returning false for
    /// nodes that are not in the created state.
    pub fn expand(&mut self, id: NodeId, metrics: &mut InferenceMetrics) -> bool {
        let Some(node) = self.nodes.get(id.0) else {
            return false;
        };
        if node.state != NodeState::Created {
            return false;
        }
        let depth = node.depth;
        let args = node.bound_args.clone();
        debug!("expanding {} {} via {}", id, node.bound_target, node.rule.name());
        self.pool.remove(&id);
        self.nodes[id.0].state = NodeState::Expanded;
        metrics.count(Counter::Expansions);

        for (slot, arg) in args.iter().enumerate() {
            if depth + 1 > self.config.max_depth {
                debug!("{} slot {}: depth limit {} reached", id, slot, self.config.max_depth);
                metrics.count(Counter::DepthCutoffs);
                continue;
            }
            for rule in self.provider.rules_for(arg) {
                self.expand_rule(id, slot, &rule, arg, metrics);
            }
        }
        self.refresh_exhaustion(id);
        true
    }

    fn expand_rule(
        &mut self,
        parent: NodeId,
        slot: usize,
        rule: &RuleRef,
        arg: &Term,
        metrics: &mut InferenceMetrics,
    ) {
        let attempts = match rule.kind() {
            RuleKind::Generator => vec![(arg.clone(), Vec::new(), BindingMap::new())],
            RuleKind::Composer => {
                let (target, placeholders) = if self.config.generalize_constants {
                    arg.generalize_constants(&mut self.fresh)
                } else {
                    (arg.clone(), BindingMap::new())
                };
                rule.input_requirements(&target, &mut self.fresh)
                    .into_iter()
                    .map(|reqs| (target.clone(), reqs, placeholders.clone()))
                    .collect()
            }
        };
        for (target, reqs, placeholders) in attempts {
            if let Err(e) = self.create_child(parent, slot, rule, target, reqs, &placeholders, metrics)
            {
                if let Some(InnerError::ArityMismatch { .. }) = e.inner() {
                    metrics.count(Counter::ArityMismatches);
                }
                warn!("{} slot {}: {}", parent, slot, e);
            }
        }
    }

    /// Adds a child for `rule` on `target` with argument targets `args` under
    /// `parent`. An existing node is reused when it is general enough and the
    /// new edge keeps the tree acyclic; otherwise a fresh node is created.
    pub(crate) fn create_child(
        &mut self,
        parent: NodeId,
        slot: usize,
        rule: &RuleRef,
        target: Term,
        args: Vec<Term>,
        placeholders: &BindingMap,
        metrics: &mut InferenceMetrics,
    ) -> Result<NodeId> {
        if args.len() != rule.arity() {
            return Err(BitError::arity_mismatch(rule.name(), rule.arity(), args.len()));
        }
        let tuple = Term::tuple(
            std::iter::once(target.clone())
                .chain(args.iter().cloned())
                .collect(),
        );
        let key = TemplateKey::new(rule.name(), &tuple);
        for candidate in self.templates.candidates(&key) {
            let Some(bindings) = self.template_link(candidate, &tuple, placeholders) else {
                continue;
            };
            if self.usage.would_cycle(parent, candidate) {
                debug!("not reusing {} under {}: cycle", candidate, parent);
                metrics.count(Counter::CycleRejections);
                continue;
            }
            debug!("reusing {} for {} under {} {}", candidate, target, parent, bindings);
            metrics.count(Counter::NodesRecycled);
            self.link(parent, slot, candidate, bindings, metrics);
            return Ok(candidate);
        }

        let id = NodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        let target_vars = target.var_set();
        let owned: BTreeSet<Variable> = args
            .iter()
            .flat_map(Term::vars)
            .filter(|v| !target_vars.contains(v))
            .collect();
        self.nodes.push(BitNode::new(
            id,
            rule.clone(),
            target,
            args,
            BindingMap::new(),
            depth,
        ));
        for v in owned {
            self.var_owner.entry(v).or_default().insert(id);
        }
        self.templates.insert(key, id);
        self.link(parent, slot, id, placeholders.without_identities(), metrics);
        self.create(id, metrics);
        Ok(id)
    }

    /// Lists `child` in `parent`'s slot and records the parent link and the
    /// usage edge. Results the child already has are replayed to the parent.
    pub(crate) fn link(
        &mut self,
        parent: NodeId,
        slot: usize,
        child: NodeId,
        bindings: BindingMap,
        metrics: &mut InferenceMetrics,
    ) {
        let entry = ParametrizedNode {
            node: child,
            bindings: bindings.clone(),
        };
        if !self.nodes[parent.0].slots[slot].children.insert(entry) {
            return;
        }
        self.nodes[child.0].parents.insert(ParentLink {
            parent,
            slot,
            bindings,
        });
        self.usage.add_edge(parent, child);

        let replay: Vec<_> = self.nodes[child.0]
            .results
            .values()
            .map(|d| d.fact.clone())
            .collect();
        let mut pending = VecDeque::new();
        for fact in &replay {
            self.lift(child, parent, slot, fact, &mut pending);
        }
        self.drain(pending, metrics);

        self.raise_bdrum(parent, self.nodes[child.0].my_bdrum);
        if !self.nodes[child.0].is_exhausted() {
            self.reopen(parent);
        }
    }

    /// Records values that satisfy the node's target without sub-goals.
    /// Bindings of variables introduced higher up additionally spawn clones
    /// of the introducing node with the binding applied.
    pub fn add_direct_result(
        &mut self,
        id: NodeId,
        results: Vec<DirectResult>,
        spawn_mode: SpawnMode,
        metrics: &mut InferenceMetrics,
    ) {
        let rule = self.nodes[id.0].rule.clone();
        let target = self.nodes[id.0].bound_target.clone();
        let target_vars = target.var_set();
        for DirectResult { fact, bindings } in results {
            if let Err(e) = validate_output(rule.name(), &fact, &[]) {
                warn!("{}: {}", id, e);
                metrics.count(Counter::MalformedResults);
                continue;
            }
            let Some(matched) = target.match_term(&fact.term, &BindingMap::new()) else {
                debug!("{}: {} does not fit {}", id, fact.term, target);
                continue;
            };
            // The rule's own bindings must agree with the value it produced.
            let claimed = bindings.restrict(|v| target_vars.contains(v));
            let bindings = match matched.union(&claimed) {
                Ok(bindings) => bindings,
                Err(e) => {
                    warn!("{}: {} from {}: {}", id, fact.term, rule.name(), e);
                    metrics.count(Counter::MalformedResults);
                    continue;
                }
            };
            if !self.nodes[id.0].direct_results.insert(fact.clone()) {
                continue;
            }
            metrics.count(Counter::DirectResults);
            self.raise_bdrum(id, fact.tv.confidence);
            let confidence = fact.tv.confidence;
            self.record_and_propagate(
                id,
                Derivation {
                    fact,
                    bindings: bindings.clone(),
                    premises: Vec::new(),
                },
                metrics,
            );
            for (var, value) in bindings.iter() {
                self.try_clone(id, var, value, confidence, spawn_mode, metrics);
            }
        }
    }

    /// Climbs parent links from `from` to the nodes that own `var` and asks
    /// for a clone of each with `var` bound to `value`. The top node is
    /// never cloned.
    pub(crate) fn try_clone(
        &mut self,
        from: NodeId,
        var: &Variable,
        value: &Term,
        confidence: f32,
        spawn_mode: SpawnMode,
        metrics: &mut InferenceMetrics,
    ) {
        let mut seen = BTreeSet::new();
        let mut owners = Vec::new();
        let mut worklist: VecDeque<(NodeId, Variable)> = self.nodes[from.0]
            .parents
            .iter()
            .filter_map(|l| translate(l, var).map(|v| (l.parent, v)))
            .collect();
        while let Some((n, v)) = worklist.pop_front() {
            if n == self.top || !seen.insert((n, v.clone())) {
                continue;
            }
            if self.var_owner.get(&v).is_some_and(|o| o.contains(&n)) {
                owners.push((n, v));
                continue;
            }
            let node = &self.nodes[n.0];
            if !node.bound_target.contains_var(&v) {
                continue;
            }
            worklist.extend(
                node.parents
                    .iter()
                    .filter_map(|l| translate(l, &v).map(|pv| (l.parent, pv))),
            );
        }
        for (owner, v) in owners {
            self.request_spawn(owner, v, value.clone(), confidence, spawn_mode, metrics);
        }
    }

    fn request_spawn(
        &mut self,
        owner: NodeId,
        var: Variable,
        value: Term,
        confidence: f32,
        spawn_mode: SpawnMode,
        metrics: &mut InferenceMetrics,
    ) {
        let current = &self.nodes[owner.0].pre_bindings;
        let Ok(pre) = current.union(&BindingMap::singleton(var.clone(), value)) else {
            return;
        };
        if pre == *current || !self.spawned.insert((owner, pre.clone())) {
            return;
        }
        match spawn_mode {
            SpawnMode::AllowSiblingSpawning => {
                self.spawn_clone(owner, pre, confidence, metrics);
            }
            SpawnMode::NoSiblingSpawning => {
                let key = (owner, var);
                if self.active_spawn.contains_key(&key) {
                    debug!("deferring clone of {} with {}", owner, pre);
                    metrics.count(Counter::DeferredSpawns);
                    self.deferred
                        .entry(key)
                        .or_default()
                        .push_back((pre, confidence));
                } else {
                    let clone = self.spawn_clone(owner, pre, confidence, metrics);
                    self.active_spawn.insert(key, clone);
                }
            }
        }
    }

    /// Creates a copy of `owner` with the given pre-bindings under all of
    /// `owner`'s parents.
    fn spawn_clone(
        &mut self,
        owner: NodeId,
        pre_bindings: BindingMap,
        confidence: f32,
        metrics: &mut InferenceMetrics,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let original = &self.nodes[owner.0];
        let mut clone = BitNode::new(
            id,
            original.rule.clone(),
            original.raw_target.clone(),
            original.raw_args.clone(),
            pre_bindings,
            original.depth,
        );
        clone.my_bdrum = confidence;
        let target_vars = clone.bound_target.var_set();
        let raw_target_vars = original.raw_target.var_set();
        let owned: BTreeSet<Variable> = original
            .raw_args
            .iter()
            .flat_map(Term::vars)
            .filter(|v| !raw_target_vars.contains(v) && !clone.pre_bindings.contains(v))
            .collect();
        let links: Vec<ParentLink> = original.parents.iter().cloned().collect();
        debug!(
            "spawning {} as clone of {} with {}",
            id, owner, clone.pre_bindings
        );
        let key = TemplateKey::new(clone.rule.name(), &clone.bound_tuple());
        self.nodes.push(clone);
        for v in owned {
            self.var_owner.entry(v).or_default().insert(id);
        }
        self.templates.insert(key, id);
        metrics.count(Counter::SpawnedClones);
        for link in links {
            let bindings = link.bindings.restrict(|v| target_vars.contains(v));
            self.link(link.parent, link.slot, id, bindings, metrics);
        }
        self.create(id, metrics);
        id
    }

    /// Releases the next deferred clone for every (owner, variable) whose
    /// pending clone has been expanded.
    pub(crate) fn release_deferred_spawns(&mut self, metrics: &mut InferenceMetrics) {
        let ready: Vec<(NodeId, Variable)> = self
            .active_spawn
            .iter()
            .filter(|(_, clone)| self.nodes[clone.0].state != NodeState::Created)
            .map(|(key, _)| key.clone())
            .collect();
        for key in ready {
            match self.deferred.get_mut(&key).and_then(VecDeque::pop_front) {
                Some((pre, confidence)) => {
                    let clone = self.spawn_clone(key.0, pre, confidence, metrics);
                    self.active_spawn.insert(key, clone);
                }
                None => {
                    self.active_spawn.remove(&key);
                }
            }
        }
    }
}

/// The name `var` has in the parent of `link`. `None` once the parent fixed
/// it to a non-variable term.
fn translate(link: &ParentLink, var: &Variable) -> Option<Variable> {
    match link.bindings.get(var) {
        Some(Term::Var(v)) => Some(v.clone()),
        Some(_) => None,
        None => Some(var.clone()),
    }
}
