//! Template cache: nodes are looked up by rule name and the alpha-canonical
//! form of their (target, arguments) tuple, so structurally equal goals share
//! one subtree.

use std::collections::BTreeMap;

use super::{BitRoot, NodeId};
use crate::middleware::{BindingMap, Term};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TemplateKey {
    pub rule: String,
    pub shape: Term,
}

impl TemplateKey {
    pub fn new(rule: &str, tuple: &Term) -> Self {
        Self {
            rule: rule.to_string(),
            shape: tuple.canonicalize().0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TemplateCache {
    exact: BTreeMap<TemplateKey, Vec<NodeId>>,
    by_rule: BTreeMap<String, Vec<NodeId>>,
}

impl TemplateCache {
    pub fn insert(&mut self, key: TemplateKey, node: NodeId) {
        self.by_rule.entry(key.rule.clone()).or_default().push(node);
        self.exact.entry(key).or_default().push(node);
    }

    /// Nodes worth trying for `key`: alpha-variants first, then every other
    /// node of the same rule in creation order.
    pub fn candidates(&self, key: &TemplateKey) -> Vec<NodeId> {
        let mut out = self.exact.get(key).cloned().unwrap_or_default();
        if let Some(same_rule) = self.by_rule.get(&key.rule) {
            let rest: Vec<NodeId> = same_rule
                .iter()
                .copied()
                .filter(|n| !out.contains(n))
                .collect();
            out.extend(rest);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.by_rule.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rule.is_empty()
    }
}

impl BitRoot {
    /// Link bindings for reusing `template` where `tuple` was requested, if
    /// the template is general enough. The template's target variables may be
    /// specialized; its argument-only variables must stay a renaming.
    /// `placeholders` are folded in so generalized constants show in the link.
    pub(crate) fn template_link(
        &self,
        template: NodeId,
        tuple: &Term,
        placeholders: &BindingMap,
    ) -> Option<BindingMap> {
        let node = self.nodes.get(template.0)?;
        let m = node.bound_tuple().match_term(tuple, &BindingMap::new())?;
        let target_vars = node.bound_target.var_set();
        let requested_target_vars = tuple.args().first()?.var_set();
        let args_only = m.restrict(|v| !target_vars.contains(v));
        if !args_only.is_renaming()
            || args_only
                .iter()
                .any(|(_, t)| t.as_var().is_some_and(|v| requested_target_vars.contains(v)))
        {
            return None;
        }
        Some(
            m.compose(placeholders)
                .restrict(|v| target_vars.contains(v))
                .without_identities(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse_term;

    fn tuple(items: &[&str]) -> Term {
        Term::tuple(items.iter().map(|s| parse_term(s).unwrap()).collect())
    }

    #[test]
    fn test_alpha_variants_share_a_key() {
        let a = TemplateKey::new("r", &tuple(&["P(?X)", "Q(?X, ?Y)"]));
        let b = TemplateKey::new("r", &tuple(&["P(?A)", "Q(?A, ?B)"]));
        let c = TemplateKey::new("s", &tuple(&["P(?A)", "Q(?A, ?B)"]));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut cache = TemplateCache::default();
        cache.insert(a.clone(), NodeId(3));
        let other = TemplateKey::new("r", &tuple(&["P(?X)", "Q(?X, b)"]));
        cache.insert(other.clone(), NodeId(5));
        assert_eq!(cache.candidates(&b), vec![NodeId(3), NodeId(5)]);
        assert_eq!(cache.candidates(&other), vec![NodeId(5), NodeId(3)]);
        assert!(cache.candidates(&c).is_empty());
        assert_eq!(cache.len(), 2);
    }
}
