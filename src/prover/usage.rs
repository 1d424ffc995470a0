//! Usage sets: for every node, the nodes that use it as a subtree, directly or
//! transitively. Sets are only ever extended, at edge-creation time.

use std::collections::{BTreeMap, BTreeSet};

use super::NodeId;

#[derive(Clone, Debug, Default)]
pub struct UsageGraph {
    users: BTreeMap<NodeId, BTreeSet<NodeId>>,
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl UsageGraph {
    pub fn users_of(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.users.get(&node)
    }

    pub fn is_user(&self, user: NodeId, node: NodeId) -> bool {
        self.users.get(&node).is_some_and(|u| u.contains(&user))
    }

    /// Whether making `child` a subtree of `parent` would make some node use itself.
    pub fn would_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        parent == child || self.is_user(child, parent)
    }

    /// Records `child` as a subtree of `parent`. `parent` and every user of
    /// `parent` become users of `child` and of everything below it.
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId) {
        if !self.children.entry(parent).or_default().insert(child) {
            return;
        }
        let mut additions = self.users.get(&parent).cloned().unwrap_or_default();
        additions.insert(parent);
        let mut worklist = vec![child];
        while let Some(n) = worklist.pop() {
            let users = self.users.entry(n).or_default();
            let before = users.len();
            users.extend(additions.iter().copied());
            if users.len() == before {
                // Everything below `n` already has these users.
                continue;
            }
            if let Some(below) = self.children.get(&n) {
                worklist.extend(below.iter().copied());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_propagate_downwards() {
        let mut g = UsageGraph::default();
        g.add_edge(NodeId(1), NodeId(2));
        g.add_edge(NodeId(2), NodeId(3));
        g.add_edge(NodeId(0), NodeId(1));
        let users: Vec<_> = g.users_of(NodeId(3)).unwrap().iter().copied().collect();
        assert_eq!(users, vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert!(g.would_cycle(NodeId(3), NodeId(0)));
        assert!(g.would_cycle(NodeId(2), NodeId(2)));
        assert!(!g.would_cycle(NodeId(0), NodeId(3)));
    }

    #[test]
    fn test_shared_child_collects_both_users() {
        let mut g = UsageGraph::default();
        g.add_edge(NodeId(0), NodeId(1));
        g.add_edge(NodeId(0), NodeId(2));
        g.add_edge(NodeId(1), NodeId(3));
        g.add_edge(NodeId(2), NodeId(3));
        let users: Vec<_> = g.users_of(NodeId(3)).unwrap().iter().copied().collect();
        assert_eq!(users, vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert!(!g.is_user(NodeId(3), NodeId(0)));
    }
}
