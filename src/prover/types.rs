use std::fmt;

use serde::{Deserialize, Serialize};

use crate::middleware::{BindingMap, Fact};

/// Stable index of a node in the tree's arena. Creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference to a node from one of its parents' argument slots. The
/// bindings send the node's target variables to the parent's terms; identity
/// entries are omitted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ParametrizedNode {
    pub node: NodeId,
    pub bindings: BindingMap,
}

/// Back-reference from a child to one of its parents.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ParentLink {
    pub parent: NodeId,
    pub slot: usize,
    pub bindings: BindingMap,
}

impl ParentLink {
    pub(crate) fn child_entry(&self, child: NodeId) -> ParametrizedNode {
        ParametrizedNode {
            node: child,
            bindings: self.bindings.clone(),
        }
    }
}

/// How alternative bindings for one variable are turned into specialized
/// clones of the variable's owner.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum SpawnMode {
    /// At most one clone per (owner, variable) waits for expansion; the rest queue.
    #[default]
    NoSiblingSpawning,
    /// Every alternative is cloned immediately.
    AllowSiblingSpawning,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display,
)]
pub enum NodeState {
    Dummy,
    Created,
    Expanded,
    Exhausted,
}

/// A value available in an argument slot, together with the bindings of
/// the slot target's variables it implies and the child that produced it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SlotResult {
    pub fact: Fact,
    pub bindings: BindingMap,
    pub source: NodeId,
}

/// How a node produced one of its results: the combined bindings of the
/// node's variables and one premise per argument slot. Direct results have
/// no premises.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Derivation {
    pub fact: Fact,
    pub bindings: BindingMap,
    pub premises: Vec<SlotResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitConfig {
    /// Children deeper than this are not created.
    pub max_depth: usize,
    pub spawn_mode: SpawnMode,
    /// Create composer children for targets with their top-level constants
    /// replaced by placeholders, so `R(X, 1)` and `R(X, 2)` share one node.
    pub generalize_constants: bool,
}

impl Default for BitConfig {
    fn default() -> Self {
        Self {
            max_depth: 24,
            spawn_mode: SpawnMode::default(),
            generalize_constants: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferParams {
    pub budget: usize,
    pub min_confidence_to_store: f32,
    pub min_confidence_to_abort: f32,
}

impl Default for InferParams {
    fn default() -> Self {
        Self {
            budget: 100,
            min_confidence_to_store: 0.000001,
            min_confidence_to_abort: 1.0,
        }
    }
}
