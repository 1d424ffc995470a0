use std::{backtrace::Backtrace, fmt::Debug};

use crate::{
    lang::ParseError,
    middleware::{bindings::BindingConflict, Term},
    prover::NodeId,
};

pub type Result<T, E = BitError> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum InnerError {
    #[error("rule {rule} produced non-ground output {output} from [{args}]")]
    MalformedRuleOutput {
        rule: String,
        output: Term,
        args: String,
    },
    #[error("rule {rule} expects {expected} arguments, got {found}")]
    ArityMismatch {
        rule: String,
        expected: usize,
        found: usize,
    },
    #[error("rule {rule} produced no value for concrete arguments [{args}]")]
    UndefinedRuleOutput { rule: String, args: String },
    #[error("slot {slot} of {rule} is already bound")]
    SlotAlreadyBound { rule: String, slot: usize },
    #[error("slot {slot} is out of range for {rule} with {arity} slots")]
    SlotOutOfRange {
        rule: String,
        slot: usize,
        arity: usize,
    },
    #[error("slot {slot} of {rule} is unbound")]
    UnboundSlot { rule: String, slot: usize },
    #[error("{rule}: {supplied} arguments supplied for {open} open slots")]
    UnusedArguments {
        rule: String,
        supplied: usize,
        open: usize,
    },
    #[error("{0} offers more than one alternative requirement set")]
    MultipleAlternatives(String),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {0} uses itself")]
    Cycle(NodeId),
    #[error("parent link {child} -> {parent} (slot {slot}) has no matching child entry")]
    BrokenLink {
        child: NodeId,
        parent: NodeId,
        slot: usize,
    },
    // Other
    #[error("{0}")]
    Custom(String),
}

#[derive(thiserror::Error)]
pub enum BitError {
    #[error("Inner: {inner}\n{backtrace}")]
    Inner {
        inner: Box<InnerError>,
        backtrace: Box<Backtrace>,
    },
    #[error(transparent)]
    Binding(#[from] BindingConflict),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Debug for BitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

macro_rules! new {
    ($inner:expr) => {
        BitError::Inner {
            inner: Box::new($inner),
            backtrace: Box::new(Backtrace::capture()),
        }
    };
}
use InnerError::*;
impl BitError {
    /// The inner error, if this is an internal invariant violation.
    pub fn inner(&self) -> Option<&InnerError> {
        match self {
            Self::Inner { inner, .. } => Some(inner),
            _ => None,
        }
    }
    pub(crate) fn malformed_rule_output(rule: &str, output: Term, args: String) -> Self {
        new!(MalformedRuleOutput {
            rule: rule.to_string(),
            output,
            args
        })
    }
    pub(crate) fn arity_mismatch(rule: &str, expected: usize, found: usize) -> Self {
        new!(ArityMismatch {
            rule: rule.to_string(),
            expected,
            found
        })
    }
    pub(crate) fn undefined_rule_output(rule: &str, args: String) -> Self {
        new!(UndefinedRuleOutput {
            rule: rule.to_string(),
            args
        })
    }
    pub(crate) fn slot_already_bound(rule: &str, slot: usize) -> Self {
        new!(SlotAlreadyBound {
            rule: rule.to_string(),
            slot
        })
    }
    pub(crate) fn slot_out_of_range(rule: &str, slot: usize, arity: usize) -> Self {
        new!(SlotOutOfRange {
            rule: rule.to_string(),
            slot,
            arity
        })
    }
    pub(crate) fn unbound_slot(rule: &str, slot: usize) -> Self {
        new!(UnboundSlot {
            rule: rule.to_string(),
            slot
        })
    }
    pub(crate) fn unused_arguments(rule: &str, supplied: usize, open: usize) -> Self {
        new!(UnusedArguments {
            rule: rule.to_string(),
            supplied,
            open
        })
    }
    pub(crate) fn multiple_alternatives(rule: &str) -> Self {
        new!(MultipleAlternatives(rule.to_string()))
    }
    pub(crate) fn unknown_node(id: NodeId) -> Self {
        new!(UnknownNode(id))
    }
    pub(crate) fn cycle(id: NodeId) -> Self {
        new!(Cycle(id))
    }
    pub(crate) fn broken_link(child: NodeId, parent: NodeId, slot: usize) -> Self {
        new!(BrokenLink {
            child,
            parent,
            slot
        })
    }
    pub fn custom(s: String) -> Self {
        new!(Custom(s))
    }
}
