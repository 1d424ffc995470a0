use std::fmt::{self, Write};

use super::{BitRoot, NodeState};

/// Graphviz DOT rendering of a tree. Nodes show id, rule, bound target,
/// state and result count; edges run from parent to child and carry the
/// slot index and link bindings.
pub struct DotGraph<'a>(pub &'a BitRoot);

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\"', "\\\"")
        .replace('\n', "\\n")
}

impl fmt::Display for DotGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.0;
        writeln!(f, "digraph BIT {{")?;
        writeln!(f, "  rankdir=TB;")?;
        writeln!(f, "  node [shape=box];")?;

        for node in root.nodes() {
            let mut label = String::new();
            write!(
                label,
                "{} {}\\n{}\\n{}",
                node.id(),
                escape(node.rule().name()),
                escape(&node.target().to_string()),
                node.state()
            )?;
            let results = node.results().count();
            if results > 0 {
                write!(label, " ({} results)", results)?;
            }
            let style = if node.id() == root.top() {
                ", style=filled, fillcolor=lightblue"
            } else if node.state() == NodeState::Exhausted {
                ", style=dashed"
            } else {
                ""
            };
            writeln!(f, "  n{} [label=\"{}\"{}];", node.id().0, label, style)?;
        }

        for node in root.nodes() {
            for (slot, s) in node.slots().iter().enumerate() {
                for child in &s.children {
                    let label = if child.bindings.is_empty() {
                        format!("{}", slot)
                    } else {
                        format!("{} {}", slot, escape(&child.bindings.to_string()))
                    };
                    writeln!(
                        f,
                        "  n{} -> n{} [label=\"{}\"];",
                        node.id().0,
                        child.node.0,
                        label
                    )?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

pub fn generate_graphviz_dot(root: &BitRoot) -> String {
    DotGraph(root).to_string()
}
