use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::NodeId;
use crate::middleware::{
    serialization::{display_keyed_map, display_keyed_sets},
    Term,
};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MetricsLevel {
    #[default]
    None,
    Counts,
    Verbose,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Expansions,
    NodesCreated,
    NodesRecycled,
    CycleRejections,
    DepthCutoffs,
    BindingConflicts,
    MalformedResults,
    ArityMismatches,
    DirectResults,
    DerivedResults,
    SpawnedClones,
    DeferredSpawns,
}

/// Statistics for one tree, owned by the caller and passed into `infer`.
/// Nothing is recorded at [`MetricsLevel::None`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct InferenceMetrics {
    pub level: MetricsLevel,

    // Counts
    #[serde(serialize_with = "display_keyed_map")]
    pub counters: BTreeMap<Counter, u64>,

    // Verbose
    #[serde(serialize_with = "display_keyed_sets")]
    pub node_results: BTreeMap<NodeId, BTreeSet<Term>>,
    pub elapsed: Option<Duration>,
}

impl InferenceMetrics {
    pub fn new(level: MetricsLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    pub(crate) fn count(&mut self, counter: Counter) {
        if self.level >= MetricsLevel::Counts {
            *self.counters.entry(counter).or_default() += 1;
        }
    }

    pub(crate) fn node_result(&mut self, node: NodeId, term: &Term) {
        if self.level >= MetricsLevel::Verbose {
            self.node_results
                .entry(node)
                .or_default()
                .insert(term.clone());
        }
    }

    pub(crate) fn add_elapsed(&mut self, d: Duration) {
        if self.level >= MetricsLevel::Verbose {
            *self.elapsed.get_or_insert(Duration::ZERO) += d;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_levels() {
        let mut none = InferenceMetrics::default();
        none.count(Counter::Expansions);
        none.node_result(NodeId(0), &Term::sym("a"));
        assert_eq!(none.get(Counter::Expansions), 0);
        assert!(none.node_results.is_empty());

        let mut counts = InferenceMetrics::new(MetricsLevel::Counts);
        counts.count(Counter::Expansions);
        counts.count(Counter::Expansions);
        counts.node_result(NodeId(0), &Term::sym("a"));
        assert_eq!(counts.get(Counter::Expansions), 2);
        assert!(counts.node_results.is_empty());

        let mut verbose = InferenceMetrics::new(MetricsLevel::Verbose);
        verbose.node_result(NodeId(0), &Term::sym("a"));
        verbose.add_elapsed(Duration::from_millis(3));
        assert_eq!(verbose.node_results[&NodeId(0)].len(), 1);
        assert_eq!(verbose.elapsed, Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_level_names() {
        assert_eq!(MetricsLevel::from_str("Verbose").unwrap(), MetricsLevel::Verbose);
        assert_eq!(MetricsLevel::Counts.to_string(), "counts");
        assert_eq!(Counter::CycleRejections.to_string(), "cycle_rejections");
    }
}
