use std::{collections::BTreeMap, sync::Arc};

use crate::middleware::{BindingMap, DirectResult, Fact, FreshVars, Rule, RuleKind, Term};

/// Stored facts, indexed by head symbol. Inserting a term twice keeps the
/// more confident truth value.
#[derive(Clone, Debug, Default)]
pub struct FactBase {
    facts: Vec<Fact>,
    positions: BTreeMap<Term, usize>,
    by_head: BTreeMap<String, Vec<usize>>,
}

impl FactBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if an equally or more confident copy was already stored.
    pub fn insert(&mut self, fact: Fact) -> bool {
        if let Some(&pos) = self.positions.get(&fact.term) {
            if self.facts[pos].tv < fact.tv {
                self.facts[pos] = fact;
                return true;
            }
            return false;
        }
        let pos = self.facts.len();
        if let Some(head) = fact.term.head() {
            self.by_head.entry(head.to_string()).or_default().push(pos);
        }
        self.positions.insert(fact.term.clone(), pos);
        self.facts.push(fact);
        true
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Facts that could match `target`, in insertion order.
    pub fn candidates<'a>(&'a self, target: &Term) -> Box<dyn Iterator<Item = &'a Fact> + 'a> {
        match target.head() {
            Some(head) => Box::new(
                self.by_head
                    .get(head)
                    .into_iter()
                    .flatten()
                    .map(move |&i| &self.facts[i]),
            ),
            None => Box::new(self.facts.iter()),
        }
    }
}

impl FromIterator<Fact> for FactBase {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        let mut base = FactBase::new();
        for fact in iter {
            base.insert(fact);
        }
        base
    }
}

/// Generator that checks whether instances of the target are stored.
#[derive(Clone, Debug)]
pub struct LookupRule {
    name: String,
    facts: Arc<FactBase>,
}

impl LookupRule {
    pub fn new(facts: Arc<FactBase>) -> Self {
        Self::named("Lookup", facts)
    }

    pub fn named(name: impl Into<String>, facts: Arc<FactBase>) -> Self {
        Self {
            name: name.into(),
            facts,
        }
    }
}

impl Rule for LookupRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        0
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Generator
    }

    fn may_produce(&self, target: &Term) -> bool {
        self.facts.candidates(target).next().is_some()
    }

    fn input_requirements(&self, _output: &Term, _fresh: &mut FreshVars) -> Vec<Vec<Term>> {
        Vec::new()
    }

    fn compute(&self, _args: &[Fact]) -> Option<Fact> {
        None
    }

    fn direct_results(&self, target: &Term) -> Vec<DirectResult> {
        self.facts
            .candidates(target)
            .filter_map(|fact| {
                target
                    .match_term(&fact.term, &BindingMap::new())
                    .map(|bindings| DirectResult {
                        fact: fact.clone(),
                        bindings,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{lang::parse_term, middleware::TruthValue};

    fn base() -> Arc<FactBase> {
        Arc::new(
            [
                Fact::new(parse_term("Q(a)").unwrap(), TruthValue::new(1.0, 0.9)),
                Fact::new(parse_term("Q(b)").unwrap(), TruthValue::new(1.0, 0.5)),
                Fact::certain(parse_term("R(a, b)").unwrap()),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_lookup_binds_target_variables() {
        let rule = LookupRule::new(base());
        let results = rule.direct_results(&parse_term("Q(?X)").unwrap());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].fact.term, parse_term("Q(a)").unwrap());
        assert_eq!(
            results[0].bindings.get(&crate::middleware::Variable::new("X")),
            Some(&Term::sym("a"))
        );
        assert!(rule
            .direct_results(&parse_term("R(b, ?Y)").unwrap())
            .is_empty());
    }

    #[test]
    fn test_fact_base_keeps_best_truth_value() {
        let mut facts = FactBase::new();
        let t = parse_term("Q(a)").unwrap();
        assert!(facts.insert(Fact::new(t.clone(), TruthValue::new(1.0, 0.3))));
        assert!(facts.insert(Fact::new(t.clone(), TruthValue::new(1.0, 0.8))));
        assert!(!facts.insert(Fact::new(t.clone(), TruthValue::new(1.0, 0.4))));
        assert_eq!(facts.len(), 1);
        assert_eq!(facts.iter().next().unwrap().confidence(), 0.8);
    }
}
