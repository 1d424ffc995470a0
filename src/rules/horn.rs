use crate::middleware::{BindingMap, Fact, FreshVars, Rule, Term, TruthValue};

/// Composer rule `head :- body_0, ..., body_n`.
///
/// The output truth value is the weakest argument scaled by the rule's own
/// truth value: `strength = min(s_i) * s_rule`, `confidence = min(c_i) * c_rule`.
#[derive(Clone, Debug)]
pub struct HornRule {
    name: String,
    head: Term,
    body: Vec<Term>,
    tv: TruthValue,
}

impl HornRule {
    pub fn new(name: impl Into<String>, head: Term, body: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            head,
            body,
            tv: TruthValue::CERTAIN,
        }
    }

    pub fn with_truth(mut self, tv: TruthValue) -> Self {
        self.tv = tv;
        self
    }

    pub fn head(&self) -> &Term {
        &self.head
    }

    pub fn body(&self) -> &[Term] {
        &self.body
    }
}

impl Rule for HornRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.body.len()
    }

    fn may_produce(&self, target: &Term) -> bool {
        target.is_var()
            || (target.head() == self.head.head() && target.args().len() == self.head.args().len())
    }

    fn input_requirements(&self, output: &Term, fresh: &mut FreshVars) -> Vec<Vec<Term>> {
        let mut renaming = BindingMap::new();
        let head = self.head.rename_apart(fresh, &mut renaming);
        let body: Vec<Term> = self
            .body
            .iter()
            .map(|b| b.rename_apart(fresh, &mut renaming))
            .collect();
        match head.unify(output, &BindingMap::new()) {
            Some(unifier) => vec![body.iter().map(|b| b.substitute(&unifier)).collect()],
            None => Vec::new(),
        }
    }

    fn compute(&self, args: &[Fact]) -> Option<Fact> {
        if args.len() != self.body.len() {
            return None;
        }
        let mut bindings = BindingMap::new();
        for (pattern, arg) in self.body.iter().zip(args) {
            bindings = pattern.match_term(&arg.term, &bindings)?;
        }
        let (strength, confidence) = args.iter().fold((1.0f32, 1.0f32), |(s, c), a| {
            (s.min(a.tv.strength), c.min(a.tv.confidence))
        });
        Some(Fact::new(
            self.head.substitute(&bindings),
            TruthValue::new(strength * self.tv.strength, confidence * self.tv.confidence),
        ))
    }
}
