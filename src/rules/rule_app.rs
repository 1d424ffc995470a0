//! Rule applications: a rule with some argument slots already filled, either
//! with concrete values or with nested applications. A fully extracted proof
//! is one of these, and it is itself usable as a rule over its open slots.

use std::{fmt, sync::Arc};

use crate::{
    error::{BitError, Result},
    middleware::{join_facts, rule::validate_output, BindingMap, Fact, FreshVars, Rule, RuleRef, Term},
};

#[derive(Clone, Debug)]
pub enum ArgProvider {
    Value(Fact),
    Pathway(Box<RuleApplication>),
}

impl PartialEq for ArgProvider {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgProvider::Value(a), ArgProvider::Value(b)) => a == b,
            (ArgProvider::Pathway(a), ArgProvider::Pathway(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ArgProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgProvider::Value(fact) => write!(f, "{}", fact.term),
            ArgProvider::Pathway(app) => write!(f, "{}", app),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuleApplication {
    rule: RuleRef,
    name: String,
    args: Vec<Option<ArgProvider>>,
}

impl PartialEq for RuleApplication {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rule, &other.rule) && self.args == other.args
    }
}

impl RuleApplication {
    pub fn new(rule: RuleRef) -> Self {
        let name = format!("pathway({})", rule.name());
        let args = vec![None; rule.arity()];
        Self { rule, name, args }
    }

    pub fn rule(&self) -> &RuleRef {
        &self.rule
    }

    pub fn args(&self) -> &[Option<ArgProvider>] {
        &self.args
    }

    /// Fills `slot`. Binding a slot twice to the same provider is accepted.
    pub fn bind(&mut self, slot: usize, provider: ArgProvider) -> Result<()> {
        let arity = self.args.len();
        let entry = self
            .args
            .get_mut(slot)
            .ok_or_else(|| BitError::slot_out_of_range(self.rule.name(), slot, arity))?;
        match entry {
            Some(existing) if *existing == provider => Ok(()),
            Some(_) => Err(BitError::slot_already_bound(self.rule.name(), slot)),
            None => {
                *entry = Some(provider);
                Ok(())
            }
        }
    }

    /// Unfilled slots, counting those of nested applications.
    pub fn open_slots(&self) -> usize {
        self.args
            .iter()
            .map(|a| match a {
                None => 1,
                Some(ArgProvider::Value(_)) => 0,
                Some(ArgProvider::Pathway(p)) => p.open_slots(),
            })
            .sum()
    }

    pub fn compute(&self) -> Result<Fact> {
        self.compute_with(&[])
    }

    /// Computes the output, taking `inputs` in order for the open slots
    /// (depth-first through nested applications).
    pub fn compute_with(&self, inputs: &[Fact]) -> Result<Fact> {
        let mut rest = inputs;
        let fact = self.compute_consuming(&mut rest)?;
        if !rest.is_empty() {
            return Err(BitError::unused_arguments(
                &self.name,
                inputs.len(),
                self.open_slots(),
            ));
        }
        Ok(fact)
    }

    fn compute_consuming<'a>(&self, inputs: &mut &'a [Fact]) -> Result<Fact> {
        let mut args = Vec::with_capacity(self.args.len());
        for (slot, arg) in self.args.iter().enumerate() {
            match arg {
                Some(ArgProvider::Value(fact)) => args.push(fact.clone()),
                Some(ArgProvider::Pathway(p)) => args.push(p.compute_consuming(inputs)?),
                None => {
                    let current: &'a [Fact] = *inputs;
                    let (first, rest) = current
                        .split_first()
                        .ok_or_else(|| BitError::unbound_slot(self.rule.name(), slot))?;
                    args.push(first.clone());
                    *inputs = rest;
                }
            }
        }
        if !self.rule.is_computable() {
            return Err(BitError::undefined_rule_output(
                self.rule.name(),
                join_facts(&args),
            ));
        }
        let out = self
            .rule
            .compute(&args)
            .ok_or_else(|| BitError::undefined_rule_output(self.rule.name(), join_facts(&args)))?;
        validate_output(self.rule.name(), &out, &args)?;
        Ok(out)
    }

    /// The targets the open slots need for the application to produce
    /// `output`, depth-first. `None` if the rule cannot produce `output` or a
    /// concrete argument does not fit its requirement.
    pub fn compose_input_requirements(
        &self,
        output: &Term,
        fresh: &mut FreshVars,
    ) -> Result<Option<Vec<Term>>> {
        let mut subst = BindingMap::new();
        Ok(self
            .compose(output, fresh, &mut subst)?
            .map(|reqs| reqs.iter().map(|r| r.substitute(&subst)).collect()))
    }

    fn compose(
        &self,
        output: &Term,
        fresh: &mut FreshVars,
        subst: &mut BindingMap,
    ) -> Result<Option<Vec<Term>>> {
        let mut alternatives = self.rule.input_requirements(output, fresh);
        if alternatives.len() > 1 {
            return Err(BitError::multiple_alternatives(self.rule.name()));
        }
        let Some(reqs) = alternatives.pop() else {
            return Ok(None);
        };
        if reqs.len() != self.args.len() {
            return Err(BitError::arity_mismatch(
                self.rule.name(),
                self.args.len(),
                reqs.len(),
            ));
        }
        let mut out = Vec::new();
        for (req, arg) in reqs.into_iter().zip(&self.args) {
            // Earlier slots may already have fixed some of the variables.
            let req = req.substitute(subst);
            match arg {
                None => out.push(req),
                Some(ArgProvider::Value(fact)) => match req.unify(&fact.term, subst) {
                    Some(extended) => *subst = extended,
                    None => return Ok(None),
                },
                Some(ArgProvider::Pathway(p)) => match p.compose(&req, fresh, subst)? {
                    Some(nested) => out.extend(nested),
                    None => return Ok(None),
                },
            }
        }
        Ok(Some(out))
    }
}

impl fmt::Display for RuleApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.rule.name())?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match a {
                Some(p) => write!(f, "{}", p)?,
                None => write!(f, "_")?,
            }
        }
        write!(f, ")")
    }
}

impl Rule for RuleApplication {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.open_slots()
    }

    fn may_produce(&self, target: &Term) -> bool {
        self.rule.may_produce(target)
    }

    fn is_computable(&self) -> bool {
        self.rule.is_computable()
            && self.args.iter().all(|a| match a {
                Some(ArgProvider::Pathway(p)) => p.is_computable(),
                _ => true,
            })
    }

    fn input_requirements(&self, output: &Term, fresh: &mut FreshVars) -> Vec<Vec<Term>> {
        match self.compose_input_requirements(output, fresh) {
            Ok(reqs) => reqs.into_iter().collect(),
            Err(e) => {
                log::error!("{}: {}", self.name, e);
                Vec::new()
            }
        }
    }

    fn compute(&self, args: &[Fact]) -> Option<Fact> {
        match self.compute_with(args) {
            Ok(fact) => Some(fact),
            Err(e) => {
                log::warn!("{}: {}", self.name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::InnerError, lang::parse_term, rules::HornRule};

    fn term(s: &str) -> Term {
        parse_term(s).unwrap()
    }

    fn both() -> RuleRef {
        Arc::new(HornRule::new(
            "both",
            term("P(?x)"),
            vec![term("Q(?x)"), term("R(?x)")],
        ))
    }

    fn wrap() -> RuleRef {
        Arc::new(HornRule::new(
            "wrap",
            term("T(?x)"),
            vec![term("P(?x)"), term("S(?x)")],
        ))
    }

    #[derive(Debug)]
    struct TwoWays;

    impl Rule for TwoWays {
        fn name(&self) -> &str {
            "two_ways"
        }
        fn arity(&self) -> usize {
            1
        }
        fn input_requirements(&self, _output: &Term, _fresh: &mut FreshVars) -> Vec<Vec<Term>> {
            vec![vec![term("A(x)")], vec![term("B(x)")]]
        }
        fn compute(&self, _args: &[Fact]) -> Option<Fact> {
            None
        }
    }

    #[test]
    fn test_bind_rules() {
        let mut app = RuleApplication::new(both());
        let q = ArgProvider::Value(Fact::certain(term("Q(a)")));
        app.bind(0, q.clone()).unwrap();
        app.bind(0, q).unwrap();
        let err = app
            .bind(0, ArgProvider::Value(Fact::certain(term("Q(b)"))))
            .unwrap_err();
        assert!(matches!(err.inner(), Some(InnerError::SlotAlreadyBound { slot: 0, .. })));
        let err = app
            .bind(2, ArgProvider::Value(Fact::certain(term("Q(b)"))))
            .unwrap_err();
        assert!(matches!(err.inner(), Some(InnerError::SlotOutOfRange { slot: 2, arity: 2, .. })));
        assert_eq!(app.open_slots(), 1);
    }

    #[test]
    fn test_compute_consumes_inputs_for_open_slots() {
        let mut app = RuleApplication::new(both());
        app.bind(0, ArgProvider::Value(Fact::certain(term("Q(a)"))))
            .unwrap();
        let out = app.compute_with(&[Fact::certain(term("R(a)"))]).unwrap();
        assert_eq!(out.term, term("P(a)"));

        let err = app.compute().unwrap_err();
        assert!(matches!(err.inner(), Some(InnerError::UnboundSlot { slot: 1, .. })));

        let err = app
            .compute_with(&[Fact::certain(term("R(a)")), Fact::certain(term("R(b)"))])
            .unwrap_err();
        assert!(matches!(
            err.inner(),
            Some(InnerError::UnusedArguments { supplied: 2, open: 1, .. })
        ));

        let err = app.compute_with(&[Fact::certain(term("R(b)"))]).unwrap_err();
        assert!(matches!(err.inner(), Some(InnerError::UndefinedRuleOutput { .. })));
    }

    #[test]
    fn test_nested_requirements_are_spliced() {
        let mut inner = RuleApplication::new(both());
        inner
            .bind(0, ArgProvider::Value(Fact::certain(term("Q(a)"))))
            .unwrap();
        let mut outer = RuleApplication::new(wrap());
        outer
            .bind(0, ArgProvider::Pathway(Box::new(inner)))
            .unwrap();
        assert_eq!(outer.open_slots(), 2);
        assert_eq!(outer.arity(), 2);
        assert_eq!(outer.to_string(), "wrap(both(Q(a), _), _)");

        let mut fresh = FreshVars::default();
        let reqs = outer
            .compose_input_requirements(&term("T(?Y)"), &mut fresh)
            .unwrap()
            .unwrap();
        assert_eq!(reqs, vec![term("R(a)"), term("S(a)")]);

        let out = outer
            .compute_with(&[Fact::certain(term("R(a)")), Fact::certain(term("S(a)"))])
            .unwrap();
        assert_eq!(out.term, term("T(a)"));
    }

    #[test]
    fn test_nested_requirements_see_earlier_values() {
        let pb: RuleRef = Arc::new(HornRule::new("pb", term("P(b)"), vec![term("Q(b)")]));
        let sp: RuleRef = Arc::new(HornRule::new(
            "sp",
            term("T(?x)"),
            vec![term("S(?x)"), term("P(?x)")],
        ));
        let mut app = RuleApplication::new(sp.clone());
        app.bind(0, ArgProvider::Value(Fact::certain(term("S(a)"))))
            .unwrap();
        app.bind(1, ArgProvider::Pathway(Box::new(RuleApplication::new(pb.clone()))))
            .unwrap();
        let mut fresh = FreshVars::default();
        assert_eq!(
            app.compose_input_requirements(&term("T(?Y)"), &mut fresh)
                .unwrap(),
            None
        );
        assert!(app.compute_with(&[Fact::certain(term("Q(b)"))]).is_err());

        let mut consistent = RuleApplication::new(sp);
        consistent
            .bind(0, ArgProvider::Value(Fact::certain(term("S(b)"))))
            .unwrap();
        consistent
            .bind(1, ArgProvider::Pathway(Box::new(RuleApplication::new(pb))))
            .unwrap();
        let reqs = consistent
            .compose_input_requirements(&term("T(?Y)"), &mut fresh)
            .unwrap()
            .unwrap();
        assert_eq!(reqs, vec![term("Q(b)")]);
        let out = consistent
            .compute_with(&[Fact::certain(term("Q(b)"))])
            .unwrap();
        assert_eq!(out.term, term("T(b)"));
    }

    #[test]
    fn test_same_name_different_rule_is_another_provider() {
        let first = both();
        let twin: RuleRef = Arc::new(HornRule::new("both", term("P(?x)"), vec![term("Q(?x)")]));
        let mut app = RuleApplication::new(wrap());
        app.bind(0, ArgProvider::Pathway(Box::new(RuleApplication::new(first.clone()))))
            .unwrap();
        app.bind(0, ArgProvider::Pathway(Box::new(RuleApplication::new(first))))
            .unwrap();
        let err = app
            .bind(0, ArgProvider::Pathway(Box::new(RuleApplication::new(twin))))
            .unwrap_err();
        assert!(matches!(err.inner(), Some(InnerError::SlotAlreadyBound { slot: 0, .. })));
    }

    #[test]
    fn test_requirements_for_unrelated_output() {
        let app = RuleApplication::new(both());
        let mut fresh = FreshVars::default();
        assert_eq!(
            app.compose_input_requirements(&term("Z(?Y)"), &mut fresh)
                .unwrap(),
            None
        );
        assert!(app.input_requirements(&term("Z(?Y)"), &mut fresh).is_empty());
    }

    #[test]
    fn test_multiple_alternatives_rejected() {
        let app = RuleApplication::new(Arc::new(TwoWays));
        let mut fresh = FreshVars::default();
        let err = app
            .compose_input_requirements(&term("C(x)"), &mut fresh)
            .unwrap_err();
        assert!(matches!(err.inner(), Some(InnerError::MultipleAlternatives(_))));
    }
}
