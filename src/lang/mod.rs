//! Textual knowledge bases.
//!
//! ```text
//! // facts, optionally with a truth value <strength, confidence>
//! Q(a) <1.0, 0.9>.
//! // Horn rules, optionally named and weighted
//! [qp] P(?x) :- Q(?x), R(?x) <1.0, 0.95>.
//! ```
//!
//! Variables are written `?name`; everything else is a symbol or an
//! application `name(args...)`.

pub mod parser;
pub mod processor;

use std::sync::Arc;

pub use parser::{ParseError, Rule};

use crate::{
    middleware::{Fact, RuleRef, RuleSet, Term},
    rules::{FactBase, HornRule, LookupRule},
};

/// A parsed knowledge base.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub facts: Vec<Fact>,
    pub rules: Vec<HornRule>,
}

impl Program {
    pub fn fact_base(&self) -> FactBase {
        self.facts.iter().cloned().collect()
    }

    /// A provider offering the fact lookup first, then the Horn rules in
    /// source order.
    pub fn rule_set(&self) -> RuleSet {
        let mut rules: Vec<RuleRef> = vec![Arc::new(LookupRule::new(Arc::new(self.fact_base())))];
        rules.extend(
            self.rules
                .iter()
                .map(|r| Arc::new(r.clone()) as RuleRef),
        );
        RuleSet::new(rules)
    }
}

pub fn parse_program(input: &str) -> Result<Program, ParseError> {
    let mut pairs = parser::parse_kb(input)?;
    match pairs.next() {
        Some(program) => processor::process_program(program),
        None => Ok(Program::default()),
    }
}

pub fn parse_term(input: &str) -> Result<Term, ParseError> {
    let mut pairs = parser::parse_query(input)?;
    let query = pairs.next().ok_or_else(|| ParseError::Invalid {
        what: "query",
        text: input.to_string(),
    })?;
    processor::process_query(query)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::middleware::{Rule as _, TruthValue};

    #[test]
    fn test_parse_term_structure() {
        let t = parse_term("f(g(a, ?Y), 1)").unwrap();
        assert_eq!(
            t,
            Term::app(
                "f",
                [
                    Term::app("g", [Term::sym("a"), Term::var("Y")]),
                    Term::sym("1")
                ]
            )
        );
        assert_eq!(t.to_string(), "f(g(a, ?Y), 1)");
        assert_eq!(parse_term(&t.to_string()).unwrap(), t);
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program(
            r#"
            // facts
            Q(a) <1.0, 0.9>.
            Q(b).
            [qp] P(?x) :- Q(?x), R(?x) <1.0, 0.5>.
            S(?x) :- P(?x).
            "#,
        )
        .unwrap();
        assert_eq!(program.facts.len(), 2);
        assert_eq!(program.facts[0].tv, TruthValue::new(1.0, 0.9));
        assert_eq!(program.facts[1].tv, TruthValue::CERTAIN);
        assert_eq!(program.rules.len(), 2);
        assert_eq!(program.rules[0].name(), "qp");
        assert_eq!(program.rules[0].arity(), 2);
        assert_eq!(program.rules[1].name(), "rule1");
        assert_eq!(program.rules[1].head(), &parse_term("S(?x)").unwrap());
        assert_eq!(program.rule_set().rules().len(), 3);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_term("P(?X"), Err(ParseError::Pest(_))));
        assert!(matches!(parse_program("Q(a)"), Err(ParseError::Pest(_))));
        assert!(matches!(
            parse_program("Q(a) <x, 1>."),
            Err(ParseError::Pest(_))
        ));
    }
}
