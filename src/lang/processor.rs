//! Turns pest pairs into terms, facts and Horn rules.

use pest::iterators::Pair;

use super::{
    parser::{ParseError, Rule},
    Program,
};
use crate::{
    middleware::{Fact, Term, TruthValue},
    rules::HornRule,
};

pub fn process_program(pair: Pair<'_, Rule>) -> Result<Program, ParseError> {
    let mut program = Program::default();
    for statement in pair.into_inner() {
        match statement.as_rule() {
            Rule::fact => program.facts.push(process_fact(statement)?),
            Rule::horn => {
                let index = program.rules.len();
                program.rules.push(process_horn(statement, index)?);
            }
            Rule::EOI => {}
            _ => return Err(invalid("statement", statement.as_str())),
        }
    }
    Ok(program)
}

pub fn process_query(pair: Pair<'_, Rule>) -> Result<Term, ParseError> {
    let term = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::term)
        .ok_or_else(|| invalid("query", ""))?;
    process_term(term)
}

fn process_fact(pair: Pair<'_, Rule>) -> Result<Fact, ParseError> {
    let mut term = None;
    let mut tv = TruthValue::CERTAIN;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::term => term = Some(process_term(p)?),
            Rule::truth => tv = process_truth(p)?,
            _ => {}
        }
    }
    let term = term.ok_or_else(|| invalid("fact", ""))?;
    Ok(Fact::new(term, tv))
}

fn process_horn(pair: Pair<'_, Rule>, index: usize) -> Result<HornRule, ParseError> {
    let text = pair.as_str().to_string();
    let mut name = None;
    let mut head = None;
    let mut body = Vec::new();
    let mut tv = TruthValue::CERTAIN;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::rule_name => {
                name = p
                    .into_inner()
                    .next()
                    .map(|ident| ident.as_str().to_string())
            }
            Rule::term => head = Some(process_term(p)?),
            Rule::body => {
                body = p
                    .into_inner()
                    .map(process_term)
                    .collect::<Result<Vec<_>, _>>()?
            }
            Rule::truth => tv = process_truth(p)?,
            _ => {}
        }
    }
    let head = head.ok_or_else(|| invalid("rule", &text))?;
    let name = name.unwrap_or_else(|| format!("rule{}", index));
    Ok(HornRule::new(name, head, body).with_truth(tv))
}

pub fn process_term(pair: Pair<'_, Rule>) -> Result<Term, ParseError> {
    let pair = match pair.as_rule() {
        Rule::term => pair
            .into_inner()
            .next()
            .ok_or_else(|| invalid("term", ""))?,
        _ => pair,
    };
    match pair.as_rule() {
        Rule::variable => {
            let name = pair
                .into_inner()
                .next()
                .ok_or_else(|| invalid("variable", ""))?;
            Ok(Term::var(name.as_str()))
        }
        Rule::symbol => Ok(Term::sym(pair.as_str())),
        Rule::compound => {
            let mut inner = pair.into_inner();
            let head = inner
                .next()
                .ok_or_else(|| invalid("compound term", ""))?
                .as_str()
                .to_string();
            let args = inner.map(process_term).collect::<Result<Vec<_>, _>>()?;
            Ok(Term::App(head, args))
        }
        other => Err(invalid("term", &format!("{:?}", other))),
    }
}

fn process_truth(pair: Pair<'_, Rule>) -> Result<TruthValue, ParseError> {
    let text = pair.as_str().to_string();
    let numbers = pair
        .into_inner()
        .map(|n| n.as_str().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("truth value", &text))?;
    match numbers.as_slice() {
        [s, c] => Ok(TruthValue::new(*s, *c)),
        _ => Err(invalid("truth value", &text)),
    }
}

fn invalid(what: &'static str, text: &str) -> ParseError {
    ParseError::Invalid {
        what,
        text: text.to_string(),
    }
}
