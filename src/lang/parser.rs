use pest::{iterators::Pairs, Parser};
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "lang/grammar.pest"]
pub struct KbParser;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Pest parsing error: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),
    #[error("invalid {what} '{text}'")]
    Invalid { what: &'static str, text: String },
}

// So `?` can box the original pest error.
impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::Pest(Box::new(err))
    }
}

/// Parses a whole knowledge base into pest pairs.
pub fn parse_kb(input: &str) -> Result<Pairs<'_, Rule>, ParseError> {
    Ok(KbParser::parse(Rule::program, input)?)
}

/// Parses a single query term into pest pairs.
pub fn parse_query(input: &str) -> Result<Pairs<'_, Rule>, ParseError> {
    Ok(KbParser::parse(Rule::query, input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_parses(rule: Rule, input: &str) {
        if let Err(e) = KbParser::parse(rule, input) {
            panic!("Failed to parse input:\n{}\nError: {}", input, e);
        }
    }

    fn assert_fails(rule: Rule, input: &str) {
        if let Ok(pairs) = KbParser::parse(rule, input) {
            panic!(
                "Expected parse to fail, but it succeeded. Parsed:\n{:#?}",
                pairs
            );
        }
    }

    #[test]
    fn test_parse_empty() {
        assert_parses(Rule::program, "");
        assert_parses(Rule::program, "\n\n");
        assert_parses(Rule::program, "// comment only");
    }

    #[test]
    fn test_parse_identifier_and_variable() {
        assert_parses(Rule::test_identifier, "my_pred");
        assert_parses(Rule::test_identifier, "_internal");
        assert_fails(Rule::test_identifier, "?invalid");
        assert_fails(Rule::test_identifier, "1_invalid_start");
        assert_parses(Rule::test_variable, "?X1");
        assert_fails(Rule::test_variable, "X");
        assert_fails(Rule::test_variable, "?");
        assert_fails(Rule::test_variable, "? X");
    }

    #[test]
    fn test_parse_terms() {
        assert_parses(Rule::query, "P(?X)");
        assert_parses(Rule::query, "R(?X, 1)");
        assert_parses(Rule::query, "f(g(a, ?Y), -2.5)");
        assert_parses(Rule::query, "nil()");
        assert_parses(Rule::query, "a");
        assert_fails(Rule::query, "P(?X");
        assert_fails(Rule::query, "P(?X) Q(?Y)");
    }

    #[test]
    fn test_parse_statements() {
        assert_parses(Rule::program, "Q(a).");
        assert_parses(Rule::program, "Q(a) <1.0, 0.9>.");
        assert_parses(Rule::program, "P(?x) :- Q(?x).");
        assert_parses(
            Rule::program,
            "[trans] A(?x, ?z) :- B(?x, ?y), B(?y, ?z) <1, 0.8>.\n// tail\nB(a, b).",
        );
        assert_fails(Rule::program, "Q(a)");
        assert_fails(Rule::program, "P(?x) :- .");
        assert_fails(Rule::program, "Q(a) <1.0>.");
    }
}
