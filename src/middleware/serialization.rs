use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use serde::{ser::SerializeMap, Serialize, Serializer};

// JSON object keys must be strings, so maps keyed by terms are written with
// the key's textual form. The BTreeMap order keeps the output deterministic.
pub fn display_keyed_map<S, K, V>(value: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    K: Display,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(value.len()))?;
    for (k, v) in value {
        map.serialize_entry(&k.to_string(), v)?;
    }
    map.end()
}

/// Like [`display_keyed_map`] for maps whose values are sets of displayable
/// items, written as lists of strings.
pub fn display_keyed_sets<S, K, T>(
    value: &BTreeMap<K, BTreeSet<T>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    K: Display,
    T: Display,
{
    let mut map = serializer.serialize_map(Some(value.len()))?;
    for (k, items) in value {
        let items: Vec<String> = items.iter().map(|t| t.to_string()).collect();
        map.serialize_entry(&k.to_string(), &items)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::middleware::{Term, TruthValue};

    #[derive(Serialize)]
    struct Wrapper {
        #[serde(serialize_with = "display_keyed_map")]
        results: BTreeMap<Term, TruthValue>,
        #[serde(serialize_with = "display_keyed_sets")]
        seen: BTreeMap<usize, BTreeSet<Term>>,
    }

    #[test]
    fn test_term_keys_become_strings() {
        let term = Term::app("P", [Term::sym("a")]);
        let w = Wrapper {
            results: BTreeMap::from([(term.clone(), TruthValue::new(1.0, 0.5))]),
            seen: BTreeMap::from([(3, BTreeSet::from([term]))]),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["results"]["P(a)"]["confidence"], 0.5);
        assert_eq!(json["seen"]["3"][0], "P(a)");
    }
}
