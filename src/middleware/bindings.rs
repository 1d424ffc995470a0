//! Binding maps: finite substitutions from variables to terms.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use super::{Term, Variable};

/// Two binding maps disagree on a variable. This is an expected outcome of
/// combining candidate results, not an internal error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("conflicting bindings for {var}: {existing} vs {incoming}")]
pub struct BindingConflict {
    pub var: Variable,
    pub existing: Term,
    pub incoming: Term,
}

/// A finite, ordered map from variables to terms. Never holds two entries for
/// the same variable; operations that would need one fail with [`BindingConflict`].
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingMap(BTreeMap<Variable, Term>);

impl BindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(var: Variable, term: Term) -> Self {
        Self(BTreeMap::from([(var, term)]))
    }

    pub fn get(&self, var: &Variable) -> Option<&Term> {
        self.0.get(var)
    }

    pub fn contains(&self, var: &Variable) -> bool {
        self.0.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.0.iter()
    }

    pub fn vars(&self) -> impl Iterator<Item = &Variable> {
        self.0.keys()
    }

    /// Overwrites without checking. Callers guarantee the variable is unbound
    /// or bound to the same term.
    pub(crate) fn insert(&mut self, var: Variable, term: Term) {
        self.0.insert(var, term);
    }

    /// Binds `var`, accepting a re-binding to the same term.
    pub fn try_insert(&mut self, var: Variable, term: Term) -> Result<(), BindingConflict> {
        match self.0.get(&var) {
            Some(existing) if *existing != term => Err(BindingConflict {
                var,
                existing: existing.clone(),
                incoming: term,
            }),
            Some(_) => Ok(()),
            None => {
                self.0.insert(var, term);
                Ok(())
            }
        }
    }

    /// Union of two maps. Fails if they bind a variable to different terms.
    pub fn union(&self, other: &BindingMap) -> Result<BindingMap, BindingConflict> {
        let mut out = self.clone();
        for (v, t) in other.iter() {
            out.try_insert(v.clone(), t.clone())?;
        }
        Ok(out)
    }

    /// Composition: apply `self`, then `outer`. Variables bound only by `outer`
    /// keep their `outer` binding.
    pub fn compose(&self, outer: &BindingMap) -> BindingMap {
        let mut out = self.map_values(|t| t.substitute(outer));
        for (v, t) in outer.iter() {
            if !out.contains(v) {
                out.insert(v.clone(), t.clone());
            }
        }
        out
    }

    pub fn map_values(&self, f: impl Fn(&Term) -> Term) -> BindingMap {
        Self(self.0.iter().map(|(v, t)| (v.clone(), f(t))).collect())
    }

    /// Keeps only the entries for variables accepted by `keep`.
    pub fn restrict(&self, keep: impl Fn(&Variable) -> bool) -> BindingMap {
        Self(
            self.0
                .iter()
                .filter(|(v, _)| keep(v))
                .map(|(v, t)| (v.clone(), t.clone()))
                .collect(),
        )
    }

    /// Drops `?x -> ?x` entries.
    pub fn without_identities(&self) -> BindingMap {
        Self(
            self.0
                .iter()
                .filter(|(v, t)| t.as_var() != Some(*v))
                .map(|(v, t)| (v.clone(), t.clone()))
                .collect(),
        )
    }

    /// True if every value is a variable and no two variables map to the same one.
    pub fn is_renaming(&self) -> bool {
        let mut seen = Vec::with_capacity(self.0.len());
        for t in self.0.values() {
            match t.as_var() {
                Some(v) if !seen.contains(&v) => seen.push(v),
                _ => return false,
            }
        }
        true
    }
}

impl FromIterator<(Variable, Term)> for BindingMap {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for BindingMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (v, t)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", v, t)?;
        }
        write!(f, "}}")
    }
}
