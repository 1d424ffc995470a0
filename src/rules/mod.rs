//! Concrete rules shipped with the crate: a fact lookup generator, Horn-clause
//! composers, and rule applications that replay multi-step pathways.

pub mod horn;
pub mod lookup;
pub mod rule_app;

pub use horn::HornRule;
pub use lookup::{FactBase, LookupRule};
pub use rule_app::{ArgProvider, RuleApplication};
