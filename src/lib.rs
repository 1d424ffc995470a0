//! Backward-inference trees: goal-directed, budgeted search over rules that
//! either produce values directly or compose them from argument values.

pub mod error;
pub use error::{BitError, Result};
pub mod lang;
pub mod middleware;
pub mod prover;
pub mod rules;
