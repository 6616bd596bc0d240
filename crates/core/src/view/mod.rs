//! View derivation
//!
//! Pure functions that turn the task collection into what the list and the
//! stat cards display.

mod query;
mod stats;

pub use query::*;
pub use stats::TaskStats;
