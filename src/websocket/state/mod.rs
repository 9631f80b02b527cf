//! State management for live results.
//!
//! - `results`: per-category result sets with partial-update reconciliation

pub mod results;

pub use results::{merge_update, ResultReconciler, ResultSet, TrackedOffer};
