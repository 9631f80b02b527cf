//! Shared types and utilities used across the API and WebSocket modules.

pub mod price;
pub mod types;

// Re-export commonly used items
pub use price::{format_eta, format_price, CURRENCY_SYMBOL};
pub use types::*;
