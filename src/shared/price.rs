//! Price and ETA formatting.
//!
//! The server computes every price; these helpers only render values for a
//! presentation layer.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::shared::types::Category;

/// Currency symbol prefixed to rendered prices.
pub const CURRENCY_SYMBOL: &str = "₹";

/// Format a price with two decimal places, e.g. `₹1250.50`.
///
/// # Example
///
/// ```
/// use pricepulse::shared::price::format_price;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_price(Decimal::new(12505, 1)), "₹1250.50");
/// ```
pub fn format_price(price: Decimal) -> String {
    let rounded = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{}{:.2}", CURRENCY_SYMBOL, rounded)
}

/// Format an offer's minutes for its category.
///
/// Taxi offers carry a trip duration and render as `3h 5m`; delivery
/// categories render as `25 minutes`.
pub fn format_eta(category: Category, minutes: u32) -> String {
    if category.is_travel() {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{} minutes", minutes)
    }
}
