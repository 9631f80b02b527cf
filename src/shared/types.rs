//! Shared type definitions.
//!
//! Offers arrive with the same shape from the comparison REST endpoints and
//! from the live push channel, so both modules decode through the types here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Category
// ============================================================================

/// Comparison category. Each category has its own independent result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Taxi / ride-hailing between two places
    Taxi,
    /// Restaurant delivery
    Restaurant,
    /// Quick-commerce (groceries to an address)
    QuickCommerce,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 3] = [Category::Taxi, Category::Restaurant, Category::QuickCommerce];

    /// Get the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Taxi => "taxi",
            Self::Restaurant => "restaurant",
            Self::QuickCommerce => "quickcommerce",
        }
    }

    /// Whether offer minutes are a travel duration (taxi) rather than a delivery time.
    pub fn is_travel(&self) -> bool {
        matches!(self, Self::Taxi)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Offer
// ============================================================================

/// A single provider's offer.
///
/// `service_name` is the identity key: it is unique within a result set and
/// every other field may change between updates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "OfferWire")]
pub struct Offer {
    /// Provider name, e.g. "Uber" or "Zepto"
    pub service_name: String,
    /// Price as computed by the server
    pub price: Decimal,
    /// Promotional text shown with the offer
    pub offer_text: String,
    /// Trip duration (taxi) or delivery time, in minutes
    pub minutes: u32,
}

impl Offer {
    /// Create an offer.
    pub fn new(
        service_name: impl Into<String>,
        price: Decimal,
        offer_text: impl Into<String>,
        minutes: u32,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            price,
            offer_text: offer_text.into(),
            minutes,
        }
    }
}

/// Wire shape of an offer.
///
/// The server omits whichever of `Duration` / `DeliveryTime` is zero, so at
/// most one of them is present.
#[derive(Debug, Clone, Deserialize)]
struct OfferWire {
    #[serde(rename = "ServiceName")]
    service_name: String,
    #[serde(rename = "Price", with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(rename = "Offer", default)]
    offer: String,
    #[serde(rename = "Duration", default)]
    duration: Option<u32>,
    #[serde(rename = "DeliveryTime", default)]
    delivery_time: Option<u32>,
}

impl From<OfferWire> for Offer {
    fn from(wire: OfferWire) -> Self {
        Self {
            service_name: wire.service_name,
            price: wire.price,
            offer_text: wire.offer,
            minutes: wire.duration.or(wire.delivery_time).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(serde_json::to_string(&Category::Taxi).unwrap(), "\"taxi\"");
        assert_eq!(
            serde_json::to_string(&Category::QuickCommerce).unwrap(),
            "\"quickcommerce\""
        );
        let parsed: Category = serde_json::from_str("\"restaurant\"").unwrap();
        assert_eq!(parsed, Category::Restaurant);
        assert!(serde_json::from_str::<Category>("\"grocery\"").is_err());
    }

    #[test]
    fn test_offer_with_duration() {
        let json = r#"{"ServiceName":"Uber","Price":1250.5,"Offer":"10% off","Duration":185}"#;
        let offer: Offer = serde_json::from_str(json).unwrap();
        assert_eq!(offer.service_name, "Uber");
        assert_eq!(offer.price, dec("1250.5"));
        assert_eq!(offer.offer_text, "10% off");
        assert_eq!(offer.minutes, 185);
    }

    #[test]
    fn test_offer_with_delivery_time() {
        let json = r#"{"ServiceName":"Zepto","Price":99,"Offer":"Free delivery","DeliveryTime":12}"#;
        let offer: Offer = serde_json::from_str(json).unwrap();
        assert_eq!(offer.price, dec("99"));
        assert_eq!(offer.minutes, 12);
    }

    #[test]
    fn test_offer_without_timing_defaults_to_zero() {
        let json = r#"{"ServiceName":"Ola","Price":300.25,"Offer":""}"#;
        let offer: Offer = serde_json::from_str(json).unwrap();
        assert_eq!(offer.minutes, 0);
    }

    #[test]
    fn test_offer_missing_price_is_rejected() {
        let json = r#"{"ServiceName":"Ola","Offer":""}"#;
        assert!(serde_json::from_str::<Offer>(json).is_err());
    }
}
