//! Message types for the live price protocol.
//!
//! Outbound messages are [`Subscription`](crate::websocket::subscriptions::Subscription)s,
//! serialized flat. Inbound messages are [`PriceUpdate`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::shared::{Category, Offer};
use crate::websocket::error::WebSocketError;

// ============================================================================
// INBOUND (Server → Client)
// ============================================================================

/// A pushed batch of offers for one category.
///
/// Taxi updates carry `route` ("Delhi to Punjab"); delivery categories carry
/// `location` ("Mumbai, Maharashtra").
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceUpdate {
    pub category: Category,
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl PriceUpdate {
    /// The route or location this update was computed for.
    pub fn context(&self) -> Option<&str> {
        match self.category {
            Category::Taxi => self.route.as_deref(),
            Category::Restaurant | Category::QuickCommerce => self.location.as_deref(),
        }
        .filter(|s| !s.is_empty())
    }
}

// ============================================================================
// CONTEXT LABEL
// ============================================================================

/// Heading shown above a result set ("Taxi from Delhi to Punjab").
///
/// Set once per fresh search and kept across push updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextLabel(String);

impl ContextLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label derived from a push update, used only when no result set is
    /// displayed yet for its category.
    pub fn for_update(update: &PriceUpdate) -> Self {
        let context = update.context().unwrap_or_default();
        match update.category {
            Category::Taxi => Self(format!("Taxi from {}", context)),
            Category::Restaurant => Self(format!("Restaurant delivery in {}", context)),
            Category::QuickCommerce => Self(format!("Delivery in {}", context)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContextLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// CLIENT EVENTS
// ============================================================================

/// Events emitted by the live client to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    /// Channel open (initially or after a reconnect)
    Connected,

    /// Channel went down
    Disconnected { reason: String },

    /// Reconnect scheduled
    Reconnecting { attempt: u32, delay_ms: u64 },

    /// Reconnect attempts exhausted; live updates stop until the next search
    GaveUp { attempts: u32 },

    /// A category's result set changed and should be re-rendered
    ResultsUpdated {
        category: Category,
        is_fresh_search: bool,
        updated_at: Option<DateTime<Utc>>,
    },

    /// Error occurred
    Error { error: WebSocketError },
}
