//! Message handlers for live price updates.
//!
//! Decodes raw payloads and routes them by category into the shared
//! [`ResultReconciler`].

#[cfg(feature = "ws-native")]
use std::sync::Arc;
#[cfg(feature = "ws-native")]
use tokio::sync::RwLock;

use crate::shared::Category;
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::types::PriceUpdate;
#[cfg(feature = "ws-native")]
use crate::{
    shared::Offer,
    websocket::{state::ResultReconciler, subscriptions::Subscription, types::WsEvent},
};

/// Decode one inbound text frame.
///
/// Rejects payloads that are not valid JSON, carry an unknown category, or
/// lack the route (taxi) or location (delivery categories) they were
/// computed for.
pub fn decode_update(text: &str) -> WsResult<PriceUpdate> {
    let update: PriceUpdate = serde_json::from_str(text)?;
    if update.context().is_none() {
        let field = match update.category {
            Category::Taxi => "route",
            Category::Restaurant | Category::QuickCommerce => "location",
        };
        return Err(WebSocketError::MessageParseError(format!(
            "{} update is missing `{}`",
            update.category, field
        )));
    }
    Ok(update)
}

/// Applies decoded updates and fresh searches to shared result state.
#[cfg(feature = "ws-native")]
#[derive(Debug, Clone)]
pub struct MessageHandler {
    results: Arc<RwLock<ResultReconciler>>,
}

#[cfg(feature = "ws-native")]
impl MessageHandler {
    pub fn new(results: Arc<RwLock<ResultReconciler>>) -> Self {
        Self { results }
    }

    /// Merge a push update into its category's result set.
    ///
    /// Updates computed for something other than the displayed search are
    /// dropped and produce no event.
    pub async fn handle_update(&self, update: &PriceUpdate) -> Option<WsEvent> {
        let mut results = self.results.write().await;
        let set = results.apply_update(update)?;
        tracing::debug!(
            "Merged {} {} offer(s), {} changed",
            update.offers.len(),
            update.category,
            set.changed_offers().count()
        );
        Some(WsEvent::ResultsUpdated {
            category: update.category,
            is_fresh_search: false,
            updated_at: set.updated_at(),
        })
    }

    /// Replace a category's result set with the offers of a new search.
    pub async fn handle_search(&self, subscription: &Subscription, offers: Vec<Offer>) -> WsEvent {
        let category = subscription.category();
        let mut results = self.results.write().await;
        let set = results.apply_search(subscription, offers);
        tracing::debug!("Fresh {} search with {} offer(s)", category, set.len());
        WsEvent::ResultsUpdated {
            category,
            is_fresh_search: true,
            updated_at: set.updated_at(),
        }
    }
}
