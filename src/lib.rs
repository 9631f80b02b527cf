//! # pricepulse
//!
//! Client-side core of a live price comparison app for taxi rides,
//! restaurant delivery and quick-commerce.
//!
//! ## Modules
//!
//! - [`websocket`]: live update channel, active subscription and result reconciliation
//! - [`api`]: REST client for one-shot comparison lookups and search form options
//!
//! Plus a shared module:
//! - [`shared`]: categories, offers and price formatting
//!
//! ## Quick Start - Live Results
//!
//! ```rust,ignore
//! use pricepulse::prelude::*;
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WebSocketError> {
//!     let mut client = LiveComparisonClient::new(LiveConfig::default());
//!
//!     let found = client
//!         .search(Subscription::taxi("India", "Delhi", "India", "Punjab"))
//!         .await?;
//!     println!("{} offers", found);
//!
//!     while let Some(event) = client.next().await {
//!         if let WsEvent::ResultsUpdated { category, .. } = event {
//!             if let Some(set) = client.get_results(category).await {
//!                 for tracked in set.offers() {
//!                     println!(
//!                         "{} {}{}",
//!                         tracked.service_name(),
//!                         format_price(tracked.price()),
//!                         if tracked.changed { " (updated)" } else { "" }
//!                     );
//!                 }
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start - Reconciliation Only
//!
//! ```rust,ignore
//! use pricepulse::prelude::*;
//!
//! let existing = ResultSet::fresh(ContextLabel::new("Taxi from Delhi to Punjab"), offers);
//! let merged = merge_update(Some(existing), incoming, ContextLabel::new(""), false);
//! println!("Cheapest: {:?}", merged.cheapest());
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Shared types and formatting helpers.
/// Used across all modules.
pub mod shared;

/// Network URL constants (API and WebSocket endpoints).
pub mod network;

/// REST API client for comparison lookups.
#[cfg(feature = "api")]
pub mod api;

/// Live update channel and result reconciliation.
pub mod websocket;

// ============================================================================
// PRELUDE
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use pricepulse::prelude::*;
/// ```
pub mod prelude {
    // Shared types
    pub use crate::shared::{format_eta, format_price, Category, Offer};

    // Network constants
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_WS_URL};

    // API module exports
    #[cfg(feature = "api")]
    pub use crate::api::{
        ApiError, ApiResult, ComparisonApiClient, ComparisonApiClientBuilder, OptionList,
        OptionsQuery, RetryConfig,
    };

    // WebSocket module exports
    pub use crate::websocket::{
        merge_update, ChannelHooks, ChannelState, ContextLabel, LiveConfig, PriceUpdate,
        ResultReconciler, ResultSet, Subscription, TrackedOffer, WebSocketError, WsEvent,
        WsResult,
    };
    #[cfg(feature = "ws-native")]
    pub use crate::websocket::{LiveClientHandle, LiveComparisonClient};
}
