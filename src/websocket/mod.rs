//! Live price updates.
//!
//! The channel lifecycle ([`ConnectionManager`]), the active subscription
//! ([`SubscriptionController`]) and result reconciliation
//! ([`ResultReconciler`]) are synchronous and runtime-agnostic. With the
//! `ws-native` feature, [`LiveComparisonClient`] drives them from a tokio
//! event loop over tokio-tungstenite.
//!
//! ```rust,ignore
//! use pricepulse::websocket::*;
//! use futures_util::StreamExt;
//!
//! let mut client = LiveComparisonClient::new(LiveConfig::default());
//! client
//!     .search(Subscription::restaurant("India", "Karnataka", "Bengaluru", "Meghana Foods"))
//!     .await?;
//!
//! while let Some(event) = client.next().await {
//!     if let WsEvent::ResultsUpdated { category, .. } = event {
//!         let set = client.get_results(category).await;
//!         println!("{:?}", set.and_then(|s| s.update_notice()));
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod state;
pub mod subscriptions;
pub mod types;

#[cfg(feature = "ws-native")]
pub mod client;
#[cfg(feature = "ws-native")]
pub mod transport;

pub use config::LiveConfig;
pub use connection::{ChannelEvent, ChannelState, ConnectionManager, Transport, TransportEvent};
pub use error::{WebSocketError, WsResult};
pub use handlers::decode_update;
pub use hooks::ChannelHooks;
pub use state::{merge_update, ResultReconciler, ResultSet, TrackedOffer};
pub use subscriptions::{ControllerEvent, Subscription, SubscriptionController};
pub use types::{ContextLabel, PriceUpdate, WsEvent};

#[cfg(feature = "ws-native")]
pub use client::{LiveClientHandle, LiveComparisonClient};
#[cfg(feature = "ws-native")]
pub use handlers::MessageHandler;
#[cfg(feature = "ws-native")]
pub use transport::TungsteniteTransport;
