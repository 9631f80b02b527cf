//! Subscription management for the live price channel.
//!
//! A client has at most one active [`Subscription`]. It survives reconnects
//! and is resent exactly once every time the channel reaches `Open`.

use serde::{Deserialize, Serialize};

use crate::shared::Category;
use crate::websocket::connection::{
    ChannelEvent, ChannelState, ConnectionManager, Transport, TransportEvent,
};
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::handlers::decode_update;
use crate::websocket::types::{ContextLabel, PriceUpdate};

/// What live updates the client wants to receive.
///
/// Serializes flat, tagged by `category`:
/// `{"category":"taxi","fromCountry":"India","fromState":"Delhi",...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Subscription {
    Taxi {
        from_country: String,
        from_state: String,
        to_country: String,
        to_state: String,
    },
    Restaurant {
        country: String,
        state: String,
        city: String,
        restaurant: String,
    },
    QuickCommerce {
        country: String,
        state: String,
        city: String,
        address: String,
        #[serde(
            default,
            deserialize_with = "non_empty_item",
            skip_serializing_if = "Option::is_none"
        )]
        grocery_item: Option<String>,
    },
}

/// An empty grocery item means "any item".
fn non_empty_item<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let item = Option::<String>::deserialize(deserializer)?;
    Ok(item.filter(|item| !item.is_empty()))
}

impl Subscription {
    pub fn taxi(
        from_country: impl Into<String>,
        from_state: impl Into<String>,
        to_country: impl Into<String>,
        to_state: impl Into<String>,
    ) -> Self {
        Self::Taxi {
            from_country: from_country.into(),
            from_state: from_state.into(),
            to_country: to_country.into(),
            to_state: to_state.into(),
        }
    }

    pub fn restaurant(
        country: impl Into<String>,
        state: impl Into<String>,
        city: impl Into<String>,
        restaurant: impl Into<String>,
    ) -> Self {
        Self::Restaurant {
            country: country.into(),
            state: state.into(),
            city: city.into(),
            restaurant: restaurant.into(),
        }
    }

    pub fn quick_commerce(
        country: impl Into<String>,
        state: impl Into<String>,
        city: impl Into<String>,
        address: impl Into<String>,
        grocery_item: Option<String>,
    ) -> Self {
        Self::QuickCommerce {
            country: country.into(),
            state: state.into(),
            city: city.into(),
            address: address.into(),
            grocery_item: grocery_item.filter(|item| !item.is_empty()),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Taxi { .. } => Category::Taxi,
            Self::Restaurant { .. } => Category::Restaurant,
            Self::QuickCommerce { .. } => Category::QuickCommerce,
        }
    }

    /// Heading for the result set produced by searching with this subscription.
    pub fn context_label(&self) -> ContextLabel {
        match self {
            Self::Taxi {
                from_state,
                to_state,
                ..
            } => ContextLabel::new(format!("Taxi from {} to {}", from_state, to_state)),
            Self::Restaurant {
                state,
                city,
                restaurant,
                ..
            } => ContextLabel::new(format!("{} in {}, {}", restaurant, city, state)),
            Self::QuickCommerce {
                state,
                city,
                address,
                grocery_item,
                ..
            } => match grocery_item {
                Some(item) => {
                    ContextLabel::new(format!("{} to {}, {}, {}", item, address, city, state))
                }
                None => ContextLabel::new(format!("Delivery to {}, {}, {}", address, city, state)),
            },
        }
    }

    /// The `route` or `location` the server stamps on updates for this subscription.
    pub fn update_context(&self) -> String {
        match self {
            Self::Taxi {
                from_state,
                to_state,
                ..
            } => format!("{} to {}", from_state, to_state),
            Self::Restaurant { state, city, .. } | Self::QuickCommerce { state, city, .. } => {
                format!("{}, {}", city, state)
            }
        }
    }

    pub fn to_json(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Output of [`SubscriptionController::handle_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Lifecycle change of the underlying channel
    Channel(ChannelEvent),
    /// A decoded push update, ready for routing by category
    Update(PriceUpdate),
    /// An inbound payload was discarded
    DecodeError(WebSocketError),
}

type UpdateHandler = Box<dyn FnMut(&PriceUpdate) + Send>;

/// Keeps the active subscription in sync with the channel.
///
/// Wraps a [`ConnectionManager`]: decodes inbound payloads into
/// [`PriceUpdate`]s and resends the subscription after every open.
pub struct SubscriptionController<T: Transport> {
    connection: ConnectionManager<T>,
    subscription: Option<Subscription>,
    update_handler: Option<UpdateHandler>,
}

impl<T: Transport> SubscriptionController<T> {
    pub fn new(connection: ConnectionManager<T>) -> Self {
        Self {
            connection,
            subscription: None,
            update_handler: None,
        }
    }

    /// Register the consumer of decoded updates. Replaces any earlier handler.
    pub fn on_update<F>(&mut self, handler: F)
    where
        F: FnMut(&PriceUpdate) + Send + 'static,
    {
        self.update_handler = Some(Box::new(handler));
    }

    /// Replace the active subscription.
    ///
    /// Sent immediately when the channel is open; otherwise a connect cycle is
    /// started (unless one is already underway) and the subscription goes out
    /// on open.
    pub fn set_subscription(&mut self, subscription: Subscription) {
        tracing::debug!("Active subscription set to {}", subscription.category());
        self.subscription = Some(subscription);

        match self.connection.state() {
            ChannelState::Open => self.send_active(),
            ChannelState::Connecting => {}
            ChannelState::Disconnected | ChannelState::Closing | ChannelState::Failed => {
                self.connection.connect();
            }
        }
    }

    /// Feed one transport event through the channel and decode any payload.
    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<ControllerEvent> {
        let mut out = Vec::new();
        for channel_event in self.connection.handle_event(event) {
            match channel_event {
                ChannelEvent::Opened => {
                    self.send_active();
                    out.push(ControllerEvent::Channel(ChannelEvent::Opened));
                }
                ChannelEvent::Message(text) => match decode_update(&text) {
                    Ok(update) => {
                        if let Some(handler) = self.update_handler.as_mut() {
                            handler(&update);
                        }
                        out.push(ControllerEvent::Update(update));
                    }
                    Err(e) => {
                        tracing::warn!("Discarding live update: {}", e);
                        out.push(ControllerEvent::DecodeError(e));
                    }
                },
                other => out.push(ControllerEvent::Channel(other)),
            }
        }
        out
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub fn state(&self) -> ChannelState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.connection
    }

    fn send_active(&mut self) {
        let Some(subscription) = &self.subscription else {
            return;
        };
        let payload = match subscription.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to serialize subscription: {}", e);
                return;
            }
        };
        match self.connection.send(&payload) {
            Ok(()) => tracing::debug!("Sent subscription: {}", payload),
            // Resent on the next open
            Err(e) => tracing::warn!("Failed to send subscription: {}", e),
        }
    }
}

impl<T: Transport> std::fmt::Debug for SubscriptionController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionController")
            .field("state", &self.connection.state())
            .field("subscription", &self.subscription)
            .field("has_update_handler", &self.update_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::config::LiveConfig;
    use crate::websocket::connection::RecordingTransport;
    use std::sync::{Arc, Mutex};

    fn controller() -> SubscriptionController<RecordingTransport> {
        SubscriptionController::new(ConnectionManager::new(
            LiveConfig::default(),
            RecordingTransport::default(),
        ))
    }

    fn current_gen(c: &SubscriptionController<RecordingTransport>) -> u64 {
        c.connection().generation()
    }

    fn open(c: &mut SubscriptionController<RecordingTransport>) -> Vec<ControllerEvent> {
        let generation = current_gen(c);
        c.handle_event(TransportEvent::Opened { generation })
    }

    fn drop_channel(c: &mut SubscriptionController<RecordingTransport>) {
        let generation = current_gen(c);
        c.handle_event(TransportEvent::Closed {
            generation,
            code: Some(1006),
            reason: "abnormal".to_string(),
        });
        let generation = current_gen(c);
        c.handle_event(TransportEvent::ReconnectDue { generation });
    }

    fn message(
        c: &mut SubscriptionController<RecordingTransport>,
        text: &str,
    ) -> Vec<ControllerEvent> {
        let generation = current_gen(c);
        c.handle_event(TransportEvent::Message {
            generation,
            text: text.to_string(),
        })
    }

    fn delhi_to_punjab() -> Subscription {
        Subscription::taxi("India", "Delhi", "India", "Punjab")
    }

    #[test]
    fn test_subscription_serializes_flat() {
        let json = delhi_to_punjab().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["category"], "taxi");
        assert_eq!(value["fromCountry"], "India");
        assert_eq!(value["fromState"], "Delhi");
        assert_eq!(value["toState"], "Punjab");
    }

    #[test]
    fn test_grocery_item_omitted_when_absent() {
        let sub =
            Subscription::quick_commerce("India", "Maharashtra", "Mumbai", "Bandra West", None);
        let json = sub.to_json().unwrap();
        assert!(json.contains("\"category\":\"quickcommerce\""));
        assert!(!json.contains("groceryItem"));

        let sub = Subscription::quick_commerce(
            "India",
            "Maharashtra",
            "Mumbai",
            "Bandra West",
            Some("Milk".to_string()),
        );
        assert!(sub.to_json().unwrap().contains("\"groceryItem\":\"Milk\""));
    }

    #[test]
    fn test_subscription_round_trips_from_wire() {
        let json = r#"{"category":"restaurant","country":"India","state":"Karnataka","city":"Bengaluru","restaurant":"Meghana Foods"}"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.category(), Category::Restaurant);
        assert_eq!(
            sub,
            Subscription::restaurant("India", "Karnataka", "Bengaluru", "Meghana Foods")
        );
    }

    #[test]
    fn test_empty_grocery_item_from_wire_is_none() {
        let json = r#"{"category":"quickcommerce","country":"India","state":"MH","city":"Mumbai","address":"Bandra","groceryItem":""}"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(
            sub,
            Subscription::quick_commerce("India", "MH", "Mumbai", "Bandra", None)
        );
        assert_eq!(sub.context_label().as_str(), "Delivery to Bandra, Mumbai, MH");
        assert!(!sub.to_json().unwrap().contains("groceryItem"));

        let json = r#"{"category":"quickcommerce","country":"India","state":"MH","city":"Mumbai","address":"Bandra","groceryItem":null}"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.context_label().as_str(), "Delivery to Bandra, Mumbai, MH");
    }

    #[test]
    fn test_update_context_matches_server_stamp() {
        assert_eq!(delhi_to_punjab().update_context(), "Delhi to Punjab");
        assert_eq!(
            Subscription::restaurant("India", "Karnataka", "Bengaluru", "Meghana Foods")
                .update_context(),
            "Bengaluru, Karnataka"
        );
        assert_eq!(
            Subscription::quick_commerce("India", "MH", "Mumbai", "Bandra", Some("Milk".into()))
                .update_context(),
            "Mumbai, MH"
        );
    }

    #[test]
    fn test_context_labels() {
        assert_eq!(
            delhi_to_punjab().context_label().as_str(),
            "Taxi from Delhi to Punjab"
        );
        assert_eq!(
            Subscription::restaurant("India", "Karnataka", "Bengaluru", "Meghana Foods")
                .context_label()
                .as_str(),
            "Meghana Foods in Bengaluru, Karnataka"
        );
        assert_eq!(
            Subscription::quick_commerce("India", "Maharashtra", "Mumbai", "Bandra West", None)
                .context_label()
                .as_str(),
            "Delivery to Bandra West, Mumbai, Maharashtra"
        );
        assert_eq!(
            Subscription::quick_commerce(
                "India",
                "Maharashtra",
                "Mumbai",
                "Bandra West",
                Some("Eggs".to_string())
            )
            .context_label()
            .as_str(),
            "Eggs to Bandra West, Mumbai, Maharashtra"
        );
    }

    #[test]
    fn test_set_subscription_while_disconnected_connects() {
        let mut c = controller();
        c.set_subscription(delhi_to_punjab());
        assert_eq!(c.state(), ChannelState::Connecting);
        assert_eq!(c.connection().transport().opens(), 1);
        assert!(c.connection().transport().sent().is_empty());
    }

    #[test]
    fn test_sent_exactly_once_on_open() {
        let mut c = controller();
        c.set_subscription(delhi_to_punjab());
        // A second search before the channel opens replaces the first
        let restaurant =
            Subscription::restaurant("India", "Karnataka", "Bengaluru", "Meghana Foods");
        c.set_subscription(restaurant.clone());
        assert_eq!(c.connection().transport().opens(), 1);

        let events = open(&mut c);
        assert_eq!(events, vec![ControllerEvent::Channel(ChannelEvent::Opened)]);
        assert_eq!(
            c.connection().transport().sent(),
            vec![restaurant.to_json().unwrap().as_str()]
        );

        // Duplicate open notifications for the same channel do not resend
        open(&mut c);
        assert_eq!(c.connection().transport().sent().len(), 1);
    }

    #[test]
    fn test_set_subscription_while_open_sends_immediately() {
        let mut c = controller();
        c.connection_mut().connect();
        open(&mut c);
        assert!(c.connection().transport().sent().is_empty());

        c.set_subscription(delhi_to_punjab());
        assert_eq!(c.connection().transport().sent().len(), 1);
        assert_eq!(c.connection().transport().opens(), 1);
    }

    #[test]
    fn test_resent_after_reconnect() {
        let mut c = controller();
        c.set_subscription(delhi_to_punjab());
        open(&mut c);
        drop_channel(&mut c);
        assert_eq!(c.state(), ChannelState::Connecting);
        open(&mut c);

        let expected = delhi_to_punjab().to_json().unwrap();
        assert_eq!(
            c.connection().transport().sent(),
            vec![expected.as_str(), expected.as_str()]
        );
    }

    #[test]
    fn test_set_subscription_from_failed_restarts_cycle() {
        let mut c = SubscriptionController::new(ConnectionManager::new(
            LiveConfig {
                max_reconnect_attempts: 0,
                ..Default::default()
            },
            RecordingTransport::default(),
        ));
        c.set_subscription(delhi_to_punjab());
        let generation = current_gen(&c);
        c.handle_event(TransportEvent::Closed {
            generation,
            code: None,
            reason: "refused".to_string(),
        });
        assert_eq!(c.state(), ChannelState::Failed);

        c.set_subscription(delhi_to_punjab());
        assert_eq!(c.state(), ChannelState::Connecting);
        assert_eq!(c.connection().transport().opens(), 2);
    }

    #[test]
    fn test_updates_decoded_and_handed_to_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut c = controller();
        {
            let seen = seen.clone();
            c.on_update(move |update| seen.lock().unwrap().push(update.category));
        }
        c.set_subscription(delhi_to_punjab());
        open(&mut c);

        let events = message(
            &mut c,
            r#"{"category":"taxi","route":"Delhi to Punjab","offers":[{"ServiceName":"Uber","Price":2400,"Offer":"","Duration":300}],"timestamp":1700000000}"#,
        );
        assert!(matches!(&events[0], ControllerEvent::Update(u) if u.offers.len() == 1));
        assert_eq!(*seen.lock().unwrap(), vec![Category::Taxi]);
    }

    #[test]
    fn test_malformed_payload_is_discarded() {
        let mut c = controller();
        c.set_subscription(delhi_to_punjab());
        open(&mut c);

        for bad in [
            "not json",
            r#"{"category":"bus","offers":[],"timestamp":1}"#,
            r#"{"offers":[]}"#,
        ] {
            let events = message(&mut c, bad);
            assert!(matches!(events.as_slice(), [ControllerEvent::DecodeError(_)]));
        }
        assert_eq!(c.subscription(), Some(&delhi_to_punjab()));
        assert_eq!(c.state(), ChannelState::Open);
    }
}
