//! Live comparison client.
//!
//! One tokio task (the event loop) owns the [`SubscriptionController`] and
//! is the only writer of result state. Socket reader tasks, reconnect timers
//! and the public handle all talk to it through channels; the presentation
//! layer reads result snapshots between loop turns.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::sync::{mpsc, RwLock};

use crate::shared::{Category, Offer};
use crate::websocket::config::LiveConfig;
use crate::websocket::connection::{ChannelEvent, ChannelState, ConnectionManager, TransportEvent};
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::handlers::MessageHandler;
use crate::websocket::hooks::ChannelHooks;
use crate::websocket::state::{ResultReconciler, ResultSet};
use crate::websocket::subscriptions::{ControllerEvent, Subscription, SubscriptionController};
use crate::websocket::transport::TungsteniteTransport;
use crate::websocket::types::WsEvent;

#[cfg(feature = "api")]
use crate::api::ComparisonApiClient;

/// Internal command for the event loop
enum ClientCommand {
    Connect,
    SetSubscription(Subscription),
    Search {
        subscription: Subscription,
        offers: Vec<Offer>,
    },
    Restart,
    Disconnect,
}

/// Cloneable handle to a running [`LiveComparisonClient`].
///
/// Lets other tasks start searches and read results while the owner drives
/// the event stream.
#[derive(Clone)]
pub struct LiveClientHandle {
    cmd_tx: mpsc::Sender<ClientCommand>,
    results: Arc<RwLock<ResultReconciler>>,
    state: Arc<RwLock<ChannelState>>,
    subscription: Arc<RwLock<Option<Subscription>>>,
    #[cfg(feature = "api")]
    api: Option<ComparisonApiClient>,
}

impl LiveClientHandle {
    /// Open the channel. No-op if it is already open or opening.
    pub async fn connect(&self) -> WsResult<()> {
        self.send(ClientCommand::Connect).await
    }

    /// Replace the active subscription without touching displayed results.
    pub async fn set_subscription(&self, subscription: Subscription) -> WsResult<()> {
        self.send(ClientCommand::SetSubscription(subscription)).await
    }

    /// Show `offers` as a fresh result set and subscribe to live updates for it.
    pub async fn search_with_offers(
        &self,
        subscription: Subscription,
        offers: Vec<Offer>,
    ) -> WsResult<()> {
        self.send(ClientCommand::Search {
            subscription,
            offers,
        })
        .await
    }

    /// Look up offers for `subscription`, show them as a fresh result set and
    /// subscribe to live updates for it.
    ///
    /// On lookup failure nothing changes: the previous results and
    /// subscription stay in place.
    #[cfg(feature = "api")]
    pub async fn search(&self, subscription: Subscription) -> WsResult<usize> {
        let api = self.api.as_ref().ok_or_else(|| {
            WebSocketError::Lookup("no comparison API client configured".to_string())
        })?;
        let offers = api.compare(&subscription).await?;
        let count = offers.len();
        self.search_with_offers(subscription, offers).await?;
        Ok(count)
    }

    /// Drop the current channel and reconnect with a fresh attempt budget.
    pub async fn restart(&self) -> WsResult<()> {
        self.send(ClientCommand::Restart).await
    }

    /// Close the channel without reconnecting.
    pub async fn disconnect(&self) -> WsResult<()> {
        self.send(ClientCommand::Disconnect).await
    }

    /// Snapshot of a category's result set.
    pub async fn get_results(&self, category: Category) -> Option<ResultSet> {
        self.results.read().await.get(category).cloned()
    }

    pub async fn connection_state(&self) -> ChannelState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ChannelState::Open
    }

    pub async fn subscription(&self) -> Option<Subscription> {
        self.subscription.read().await.clone()
    }

    async fn send(&self, command: ClientCommand) -> WsResult<()> {
        self.cmd_tx.send(command).await?;
        Ok(())
    }
}

impl std::fmt::Debug for LiveClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveClientHandle").finish_non_exhaustive()
    }
}

pin_project! {
    /// Live price comparison client.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use pricepulse::websocket::*;
    /// use futures_util::StreamExt;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), WebSocketError> {
    ///     let mut client = LiveComparisonClient::new(LiveConfig::default());
    ///
    ///     client
    ///         .search(Subscription::taxi("India", "Delhi", "India", "Punjab"))
    ///         .await?;
    ///
    ///     while let Some(event) = client.next().await {
    ///         if let WsEvent::ResultsUpdated { category, .. } = event {
    ///             if let Some(set) = client.get_results(category).await {
    ///                 println!("Cheapest: {:?}", set.cheapest());
    ///             }
    ///         }
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub struct LiveComparisonClient {
        handle: LiveClientHandle,
        config: LiveConfig,
        #[pin]
        event_rx: mpsc::Receiver<WsEvent>,
        loop_task: tokio::task::JoinHandle<()>,
    }
}

impl LiveComparisonClient {
    /// Start the event loop. The channel opens with the first subscription
    /// (or an explicit [`connect`](Self::connect)).
    ///
    /// With the `api` feature, searches go to the default comparison server;
    /// use [`with_api`](Self::with_api) to point elsewhere. Must be called
    /// from within a tokio runtime.
    pub fn new(config: LiveConfig) -> Self {
        Self::with_hooks(config, ChannelHooks::default())
    }

    /// Start the event loop with channel observer hooks installed.
    pub fn with_hooks(config: LiveConfig, hooks: ChannelHooks) -> Self {
        // tokio channels reject a zero capacity
        let event_capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(event_capacity);
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_channel_capacity.max(1));
        let (transport_tx, transport_rx) = mpsc::channel(event_capacity);

        let transport = TungsteniteTransport::new(transport_tx, config.connect_timeout());
        let controller = SubscriptionController::new(ConnectionManager::with_hooks(
            config.clone(),
            transport,
            hooks,
        ));

        let results = Arc::new(RwLock::new(ResultReconciler::new()));
        let state = Arc::new(RwLock::new(ChannelState::Disconnected));
        let subscription = Arc::new(RwLock::new(None));

        let ctx = LoopContext {
            handler: MessageHandler::new(results.clone()),
            event_tx,
            state: state.clone(),
            subscription: subscription.clone(),
        };
        let loop_task = tokio::spawn(event_loop(controller, transport_rx, cmd_rx, ctx));

        #[cfg(feature = "api")]
        let api = match ComparisonApiClient::new_default() {
            Ok(api) => Some(api),
            Err(e) => {
                tracing::warn!("Comparison API client unavailable: {}", e);
                None
            }
        };

        Self {
            handle: LiveClientHandle {
                cmd_tx,
                results,
                state,
                subscription,
                #[cfg(feature = "api")]
                api,
            },
            config,
            event_rx,
            loop_task,
        }
    }

    /// Use `api` for [`search`](Self::search).
    #[cfg(feature = "api")]
    pub fn with_api(mut self, api: ComparisonApiClient) -> Self {
        self.handle.api = Some(api);
        self
    }

    /// A cloneable handle for driving this client from other tasks.
    pub fn handle(&self) -> LiveClientHandle {
        self.handle.clone()
    }

    pub async fn connect(&self) -> WsResult<()> {
        self.handle.connect().await
    }

    pub async fn set_subscription(&self, subscription: Subscription) -> WsResult<()> {
        self.handle.set_subscription(subscription).await
    }

    pub async fn search_with_offers(
        &self,
        subscription: Subscription,
        offers: Vec<Offer>,
    ) -> WsResult<()> {
        self.handle.search_with_offers(subscription, offers).await
    }

    /// See [`LiveClientHandle::search`]. Returns the number of offers found.
    #[cfg(feature = "api")]
    pub async fn search(&self, subscription: Subscription) -> WsResult<usize> {
        self.handle.search(subscription).await
    }

    pub async fn restart(&self) -> WsResult<()> {
        self.handle.restart().await
    }

    pub async fn disconnect(&self) -> WsResult<()> {
        self.handle.disconnect().await
    }

    pub async fn get_results(&self, category: Category) -> Option<ResultSet> {
        self.handle.get_results(category).await
    }

    pub async fn connection_state(&self) -> ChannelState {
        self.handle.connection_state().await
    }

    pub async fn is_connected(&self) -> bool {
        self.handle.is_connected().await
    }

    pub async fn subscription(&self) -> Option<Subscription> {
        self.handle.subscription().await
    }

    /// Check if the event loop is still running
    pub fn is_task_running(&self) -> bool {
        !self.loop_task.is_finished()
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }
}

impl Stream for LiveComparisonClient {
    type Item = WsEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        this.event_rx.poll_recv(cx)
    }
}

/// Shared context for the event loop
struct LoopContext {
    handler: MessageHandler,
    event_tx: mpsc::Sender<WsEvent>,
    state: Arc<RwLock<ChannelState>>,
    subscription: Arc<RwLock<Option<Subscription>>>,
}

impl LoopContext {
    fn emit(&self, event: WsEvent) {
        // Never block the loop on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(
                    "Event channel full, dropping event: {:?}",
                    std::mem::discriminant(&dropped)
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("Event receiver dropped");
            }
        }
    }

    async fn publish(&self, state: ChannelState, subscription: Option<Subscription>) {
        *self.state.write().await = state;
        *self.subscription.write().await = subscription;
    }

    async fn process(&self, event: ControllerEvent) -> Option<WsEvent> {
        let event = match event {
            ControllerEvent::Update(update) => return self.handler.handle_update(&update).await,
            ControllerEvent::DecodeError(error) => WsEvent::Error { error },
            ControllerEvent::Channel(ChannelEvent::Opened) => WsEvent::Connected,
            ControllerEvent::Channel(ChannelEvent::Closed { reason, .. }) => {
                WsEvent::Disconnected { reason }
            }
            ControllerEvent::Channel(ChannelEvent::Error(error)) => WsEvent::Error { error },
            ControllerEvent::Channel(ChannelEvent::Reconnecting { attempt, delay }) => {
                WsEvent::Reconnecting {
                    attempt,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                }
            }
            ControllerEvent::Channel(ChannelEvent::GaveUp { attempts }) => {
                WsEvent::GaveUp { attempts }
            }
            // Consumed by the controller
            ControllerEvent::Channel(ChannelEvent::Message(_)) => return None,
        };
        Some(event)
    }
}

/// Processes one event at a time to completion.
///
/// Shared state is published before the turn's events are emitted, so a
/// consumer reacting to an event always reads state at least as new.
async fn event_loop(
    mut controller: SubscriptionController<TungsteniteTransport>,
    mut transport_rx: mpsc::Receiver<TransportEvent>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
    ctx: LoopContext,
) {
    loop {
        let mut outgoing = Vec::new();
        tokio::select! {
            event = transport_rx.recv() => {
                let Some(event) = event else {
                    return;
                };
                for controller_event in controller.handle_event(event) {
                    outgoing.extend(ctx.process(controller_event).await);
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Connect) => controller.connection_mut().connect(),
                    Some(ClientCommand::SetSubscription(subscription)) => {
                        controller.set_subscription(subscription);
                    }
                    Some(ClientCommand::Search { subscription, offers }) => {
                        outgoing.push(ctx.handler.handle_search(&subscription, offers).await);
                        controller.set_subscription(subscription);
                    }
                    Some(ClientCommand::Restart) => controller.connection_mut().restart(),
                    Some(ClientCommand::Disconnect) => controller.connection_mut().disconnect(),
                    None => {
                        tracing::debug!("All client handles dropped, stopping event loop");
                        controller.connection_mut().disconnect();
                        return;
                    }
                }
            }
        }

        let state = controller.state();
        let subscription = controller.subscription().cloned();
        ctx.publish(state, subscription).await;
        for event in outgoing {
            ctx.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_search_with_offers_populates_results() {
        let client = LiveComparisonClient::new(LiveConfig::with_url("ws://127.0.0.1:1/ws"));
        let sub = Subscription::taxi("India", "Delhi", "India", "Punjab");
        client
            .search_with_offers(
                sub.clone(),
                vec![
                    Offer::new("Ola", Decimal::new(2600, 0), "", 310),
                    Offer::new("Uber", Decimal::new(2400, 0), "", 300),
                ],
            )
            .await
            .unwrap();

        let mut client = client;
        let event = futures_util::StreamExt::next(&mut client).await;
        assert!(matches!(
            event,
            Some(WsEvent::ResultsUpdated {
                category: Category::Taxi,
                is_fresh_search: true,
                ..
            })
        ));

        let set = client.get_results(Category::Taxi).await.unwrap();
        assert_eq!(set.cheapest().unwrap().service_name(), "Uber");
        assert_eq!(set.context_label().as_str(), "Taxi from Delhi to Punjab");
        assert_eq!(client.subscription().await, Some(sub));
        assert!(client.get_results(Category::Restaurant).await.is_none());
    }

    #[cfg(feature = "api")]
    #[tokio::test]
    async fn test_failed_lookup_keeps_previous_search() {
        let api = ComparisonApiClient::new("http://127.0.0.1:1/api").unwrap();
        let mut client =
            LiveComparisonClient::new(LiveConfig::with_url("ws://127.0.0.1:1/ws")).with_api(api);
        let delhi = Subscription::taxi("India", "Delhi", "India", "Punjab");
        client
            .search_with_offers(
                delhi.clone(),
                vec![Offer::new("Uber", Decimal::new(2400, 0), "", 300)],
            )
            .await
            .unwrap();
        loop {
            match futures_util::StreamExt::next(&mut client).await {
                Some(WsEvent::ResultsUpdated { .. }) => break,
                Some(_) => continue,
                None => panic!("event stream ended"),
            }
        }

        let err = client
            .search(Subscription::taxi("India", "Goa", "India", "Kerala"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebSocketError::Lookup(_)));

        let set = client.get_results(Category::Taxi).await.unwrap();
        assert_eq!(set.context_label().as_str(), "Taxi from Delhi to Punjab");
        assert_eq!(set.cheapest().unwrap().price(), Decimal::new(2400, 0));
        assert_eq!(client.subscription().await, Some(delhi));
    }

    #[tokio::test]
    async fn test_zero_channel_capacity_is_clamped() {
        let client = LiveComparisonClient::new(LiveConfig {
            event_channel_capacity: 0,
            command_channel_capacity: 0,
            ..LiveConfig::with_url("ws://127.0.0.1:1/ws")
        });
        client.disconnect().await.unwrap();
        assert!(client.is_task_running());
    }

    #[tokio::test]
    async fn test_idle_client_stream_is_pending() {
        let client = LiveComparisonClient::new(LiveConfig::with_url("ws://127.0.0.1:1/ws"));
        let mut stream = tokio_test::task::spawn(client);
        tokio_test::assert_pending!(stream.poll_next());
        assert!(!stream.is_woken());
    }

    #[tokio::test]
    async fn test_handle_outlives_borrow() {
        let client = LiveComparisonClient::new(LiveConfig::with_url("ws://127.0.0.1:1/ws"));
        let handle = client.handle();
        assert_eq!(handle.connection_state().await, ChannelState::Disconnected);
        assert!(client.is_task_running());
        handle.disconnect().await.unwrap();
    }
}
