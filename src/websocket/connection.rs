//! Push channel lifecycle.
//!
//! [`ConnectionManager`] is a synchronous state machine. It never performs I/O
//! itself: opening a socket, writing a frame, closing and arming the reconnect
//! timer all go through a [`Transport`]. The transport reports back with
//! [`TransportEvent`]s which are fed to [`ConnectionManager::handle_event`] one
//! at a time.
//!
//! Every channel attempt gets a new *generation*. Transport events and timer
//! firings carry the generation they were created for; anything tagged with a
//! superseded generation is ignored, so a late timer or a close frame from a
//! torn-down socket can never open a duplicate channel.

use std::time::Duration;

use crate::websocket::config::LiveConfig;
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::hooks::ChannelHooks;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    /// Reconnect attempts exhausted. Only an explicit `connect()` leaves this state.
    Failed,
}

/// I/O seam used by [`ConnectionManager`].
///
/// Implementations report outcomes asynchronously as [`TransportEvent`]s
/// tagged with the generation passed in.
pub trait Transport {
    /// Start opening a channel to `url`.
    fn open(&mut self, url: &str, generation: u64);

    /// Write one text frame on the channel of `generation`.
    fn send(&mut self, generation: u64, text: &str) -> WsResult<()>;

    /// Close (or abandon, if still opening) the channel of `generation`.
    fn close(&mut self, generation: u64);

    /// Deliver [`TransportEvent::ReconnectDue`] for `generation` after `delay`.
    fn schedule_reconnect(&mut self, generation: u64, delay: Duration);
}

/// Raw events reported by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened { generation: u64 },
    Message { generation: u64, text: String },
    Closed { generation: u64, code: Option<u16>, reason: String },
    Error { generation: u64, error: WebSocketError },
    ReconnectDue { generation: u64 },
}

impl TransportEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation }
            | Self::Message { generation, .. }
            | Self::Closed { generation, .. }
            | Self::Error { generation, .. }
            | Self::ReconnectDue { generation } => *generation,
        }
    }
}

/// Lifecycle events produced by [`ConnectionManager::handle_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Channel reached Open
    Opened,
    /// Raw inbound payload
    Message(String),
    /// Channel went down
    Closed { code: Option<u16>, reason: String },
    /// Transport error (always followed by `Closed` if the channel was up)
    Error(WebSocketError),
    /// A reconnect attempt has been scheduled
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect attempts exhausted; state is now `Failed`
    GaveUp { attempts: u32 },
}

/// Owns the push channel lifecycle and the reconnection policy.
pub struct ConnectionManager<T: Transport> {
    config: LiveConfig,
    transport: T,
    hooks: ChannelHooks,
    state: ChannelState,
    generation: u64,
    reconnect_attempts: u32,
    reconnect_pending: bool,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(config: LiveConfig, transport: T) -> Self {
        Self::with_hooks(config, transport, ChannelHooks::default())
    }

    pub fn with_hooks(config: LiveConfig, transport: T, hooks: ChannelHooks) -> Self {
        Self {
            config,
            transport,
            hooks,
            state: ChannelState::Disconnected,
            generation: 0,
            reconnect_attempts: 0,
            reconnect_pending: false,
        }
    }

    /// Open the channel.
    ///
    /// No-op while `Connecting` or `Open`. From `Failed` the attempt counter is
    /// reset. A reconnect timer pending from an earlier close becomes stale.
    pub fn connect(&mut self) {
        match self.state {
            ChannelState::Connecting | ChannelState::Open => {
                tracing::debug!("connect() ignored, channel is {:?}", self.state);
                return;
            }
            ChannelState::Failed => {
                self.reconnect_attempts = 0;
            }
            ChannelState::Disconnected | ChannelState::Closing => {}
        }
        self.begin_connecting();
    }

    /// Tear down the current channel and start a fresh connect cycle.
    ///
    /// Resets the attempt counter. Skipped while a connection attempt is already running.
    pub fn restart(&mut self) {
        match self.state {
            ChannelState::Connecting => {
                tracing::info!("Already connecting, skipping restart");
                return;
            }
            ChannelState::Open | ChannelState::Closing => {
                tracing::info!("Manual reconnection requested");
                self.transport.close(self.generation);
            }
            ChannelState::Disconnected | ChannelState::Failed => {}
        }
        self.reconnect_attempts = 0;
        self.begin_connecting();
    }

    /// Close the channel without reconnecting.
    pub fn disconnect(&mut self) {
        self.reconnect_pending = false;
        match self.state {
            ChannelState::Open | ChannelState::Connecting => {
                self.state = ChannelState::Closing;
                self.transport.close(self.generation);
            }
            ChannelState::Closing | ChannelState::Disconnected | ChannelState::Failed => {}
        }
    }

    /// Send a text payload. Only succeeds while `Open`; nothing is queued.
    pub fn send(&mut self, payload: &str) -> WsResult<()> {
        if self.state != ChannelState::Open {
            return Err(WebSocketError::NotReady);
        }
        self.transport.send(self.generation, payload)
    }

    /// Apply one transport event and return the resulting lifecycle events.
    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<ChannelEvent> {
        if event.generation() != self.generation {
            tracing::trace!(
                "Ignoring stale event for generation {} (current {})",
                event.generation(),
                self.generation
            );
            return Vec::new();
        }

        let mut events = Vec::new();
        match event {
            TransportEvent::Opened { .. } => {
                if self.state == ChannelState::Connecting {
                    self.state = ChannelState::Open;
                    self.reconnect_attempts = 0;
                    tracing::info!("Live price channel open");
                    self.emit(&mut events, ChannelEvent::Opened);
                }
            }
            TransportEvent::Message { text, .. } => {
                if matches!(self.state, ChannelState::Open | ChannelState::Closing) {
                    self.emit(&mut events, ChannelEvent::Message(text));
                }
            }
            TransportEvent::Closed { code, reason, .. } => {
                self.channel_down(&mut events, code, reason);
            }
            TransportEvent::Error { error, .. } => {
                tracing::error!("WebSocket error: {}", error);
                let reason = error.to_string();
                self.emit(&mut events, ChannelEvent::Error(error));
                self.channel_down(&mut events, None, reason);
            }
            TransportEvent::ReconnectDue { .. } => {
                if self.state == ChannelState::Disconnected && self.reconnect_pending {
                    self.begin_connecting();
                } else {
                    tracing::debug!("Reconnect timer superseded, state is {:?}", self.state);
                }
            }
        }
        events
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Generation of the current (or last) channel attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Whether a reconnect timer is armed for the current generation.
    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn begin_connecting(&mut self) {
        self.generation += 1;
        self.reconnect_pending = false;
        self.state = ChannelState::Connecting;
        tracing::info!("Connecting to {} (generation {})", self.config.url, self.generation);
        self.transport.open(&self.config.url, self.generation);
    }

    fn channel_down(&mut self, events: &mut Vec<ChannelEvent>, code: Option<u16>, reason: String) {
        let user_requested = match self.state {
            ChannelState::Connecting | ChannelState::Open => false,
            ChannelState::Closing => true,
            // Already down: a close following an error for the same channel
            ChannelState::Disconnected | ChannelState::Failed => return,
        };

        self.state = ChannelState::Disconnected;
        tracing::info!("Live price channel closed: {}", reason);
        self.emit(events, ChannelEvent::Closed { code, reason });

        if user_requested || !self.config.auto_reconnect {
            return;
        }

        if self.reconnect_attempts < self.config.max_reconnect_attempts {
            self.reconnect_attempts += 1;
            self.reconnect_pending = true;
            let delay = self.config.reconnect_delay();
            tracing::info!(
                "Reconnect attempt {}/{} in {}ms",
                self.reconnect_attempts,
                self.config.max_reconnect_attempts,
                delay.as_millis()
            );
            self.transport.schedule_reconnect(self.generation, delay);
            self.emit(
                events,
                ChannelEvent::Reconnecting {
                    attempt: self.reconnect_attempts,
                    delay,
                },
            );
        } else {
            self.state = ChannelState::Failed;
            tracing::warn!(
                "Failed to reconnect after {} attempts",
                self.reconnect_attempts
            );
            self.emit(
                events,
                ChannelEvent::GaveUp {
                    attempts: self.reconnect_attempts,
                },
            );
        }
    }

    fn emit(&self, events: &mut Vec<ChannelEvent>, event: ChannelEvent) {
        match &event {
            ChannelEvent::Opened => self.hooks.emit_open(),
            ChannelEvent::Message(text) => self.hooks.emit_message(text),
            ChannelEvent::Closed { code, reason } => self.hooks.emit_close(*code, reason),
            ChannelEvent::Error(error) => self.hooks.emit_error(error),
            ChannelEvent::Reconnecting { attempt, delay } => {
                self.hooks.emit_reconnecting(*attempt, *delay)
            }
            ChannelEvent::GaveUp { attempts } => self.hooks.emit_give_up(*attempts),
        }
        events.push(event);
    }
}

/// In-memory transport that records every call, for driving the state machine in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    pub calls: Vec<TransportCall>,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportCall {
    Open { generation: u64 },
    Send { generation: u64, text: String },
    Close { generation: u64 },
    Schedule { generation: u64, delay: Duration },
}

#[cfg(test)]
impl RecordingTransport {
    pub fn opens(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Open { .. }))
            .count()
    }

    pub fn sent(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Send { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl Transport for RecordingTransport {
    fn open(&mut self, _url: &str, generation: u64) {
        self.calls.push(TransportCall::Open { generation });
    }

    fn send(&mut self, generation: u64, text: &str) -> WsResult<()> {
        self.calls.push(TransportCall::Send {
            generation,
            text: text.to_string(),
        });
        Ok(())
    }

    fn close(&mut self, generation: u64) {
        self.calls.push(TransportCall::Close { generation });
    }

    fn schedule_reconnect(&mut self, generation: u64, delay: Duration) {
        self.calls.push(TransportCall::Schedule { generation, delay });
    }
}
