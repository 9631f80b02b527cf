//! Observer hooks for push channel lifecycle events.
//!
//! All hooks are optional and are invoked synchronously from
//! [`ConnectionManager::handle_event`](crate::websocket::connection::ConnectionManager::handle_event),
//! in the same order as the [`ChannelEvent`](crate::websocket::connection::ChannelEvent)s
//! it returns.
//!
//! ```rust,ignore
//! use pricepulse::websocket::ChannelHooks;
//!
//! let hooks = ChannelHooks::new()
//!     .on_open(|| println!("live prices connected"))
//!     .on_close(|code, reason| println!("closed ({:?}): {}", code, reason))
//!     .on_give_up(|attempts| eprintln!("gave up after {} attempts", attempts));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::websocket::error::WebSocketError;

pub type OnOpenCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnCloseCallback = Arc<dyn Fn(Option<u16>, &str) + Send + Sync>;
pub type OnMessageCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type OnErrorCallback = Arc<dyn Fn(&WebSocketError) + Send + Sync>;
pub type OnReconnectingCallback = Arc<dyn Fn(u32, Duration) + Send + Sync>;
pub type OnGiveUpCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Channel lifecycle hooks.
#[derive(Clone, Default)]
pub struct ChannelHooks {
    pub(crate) on_open: Option<OnOpenCallback>,
    pub(crate) on_close: Option<OnCloseCallback>,
    pub(crate) on_message: Option<OnMessageCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_reconnecting: Option<OnReconnectingCallback>,
    pub(crate) on_give_up: Option<OnGiveUpCallback>,
}

impl fmt::Debug for ChannelHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_reconnecting", &self.on_reconnecting.is_some())
            .field("on_give_up", &self.on_give_up.is_some())
            .finish()
    }
}

impl ChannelHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each time the channel reaches Open.
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Called when the channel goes down, with the close code if the server sent one.
    pub fn on_close(mut self, f: impl Fn(Option<u16>, &str) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Called with every raw inbound payload, in delivery order.
    pub fn on_message(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called on transport errors.
    pub fn on_error(mut self, f: impl Fn(&WebSocketError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called when a reconnect attempt is scheduled.
    pub fn on_reconnecting(mut self, f: impl Fn(u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_reconnecting = Some(Arc::new(f));
        self
    }

    /// Called once when reconnect attempts are exhausted.
    pub fn on_give_up(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_give_up = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_open(&self) {
        if let Some(cb) = &self.on_open {
            cb();
        }
    }

    pub(crate) fn emit_close(&self, code: Option<u16>, reason: &str) {
        if let Some(cb) = &self.on_close {
            cb(code, reason);
        }
    }

    pub(crate) fn emit_message(&self, payload: &str) {
        if let Some(cb) = &self.on_message {
            cb(payload);
        }
    }

    pub(crate) fn emit_error(&self, error: &WebSocketError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_reconnecting(&self, attempt: u32, delay: Duration) {
        if let Some(cb) = &self.on_reconnecting {
            cb(attempt, delay);
        }
    }

    pub(crate) fn emit_give_up(&self, attempts: u32) {
        if let Some(cb) = &self.on_give_up {
            cb(attempts);
        }
    }
}
