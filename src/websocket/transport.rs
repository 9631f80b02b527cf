//! tokio-tungstenite implementation of [`Transport`].
//!
//! Each channel runs in its own task that forwards socket activity into the
//! event loop as [`TransportEvent`]s. Reconnect timers are plain sleeping
//! tasks that report back the same way.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::websocket::connection::{Transport, TransportEvent};
use crate::websocket::error::{WebSocketError, WsResult};

/// Internal command for a channel task
enum ChannelCommand {
    Send(String),
    Close,
}

struct ActiveChannel {
    generation: u64,
    cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
    task: JoinHandle<()>,
}

/// WebSocket transport backed by tokio-tungstenite.
pub struct TungsteniteTransport {
    event_tx: mpsc::Sender<TransportEvent>,
    connect_timeout: Duration,
    channel: Option<ActiveChannel>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl TungsteniteTransport {
    pub fn new(event_tx: mpsc::Sender<TransportEvent>, connect_timeout: Duration) -> Self {
        Self {
            event_tx,
            connect_timeout,
            channel: None,
            reconnect_timer: None,
        }
    }

    fn channel_for(&self, generation: u64) -> Option<&ActiveChannel> {
        self.channel
            .as_ref()
            .filter(|channel| channel.generation == generation)
    }
}

impl Transport for TungsteniteTransport {
    fn open(&mut self, url: &str, generation: u64) {
        if let Some(previous) = self.channel.take() {
            // Dropping the command sender ends the old task
            tracing::debug!("Replacing channel of generation {}", previous.generation);
        }
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(channel_task(
            url.to_string(),
            generation,
            self.connect_timeout,
            cmd_rx,
            self.event_tx.clone(),
        ));
        self.channel = Some(ActiveChannel {
            generation,
            cmd_tx,
            task,
        });
    }

    fn send(&mut self, generation: u64, text: &str) -> WsResult<()> {
        let channel = self.channel_for(generation).ok_or(WebSocketError::NotReady)?;
        channel
            .cmd_tx
            .send(ChannelCommand::Send(text.to_string()))
            .map_err(|_| WebSocketError::SendFailed("channel task has exited".to_string()))
    }

    fn close(&mut self, generation: u64) {
        if let Some(channel) = self.channel_for(generation) {
            if channel.cmd_tx.send(ChannelCommand::Close).is_err() {
                tracing::debug!("Channel of generation {} already finished", generation);
            }
        }
    }

    fn schedule_reconnect(&mut self, generation: u64, delay: Duration) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        let event_tx = self.event_tx.clone();
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = event_tx.send(TransportEvent::ReconnectDue { generation }).await;
        }));
    }
}

impl Drop for TungsteniteTransport {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.task.abort();
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }
}

/// Owns one WebSocket connection from handshake to close.
async fn channel_task(
    url: String,
    generation: u64,
    connect_timeout: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<ChannelCommand>,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    let handshake = tokio::select! {
        result = tokio::time::timeout(connect_timeout, connect_async(url.as_str())) => result,
        // Sends are only issued once open, so anything here abandons the attempt
        _ = cmd_rx.recv() => {
            let _ = event_tx
                .send(TransportEvent::Closed {
                    generation,
                    code: None,
                    reason: "Connection attempt abandoned".to_string(),
                })
                .await;
            return;
        }
    };

    let ws_stream = match handshake {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => {
            let _ = event_tx
                .send(TransportEvent::Error {
                    generation,
                    error: WebSocketError::from(e),
                })
                .await;
            return;
        }
        Err(_) => {
            let _ = event_tx
                .send(TransportEvent::Error {
                    generation,
                    error: WebSocketError::Timeout,
                })
                .await;
            return;
        }
    };

    if event_tx
        .send(TransportEvent::Opened { generation })
        .await
        .is_err()
    {
        return;
    }

    let (mut sink, mut source) = ws_stream.split();

    loop {
        tokio::select! {
            msg = source.next() => {
                let event = match msg {
                    Some(Ok(Message::Text(text))) => TransportEvent::Message {
                        generation,
                        text: text.as_str().to_string(),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!("Failed to send pong: {}", e);
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_string()),
                            None => (None, "no reason".to_string()),
                        };
                        let _ = event_tx
                            .send(TransportEvent::Closed { generation, code, reason })
                            .await;
                        return;
                    }
                    // Binary frames, pongs and raw frames carry no updates
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = event_tx
                            .send(TransportEvent::Error {
                                generation,
                                error: WebSocketError::from(e),
                            })
                            .await;
                        return;
                    }
                    None => {
                        let _ = event_tx
                            .send(TransportEvent::Closed {
                                generation,
                                code: None,
                                reason: "Stream ended".to_string(),
                            })
                            .await;
                        return;
                    }
                };
                if event_tx.send(event).await.is_err() {
                    tracing::debug!("Event loop dropped, closing channel");
                    return;
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!("Failed to send message: {}", e);
                        }
                    }
                    Some(ChannelCommand::Close) | None => {
                        let _ = sink
                            .send(Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: "Client disconnect".into(),
                            })))
                            .await;
                        let _ = event_tx
                            .send(TransportEvent::Closed {
                                generation,
                                code: Some(1000),
                                reason: "Client disconnect".to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        }
    }
}
