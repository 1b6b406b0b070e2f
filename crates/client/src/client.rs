//! Websocket client with auto-reconnect.
//!
//! Connects to the hub's `/ws` endpoint, feeds every broadcast into a
//! [`DeviceCache`], and retries with exponential backoff when the
//! connection drops. The server replays a full device-list snapshot on
//! every (re)connect, so the cache converges even after missed updates.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use fleethub_domain::id::DeviceId;
use fleethub_domain::protocol::{ClientMessage, CommandName, ServerMessage};
use fleethub_domain::time::now;

use crate::cache::DeviceCache;
use crate::error::ClientError;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Where the client currently stands with the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    config.initial_delay.saturating_mul(factor).min(config.max_delay)
}

/// Handle to a running realtime client.
///
/// Dropping the handle tears the background task down; call
/// [`shutdown`](Self::shutdown) to stop it explicitly while keeping the
/// handle (and its cache) around.
pub struct FleetClient {
    cache: Arc<DeviceCache>,
    state_rx: watch::Receiver<ConnectionState>,
    command_tx: mpsc::Sender<ClientMessage>,
    cancel: CancellationToken,
}

impl FleetClient {
    /// Parse the hub URL and spawn the reconnection loop.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Watch [`state_changes`](Self::state_changes) to learn
    /// when the client is connected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when the URL does not parse.
    pub fn connect(url: &str, reconnect: ReconnectConfig) -> Result<Self, ClientError> {
        let url = Url::parse(url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        let cache = Arc::new(DeviceCache::default());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        tokio::spawn(run_loop(
            url,
            Arc::clone(&cache),
            state_tx,
            command_rx,
            reconnect,
            cancel.clone(),
        ));

        Ok(Self {
            cache,
            state_rx,
            command_tx,
            cancel,
        })
    }

    /// The local device cache, shared with the background task.
    #[must_use]
    pub fn cache(&self) -> Arc<DeviceCache> {
        Arc::clone(&self.cache)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A watch receiver that observes connection state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Issue a device command, applying its expected effect to the local
    /// cache immediately. The authoritative state arrives via the feed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when the client is not
    /// currently connected or the outbound queue is full.
    pub fn send_command(
        &self,
        device_id: DeviceId,
        command: CommandName,
        value: Option<f64>,
    ) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let message = ClientMessage::DeviceCommand {
            device_id,
            command,
            value,
            timestamp: now(),
        };
        self.command_tx
            .try_send(message)
            .map_err(|_| ClientError::NotConnected)?;
        self.cache.apply_command_locally(device_id, command, value);
        Ok(())
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FleetClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum SessionEnd {
    /// The connection dropped; reconnect.
    Disconnected,
    /// Teardown was requested; stop retrying.
    Shutdown,
}

/// Main loop: connect, read until the stream drops, back off, reconnect.
async fn run_loop(
    url: Url,
    cache: Arc<DeviceCache>,
    state_tx: watch::Sender<ConnectionState>,
    mut command_rx: mpsc::Receiver<ClientMessage>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let _ = state_tx.send(ConnectionState::Connecting);

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                tracing::info!(url = %url, "connected to hub");
                let _ = state_tx.send(ConnectionState::Connected);
                attempt = 0;

                let end = session(stream, &cache, &mut command_rx, &cancel).await;
                let _ = state_tx.send(ConnectionState::Disconnected);
                match end {
                    Ok(SessionEnd::Shutdown) => break,
                    Ok(SessionEnd::Disconnected) => {
                        tracing::info!("disconnected from hub, reconnecting");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "session ended with error");
                    }
                }
            }
            Err(err) => {
                let _ = state_tx.send(ConnectionState::Disconnected);
                tracing::warn!(error = %err, attempt, "failed to connect to hub");
            }
        }

        if let Some(max) = reconnect.max_retries {
            if attempt >= max {
                tracing::error!(max_retries = max, "reconnection limit reached, giving up");
                break;
            }
        }

        let delay = backoff_delay(attempt, &reconnect);
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
        attempt = attempt.saturating_add(1);
    }

    let _ = state_tx.send(ConnectionState::Disconnected);
    tracing::debug!("client loop exiting");
}

/// Drive a single connection: outbound commands and inbound broadcasts.
async fn session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    cache: &DeviceCache,
    command_rx: &mut mpsc::Receiver<ClientMessage>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, ClientError> {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            command = command_rx.recv() => match command {
                Some(command) => {
                    let text = serde_json::to_string(&command)
                        .map_err(|err| ClientError::WebSocket(err.to_string()))?;
                    write
                        .send(Message::Text(text.into()))
                        .await
                        .map_err(|err| ClientError::WebSocket(err.to_string()))?;
                }
                // All command senders are gone; nothing left to drive.
                None => return Ok(SessionEnd::Shutdown),
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(cache, text.as_str()),
                Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Disconnected),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(ClientError::WebSocket(err.to_string())),
            },
        }
    }
}

fn handle_frame(cache: &DeviceCache, text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Error { message, .. }) => {
            tracing::warn!(message, "hub rejected a command");
        }
        Ok(message) => cache.apply(&message),
        Err(err) => {
            tracing::debug!(error = %err, "unrecognized message from hub");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_double_backoff_until_capped() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        };

        assert_eq!(backoff_delay(0, &config), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, &config), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, &config), Duration::from_secs(8));
        assert_eq!(backoff_delay(5, &config), Duration::from_secs(30));
        assert_eq!(backoff_delay(30, &config), Duration::from_secs(30));
    }

    #[test]
    fn should_not_overflow_for_huge_attempt_counts() {
        let config = ReconnectConfig::default();
        assert_eq!(backoff_delay(u32::MAX, &config), config.max_delay);
    }

    #[tokio::test]
    async fn should_reject_commands_while_disconnected() {
        let client = FleetClient::connect("ws://127.0.0.1:1/ws", ReconnectConfig::default())
            .expect("valid url");

        let result = client.send_command(DeviceId::new(), CommandName::TogglePower, None);
        assert!(matches!(result, Err(ClientError::NotConnected)));

        client.shutdown();
    }

    #[tokio::test]
    async fn should_stop_retry_loop_when_handle_dropped() {
        let client = FleetClient::connect(
            "ws://127.0.0.1:1/ws",
            ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                max_retries: None,
            },
        )
        .expect("valid url");
        let mut state = client.state_changes();

        drop(client);

        // The loop exiting drops its watch sender, which ends this stream.
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.changed().await.is_ok() {}
        })
        .await
        .expect("client loop should exit after the handle is dropped");
    }

    #[test]
    fn should_reject_malformed_url() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let result = FleetClient::connect("not a url", ReconnectConfig::default());
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }
}
