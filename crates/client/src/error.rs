//! Client error types.

/// Errors surfaced by the realtime client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The websocket URL could not be parsed.
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),

    /// A command was issued while the client is not connected to the hub.
    #[error("not connected to the hub")]
    NotConnected,

    /// The websocket connection failed or dropped mid-session.
    #[error("websocket error: {0}")]
    WebSocket(String),
}
