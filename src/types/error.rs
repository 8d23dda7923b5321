use thiserror::Error;

/// Errors that can occur when using the realtime client.
///
/// Protocol-level failures (join rejection, push timeouts, dropped sockets) are
/// recovered internally and surface as channel state changes or push outcomes.
/// The variants here are what those outcomes and the few fallible entry points
/// report.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport-level failure (connection refused, socket dropped)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication or authorization error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid client or channel configuration, only raised at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel API misuse (pushing before subscribing, subscribing twice)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Malformed inbound frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// No reply arrived within the push timeout
    #[error("Timeout error")]
    Timeout,

    /// Channel or push was torn down before it resolved
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
