use super::connection::ConnectionManager;
use super::core::{ClientInner, RealtimeClient};
use super::state::ClientState;
use crate::infrastructure::{Backoff, Timer};
use crate::messaging::{ArraySerializer, Serializer};
use crate::types::{DEFAULT_TIMEOUT, HEARTBEAT_INTERVAL, RealtimeError, Result};
use crate::websocket::{Transport, WebSocketTransport};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Receives `(kind, message, data)` for every lifecycle and protocol record
pub type Logger = Arc<dyn Fn(&str, &str, &Value) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RealtimeClientOptions {
    pub api_key: String,
    /// Push and join timeout in milliseconds
    pub timeout: Option<u64>,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: Option<u64>,
    pub access_token: Option<String>,
    /// Extra query parameters for the endpoint URL
    pub params: BTreeMap<String, String>,
    /// Delay schedule between reconnect attempts
    pub reconnect_after: Option<Backoff>,
    /// Delay schedule between channel rejoin attempts
    pub rejoin_after: Option<Backoff>,
    /// Wire format; defaults to the array format
    pub serializer: Option<Arc<dyn Serializer>>,
    /// Connection factory; defaults to [`WebSocketTransport`]
    pub transport: Option<Arc<dyn Transport>>,
    pub logger: Option<Logger>,
}

impl fmt::Debug for RealtimeClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClientOptions")
            .field("timeout", &self.timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("params", &self.params)
            .field("reconnect_after", &self.reconnect_after)
            .field("rejoin_after", &self.rejoin_after)
            .field("serializer", &self.serializer.as_ref().map(|s| s.vsn()))
            .field("has_transport", &self.transport.is_some())
            .field("has_logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

/// Options resolved against their defaults
pub(crate) struct ClientConfig {
    pub api_key: String,
    pub params: BTreeMap<String, String>,
    pub timeout: Duration,
    pub heartbeat_interval: Duration,
    pub rejoin_after: Backoff,
    pub transport: Arc<dyn Transport>,
    pub logger: Option<Logger>,
}

/// Builder for RealtimeClient that handles initialization
pub struct RealtimeClientBuilder {
    endpoint: String,
    options: RealtimeClientOptions,
}

impl RealtimeClientBuilder {
    /// Create a new builder, rejecting configurations that can never connect
    pub fn new(endpoint: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        let endpoint = endpoint.into();

        // Validate API key is provided
        if options.api_key.is_empty() {
            return Err(RealtimeError::Auth("API key is required".to_string()));
        }

        let url = Url::parse(&endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::Config(format!(
                "endpoint must use ws or wss, got '{}'",
                url.scheme()
            )));
        }

        if options.timeout == Some(0) {
            return Err(RealtimeError::Config("timeout must be positive".to_string()));
        }
        if options.heartbeat_interval == Some(0) {
            return Err(RealtimeError::Config(
                "heartbeat interval must be positive".to_string(),
            ));
        }

        Ok(Self { endpoint, options })
    }

    /// Build the client. No connection is made until `connect`.
    pub fn build(self) -> RealtimeClient {
        let options = self.options;
        let serializer: Arc<dyn Serializer> = options
            .serializer
            .unwrap_or_else(|| Arc::new(ArraySerializer));
        let config = ClientConfig {
            api_key: options.api_key,
            params: options.params,
            timeout: Duration::from_millis(options.timeout.unwrap_or(DEFAULT_TIMEOUT)),
            heartbeat_interval: Duration::from_millis(
                options.heartbeat_interval.unwrap_or(HEARTBEAT_INTERVAL),
            ),
            rejoin_after: options.rejoin_after.unwrap_or_else(Backoff::default_rejoin),
            transport: options
                .transport
                .unwrap_or_else(|| Arc::new(WebSocketTransport)),
            logger: options.logger,
        };
        let reconnect_after = options
            .reconnect_after
            .unwrap_or_else(Backoff::default_reconnect);
        let endpoint = self.endpoint;
        let access_token = options.access_token;

        let inner = Arc::new_cyclic(|weak| {
            let weak = weak.clone();
            ClientInner {
                endpoint,
                config,
                connection: ConnectionManager::new(serializer),
                state: Mutex::new(ClientState::new(access_token)),
                reconnect_timer: Timer::new(reconnect_after, move || {
                    if let Some(client) = RealtimeClient::upgrade(&weak) {
                        tokio::spawn(async move { client.reconnect().await });
                    }
                }),
            }
        });

        RealtimeClient { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RealtimeClientOptions {
        RealtimeClientOptions {
            api_key: "key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let result = RealtimeClientBuilder::new("wss://example.com/socket", Default::default());
        assert!(matches!(result, Err(RealtimeError::Auth(_))));
    }

    #[test]
    fn test_bad_urls_are_rejected() {
        assert!(matches!(
            RealtimeClientBuilder::new("not a url", options()),
            Err(RealtimeError::UrlParse(_))
        ));
        assert!(matches!(
            RealtimeClientBuilder::new("https://example.com/socket", options()),
            Err(RealtimeError::Config(_))
        ));
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let result = RealtimeClientBuilder::new(
            "wss://example.com/socket",
            RealtimeClientOptions {
                heartbeat_interval: Some(0),
                ..options()
            },
        );
        assert!(matches!(result, Err(RealtimeError::Config(_))));
    }
}
