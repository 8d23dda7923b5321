use super::builder::{ClientConfig, RealtimeClientBuilder, RealtimeClientOptions};
use super::connection::{ConnectionManager, ConnectionState};
use super::state::{ClientState, HeartbeatStatus};
use crate::channel::{PushStatus, RealtimeChannel, RealtimeChannelOptions};
use crate::infrastructure::{HeartbeatManager, Timer, lock};
use crate::messaging::MessageRouter;
use crate::types::{PHOENIX_TOPIC, RealtimeError, RealtimeMessage, Result, WS_CLOSE_NORMAL};
use crate::websocket::{TransportEvent, TransportHandle};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, watch};
use url::Url;

pub(crate) struct ClientInner {
    pub(crate) endpoint: String,
    pub(crate) config: ClientConfig,
    pub(crate) connection: ConnectionManager,
    pub(crate) state: Mutex<ClientState>,
    pub(crate) reconnect_timer: Timer,
}

/// The connection manager: owns the socket, multiplexes channels over it,
/// keeps it alive with heartbeats, and re-establishes it with backoff.
///
/// Cloning is cheap; clones share the same connection.
///
/// # Example
///
/// ```no_run
/// use realtime_channels::{RealtimeClient, RealtimeClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(
///     "wss://example.com/socket",
///     RealtimeClientOptions {
///         api_key: "your-key".to_string(),
///         ..Default::default()
///     }
/// )?;
///
/// client.connect().await?;
/// // Use the client...
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl RealtimeClient {
    /// Creates a new RealtimeClient instance.
    ///
    /// This initializes the client but does not establish a connection. You must call
    /// [`connect()`](Self::connect) to establish the connection.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Auth`] without an API key, [`RealtimeError::UrlParse`] if
    /// the endpoint cannot be parsed, and [`RealtimeError::Config`] for a non-WebSocket
    /// endpoint or a zero timeout or heartbeat interval.
    pub fn new(endpoint: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        RealtimeClientBuilder::new(endpoint, options).map(|builder| builder.build())
    }

    pub(crate) fn downgrade(&self) -> Weak<ClientInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<ClientInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Connects to the server.
    ///
    /// Resolves once the transport is open; does nothing if a connection is
    /// already open or being opened. On failure the error is returned and a
    /// reconnect is scheduled with backoff. An attempt cut short by
    /// [`disconnect`](Self::disconnect) fails with [`RealtimeError::Connection`].
    pub async fn connect(&self) -> Result<()> {
        let Some(conn_id) = self.inner.connection.begin_connect() else {
            return Ok(());
        };
        {
            let mut state = lock(&self.inner.state);
            state.was_manual_disconnect = false;
            state.notify_state_change(ConnectionState::Connecting);
        }

        let url = match self.endpoint_url() {
            Ok(url) => url,
            Err(e) => {
                self.inner.connection.detach(conn_id);
                lock(&self.inner.state).notify_state_change(ConnectionState::Closed);
                return Err(e);
            }
        };
        tracing::info!("Connecting to {}", self.inner.endpoint);

        match self.inner.config.transport.open(&url).await {
            Ok(TransportHandle { outgoing, incoming }) => {
                if !self.inner.connection.attach(conn_id, outgoing) {
                    tracing::debug!("Connection attempt {} superseded before it opened", conn_id);
                    return Err(RealtimeError::Connection(
                        "connection attempt superseded".to_string(),
                    ));
                }
                self.spawn_read_loop(conn_id, incoming);
                self.on_conn_open(conn_id);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!("Connection attempt failed: {}", reason);
                self.on_conn_error(conn_id, &reason);
                self.on_conn_close(conn_id, None, &reason);
                Err(RealtimeError::Connection(reason))
            }
        }
    }

    /// Closes the connection with a normal close code and stops reconnecting.
    pub async fn disconnect(&self) -> Result<()> {
        self.disconnect_with(WS_CLOSE_NORMAL, "client disconnect").await
    }

    /// Closes the connection with `code` and `reason` and stops reconnecting.
    ///
    /// Registered channels move to errored and rejoin on the next `connect`.
    pub async fn disconnect_with(&self, code: u16, reason: &str) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            state.was_manual_disconnect = true;
            state.notify_state_change(ConnectionState::Closing);
        }
        self.inner.reconnect_timer.reset();

        match self.inner.connection.close(code, reason) {
            Some(_) => self.handle_close(Some(code), reason),
            None => {
                let mut state = lock(&self.inner.state);
                state.task_manager.abort_all();
                state.notify_state_change(ConnectionState::Closed);
            }
        }
        tracing::info!("Disconnected ({} {})", code, reason);
        Ok(())
    }

    pub(crate) async fn reconnect(&self) {
        if lock(&self.inner.state).was_manual_disconnect {
            tracing::info!("Manual disconnect detected, will not attempt to reconnect");
            return;
        }
        tracing::info!(
            "Reconnect attempt {}",
            self.inner.reconnect_timer.tries()
        );
        if let Err(e) = self.connect().await {
            tracing::warn!("Reconnect failed: {}", e);
        }
    }

    /// Creates or retrieves the channel for `topic`.
    ///
    /// Topics are used verbatim. A channel removed from the client registers
    /// itself again when it resubscribes.
    pub fn channel(
        &self,
        topic: impl Into<String>,
        options: RealtimeChannelOptions,
    ) -> Arc<RealtimeChannel> {
        let topic = topic.into();
        let existing = lock(&self.inner.state)
            .channels
            .iter()
            .find(|channel| channel.topic() == topic)
            .cloned();
        if let Some(channel) = existing {
            return channel;
        }

        let channel = RealtimeChannel::new(topic, self, options);
        self.register_channel(&channel);
        channel
    }

    /// All registered channels
    pub fn channels(&self) -> Vec<Arc<RealtimeChannel>> {
        lock(&self.inner.state).channels.clone()
    }

    /// Unsubscribes `channel` and waits for it to close.
    pub async fn remove_channel(&self, channel: &Arc<RealtimeChannel>) -> PushStatus {
        if channel.is_closed() {
            self.remove(channel);
            return PushStatus::Ok;
        }
        match channel.unsubscribe() {
            Ok(leave_push) => leave_push.outcome().await.status,
            Err(e) => {
                tracing::warn!("Failed to leave {}: {}", channel.topic(), e);
                self.remove(channel);
                PushStatus::Error
            }
        }
    }

    /// Unsubscribes every channel
    pub async fn remove_all_channels(&self) -> Vec<PushStatus> {
        let mut statuses = Vec::new();
        for channel in self.channels() {
            statuses.push(self.remove_channel(&channel).await);
        }
        statuses
    }

    /// Sets the access token sent with joins and forwards it to joined channels
    pub fn set_auth(&self, token: Option<String>) {
        let channels = {
            let mut state = lock(&self.inner.state);
            state.access_token = token.clone();
            state.channels.clone()
        };
        for channel in channels {
            channel.update_access_token(token.as_deref());
        }
    }

    pub fn access_token(&self) -> Option<String> {
        lock(&self.inner.state).access_token.clone()
    }

    /// Checks if currently connected
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Watches connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        lock(&self.inner.state).state_change_tx.subscribe()
    }

    /// Reconnect attempts scheduled since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_timer.tries()
    }

    pub fn on_open<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.inner.state).callbacks.open.push(Arc::new(callback));
    }

    /// Registers a callback receiving the close code (if any) and reason
    pub fn on_close<F>(&self, callback: F)
    where
        F: Fn(Option<u16>, &str) + Send + Sync + 'static,
    {
        lock(&self.inner.state).callbacks.close.push(Arc::new(callback));
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        lock(&self.inner.state).callbacks.error.push(Arc::new(callback));
    }

    /// Registers a callback for every decoded inbound message
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(&RealtimeMessage) + Send + Sync + 'static,
    {
        lock(&self.inner.state).callbacks.message.push(Arc::new(callback));
    }

    pub fn on_heartbeat<F>(&self, callback: F)
    where
        F: Fn(HeartbeatStatus) + Send + Sync + 'static,
    {
        lock(&self.inner.state).callbacks.heartbeat.push(Arc::new(callback));
    }

    /// The endpoint with `apikey`, `vsn` and the configured params appended
    pub fn endpoint_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.inner.endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("apikey", &self.inner.config.api_key)
                .append_pair("vsn", self.inner.connection.serializer().vsn());
            for (key, value) in &self.inner.config.params {
                query.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    /// Generate next message reference
    pub fn make_ref(&self) -> String {
        lock(&self.inner.state).make_ref()
    }

    /// Sends a message, buffering it until the connection opens
    pub(crate) fn push(&self, message: RealtimeMessage) -> Result<()> {
        self.log(
            "push",
            &format!("{} {}", message.topic, message.event),
            &json!({ "ref": message.r#ref, "join_ref": message.join_ref }),
        );
        self.inner.connection.send_message(message)
    }

    pub(crate) fn register_channel(&self, channel: &Arc<RealtimeChannel>) {
        let mut state = lock(&self.inner.state);
        if !state.channels.iter().any(|c| Arc::ptr_eq(c, channel)) {
            state.channels.push(Arc::clone(channel));
        }
    }

    /// Unregisters a channel
    pub(crate) fn remove(&self, channel: &Arc<RealtimeChannel>) {
        lock(&self.inner.state)
            .channels
            .retain(|c| !Arc::ptr_eq(c, channel));
    }

    /// Makes any other instance joined or joining `topic` leave it
    pub(crate) fn leave_open_topic(&self, topic: &str, except: &RealtimeChannel) {
        let duplicates: Vec<Arc<RealtimeChannel>> = lock(&self.inner.state)
            .channels
            .iter()
            .filter(|c| c.topic() == topic && !std::ptr::eq(c.as_ref(), except))
            .filter(|c| c.is_joined() || c.is_joining())
            .cloned()
            .collect();

        for duplicate in duplicates {
            self.log("transport", &format!("leaving duplicate topic \"{}\"", topic), &Value::Null);
            if let Err(e) = duplicate.unsubscribe() {
                tracing::warn!("Failed to leave duplicate {}: {}", topic, e);
            }
        }
    }

    pub(crate) fn log(&self, kind: &str, msg: &str, data: &Value) {
        tracing::debug!(kind, "{}", msg);
        if let Some(logger) = &self.inner.config.logger {
            logger(kind, msg, data);
        }
    }

    /// One heartbeat tick. Returns `false` when the heartbeat loop should stop.
    pub(crate) fn send_heartbeat(&self, conn_id: u64) -> bool {
        if !self.inner.connection.is_current(conn_id) || !self.is_connected() {
            return false;
        }

        let next_ref = {
            let mut state = lock(&self.inner.state);
            if state.pending_heartbeat_ref.take().is_some() {
                None
            } else {
                let heartbeat_ref = state.make_ref();
                state.pending_heartbeat_ref = Some(heartbeat_ref.clone());
                Some(heartbeat_ref)
            }
        };

        let Some(heartbeat_ref) = next_ref else {
            tracing::warn!("Heartbeat timeout, attempting to re-establish connection");
            self.log("transport", "heartbeat timeout", &Value::Null);
            self.notify_heartbeat(HeartbeatStatus::Timeout);
            self.abnormal_close(conn_id, "heartbeat timeout");
            return false;
        };

        if let Err(e) = self.push(RealtimeMessage::heartbeat(heartbeat_ref)) {
            tracing::warn!("Failed to send heartbeat: {}", e);
            self.notify_heartbeat(HeartbeatStatus::Error);
            return true;
        }
        self.notify_heartbeat(HeartbeatStatus::Sent);
        true
    }

    /// Clears the pending heartbeat if `message` acknowledges it
    pub(crate) fn handle_heartbeat_reply(&self, message: &RealtimeMessage) {
        let Some(msg_ref) = &message.r#ref else {
            return;
        };
        let acknowledged = {
            let mut state = lock(&self.inner.state);
            if state.pending_heartbeat_ref.as_ref() == Some(msg_ref) {
                state.pending_heartbeat_ref = None;
                true
            } else {
                false
            }
        };
        if !acknowledged {
            return;
        }

        tracing::debug!("Received heartbeat ack for ref {}", msg_ref);
        let status = match message.reply_status() {
            Some("ok") => HeartbeatStatus::Ok,
            _ => HeartbeatStatus::Error,
        };
        self.notify_heartbeat(status);
    }

    fn notify_heartbeat(&self, status: HeartbeatStatus) {
        let callbacks = lock(&self.inner.state).callbacks.heartbeat.clone();
        for callback in callbacks {
            callback(status);
        }
    }

    fn spawn_read_loop(&self, conn_id: u64, mut incoming: mpsc::UnboundedReceiver<TransportEvent>) {
        let weak = self.downgrade();
        lock(&self.inner.state).task_manager.spawn("read", async move {
            tracing::debug!("Starting read task for connection {}", conn_id);
            while let Some(event) = incoming.recv().await {
                let Some(client) = RealtimeClient::upgrade(&weak) else {
                    return;
                };
                match event {
                    TransportEvent::Message(text) => client.on_conn_message(conn_id, &text),
                    TransportEvent::Error(error) => client.on_conn_error(conn_id, &error),
                    TransportEvent::Closed { code, reason } => {
                        client.on_conn_close(conn_id, code, &reason);
                        return;
                    }
                }
            }
            if let Some(client) = RealtimeClient::upgrade(&weak) {
                client.on_conn_close(conn_id, None, "transport dropped");
            }
        });
    }

    fn on_conn_open(&self, conn_id: u64) {
        self.log(
            "transport",
            &format!("connected to {}", self.inner.endpoint),
            &Value::Null,
        );
        let flushed = self
            .inner
            .connection
            .flush_send_buffer(|message| self.is_live(message));
        if flushed > 0 {
            tracing::debug!("Flushed {} buffered messages", flushed);
        }
        self.inner.reconnect_timer.reset();

        let heartbeat = HeartbeatManager::new(self.downgrade(), conn_id)
            .with_interval(self.inner.config.heartbeat_interval);
        let (callbacks, channels) = {
            let mut state = lock(&self.inner.state);
            state.pending_heartbeat_ref = None;
            state.task_manager.spawn("heartbeat", heartbeat.run());
            state.notify_state_change(ConnectionState::Open);
            (state.callbacks.open.clone(), state.channels.clone())
        };

        tracing::info!("Connected to {}", self.inner.endpoint);
        for callback in callbacks {
            callback();
        }
        for channel in channels {
            channel.on_socket_open();
        }
    }

    /// Whether a buffered envelope still belongs to an unresolved push of a
    /// registered channel. Buffered heartbeats are always stale.
    fn is_live(&self, message: &RealtimeMessage) -> bool {
        let Some(ref_id) = &message.r#ref else {
            return true;
        };
        if message.topic == PHOENIX_TOPIC {
            return false;
        }
        self.channels()
            .iter()
            .any(|channel| channel.topic() == message.topic && channel.is_pending(ref_id))
    }

    fn on_conn_message(&self, conn_id: u64, text: &str) {
        if !self.inner.connection.is_current(conn_id) {
            tracing::debug!("Ignoring frame from stale connection {}", conn_id);
            return;
        }

        let message = match self.inner.connection.serializer().decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {} - Raw: {}", e, text);
                self.log(
                    "transport",
                    "dropped malformed frame",
                    &json!({ "error": e.to_string() }),
                );
                return;
            }
        };

        self.log(
            "receive",
            &format!(
                "{} {} {} {}",
                message.reply_status().unwrap_or(""),
                message.topic,
                message.event,
                message.r#ref.as_deref().map(|r| format!("({r})")).unwrap_or_default()
            ),
            &message.payload,
        );

        MessageRouter::new(self).route(&message);

        let callbacks = lock(&self.inner.state).callbacks.message.clone();
        for callback in callbacks {
            callback(&message);
        }
    }

    fn on_conn_error(&self, conn_id: u64, error: &str) {
        if !self.inner.connection.is_current(conn_id) {
            return;
        }
        tracing::error!("Transport error: {}", error);
        self.log("transport", error, &Value::Null);

        let callbacks = lock(&self.inner.state).callbacks.error.clone();
        for callback in callbacks {
            callback(error);
        }
        self.trigger_chan_error(error);
    }

    fn on_conn_close(&self, conn_id: u64, code: Option<u16>, reason: &str) {
        if !self.inner.connection.detach(conn_id) {
            tracing::debug!("Ignoring close of stale connection {}", conn_id);
            return;
        }
        self.handle_close(code, reason);
    }

    /// Closes a connection that is still open but no longer trusted
    fn abnormal_close(&self, conn_id: u64, reason: &str) {
        if self
            .inner
            .connection
            .close_if_current(conn_id, WS_CLOSE_NORMAL, reason)
        {
            self.handle_close(Some(WS_CLOSE_NORMAL), reason);
        }
    }

    /// Shared teardown once a connection is gone: stop its tasks, error the
    /// channels, and reconnect unless the close was requested
    fn handle_close(&self, code: Option<u16>, reason: &str) {
        self.log(
            "transport",
            "close",
            &json!({ "code": code, "reason": reason }),
        );

        let (callbacks, manual) = {
            let mut state = lock(&self.inner.state);
            state.task_manager.abort_all();
            state.pending_heartbeat_ref = None;
            state.notify_state_change(ConnectionState::Closed);
            (state.callbacks.close.clone(), state.was_manual_disconnect)
        };

        self.trigger_chan_error(reason);
        self.notify_heartbeat(HeartbeatStatus::Disconnected);
        for callback in callbacks {
            callback(code, reason);
        }

        if !manual {
            self.inner.reconnect_timer.schedule_timeout();
            tracing::info!(
                "Connection lost ({}), reconnect attempt {} scheduled",
                reason,
                self.inner.reconnect_timer.tries()
            );
        }
    }

    fn trigger_chan_error(&self, reason: &str) {
        for channel in self.channels() {
            channel.handle_error(reason);
        }
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.connection_state())
            .finish_non_exhaustive()
    }
}
