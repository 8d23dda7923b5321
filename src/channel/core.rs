use super::{
    config::{JoinPayload, RealtimeChannelOptions},
    presence::{PresenceMeta, PresenceState, RawPresenceDiff, RawPresenceState},
    push::{Push, PushReply, PushStatus},
    state::{ChannelState, ChannelStatus, EventBinding},
};
use crate::client::{ClientInner, RealtimeClient};
use crate::infrastructure::{Timer, lock};
use crate::messaging::{ChannelEvent, SystemEvent};
use crate::types::{LISTENER_CAPACITY, MAX_PUSH_BUFFER_SIZE, RealtimeError, RealtimeMessage, Result};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Status reported to a [`RealtimeChannel::subscribe_with`] callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeStatus {
    /// The server accepted the join
    Subscribed,
    /// The join got no reply in time; a rejoin is scheduled
    TimedOut,
    /// The server rejected the join, or the channel errored afterwards
    ChannelError(Value),
    /// The channel was left
    Closed,
}

/// A topic-scoped conversation multiplexed over the client's connection.
///
/// Channels move through `closed → joining → joined → leaving → closed`, with
/// `errored` reachable from `joining` and `joined`. An errored channel rejoins
/// on its own with backoff while the connection is open, and right away when
/// the connection reopens.
///
/// # Example
///
/// ```no_run
/// use realtime_channels::{RealtimeClient, RealtimeClientOptions};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(
///     "wss://example.com/socket",
///     RealtimeClientOptions {
///         api_key: "your-key".to_string(),
///         ..Default::default()
///     },
/// )?;
/// client.connect().await?;
///
/// let channel = client.channel("room:lobby", Default::default());
/// channel.on_broadcast("message", |payload| println!("{payload}"));
/// channel.subscribe()?.outcome().await.into_result()?;
///
/// channel.broadcast("message", json!({ "body": "hello" }))?;
/// # Ok(())
/// # }
/// ```
pub struct RealtimeChannel {
    topic: String,
    client: Weak<ClientInner>,
    this: Weak<RealtimeChannel>,
    options: RealtimeChannelOptions,
    pub(crate) state: Mutex<ChannelState>,
    join_push: Arc<Push>,
    rejoin_timer: Timer,
}

impl RealtimeChannel {
    pub(crate) fn new(
        topic: String,
        client: &RealtimeClient,
        options: RealtimeChannelOptions,
    ) -> Arc<Self> {
        let timeout = options.timeout.unwrap_or(client.config().timeout);
        let rejoin_after = client.config().rejoin_after.clone();
        let join_payload = Self::build_join_payload(&options, client.access_token());

        let channel = Arc::new_cyclic(|this: &Weak<Self>| {
            let rejoin = this.clone();
            Self {
                topic,
                client: client.downgrade(),
                this: this.clone(),
                options,
                state: Mutex::new(ChannelState::new(timeout)),
                join_push: Arc::new(Push::new(
                    this.clone(),
                    SystemEvent::Join.into(),
                    join_payload,
                    timeout,
                )),
                rejoin_timer: Timer::new(rejoin_after, move || {
                    if let Some(channel) = rejoin.upgrade() {
                        channel.rejoin_if_connected();
                    }
                }),
            }
        });
        channel.install_join_hooks();
        channel
    }

    fn install_join_hooks(&self) {
        let on_ok = self.this.clone();
        let on_error = self.this.clone();
        let on_timeout = self.this.clone();
        self.join_push
            .receive(PushStatus::Ok, move |response| {
                if let Some(channel) = on_ok.upgrade() {
                    channel.on_join_ok(response);
                }
            })
            .receive(PushStatus::Error, move |response| {
                if let Some(channel) = on_error.upgrade() {
                    channel.on_join_error(response);
                }
            })
            .receive(PushStatus::Timeout, move |_| {
                if let Some(channel) = on_timeout.upgrade() {
                    channel.on_join_timeout();
                }
            });
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn options(&self) -> &RealtimeChannelOptions {
        &self.options
    }

    pub fn status(&self) -> ChannelStatus {
        lock(&self.state).status
    }

    pub fn is_joined(&self) -> bool {
        self.status() == ChannelStatus::Joined
    }

    pub fn is_joining(&self) -> bool {
        self.status() == ChannelStatus::Joining
    }

    pub fn is_errored(&self) -> bool {
        self.status() == ChannelStatus::Errored
    }

    pub fn is_leaving(&self) -> bool {
        self.status() == ChannelStatus::Leaving
    }

    pub fn is_closed(&self) -> bool {
        self.status() == ChannelStatus::Closed
    }

    /// Default timeout for pushes on this channel
    pub fn timeout(&self) -> Duration {
        lock(&self.state).timeout
    }

    /// Ref of the current join attempt. Lifecycle messages carrying any other
    /// join ref belong to an earlier join and are dropped.
    pub fn join_ref(&self) -> Option<String> {
        self.join_push.ref_id()
    }

    /// The push that carries `phx_join`
    pub fn join_push(&self) -> Arc<Push> {
        Arc::clone(&self.join_push)
    }

    /// Rejoin attempts scheduled since the last successful join
    pub fn rejoin_attempts(&self) -> u32 {
        self.rejoin_timer.tries()
    }

    /// Joins the channel.
    ///
    /// Returns the join push; await its [`Push::outcome`] to learn whether
    /// the server accepted. Fails if the channel is already joining, joined
    /// or leaving.
    pub fn subscribe(&self) -> Result<Arc<Push>> {
        let client = self
            .client()
            .ok_or_else(|| RealtimeError::Channel("client dropped".to_string()))?;
        {
            let mut state = lock(&self.state);
            match state.status {
                ChannelStatus::Closed | ChannelStatus::Errored => {}
                status => {
                    return Err(RealtimeError::Channel(format!(
                        "tried to subscribe to '{}' while {}",
                        self.topic, status
                    )));
                }
            }
            state.joined_once = true;
        }

        if let Some(this) = self.this.upgrade() {
            client.register_channel(&this);
        }
        self.rejoin_timer.reset();
        self.rejoin();
        Ok(self.join_push())
    }

    /// Joins the channel and reports lifecycle changes to `callback`.
    pub fn subscribe_with<F>(&self, callback: F) -> Result<Arc<Push>>
    where
        F: Fn(SubscribeStatus) + Send + Sync + 'static,
    {
        let join_push = self.subscribe()?;
        let callback = Arc::new(callback);

        let on_ok = Arc::clone(&callback);
        let on_error = Arc::clone(&callback);
        let on_timeout = Arc::clone(&callback);
        join_push
            .receive(PushStatus::Ok, move |_| on_ok(SubscribeStatus::Subscribed))
            .receive(PushStatus::Error, move |response| {
                on_error(SubscribeStatus::ChannelError(response))
            })
            .receive(PushStatus::Timeout, move |_| {
                on_timeout(SubscribeStatus::TimedOut)
            });

        let on_channel_error = Arc::clone(&callback);
        self.on_error(move |reason| on_channel_error(SubscribeStatus::ChannelError(reason)));
        self.on_state_change(move |status| {
            if status == ChannelStatus::Closed {
                callback(SubscribeStatus::Closed);
            }
        });
        Ok(join_push)
    }

    /// Leaves the channel.
    ///
    /// Every pending push resolves as cancelled. The channel closes once the
    /// leave is acknowledged, rejected or times out; while disconnected it
    /// closes immediately.
    pub fn unsubscribe(&self) -> Result<Arc<Push>> {
        self.unsubscribe_with_timeout(None)
    }

    pub fn unsubscribe_with_timeout(&self, timeout: Option<Duration>) -> Result<Arc<Push>> {
        let (pending, buffered, timeout) = {
            let mut state = lock(&self.state);
            if state.status == ChannelStatus::Closed {
                return Err(RealtimeError::Channel(format!(
                    "channel '{}' is not subscribed",
                    self.topic
                )));
            }
            let pending: Vec<Arc<Push>> = state.pending_pushes.drain().map(|(_, p)| p).collect();
            let buffered: Vec<Arc<Push>> = state.push_buffer.drain(..).collect();
            (pending, buffered, timeout.unwrap_or(state.timeout))
        };

        self.rejoin_timer.reset();
        self.join_push.cancel_timeout();
        self.set_status(ChannelStatus::Leaving);

        let reason = json!({ "reason": "unsubscribed" });
        for push in pending.into_iter().chain(buffered) {
            push.trigger(PushStatus::Cancelled, reason.clone());
        }

        let leave_push = Arc::new(Push::new(
            self.this.clone(),
            SystemEvent::Leave.into(),
            json!({}),
            timeout,
        ));
        for status in PushStatus::ALL {
            let channel = self.this.clone();
            leave_push.receive(status, move |_| {
                if let Some(channel) = channel.upgrade() {
                    channel.finish_leave();
                }
            });
        }

        if self.client_connected() {
            leave_push.send();
        } else {
            leave_push.trigger(PushStatus::Ok, json!({}));
        }
        Ok(leave_push)
    }

    /// Sends an event to the channel.
    ///
    /// Before the channel is joined the push is buffered (up to a bound; the
    /// oldest is cancelled on overflow) and sent in order once the join
    /// succeeds. Its timeout runs from now either way.
    pub fn push(
        &self,
        event: impl Into<ChannelEvent>,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Arc<Push>> {
        let event = event.into();
        let timeout = {
            let state = lock(&self.state);
            if !state.joined_once {
                return Err(RealtimeError::Channel(format!(
                    "tried to push '{}' to '{}' before joining. Use channel.subscribe() before pushing events",
                    event, self.topic
                )));
            }
            timeout.unwrap_or(state.timeout)
        };

        let push = Arc::new(Push::new(self.this.clone(), event, payload, timeout));
        push.start_timeout();

        let (send_now, dropped) = {
            let mut state = lock(&self.state);
            if state.status == ChannelStatus::Joined
                && !state.flushing
                && state.push_buffer.is_empty()
                && self.client_connected()
            {
                (true, None)
            } else {
                state.push_buffer.push_back(Arc::clone(&push));
                let dropped = if state.push_buffer.len() > MAX_PUSH_BUFFER_SIZE {
                    state.push_buffer.pop_front()
                } else {
                    None
                };
                (false, dropped)
            }
        };

        if let Some(dropped) = dropped {
            tracing::warn!("Push buffer for {} full, dropping oldest push", self.topic);
            dropped.trigger(PushStatus::Cancelled, json!({ "reason": "push buffer full" }));
        }
        if send_now {
            push.send();
        }
        Ok(push)
    }

    /// Pushes an event and waits for its outcome
    pub async fn send(
        &self,
        event: impl Into<ChannelEvent>,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<PushReply> {
        let push = self.push(event, payload, timeout)?;
        Ok(push.outcome().await)
    }

    /// Broadcasts `payload` under `event` to everyone on the topic
    pub fn broadcast(&self, event: &str, payload: Value) -> Result<Arc<Push>> {
        self.push(
            ChannelEvent::Broadcast,
            json!({ "type": "broadcast", "event": event, "payload": payload }),
            None,
        )
    }

    /// Starts tracking this client's presence with `payload` as its metadata
    pub fn track(&self, payload: Value) -> Result<Arc<Push>> {
        self.push(
            ChannelEvent::Presence,
            json!({ "type": "presence", "event": "track", "payload": payload }),
            None,
        )
    }

    pub fn untrack(&self) -> Result<Arc<Push>> {
        self.push(
            ChannelEvent::Presence,
            json!({ "type": "presence", "event": "untrack" }),
            None,
        )
    }

    /// Registers a callback for `event`. Returns a binding id for [`off`](Self::off).
    pub fn on<F>(&self, event: impl Into<ChannelEvent>, callback: F) -> u64
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.bind(event.into(), None, callback)
    }

    /// Registers a callback for broadcasts whose inner event is `event`
    pub fn on_broadcast<F>(&self, event: &str, callback: F) -> u64
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.bind(ChannelEvent::Broadcast, Some(event.to_string()), callback)
    }

    /// Registers a callback for presence `sync`, `join` or `leave` events
    pub fn on_presence<F>(&self, event: &str, callback: F) -> u64
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.bind(ChannelEvent::Presence, Some(event.to_string()), callback)
    }

    /// Registers a callback for channel errors
    pub fn on_error<F>(&self, callback: F) -> u64
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.bind(SystemEvent::Error.into(), None, callback)
    }

    /// Registers a callback for the channel closing
    pub fn on_close<F>(&self, callback: F) -> u64
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.bind(SystemEvent::Close.into(), None, callback)
    }

    fn bind<F>(&self, event: ChannelEvent, filter: Option<String>, callback: F) -> u64
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        let id = state.next_binding_id();
        state.bindings.push(EventBinding {
            event,
            filter,
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes the binding `id` for `event`, or every binding for `event`.
    pub fn off(&self, event: impl Into<ChannelEvent>, id: Option<u64>) {
        let event = event.into();
        lock(&self.state).bindings.retain(|binding| {
            binding.event != event || id.is_some_and(|id| binding.id != id)
        });
    }

    /// Returns a receiver fed with every payload for `event`.
    ///
    /// Payloads are dropped with a warning when the receiver falls behind.
    pub fn listen(&self, event: impl Into<ChannelEvent>) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(LISTENER_CAPACITY);
        let topic = self.topic.clone();
        self.on(event, move |payload| match tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Listener on {} is full, dropping event", topic);
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("Listener on {} closed", topic);
            }
        });
        rx
    }

    /// Registers a callback for status transitions
    pub fn on_state_change<F>(&self, callback: F) -> u64
    where
        F: Fn(ChannelStatus) + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        let id = state.next_binding_id();
        state.state_hooks.push((id, Arc::new(callback)));
        id
    }

    pub fn off_state_change(&self, id: u64) {
        lock(&self.state)
            .state_hooks
            .retain(|(hook_id, _)| *hook_id != id);
    }

    /// Current presence replica
    pub fn presence_state(&self) -> PresenceState {
        lock(&self.state).presence.state().clone()
    }

    /// Present keys with their metas, sorted by key
    pub fn presence_list(&self) -> Vec<(String, Vec<PresenceMeta>)> {
        lock(&self.state)
            .presence
            .list()
            .into_iter()
            .map(|(key, metas)| (key.clone(), metas.clone()))
            .collect()
    }

    /// Whether `message` belongs to the current join of this channel
    pub(crate) fn is_member(&self, message: &RealtimeMessage) -> bool {
        if message.topic != self.topic {
            return false;
        }

        if let Some(join_ref) = &message.join_ref
            && message.event.is_lifecycle()
            && self.join_ref().as_ref() != Some(join_ref)
        {
            self.log(
                "channel",
                "dropping outdated message",
                &json!({
                    "topic": message.topic,
                    "event": message.event.as_str(),
                    "join_ref": join_ref,
                }),
            );
            return false;
        }
        true
    }

    /// Handles an inbound message already matched to this channel
    pub(crate) fn handle_message(&self, message: &RealtimeMessage) {
        match &message.event {
            ChannelEvent::System(SystemEvent::Error) => self.handle_error("server error"),
            ChannelEvent::System(SystemEvent::Close) => match self.status() {
                ChannelStatus::Leaving => self.finish_leave(),
                ChannelStatus::Joined | ChannelStatus::Joining => {
                    self.handle_error("closed by server")
                }
                _ => {}
            },
            event => self.dispatch(event, &message.payload),
        }
    }

    fn dispatch(&self, event: &ChannelEvent, payload: &Value) {
        let callbacks = lock(&self.state).callbacks_for(event, payload);
        for callback in callbacks {
            callback(payload.clone());
        }
    }

    /// Removes and returns the push waiting on `ref_id`
    pub(crate) fn take_pending(&self, ref_id: &str) -> Option<Arc<Push>> {
        lock(&self.state).pending_pushes.remove(ref_id)
    }

    pub(crate) fn is_pending(&self, ref_id: &str) -> bool {
        lock(&self.state).pending_pushes.contains_key(ref_id)
    }

    pub(crate) fn track_push(&self, ref_id: String, push: Arc<Push>) {
        lock(&self.state).pending_pushes.insert(ref_id, push);
    }

    pub(crate) fn forget_push(&self, ref_id: &str) {
        lock(&self.state).pending_pushes.remove(ref_id);
    }

    pub(crate) fn make_ref(&self) -> Option<String> {
        self.client().map(|client| client.make_ref())
    }

    pub(crate) fn send_message(&self, message: RealtimeMessage) -> Result<()> {
        match self.client() {
            Some(client) => client.push(message),
            None => Err(RealtimeError::NotConnected),
        }
    }

    pub(crate) fn sync_presence_state(&self, payload: &Value) {
        let raw: RawPresenceState = match serde_json::from_value(payload.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Invalid presence state on {}: {}", self.topic, e);
                return;
            }
        };
        let Some(join_ref) = self.join_ref() else {
            return;
        };

        let events = lock(&self.state).presence.sync_state(raw, join_ref);
        for event in events {
            self.dispatch(&ChannelEvent::Presence, &event.to_payload());
        }
    }

    pub(crate) fn sync_presence_diff(&self, payload: &Value) {
        let diff: RawPresenceDiff = match serde_json::from_value(payload.clone()) {
            Ok(diff) => diff,
            Err(e) => {
                tracing::warn!("Invalid presence diff on {}: {}", self.topic, e);
                return;
            }
        };
        let join_ref = self.join_ref();

        let events = {
            let mut state = lock(&self.state);
            if state.presence.in_pending_sync_state(join_ref.as_deref()) {
                state.presence.add_pending_diff(diff);
                Vec::new()
            } else {
                state.presence.sync_diff(diff)
            }
        };
        for event in events {
            self.dispatch(&ChannelEvent::Presence, &event.to_payload());
        }
    }

    /// Replaces the token sent with future joins and forwards it to the
    /// server while joined
    pub(crate) fn update_access_token(&self, token: Option<&str>) {
        self.join_push.set_payload(Self::build_join_payload(
            &self.options,
            token.map(str::to_string),
        ));

        if let Some(token) = token
            && self.is_joined()
            && let Err(e) = self.push(
                ChannelEvent::AccessToken,
                json!({ "access_token": token }),
                None,
            )
        {
            tracing::warn!("Failed to send access token to {}: {}", self.topic, e);
        }
    }

    /// Connection opened: rejoin right away if errored
    pub(crate) fn on_socket_open(&self) {
        self.rejoin_timer.reset();
        if self.is_errored() {
            self.rejoin();
        }
    }

    /// Moves a joining or joined channel to errored and schedules a rejoin.
    pub(crate) fn handle_error(&self, reason: &str) {
        let status = self.status();
        if matches!(
            status,
            ChannelStatus::Errored | ChannelStatus::Leaving | ChannelStatus::Closed
        ) {
            return;
        }

        self.log("channel", &format!("error {}", self.topic), &json!({ "reason": reason }));
        if status == ChannelStatus::Joining {
            self.join_push.reset();
        }
        self.set_errored(reason);
        self.dispatch(&SystemEvent::Error.into(), &json!({ "reason": reason }));
        if self.client_connected() {
            self.rejoin_timer.schedule_timeout();
        }
    }

    fn on_join_ok(&self, response: Value) {
        let hooks = {
            let mut state = lock(&self.state);
            state.status = ChannelStatus::Joined;
            state.flushing = true;
            state.state_callbacks()
        };
        self.rejoin_timer.reset();
        self.log("channel", &format!("joined {}", self.topic), &response);

        self.flush_push_buffer();
        for hook in hooks {
            hook(ChannelStatus::Joined);
        }
    }

    /// Sends buffered pushes one at a time in FIFO order. Pushes made while
    /// this runs are appended to the buffer and go out after the older ones.
    fn flush_push_buffer(&self) {
        loop {
            let next = {
                let mut state = lock(&self.state);
                if state.status != ChannelStatus::Joined {
                    state.flushing = false;
                    return;
                }
                let next = state.push_buffer.pop_front();
                if next.is_none() {
                    state.flushing = false;
                }
                next
            };
            match next {
                Some(push) => push.send(),
                None => return,
            }
        }
    }

    fn on_join_error(&self, response: Value) {
        self.log("channel", &format!("join rejected {}", self.topic), &response);
        self.set_errored("join rejected");
        if self.client_connected() {
            self.rejoin_timer.schedule_timeout();
        }
    }

    fn on_join_timeout(&self) {
        let timeout = self.join_push.timeout();
        self.log(
            "channel",
            &format!(
                "timeout {} ({})",
                self.topic,
                self.join_ref().unwrap_or_default()
            ),
            &json!({ "timeout_ms": timeout.as_millis() as u64 }),
        );

        if self.client_connected() {
            let leave_push = Arc::new(Push::new(
                self.this.clone(),
                SystemEvent::Leave.into(),
                json!({}),
                timeout,
            ));
            leave_push.send();
        }
        self.set_errored("join timed out");
        self.join_push.reset();
        if self.client_connected() {
            self.rejoin_timer.schedule_timeout();
        }
    }

    fn rejoin_if_connected(&self) {
        if self.client_connected() {
            self.rejoin();
        }
    }

    fn rejoin(&self) {
        if self.is_leaving() {
            return;
        }
        if let Some(client) = self.client() {
            client.leave_open_topic(&self.topic, self);
            self.join_push.set_payload(Self::build_join_payload(
                &self.options,
                client.access_token(),
            ));
        }

        self.set_status(ChannelStatus::Joining);
        let timeout = self.timeout();
        self.join_push.resend(timeout);
    }

    /// Final step of a leave: closed, bindings detached, unregistered
    fn finish_leave(&self) {
        self.rejoin_timer.reset();
        self.join_push.cancel_timeout();

        let (close_callbacks, hooks) = {
            let mut state = lock(&self.state);
            if state.status == ChannelStatus::Closed {
                return;
            }
            state.status = ChannelStatus::Closed;
            state.presence.clear();
            let close_callbacks =
                state.callbacks_for(&SystemEvent::Close.into(), &Value::Null);
            state.bindings.clear();
            (close_callbacks, state.state_callbacks())
        };
        self.log("channel", &format!("leave {}", self.topic), &Value::Null);

        for callback in close_callbacks {
            callback(json!({}));
        }
        for hook in hooks {
            hook(ChannelStatus::Closed);
        }
        if let (Some(client), Some(this)) = (self.client(), self.this.upgrade()) {
            client.remove(&this);
        }
    }

    fn set_status(&self, status: ChannelStatus) {
        let hooks = {
            let mut state = lock(&self.state);
            if state.status == status {
                return;
            }
            state.status = status;
            state.state_callbacks()
        };
        for hook in hooks {
            hook(status);
        }
    }

    /// Moves to errored and fails every push already on the wire.
    /// Buffered pushes stay queued for the next join.
    fn set_errored(&self, reason: &str) {
        self.set_status(ChannelStatus::Errored);

        let pending: Vec<Arc<Push>> = lock(&self.state).pending_pushes.values().cloned().collect();
        let response = json!({ "reason": reason });
        for push in pending {
            if Arc::ptr_eq(&push, &self.join_push) || !push.is_sent() {
                continue;
            }
            push.trigger(PushStatus::Error, response.clone());
        }
    }

    fn build_join_payload(options: &RealtimeChannelOptions, access_token: Option<String>) -> Value {
        let payload = JoinPayload {
            config: options.join_config(),
            access_token,
        };
        serde_json::to_value(&payload).unwrap_or_else(|e| {
            tracing::error!("Failed to encode join payload: {}", e);
            json!({})
        })
    }

    fn client(&self) -> Option<RealtimeClient> {
        RealtimeClient::upgrade(&self.client)
    }

    fn client_connected(&self) -> bool {
        self.client().is_some_and(|client| client.is_connected())
    }

    fn log(&self, kind: &str, msg: &str, data: &Value) {
        match self.client() {
            Some(client) => client.log(kind, msg, data),
            None => tracing::debug!(kind, "{}", msg),
        }
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("topic", &self.topic)
            .field("status", &self.status())
            .field("join_ref", &self.join_ref())
            .finish()
    }
}
