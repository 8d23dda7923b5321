use super::core::RealtimeChannel;
use crate::infrastructure::{Deadline, lock};
use crate::messaging::ChannelEvent;
use crate::types::{RealtimeError, RealtimeMessage, Result};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

type Callback = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// Outcome status of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushStatus {
    /// Server replied `ok`
    Ok,
    /// Server replied `error`, or the push was failed because its channel errored
    Error,
    /// No reply within the push timeout
    Timeout,
    /// Channel was left or the push was dropped before it resolved
    Cancelled,
}

impl PushStatus {
    pub const ALL: [PushStatus; 4] = [Self::Ok, Self::Error, Self::Timeout, Self::Cancelled];

    /// Maps a reply `status` field; anything but `ok`/`timeout` counts as an error
    pub fn parse(s: &str) -> Self {
        match s {
            "ok" => Self::Ok,
            "timeout" => Self::Timeout,
            "cancelled" => Self::Cancelled,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single terminal outcome of one push attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PushReply {
    pub status: PushStatus,
    pub response: Value,
}

impl PushReply {
    pub fn new(status: PushStatus, response: Value) -> Self {
        Self { status, response }
    }

    pub fn is_ok(&self) -> bool {
        self.status == PushStatus::Ok
    }

    /// `Ok(response)` for an `ok` reply, the matching error otherwise
    pub fn into_result(self) -> Result<Value> {
        match self.status {
            PushStatus::Ok => Ok(self.response),
            PushStatus::Error => Err(RealtimeError::Channel(format!(
                "push rejected: {}",
                self.response
            ))),
            PushStatus::Timeout => Err(RealtimeError::Timeout),
            PushStatus::Cancelled => Err(RealtimeError::Cancelled(
                self.response
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("cancelled")
                    .to_string(),
            )),
        }
    }
}

struct PushInner {
    timeout: Duration,
    ref_id: Option<String>,
    sent: bool,
    received: Option<PushReply>,
    hooks: Vec<(PushStatus, Callback)>,
    deadline: Option<Deadline>,
}

/// An outbound message awaiting a correlated reply or a timeout.
///
/// Every send cycle draws a fresh `ref` and resolves at most once: the first of
/// reply, timeout or cancellation wins and later ones are ignored. `resend`
/// starts a new cycle.
pub struct Push {
    channel: Weak<RealtimeChannel>,
    event: ChannelEvent,
    payload: Mutex<Value>,
    inner: Mutex<PushInner>,
}

impl Push {
    pub(crate) fn new(
        channel: Weak<RealtimeChannel>,
        event: ChannelEvent,
        payload: Value,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            event,
            payload: Mutex::new(payload),
            inner: Mutex::new(PushInner {
                timeout,
                ref_id: None,
                sent: false,
                received: None,
                hooks: Vec::new(),
                deadline: None,
            }),
        }
    }

    pub fn event(&self) -> &ChannelEvent {
        &self.event
    }

    pub fn payload(&self) -> Value {
        lock(&self.payload).clone()
    }

    pub(crate) fn set_payload(&self, payload: Value) {
        *lock(&self.payload) = payload;
    }

    /// Ref of the current send cycle, if one has started
    pub fn ref_id(&self) -> Option<String> {
        lock(&self.inner).ref_id.clone()
    }

    pub fn timeout(&self) -> Duration {
        lock(&self.inner).timeout
    }

    pub fn is_sent(&self) -> bool {
        lock(&self.inner).sent
    }

    /// Outcome of the current send cycle, once known
    pub fn received(&self) -> Option<PushReply> {
        lock(&self.inner).received.clone()
    }

    pub fn has_received(&self, status: PushStatus) -> bool {
        lock(&self.inner)
            .received
            .as_ref()
            .is_some_and(|reply| reply.status == status)
    }

    /// Registers a callback for `status`.
    ///
    /// If that outcome already arrived the callback runs immediately.
    pub fn receive<F>(self: &Arc<Self>, status: PushStatus, callback: F) -> Arc<Self>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let replay = {
            let mut inner = lock(&self.inner);
            inner.hooks.push((status, Arc::clone(&callback)));
            inner
                .received
                .as_ref()
                .filter(|reply| reply.status == status)
                .map(|reply| reply.response.clone())
        };

        if let Some(response) = replay {
            callback(response);
        }
        Arc::clone(self)
    }

    /// Resolves with the first outcome of the current send cycle.
    pub fn outcome(self: &Arc<Self>) -> impl Future<Output = PushReply> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        for status in PushStatus::ALL {
            let tx = Arc::clone(&tx);
            self.receive(status, move |response| {
                if let Some(tx) = lock(&tx).take() {
                    let _ = tx.send(PushReply::new(status, response));
                }
            });
        }

        async move {
            rx.await.unwrap_or_else(|_| {
                PushReply::new(PushStatus::Cancelled, json!({ "reason": "push dropped" }))
            })
        }
    }

    /// Transmits the push through its channel's connection and arms the timeout.
    pub fn send(self: &Arc<Self>) {
        if self.has_received(PushStatus::Timeout) {
            return;
        }
        let Some(channel) = self.channel.upgrade() else {
            return;
        };

        let ref_id = self.start_timeout();
        lock(&self.inner).sent = true;

        let mut message = RealtimeMessage::new(channel.topic(), self.event.clone(), self.payload());
        if let Some(ref_id) = ref_id {
            message = message.with_ref(ref_id);
        }
        if let Some(join_ref) = channel.join_ref() {
            message = message.with_join_ref(join_ref);
        }

        if let Err(e) = channel.send_message(message) {
            tracing::warn!(
                "Push {} on {} not transmitted: {}",
                self.event,
                channel.topic(),
                e
            );
        }
    }

    /// Starts a new send cycle with `timeout`. Used when rejoining.
    pub fn resend(self: &Arc<Self>, timeout: Duration) {
        lock(&self.inner).timeout = timeout;
        self.reset();
        self.send();
    }

    /// Records the outcome of the current cycle and fans it out to the
    /// callbacks registered for `status`.
    ///
    /// Returns `false` when the cycle had already resolved.
    pub fn trigger(&self, status: PushStatus, response: Value) -> bool {
        let (hooks, ref_id) = {
            let mut inner = lock(&self.inner);
            if inner.received.is_some() {
                return false;
            }
            inner.received = Some(PushReply::new(status, response.clone()));
            inner.deadline = None;
            let hooks: Vec<Callback> = inner
                .hooks
                .iter()
                .filter(|(hook_status, _)| *hook_status == status)
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            (hooks, inner.ref_id.clone())
        };

        if let (Some(channel), Some(ref_id)) = (self.channel.upgrade(), ref_id) {
            channel.forget_push(&ref_id);
        }
        for hook in hooks {
            hook(response.clone());
        }
        true
    }

    /// Triggers only if `ref_id` still names the current cycle
    pub(crate) fn trigger_for_ref(&self, ref_id: &str, status: PushStatus, response: Value) -> bool {
        if self.ref_id().as_deref() != Some(ref_id) {
            return false;
        }
        self.trigger(status, response)
    }

    /// Stops the timeout without resolving the push
    pub(crate) fn cancel_timeout(&self) {
        lock(&self.inner).deadline = None;
    }

    /// Clears the current cycle so the push can be sent again.
    pub(crate) fn reset(&self) {
        let ref_id = {
            let mut inner = lock(&self.inner);
            inner.deadline = None;
            inner.received = None;
            inner.sent = false;
            inner.ref_id.take()
        };
        if let (Some(channel), Some(ref_id)) = (self.channel.upgrade(), ref_id) {
            channel.forget_push(&ref_id);
        }
    }

    /// Allocates a fresh ref, registers it with the channel, and arms the timeout.
    pub(crate) fn start_timeout(self: &Arc<Self>) -> Option<String> {
        let channel = self.channel.upgrade()?;
        let ref_id = channel.make_ref()?;

        let weak = Arc::downgrade(self);
        let timed_ref = ref_id.clone();
        let (previous, timeout) = {
            let mut inner = lock(&self.inner);
            let timeout = inner.timeout;
            inner.deadline = Some(Deadline::after(timeout, move || {
                if let Some(push) = weak.upgrade() {
                    push.trigger_for_ref(&timed_ref, PushStatus::Timeout, json!({}));
                }
            }));
            (inner.ref_id.replace(ref_id.clone()), timeout)
        };

        if let Some(previous) = previous {
            channel.forget_push(&previous);
        }
        channel.track_push(ref_id.clone(), Arc::clone(self));
        tracing::trace!(
            "push {} armed with ref {} ({:?})",
            self.event,
            ref_id,
            timeout
        );
        Some(ref_id)
    }
}

impl std::fmt::Debug for Push {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Push")
            .field("event", &self.event)
            .field("ref", &inner.ref_id)
            .field("sent", &inner.sent)
            .field("received", &inner.received)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn detached_push() -> Arc<Push> {
        Arc::new(Push::new(
            Weak::new(),
            ChannelEvent::parse("msg"),
            json!({"body": "hi"}),
            Duration::from_millis(100),
        ))
    }

    #[test]
    fn test_trigger_delivers_at_most_once() {
        let push = detached_push();
        let ok_calls = Arc::new(AtomicUsize::new(0));
        let timeout_calls = Arc::new(AtomicUsize::new(0));

        let ok = Arc::clone(&ok_calls);
        let timeout = Arc::clone(&timeout_calls);
        push.receive(PushStatus::Ok, move |_| {
            ok.fetch_add(1, Ordering::SeqCst);
        })
        .receive(PushStatus::Timeout, move |_| {
            timeout.fetch_add(1, Ordering::SeqCst);
        });

        assert!(push.trigger(PushStatus::Timeout, json!({})));
        assert!(!push.trigger(PushStatus::Ok, json!({})));
        assert!(!push.trigger(PushStatus::Timeout, json!({})));

        assert_eq!(timeout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            push.received().map(|reply| reply.status),
            Some(PushStatus::Timeout)
        );
    }

    #[test]
    fn test_receive_replays_existing_outcome() {
        let push = detached_push();
        push.trigger(PushStatus::Ok, json!({"n": 1}));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        push.receive(PushStatus::Ok, move |response| {
            sink.lock().unwrap().push(response);
        });
        push.receive(PushStatus::Error, |_| panic!("error hook must not run"));

        assert_eq!(*seen.lock().unwrap(), vec![json!({"n": 1})]);
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let push = detached_push();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            push.receive(PushStatus::Error, move |_| order.lock().unwrap().push(n));
        }

        push.trigger(PushStatus::Error, json!({"reason": "nope"}));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_reset_allows_a_new_cycle() {
        let push = detached_push();
        push.trigger(PushStatus::Error, json!({}));
        push.reset();

        assert!(push.received().is_none());
        assert!(push.trigger(PushStatus::Ok, json!({})));
    }

    #[test]
    fn test_trigger_for_stale_ref_is_ignored() {
        let push = detached_push();
        assert!(!push.trigger_for_ref("7", PushStatus::Timeout, json!({})));
        assert!(push.received().is_none());
    }

    #[tokio::test]
    async fn test_outcome_resolves_with_first_status() {
        let push = detached_push();
        let outcome = push.outcome();
        push.trigger(PushStatus::Cancelled, json!({"reason": "unsubscribed"}));
        push.trigger(PushStatus::Ok, json!({}));

        let reply = outcome.await;
        assert_eq!(reply.status, PushStatus::Cancelled);
        assert!(matches!(
            reply.into_result(),
            Err(RealtimeError::Cancelled(reason)) if reason == "unsubscribed"
        ));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(PushStatus::parse("ok"), PushStatus::Ok);
        assert_eq!(PushStatus::parse("error"), PushStatus::Error);
        assert_eq!(PushStatus::parse("whatever"), PushStatus::Error);
        assert_eq!(PushStatus::parse("timeout"), PushStatus::Timeout);
    }
}
