#![allow(dead_code)]

use realtime_channels::{
    ArraySerializer, Backoff, RealtimeClient, RealtimeClientOptions, RealtimeError,
    RealtimeMessage, Result, Serializer, SystemEvent, Transport, TransportCommand, TransportEvent,
    TransportHandle,
};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory transport; every successful `open` hands a [`MockConnection`]
/// to the paired [`MockServer`].
pub struct MockTransport {
    connections: mpsc::UnboundedSender<MockConnection>,
    failures: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<TransportHandle>> {
        self.urls.lock().unwrap().push(url.to_string());

        let result = if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(RealtimeError::Connection("connection refused".to_string()))
        } else {
            let (handle, commands, events) = TransportHandle::pair();
            let _ = self.connections.send(MockConnection { commands, events });
            Ok(handle)
        };
        let delay = *self.delay.lock().unwrap();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

pub struct MockServer {
    connections: mpsc::UnboundedReceiver<MockConnection>,
    failures: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// The connection opened by the last successful `open`
    pub fn accept(&mut self) -> MockConnection {
        self.connections
            .try_recv()
            .expect("no connection was opened")
    }

    pub fn try_accept(&mut self) -> Option<MockConnection> {
        self.connections.try_recv().ok()
    }

    /// Makes the next `n` opens fail
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Makes every open take `delay` before it resolves
    pub fn delay_open(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

pub fn mock_transport() -> (Arc<MockTransport>, MockServer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let failures = Arc::new(AtomicUsize::new(0));
    let delay = Arc::new(Mutex::new(None));
    let urls = Arc::new(Mutex::new(Vec::new()));
    (
        Arc::new(MockTransport {
            connections: tx,
            failures: Arc::clone(&failures),
            delay: Arc::clone(&delay),
            urls: Arc::clone(&urls),
        }),
        MockServer {
            connections: rx,
            failures,
            delay,
            urls,
        },
    )
}

/// Server side of one mock connection
pub struct MockConnection {
    commands: mpsc::UnboundedReceiver<TransportCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MockConnection {
    /// Next command the client issued, if any
    pub fn next_command(&mut self) -> Option<TransportCommand> {
        self.commands.try_recv().ok()
    }

    /// Next frame the client sent, decoded
    pub fn next_message(&mut self) -> Option<RealtimeMessage> {
        match self.next_command()? {
            TransportCommand::Send(text) => Some(
                ArraySerializer
                    .decode(&text)
                    .expect("client sent an undecodable frame"),
            ),
            TransportCommand::Close { .. } => None,
        }
    }

    pub fn expect_message(&mut self) -> RealtimeMessage {
        self.next_message().expect("expected an outbound message")
    }

    /// Everything the client sent so far
    pub fn messages(&mut self) -> Vec<RealtimeMessage> {
        std::iter::from_fn(|| self.next_message()).collect()
    }

    /// Whether the client asked to close this connection
    pub fn was_closed_by_client(&mut self) -> bool {
        while let Some(command) = self.next_command() {
            if matches!(command, TransportCommand::Close { .. }) {
                return true;
            }
        }
        false
    }

    pub fn push(&self, message: RealtimeMessage) {
        let text = ArraySerializer.encode(&message).unwrap();
        self.push_raw(&text);
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    /// Answers `to` with a `phx_reply` carrying its ref and join ref
    pub fn reply(&self, to: &RealtimeMessage, status: &str, response: Value) {
        let mut reply = RealtimeMessage::new(
            to.topic.clone(),
            SystemEvent::Reply,
            json!({ "status": status, "response": response }),
        );
        reply.r#ref = to.r#ref.clone();
        reply.join_ref = to.join_ref.clone();
        self.push(reply);
    }

    /// Simulates the network dropping the connection
    pub fn drop_connection(&self) {
        let _ = self.events.send(TransportEvent::Closed {
            code: Some(1006),
            reason: "abnormal closure".to_string(),
        });
    }
}

/// Lets spawned tasks process everything already queued
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn options(transport: Arc<MockTransport>) -> RealtimeClientOptions {
    RealtimeClientOptions {
        api_key: "test-key".to_string(),
        transport: Some(transport),
        reconnect_after: Some(Backoff::intervals_ms(&[100])),
        rejoin_after: Some(Backoff::intervals_ms(&[200])),
        ..Default::default()
    }
}

pub fn client(transport: Arc<MockTransport>) -> RealtimeClient {
    RealtimeClient::new("ws://localhost:4000/socket", options(transport)).unwrap()
}

/// Connected client plus its open server-side connection
pub async fn connected() -> (RealtimeClient, MockServer, MockConnection) {
    let (transport, mut server) = mock_transport();
    let client = client(transport);
    client.connect().await.unwrap();
    let conn = server.accept();
    (client, server, conn)
}
