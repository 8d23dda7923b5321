use crate::infrastructure::lock;
use crate::messaging::Serializer;
use crate::types::{RealtimeError, Result, message::RealtimeMessage};
use crate::websocket::TransportCommand;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

struct Socket {
    state: ConnectionState,
    /// Id of the connection attempt currently owning the socket
    active: Option<u64>,
    next_id: u64,
    writer: Option<UnboundedSender<TransportCommand>>,
    send_buffer: VecDeque<RealtimeMessage>,
}

/// Owns the single transport handle, the outbound encoder, and the buffer of
/// envelopes produced while no connection is open.
///
/// Every connection attempt gets an id; events from a transport whose id is no
/// longer active are stale and must be ignored by the caller.
pub struct ConnectionManager {
    serializer: Arc<dyn Serializer>,
    socket: Mutex<Socket>,
}

impl ConnectionManager {
    pub fn new(serializer: Arc<dyn Serializer>) -> Self {
        Self {
            serializer,
            socket: Mutex::new(Socket {
                state: ConnectionState::Closed,
                active: None,
                next_id: 0,
                writer: None,
                send_buffer: VecDeque::new(),
            }),
        }
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    /// Gets the current connection state
    pub fn state(&self) -> ConnectionState {
        lock(&self.socket).state
    }

    /// Checks if currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Whether `conn_id` still owns the socket
    pub fn is_current(&self, conn_id: u64) -> bool {
        lock(&self.socket).active == Some(conn_id)
    }

    /// Starts a connection attempt. Returns `None` when one is already open or in flight.
    pub fn begin_connect(&self) -> Option<u64> {
        let mut socket = lock(&self.socket);
        if matches!(
            socket.state,
            ConnectionState::Open | ConnectionState::Connecting
        ) {
            return None;
        }
        socket.next_id += 1;
        socket.active = Some(socket.next_id);
        socket.state = ConnectionState::Connecting;
        Some(socket.next_id)
    }

    /// Installs the writer of a freshly opened transport (called after successful connection)
    pub fn attach(&self, conn_id: u64, writer: UnboundedSender<TransportCommand>) -> bool {
        let mut socket = lock(&self.socket);
        if socket.active != Some(conn_id) || socket.state != ConnectionState::Connecting {
            return false;
        }
        socket.writer = Some(writer);
        socket.state = ConnectionState::Open;
        true
    }

    /// Releases the socket after the transport reported a close. Returns false for stale ids.
    pub fn detach(&self, conn_id: u64) -> bool {
        let mut socket = lock(&self.socket);
        if socket.active != Some(conn_id) {
            return false;
        }
        socket.active = None;
        socket.writer = None;
        socket.state = ConnectionState::Closed;
        true
    }

    /// Closes the active connection, if any, and releases the socket.
    ///
    /// Returns the id of the connection that was closed.
    pub fn close(&self, code: u16, reason: &str) -> Option<u64> {
        let mut socket = lock(&self.socket);
        let closed = socket.active.take();
        if let Some(writer) = socket.writer.take() {
            let _ = writer.send(TransportCommand::Close {
                code,
                reason: reason.to_string(),
            });
        }
        socket.state = ConnectionState::Closed;
        closed
    }

    /// Closes the socket only while `conn_id` still owns it
    pub fn close_if_current(&self, conn_id: u64, code: u16, reason: &str) -> bool {
        if !self.is_current(conn_id) {
            return false;
        }
        self.close(code, reason) == Some(conn_id)
    }

    /// Sends a message through the transport, or buffers it while disconnected
    pub fn send_message(&self, msg: RealtimeMessage) -> Result<()> {
        let mut socket = lock(&self.socket);
        if socket.state != ConnectionState::Open {
            tracing::debug!(
                "Buffering {} on {} until the socket opens",
                msg.event,
                msg.topic
            );
            socket.send_buffer.push_back(msg);
            return Ok(());
        }

        let text = self.serializer.encode(&msg)?;
        let delivered = socket
            .writer
            .as_ref()
            .is_some_and(|writer| writer.send(TransportCommand::Send(text)).is_ok());
        if !delivered {
            tracing::warn!(
                "Transport writer gone, buffering {} on {}",
                msg.event,
                msg.topic
            );
            socket.send_buffer.push_back(msg);
            return Err(RealtimeError::NotConnected);
        }
        tracing::debug!(
            "push {} {} ({})",
            msg.topic,
            msg.event,
            msg.r#ref.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    /// Sends everything buffered while disconnected, in arrival order.
    ///
    /// Envelopes rejected by `keep` belong to pushes that were reset, cancelled
    /// or failed in the meantime and are dropped. Returns the number sent.
    pub fn flush_send_buffer<F>(&self, keep: F) -> usize
    where
        F: Fn(&RealtimeMessage) -> bool,
    {
        let buffered: Vec<RealtimeMessage> = lock(&self.socket).send_buffer.drain(..).collect();
        let mut sent = 0;
        for msg in buffered {
            if !keep(&msg) {
                tracing::debug!(
                    "Dropping stale buffered {} on {} ({})",
                    msg.event,
                    msg.topic,
                    msg.r#ref.as_deref().unwrap_or("-")
                );
                continue;
            }
            match self.send_message(msg) {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!("Failed to flush buffered message: {}", e),
            }
        }
        sent
    }

    /// Number of envelopes waiting for a connection
    pub fn buffered(&self) -> usize {
        lock(&self.socket).send_buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::JsonSerializer;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Arc::new(JsonSerializer))
    }

    #[test]
    fn test_messages_buffer_until_open_then_flush_in_order() {
        let connection = manager();
        for n in 1..=3 {
            connection
                .send_message(RealtimeMessage::new("room:1", "msg", json!({ "n": n })))
                .unwrap();
        }
        assert_eq!(connection.buffered(), 3);

        let conn_id = connection.begin_connect().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(connection.attach(conn_id, tx));
        assert_eq!(connection.flush_send_buffer(|_| true), 3);

        for n in 1..=3 {
            let Some(TransportCommand::Send(text)) = rx.try_recv().ok() else {
                panic!("expected a text frame");
            };
            let msg: RealtimeMessage = serde_json::from_str(&text).unwrap();
            assert_eq!(msg.payload["n"], n);
        }
    }

    #[test]
    fn test_flush_drops_rejected_messages() {
        let connection = manager();
        for n in 1..=3 {
            connection
                .send_message(
                    RealtimeMessage::new("room:1", "msg", json!({ "n": n })).with_ref(n.to_string()),
                )
                .unwrap();
        }

        let conn_id = connection.begin_connect().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.attach(conn_id, tx);
        let sent = connection.flush_send_buffer(|msg| msg.r#ref.as_deref() != Some("2"));

        assert_eq!(sent, 2);
        assert_eq!(connection.buffered(), 0);
        let mut refs = Vec::new();
        while let Ok(TransportCommand::Send(text)) = rx.try_recv() {
            let msg: RealtimeMessage = serde_json::from_str(&text).unwrap();
            refs.push(msg.r#ref.unwrap());
        }
        assert_eq!(refs, vec!["1", "3"]);
    }

    #[test]
    fn test_begin_connect_is_exclusive() {
        let connection = manager();
        let first = connection.begin_connect();
        assert!(first.is_some());
        assert_eq!(connection.begin_connect(), None);
        assert_eq!(connection.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_stale_connection_ids_are_rejected() {
        let connection = manager();
        let first = connection.begin_connect().unwrap();
        assert!(connection.detach(first));

        let second = connection.begin_connect().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(!connection.attach(first, tx.clone()));
        assert!(!connection.detach(first));
        assert!(connection.attach(second, tx));
        assert!(connection.is_connected());
    }

    #[test]
    fn test_close_sends_close_command() {
        let connection = manager();
        let conn_id = connection.begin_connect().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.attach(conn_id, tx);

        assert_eq!(connection.close(1000, "bye"), Some(conn_id));
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportCommand::Close {
                code: 1000,
                reason: "bye".to_string()
            }
        );
        assert!(!connection.is_current(conn_id));
    }

    #[test]
    fn test_dead_writer_rebuffers() {
        let connection = manager();
        let conn_id = connection.begin_connect().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        connection.attach(conn_id, tx);
        drop(rx);

        let result = connection.send_message(RealtimeMessage::new("room:1", "msg", json!({})));
        assert!(matches!(result, Err(RealtimeError::NotConnected)));
        assert_eq!(connection.buffered(), 1);
    }
}
