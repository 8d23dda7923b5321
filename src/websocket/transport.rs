use crate::types::Result;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

/// Commands the client issues to an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Send one text frame
    Send(String),
    /// Close the connection with a close code and reason
    Close { code: u16, reason: String },
}

/// Events an open transport reports back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame
    Message(String),
    /// Non-fatal or pre-close failure
    Error(String),
    /// Connection closed; no further events follow
    Closed { code: Option<u16>, reason: String },
}

/// Both halves of an open connection.
///
/// Dropping `outgoing` asks the transport to shut down; the transport ends the
/// `incoming` stream with [`TransportEvent::Closed`] when the connection is gone.
pub struct TransportHandle {
    pub outgoing: mpsc::UnboundedSender<TransportCommand>,
    pub incoming: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportHandle {
    /// Creates a handle plus the transport-side ends of its channels
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<TransportCommand>,
        mpsc::UnboundedSender<TransportEvent>,
    ) {
        let (outgoing, commands) = mpsc::unbounded_channel();
        let (events, incoming) = mpsc::unbounded_channel();
        (Self { outgoing, incoming }, commands, events)
    }
}

/// A bidirectional, message-oriented connection factory.
///
/// `open` resolves once the connection is established (the "open" callback);
/// frames, errors and the final close are then delivered through
/// [`TransportHandle::incoming`].
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<TransportHandle>>;
}
