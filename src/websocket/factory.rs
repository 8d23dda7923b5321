use super::transport::{Transport, TransportCommand, TransportEvent, TransportHandle};
use crate::types::Result;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<TransportHandle>> {
        let url = url.to_string();
        Box::pin(async move {
            tracing::debug!("Creating WebSocket connection to: {}", url);
            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (mut write_half, mut read_half) = ws_stream.split();
            let (handle, mut commands, events) = TransportHandle::pair();

            tokio::spawn(async move {
                while let Some(command) = commands.recv().await {
                    let result = match command {
                        TransportCommand::Send(text) => {
                            write_half.send(Message::Text(text.into())).await
                        }
                        TransportCommand::Close { code, reason } => {
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            };
                            let result = write_half.send(Message::Close(Some(frame))).await;
                            if let Err(e) = result {
                                tracing::debug!("WebSocket close handshake failed: {}", e);
                            }
                            return;
                        }
                    };
                    if let Err(e) = result {
                        tracing::error!("WebSocket write error: {}", e);
                        return;
                    }
                }
                // Client dropped its handle
                let _ = write_half.close().await;
            });

            tokio::spawn(async move {
                tracing::debug!("Starting read task");
                while let Some(msg_result) = read_half.next().await {
                    match msg_result {
                        Ok(Message::Text(text)) => {
                            let event = TransportEvent::Message(text.as_str().to_string());
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            let (code, reason) = match frame {
                                Some(close_frame) => (
                                    Some(u16::from(close_frame.code)),
                                    close_frame.reason.as_str().to_string(),
                                ),
                                None => {
                                    tracing::warn!("Server closed connection without close frame");
                                    (None, String::new())
                                }
                            };
                            let _ = events.send(TransportEvent::Closed { code, reason });
                            return;
                        }
                        Ok(Message::Ping(data)) => {
                            tracing::debug!("Received ping ({} bytes)", data.len());
                        }
                        Ok(Message::Pong(data)) => {
                            tracing::debug!("Received pong ({} bytes)", data.len());
                        }
                        Ok(Message::Binary(data)) => {
                            tracing::warn!(
                                "Received unexpected binary message ({} bytes)",
                                data.len()
                            );
                        }
                        Ok(Message::Frame(_)) => {
                            tracing::debug!("Received raw frame (internal)");
                        }
                        Err(e) => {
                            tracing::error!("WebSocket read error: {}", e);
                            let _ = events.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    }
                }
                let _ = events.send(TransportEvent::Closed {
                    code: None,
                    reason: "connection lost".to_string(),
                });
                tracing::debug!("Read task finished");
            });

            Ok(handle)
        })
    }
}
