//! Client Transport
//!
//! WebSocket connection to the host. A reader task decodes inbound frames
//! into a shared queue; the game thread drains that queue at tick
//! boundaries, so nothing inbound is ever applied while the synchronization
//! system is reading the global world. Outbound messages are encoded on the
//! caller's thread, so an unregistered type fails at the call site.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async_with_config, tungstenite::Message as Frame};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::network::codec::Registry;
use crate::network::config::NetworkConfig;
use crate::network::protocol::Message;
use crate::network::transport::{decode_frame, encode_frame, websocket_config, TransportError};

/// Something the reader task observed.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A decoded message
    Message(Message),
    /// The connection ended, with a reason when it was not a clean close
    Disconnected(Option<String>),
}

/// Open connection to a host.
pub struct SessionClient {
    registry: Arc<Registry>,
    max_frame_bytes: usize,
    outgoing: mpsc::UnboundedSender<Frame>,
    inbound: Arc<Mutex<Vec<InboundEvent>>>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SessionClient {
    /// Connect to the configured host, waiting at most `connect_timeout`.
    pub async fn connect(config: &NetworkConfig, registry: Arc<Registry>) -> Result<Self, TransportError> {
        let url = config.url();
        info!("Connecting to {}...", url);

        let attempt = connect_async_with_config(url.as_str(), Some(websocket_config(config)), false);
        let ws_stream = match timeout(config.connect_timeout, attempt).await {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectFailure { addr: url, reason: e.to_string() });
            }
            Err(_) => {
                return Err(TransportError::ConnectFailure {
                    addr: url,
                    reason: format!("timed out after {:?}", config.connect_timeout),
                });
            }
        };
        info!("Connected to {}", url);

        let (mut write, mut read) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Frame>();
        let inbound = Arc::new(Mutex::new(Vec::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let reader = {
            let queue = inbound.clone();
            let connected = connected.clone();
            let registry = registry.clone();
            let limit = config.max_frame_bytes;
            tokio::spawn(async move {
                let mut reason = None;
                while let Some(frame) = read.next().await {
                    match frame {
                        Ok(Frame::Binary(data)) => match decode_frame(&data, &registry, limit) {
                            Ok(message) => {
                                debug!("Received {}", message.kind().name());
                                push(&queue, InboundEvent::Message(message));
                            }
                            Err(e) => {
                                error!("Undecodable frame from host: {}", e);
                                reason = Some(e.to_string());
                                break;
                            }
                        },
                        Ok(Frame::Close(_)) => {
                            info!("Host closed connection");
                            break;
                        }
                        Err(e) => {
                            error!("WebSocket read error: {}", e);
                            reason = Some(e.to_string());
                            break;
                        }
                        _ => {}
                    }
                }
                connected.store(false, Ordering::SeqCst);
                push(&queue, InboundEvent::Disconnected(reason));
            })
        };

        let writer = tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                if let Err(e) = write.send(frame).await {
                    error!("Failed to send frame: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        Ok(Self {
            registry,
            max_frame_bytes: config.max_frame_bytes,
            outgoing,
            inbound,
            connected,
            reader,
            writer,
        })
    }

    /// Queue a message for sending.
    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let frame = encode_frame(message, &self.registry, self.max_frame_bytes)?;
        debug!("Sending {}", message.kind().name());
        self.outgoing.send(frame).map_err(|_| TransportError::NotConnected)
    }

    /// Take everything received since the last drain, in arrival order.
    pub fn drain(&self) -> Vec<InboundEvent> {
        match self.inbound.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => {
                warn!("Inbound queue poisoned");
                vec![InboundEvent::Disconnected(Some("inbound queue poisoned".to_string()))]
            }
        }
    }

    /// Whether the connection is still open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.outgoing.is_closed()
    }

    /// Close the connection. Queued messages are flushed first.
    pub fn close(self) {
        self.connected.store(false, Ordering::SeqCst);
        drop(self.outgoing);
        self.reader.abort();
        drop(self.writer);
    }
}

fn push(queue: &Mutex<Vec<InboundEvent>>, event: InboundEvent) {
    if let Ok(mut queue) = queue.lock() {
        queue.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_refused_is_connect_failure() {
        // Grab a free port, then release it so nothing listens there
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = NetworkConfig {
            port,
            connect_timeout: Duration::from_millis(500),
            ..NetworkConfig::default()
        };

        let result = SessionClient::connect(&config, Arc::new(Registry::standard())).await;
        assert!(matches!(result, Err(TransportError::ConnectFailure { .. })));
    }
}
