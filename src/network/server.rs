//! Host Server
//!
//! Async WebSocket server wrapping a [`HostSession`]. Each connection gets a
//! reader loop and a sender task fed by an mpsc channel; the session's
//! [`Outbound`] instructions are routed through those channels.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::{accept_async_with_config, tungstenite::Message as Frame};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::core::ids::{ConnectionId, GlobalId};
use crate::network::codec::Registry;
use crate::network::config::{HostConfig, NetworkConfig};
use crate::network::protocol::Message;
use crate::network::session::{HostSession, Outbound, SessionError};
use crate::network::transport::{decode_frame, encode_frame, websocket_config};

type Connections = Arc<RwLock<BTreeMap<ConnectionId, mpsc::Sender<Message>>>>;

/// The host server.
#[derive(Clone)]
pub struct HostServer {
    config: NetworkConfig,
    registry: Arc<Registry>,
    session: Arc<RwLock<HostSession>>,
    connections: Connections,
    next_connection: Arc<AtomicU32>,
    shutdown_tx: watch::Sender<bool>,
}

impl HostServer {
    /// Create a server; nothing is bound until [`HostServer::bind`].
    pub fn new(config: NetworkConfig, host_config: HostConfig, registry: Arc<Registry>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            registry,
            session: Arc::new(RwLock::new(HostSession::new(host_config))),
            connections: Arc::new(RwLock::new(BTreeMap::new())),
            next_connection: Arc::new(AtomicU32::new(1)),
            shutdown_tx,
        }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, SessionError> {
        let listener = TcpListener::bind(self.config.address()).await?;
        info!("Host server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Bind and serve until shutdown.
    pub async fn run(&self) -> Result<(), SessionError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), SessionError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        while !*shutdown_rx.borrow() {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let count = self.connections.read().await.len();
                            if count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Host server shutting down");
                }
            }
        }

        Ok(())
    }

    /// Drive one WebSocket connection until it closes.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let conn = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let server = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_config = websocket_config(&server.config);
            let ws_stream = match accept_async_with_config(stream, Some(ws_config)).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(server.config.outbound_queue);
            server.connections.write().await.insert(conn, msg_tx);

            let registry = server.registry.clone();
            let limit = server.config.max_frame_bytes;
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let frame = match encode_frame(&msg, &registry, limit) {
                        Ok(f) => f,
                        Err(e) => {
                            error!("Failed to encode {}: {}", msg.kind().name(), e);
                            continue;
                        }
                    };
                    if ws_sender.send(frame).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            while !*shutdown_rx.borrow() {
                tokio::select! {
                    frame = ws_receiver.next() => {
                        match frame {
                            Some(Ok(Frame::Binary(data))) => {
                                let message = match decode_frame(&data, &server.registry, limit) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        error!("Dropping {} ({}): {}", conn, addr, e);
                                        break;
                                    }
                                };
                                let outbound = server.session.write().await.handle(conn, message);
                                server.dispatch(conn, outbound).await;
                            }
                            Some(Ok(Frame::Close(_))) | None => {
                                debug!("Connection {} closed", conn);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", conn, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.changed() => {}
                }
            }

            server.connections.write().await.remove(&conn);
            sender_task.abort();

            let outbound = server.session.write().await.disconnect(conn);
            server.dispatch(conn, outbound).await;
            info!("Connection {} ({}) cleaned up", conn, addr);
        });
    }

    /// Route session output to connection channels.
    async fn dispatch(&self, from: ConnectionId, outbound: Vec<Outbound>) {
        for out in outbound {
            let targets: Vec<(ConnectionId, mpsc::Sender<Message>)> = {
                let connections = self.connections.read().await;
                match &out {
                    Outbound::Reply(_) => connections.get(&from).map(|tx| (from, tx.clone())).into_iter().collect(),
                    Outbound::To(conn, _) => connections.get(conn).map(|tx| (*conn, tx.clone())).into_iter().collect(),
                    Outbound::Broadcast(_) => connections.iter().map(|(c, tx)| (*c, tx.clone())).collect(),
                    Outbound::BroadcastExcept(skip, _) => connections
                        .iter()
                        .filter(|(c, _)| *c != skip)
                        .map(|(c, tx)| (*c, tx.clone()))
                        .collect(),
                }
            };
            let message = match out {
                Outbound::Reply(m) | Outbound::To(_, m) | Outbound::Broadcast(m) | Outbound::BroadcastExcept(_, m) => m,
            };
            for (conn, tx) in targets {
                if tx.send(message.clone()).await.is_err() {
                    debug!("Connection {} gone before {}", conn, message.kind().name());
                }
            }
        }
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Open connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether a client id belongs to the hosting connection.
    pub async fn is_host(&self, client_id: GlobalId) -> bool {
        self.session.read().await.is_host_client(client_id)
    }

    /// Shared session state.
    pub fn session(&self) -> Arc<RwLock<HostSession>> {
        self.session.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> NetworkConfig {
        NetworkConfig { port: 0, ..NetworkConfig::default() }
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = HostServer::new(local_config(), HostConfig::default(), Arc::new(Registry::standard()));
        assert_eq!(server.connection_count().await, 0);
        assert!(!server.is_host(GlobalId(1)).await);
    }

    #[tokio::test]
    async fn test_server_shutdown_stops_serving() {
        let server = HostServer::new(local_config(), HostConfig::default(), Arc::new(Registry::standard()));
        let listener = server.bind().await.unwrap();
        let runner = server.clone();
        let handle = tokio::spawn(async move { runner.serve(listener).await });

        tokio::task::yield_now().await;
        server.shutdown();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
