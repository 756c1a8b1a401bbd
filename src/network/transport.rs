//! Session Transport
//!
//! One WebSocket connection per client, one binary frame per message. The
//! WebSocket layer provides ordering, reliability and framing; this module
//! only bounds frame size and maps frames to [`Message`]s.

use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as Frame;

use crate::network::codec::{CodecError, Registry};
use crate::network::config::NetworkConfig;
use crate::network::protocol::Message;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the host in time
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailure {
        /// Address tried
        addr: String,
        /// What went wrong
        reason: String,
    },

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No open connection
    #[error("Not connected")]
    NotConnected,

    /// Frame over the configured limit
    #[error("Frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Frame size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Message could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// WebSocket limits derived from the network config.
pub fn websocket_config(config: &NetworkConfig) -> WebSocketConfig {
    WebSocketConfig {
        max_message_size: Some(config.max_frame_bytes),
        max_frame_size: Some(config.max_frame_bytes),
        ..WebSocketConfig::default()
    }
}

/// Encode a message into a binary frame.
pub fn encode_frame(message: &Message, registry: &Registry, limit: usize) -> Result<Frame, TransportError> {
    let bytes = message.to_bytes(registry)?;
    if bytes.len() > limit {
        return Err(TransportError::FrameTooLarge { size: bytes.len(), limit });
    }
    Ok(Frame::Binary(bytes))
}

/// Decode a binary frame payload into a message.
pub fn decode_frame(data: &[u8], registry: &Registry, limit: usize) -> Result<Message, TransportError> {
    if data.len() > limit {
        return Err(TransportError::FrameTooLarge { size: data.len(), limit });
    }
    Ok(Message::from_bytes(data, registry)?)
}

/// Milliseconds since the Unix epoch, for ping timestamps.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let registry = Registry::standard();
        let frame = encode_frame(&Message::PingRequest { time: 5 }, &registry, 1024).unwrap();
        let Frame::Binary(data) = frame else {
            panic!("expected binary frame");
        };
        let decoded = decode_frame(&data, &registry, 1024).unwrap();
        assert_eq!(decoded, Message::PingRequest { time: 5 });
    }

    #[test]
    fn test_frame_limit_enforced() {
        let registry = Registry::standard();
        let err = encode_frame(&Message::PingRequest { time: 5 }, &registry, 4).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { size: 10, limit: 4 }));
    }

    #[test]
    fn test_websocket_config_uses_limit() {
        let config = NetworkConfig { max_frame_bytes: 1000, ..NetworkConfig::default() };
        let ws = websocket_config(&config);
        assert_eq!(ws.max_message_size, Some(1000));
        assert_eq!(ws.max_frame_size, Some(1000));
    }
}
