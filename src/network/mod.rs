//! Network Layer
//!
//! Wire codec, message catalogue, host session and the WebSocket transport
//! on both sides. Nothing here touches the local world; the game layer
//! reads the client's global world at tick boundaries.

pub mod client;
pub mod codec;
pub mod config;
pub mod entity_codec;
pub mod manager;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{InboundEvent, SessionClient};
pub use codec::{CodecError, Decode, Encode, Registry, Tag, TypeFamily, WireReader, WireWriter};
pub use config::{HostConfig, NetworkConfig, DEFAULT_PORT};
pub use entity_codec::ComponentReader;
pub use manager::{ClientSessionManager, ConnectionState, NoopObserver, SessionObserver};
pub use protocol::{Message, MessageKind};
pub use server::HostServer;
pub use session::{HostSession, Outbound, SessionError};
pub use transport::TransportError;
