//! # Dungeon Sync
//!
//! Multiplayer synchronization layer for the dungeon entity-component game.
//! One player hosts, the others join; the host holds the authoritative
//! entity set and every client reconciles its local world against it once
//! per tick.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DUNGEON SYNC                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Value types                             │
//! │  ├── ids.rs        - Local, global and connection ids        │
//! │  └── point.rs      - World points and tile coordinates       │
//! │                                                              │
//! │  game/             - Entity model (single threaded)          │
//! │  ├── component.rs  - Component catalogue                     │
//! │  ├── strategy.rs   - Behavior strategies                     │
//! │  ├── entity.rs     - Entities                                │
//! │  ├── level.rs      - Tile grid                               │
//! │  ├── world.rs      - Local and global entity sets            │
//! │  ├── sync.rs       - Per-tick reconciliation                 │
//! │  └── context.rs    - Game mode and session glue              │
//! │                                                              │
//! │  network/          - Session layer                           │
//! │  ├── codec.rs      - Positional wire codec, type tags        │
//! │  ├── entity_codec.rs - Entity and component encoding         │
//! │  ├── protocol.rs   - Message catalogue                       │
//! │  ├── session.rs    - Authoritative host state                │
//! │  ├── server.rs     - Host WebSocket server                   │
//! │  ├── client.rs     - Client WebSocket transport              │
//! │  └── manager.rs    - Client session manager                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! Transport tasks run on the tokio runtime and only ever push decoded
//! messages into a queue. The game thread drains that queue at the start of
//! a tick, so the global world is never written while the synchronization
//! system reads it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::ids::{ConnectionId, GlobalId, LocalId};
pub use core::point::{Coordinate, Point};
pub use game::context::{GameMode, LevelSource, SessionContext};
pub use game::entity::Entity;
pub use game::sync::SyncSystem;
pub use game::world::{GlobalWorld, LocalWorld};
pub use network::codec::Registry;
pub use network::protocol::Message;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Game loop rate (Hz)
pub const FRAME_RATE: u32 = 30;
