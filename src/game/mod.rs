//! Game Model
//!
//! Entities, components and levels, the two entity worlds a client keeps,
//! and the per-tick synchronization between them.
//!
//! ## Module Structure
//!
//! - `component`: Component catalogue and animation clips
//! - `strategy`: Behavior strategies referenced by components
//! - `entity`: Entity with identity and components
//! - `level`: Tile grid
//! - `state`: Level plus entity snapshot
//! - `world`: Local and global entity sets
//! - `sync`: Local/global reconciliation
//! - `context`: Game mode and session glue

pub mod component;
pub mod context;
pub mod entity;
pub mod level;
pub mod state;
pub mod strategy;
pub mod sync;
pub mod world;

// Re-export key types
pub use component::{Component, ComponentKind, CoreAnimation};
pub use context::{GameMode, LevelSource, SessionContext};
pub use entity::Entity;
pub use level::{DesignLabel, Level, LevelError, Tile, TileKind};
pub use state::GameState;
pub use strategy::{Strategy, StrategyKind, StrategyRole};
pub use sync::{SyncError, SyncResult, SyncSystem};
pub use world::{GlobalWorld, LocalWorld};
