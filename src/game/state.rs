//! Session Snapshot
//!
//! The immutable (level, entities) pair exchanged when a map is loaded or a
//! client joins.

use serde::{Serialize, Deserialize};

use crate::core::ids::GlobalId;
use crate::game::entity::Entity;
use crate::game::level::Level;

/// Level geometry plus the entities living in it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Level geometry
    pub level: Level,
    /// Session entities
    pub entities: Vec<Entity>,
}

impl GameState {
    /// Create a snapshot.
    pub fn new(level: Level, entities: Vec<Entity>) -> Self {
        Self { level, entities }
    }

    /// Find an entity by global id.
    pub fn entity(&self, global_id: GlobalId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.global_id() == Some(global_id))
    }

    /// Human-readable dump for logs.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
