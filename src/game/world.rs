//! Entity Collections
//!
//! The two independent entity sets a client holds:
//! - `LocalWorld`: what this process simulates, keyed by local id with a
//!   secondary global-id index
//! - `GlobalWorld`: the last authoritative view received from the host,
//!   keyed by global id
//!
//! They are reconciled by the synchronization system, never merged in place.

use std::collections::BTreeMap;
use tracing::warn;

use crate::core::ids::{GlobalId, LocalId};
use crate::game::entity::Entity;

// =============================================================================
// LOCAL WORLD
// =============================================================================

/// Entities simulated by this process.
///
/// Global ids must be changed through [`LocalWorld::set_global_id`] so the
/// index stays consistent.
#[derive(Clone, Debug, Default)]
pub struct LocalWorld {
    entities: BTreeMap<LocalId, Entity>,
    by_global: BTreeMap<GlobalId, LocalId>,
}

impl LocalWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing any with the same local id.
    ///
    /// If another entity already claims the same global id, the newcomer
    /// takes over the index entry.
    pub fn insert(&mut self, entity: Entity) -> LocalId {
        let local_id = entity.local_id();
        if let Some(old) = self.entities.remove(&local_id) {
            self.unindex(&old);
        }
        if let Some(global_id) = entity.global_id() {
            self.by_global.insert(global_id, local_id);
        }
        self.entities.insert(local_id, entity);
        local_id
    }

    /// Remove an entity by local id.
    pub fn remove(&mut self, local_id: LocalId) -> Option<Entity> {
        let entity = self.entities.remove(&local_id)?;
        self.unindex(&entity);
        Some(entity)
    }

    /// Remove the entity tracking a global id.
    pub fn remove_global(&mut self, global_id: GlobalId) -> Option<Entity> {
        let local_id = self.by_global.get(&global_id).copied()?;
        self.remove(local_id)
    }

    /// Entity by local id.
    pub fn get(&self, local_id: LocalId) -> Option<&Entity> {
        self.entities.get(&local_id)
    }

    /// Mutable entity by local id.
    pub fn get_mut(&mut self, local_id: LocalId) -> Option<&mut Entity> {
        self.entities.get_mut(&local_id)
    }

    /// Entity tracking a global id.
    pub fn find_global(&self, global_id: GlobalId) -> Option<&Entity> {
        self.by_global.get(&global_id).and_then(|l| self.entities.get(l))
    }

    /// Mutable entity tracking a global id.
    pub fn find_global_mut(&mut self, global_id: GlobalId) -> Option<&mut Entity> {
        let local_id = self.by_global.get(&global_id)?;
        self.entities.get_mut(local_id)
    }

    /// Whether some entity tracks this global id.
    pub fn contains_global(&self, global_id: GlobalId) -> bool {
        self.by_global.contains_key(&global_id)
    }

    /// Assign or clear an entity's global id, keeping the index in step.
    pub fn set_global_id(&mut self, local_id: LocalId, global_id: Option<GlobalId>) -> bool {
        let Some(entity) = self.entities.get_mut(&local_id) else {
            return false;
        };
        if let Some(old) = entity.global_id() {
            if self.by_global.get(&old) == Some(&local_id) {
                self.by_global.remove(&old);
            }
        }
        entity.set_global_id(global_id);
        if let Some(new) = global_id {
            self.by_global.insert(new, local_id);
        }
        true
    }

    /// Drop every global id. Used when a session ends.
    pub fn clear_global_ids(&mut self) {
        for entity in self.entities.values_mut() {
            entity.set_global_id(None);
        }
        self.by_global.clear();
    }

    /// Global ids currently tracked, ascending.
    pub fn global_ids(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.by_global.keys().copied()
    }

    /// All entities, by local id.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the world is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn unindex(&mut self, entity: &Entity) {
        if let Some(global_id) = entity.global_id() {
            if self.by_global.get(&global_id) == Some(&entity.local_id()) {
                self.by_global.remove(&global_id);
            }
        }
    }
}

// =============================================================================
// GLOBAL WORLD
// =============================================================================

/// Last known authoritative entity set.
#[derive(Clone, Debug, Default)]
pub struct GlobalWorld {
    entities: BTreeMap<GlobalId, Entity>,
}

impl GlobalWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with a fresh snapshot.
    pub fn replace_all(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.entities.clear();
        for entity in entities {
            self.upsert(entity);
        }
    }

    /// Insert or overwrite one entity. Entities without a global id are
    /// dropped.
    pub fn upsert(&mut self, entity: Entity) -> bool {
        match entity.global_id() {
            Some(global_id) => {
                self.entities.insert(global_id, entity);
                true
            }
            None => {
                warn!(name = entity.name(), "Dropping global entity without global id");
                false
            }
        }
    }

    /// Remove one entity.
    pub fn remove(&mut self, global_id: GlobalId) -> Option<Entity> {
        self.entities.remove(&global_id)
    }

    /// Entity by global id.
    pub fn get(&self, global_id: GlobalId) -> Option<&Entity> {
        self.entities.get(&global_id)
    }

    /// Mutable entity by global id.
    pub fn get_mut(&mut self, global_id: GlobalId) -> Option<&mut Entity> {
        self.entities.get_mut(&global_id)
    }

    /// Whether the id is present.
    pub fn contains(&self, global_id: GlobalId) -> bool {
        self.entities.contains_key(&global_id)
    }

    /// Global ids present, ascending.
    pub fn ids(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.entities.keys().copied()
    }

    /// All entities, by global id.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Owned copy of every entity.
    pub fn to_vec(&self) -> Vec<Entity> {
        self.entities.values().cloned().collect()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the world is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(name: &str, gid: u32) -> Entity {
        let mut e = Entity::new(name);
        e.set_global_id(Some(GlobalId(gid)));
        e
    }

    #[test]
    fn test_local_index_follows_insert_and_remove() {
        let mut world = LocalWorld::new();
        let id = world.insert(tracked("hero", 3));
        world.insert(Entity::new("torch"));

        assert_eq!(world.len(), 2);
        assert!(world.contains_global(GlobalId(3)));
        assert_eq!(world.find_global(GlobalId(3)).map(|e| e.local_id()), Some(id));

        let removed = world.remove_global(GlobalId(3)).unwrap();
        assert_eq!(removed.name(), "hero");
        assert!(!world.contains_global(GlobalId(3)));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_local_set_global_id_reindexes() {
        let mut world = LocalWorld::new();
        let id = world.insert(Entity::new("hero"));
        assert!(world.set_global_id(id, Some(GlobalId(9))));
        assert!(world.contains_global(GlobalId(9)));

        world.set_global_id(id, Some(GlobalId(10)));
        assert!(!world.contains_global(GlobalId(9)));
        assert_eq!(world.global_ids().collect::<Vec<_>>(), vec![GlobalId(10)]);

        world.clear_global_ids();
        assert_eq!(world.global_ids().count(), 0);
        assert_eq!(world.get(id).and_then(|e| e.global_id()), None);
    }

    #[test]
    fn test_global_world_drops_untracked() {
        let mut world = GlobalWorld::new();
        assert!(world.upsert(tracked("a", 1)));
        assert!(!world.upsert(Entity::new("b")));
        assert_eq!(world.len(), 1);

        world.replace_all(vec![tracked("c", 2), tracked("d", 5)]);
        assert_eq!(world.ids().collect::<Vec<_>>(), vec![GlobalId(2), GlobalId(5)]);
    }
}
