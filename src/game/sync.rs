//! Synchronization System
//!
//! Reconciles the local entity set against the global (session) set once per
//! frame. Phases run in a fixed order:
//!
//! 1. Add entities present globally but unknown locally
//! 2. Remove local entities whose global id vanished
//! 3. Overwrite local positions with global positions
//! 4. Derive animations from global velocities
//!
//! Matching is by global id through the `LocalWorld` index, so each phase is
//! O(n log n) rather than a nested scan.

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::ids::{GlobalId, LocalId};
use crate::game::component::{ComponentKind, CoreAnimation};
use crate::game::entity::Entity;
use crate::game::world::{GlobalWorld, LocalWorld};

/// Per-entity reconciliation failures. None of them abort the tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// An entity lacks a component the phase needs
    #[error("entity {global_id} has no {} component", .component.name())]
    MissingComponent {
        /// Entity being synchronized
        global_id: GlobalId,
        /// Component that was expected
        component: ComponentKind,
    },
}

/// What one pass changed.
#[derive(Debug, Default)]
pub struct SyncResult {
    /// Global ids instantiated locally this pass
    pub added: Vec<GlobalId>,
    /// Global ids removed locally this pass
    pub removed: Vec<GlobalId>,
    /// Entities whose position was overwritten
    pub positioned: usize,
    /// Entities whose animation was set
    pub animated: usize,
    /// Per-entity failures
    pub errors: Vec<SyncError>,
}

impl SyncResult {
    /// Whether the pass changed set membership.
    pub fn membership_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Per-frame reconciliation of local and global entity sets.
#[derive(Debug, Default)]
pub struct SyncSystem {
    /// Entities this system instantiated from the global set
    synchronized: BTreeSet<GlobalId>,
    /// Whether the previous pass ran with a session
    was_active: bool,
}

impl SyncSystem {
    /// Create an idle system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Global ids of entities this system created and still tracks.
    pub fn synchronized(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.synchronized.iter().copied()
    }

    /// Run one pass.
    ///
    /// `global` is `Some` while a session is active. When it becomes `None`
    /// the entities this system created are removed and every remaining
    /// local global id is cleared, since global ids mean nothing outside a
    /// session.
    pub fn execute(&mut self, global: Option<&GlobalWorld>, local: &mut LocalWorld) -> SyncResult {
        let mut result = SyncResult::default();

        match global {
            Some(global) => {
                self.was_active = true;
                self.add_entities(global, local, &mut result);
                self.remove_entities(global, local, &mut result);
                sync_positions(global, local, &mut result);
                sync_animations(global, local, &mut result);
            }
            None => {
                if self.was_active {
                    self.teardown(local, &mut result);
                    self.was_active = false;
                }
            }
        }

        if result.membership_changed() {
            debug!(
                added = result.added.len(),
                removed = result.removed.len(),
                "Reconciled entity membership"
            );
        }
        for error in &result.errors {
            warn!("Sync skipped entity: {}", error);
        }

        result
    }

    fn add_entities(&mut self, global: &GlobalWorld, local: &mut LocalWorld, result: &mut SyncResult) {
        let missing: Vec<&Entity> = global
            .iter()
            .filter(|e| e.global_id().is_some_and(|id| !local.contains_global(id)))
            .collect();

        for source in missing {
            let global_id = source.global_id();
            let mut copy = Entity::with_ids(source.name(), LocalId::next(), global_id);
            for component in source.components() {
                copy.add(component.clone());
            }
            local.insert(copy);
            if let Some(id) = global_id {
                self.synchronized.insert(id);
                result.added.push(id);
            }
        }
    }

    fn remove_entities(&mut self, global: &GlobalWorld, local: &mut LocalWorld, result: &mut SyncResult) {
        let stale: Vec<GlobalId> = local.global_ids().filter(|id| !global.contains(*id)).collect();

        for id in stale {
            local.remove_global(id);
            self.synchronized.remove(&id);
            result.removed.push(id);
        }
    }

    fn teardown(&mut self, local: &mut LocalWorld, result: &mut SyncResult) {
        for id in std::mem::take(&mut self.synchronized) {
            if local.remove_global(id).is_some() {
                result.removed.push(id);
            }
        }
        local.clear_global_ids();
        debug!(removed = result.removed.len(), "Session ended, local state detached");
    }
}

fn sync_positions(global: &GlobalWorld, local: &mut LocalWorld, result: &mut SyncResult) {
    for source in global.iter() {
        let Some(id) = source.global_id() else { continue };
        let Some(target) = local.find_global_mut(id) else { continue };

        let Some(position) = source.position().map(|p| p.position) else {
            result.errors.push(SyncError::MissingComponent { global_id: id, component: ComponentKind::Position });
            continue;
        };
        match target.position_mut() {
            Some(p) => {
                p.position = position;
                result.positioned += 1;
            }
            None => result.errors.push(SyncError::MissingComponent {
                global_id: id,
                component: ComponentKind::Position,
            }),
        }
    }
}

fn sync_animations(global: &GlobalWorld, local: &mut LocalWorld, result: &mut SyncResult) {
    for source in global.iter() {
        let Some(id) = source.global_id() else { continue };
        let Some(velocity) = source.velocity() else { continue };
        let Some(target) = local.find_global_mut(id) else { continue };

        match target.draw_mut() {
            Some(draw) => {
                draw.current_animation =
                    CoreAnimation::from_x_velocity(velocity.current_x_velocity, draw.current_animation);
                result.animated += 1;
            }
            None => result.errors.push(SyncError::MissingComponent {
                global_id: id,
                component: ComponentKind::Draw,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::point::Point;
    use crate::game::component::{Component, DrawComponent, PositionComponent, VelocityComponent};

    fn global_entity(gid: u32, x: f32, y: f32) -> Entity {
        let mut e = Entity::new("monster")
            .with(Component::Position(PositionComponent { position: Point::new(x, y) }))
            .with(Component::Draw(DrawComponent::default()));
        e.set_global_id(Some(GlobalId(gid)));
        e
    }

    fn moving(mut entity: Entity, current_x: f32) -> Entity {
        entity.add(Component::Velocity(VelocityComponent {
            x_velocity: 1.0,
            y_velocity: 1.0,
            current_x_velocity: current_x,
            current_y_velocity: 0.0,
        }));
        entity
    }

    #[test]
    fn test_add_copies_identity_and_components() {
        let mut global = GlobalWorld::new();
        global.upsert(global_entity(4, 2.0, 3.0));
        let mut local = LocalWorld::new();
        let mut system = SyncSystem::new();

        let result = system.execute(Some(&global), &mut local);

        assert_eq!(result.added, vec![GlobalId(4)]);
        let copy = local.find_global(GlobalId(4)).unwrap();
        assert_eq!(copy.name(), "monster");
        assert_eq!(copy.position().map(|p| p.position), Some(Point::new(2.0, 3.0)));
        assert_ne!(copy.local_id(), global.get(GlobalId(4)).unwrap().local_id());
    }

    #[test]
    fn test_remove_leaves_untracked_local_entities() {
        let mut global = GlobalWorld::new();
        global.upsert(global_entity(1, 0.0, 0.0));
        let mut local = LocalWorld::new();
        local.insert(global_entity(3, 0.0, 0.0));
        local.insert(Entity::new("torch"));
        let mut system = SyncSystem::new();

        let result = system.execute(Some(&global), &mut local);

        assert_eq!(result.removed, vec![GlobalId(3)]);
        assert!(local.iter().any(|e| e.name() == "torch"));
        assert_eq!(local.global_ids().collect::<Vec<_>>(), vec![GlobalId(1)]);
    }

    #[test]
    fn test_global_position_wins() {
        let mut global = GlobalWorld::new();
        global.upsert(global_entity(2, 5.0, 6.0));
        let mut local = LocalWorld::new();
        local.insert(global_entity(2, 0.0, 0.0));
        let mut system = SyncSystem::new();

        let result = system.execute(Some(&global), &mut local);

        assert_eq!(result.positioned, 1);
        let pos = local.find_global(GlobalId(2)).and_then(|e| e.position()).map(|p| p.position);
        assert_eq!(pos, Some(Point::new(5.0, 6.0)));
    }

    #[test]
    fn test_missing_position_is_reported_not_fatal() {
        let mut bare = Entity::new("ghost");
        bare.set_global_id(Some(GlobalId(8)));
        let mut global = GlobalWorld::new();
        global.upsert(bare);
        global.upsert(global_entity(9, 1.0, 1.0));
        let mut local = LocalWorld::new();
        let mut system = SyncSystem::new();

        let result = system.execute(Some(&global), &mut local);

        assert_eq!(result.added.len(), 2);
        assert_eq!(
            result.errors,
            vec![SyncError::MissingComponent { global_id: GlobalId(8), component: ComponentKind::Position }]
        );
        assert_eq!(result.positioned, 1);
    }

    #[test]
    fn test_animation_follows_global_velocity() {
        let mut global = GlobalWorld::new();
        global.upsert(moving(global_entity(5, 0.0, 0.0), -2.0));
        let mut local = LocalWorld::new();
        let mut system = SyncSystem::new();

        system.execute(Some(&global), &mut local);
        let anim = local.find_global(GlobalId(5)).and_then(|e| e.draw()).map(|d| d.current_animation);
        assert_eq!(anim, Some(CoreAnimation::RunLeft));

        global.upsert(moving(global_entity(5, 0.0, 0.0), 0.0));
        system.execute(Some(&global), &mut local);
        let anim = local.find_global(GlobalId(5)).and_then(|e| e.draw()).map(|d| d.current_animation);
        assert_eq!(anim, Some(CoreAnimation::IdleLeft));
    }

    #[test]
    fn test_animation_requires_local_draw() {
        let mut global = GlobalWorld::new();
        global.upsert(moving(global_entity(6, 0.0, 0.0), 1.0));
        let mut local = LocalWorld::new();
        let mut plain = Entity::new("hero")
            .with(Component::Position(PositionComponent::default()));
        plain.set_global_id(Some(GlobalId(6)));
        local.insert(plain);
        let mut system = SyncSystem::new();

        let result = system.execute(Some(&global), &mut local);

        assert_eq!(result.animated, 0);
        assert_eq!(
            result.errors,
            vec![SyncError::MissingComponent { global_id: GlobalId(6), component: ComponentKind::Draw }]
        );
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let mut global = GlobalWorld::new();
        global.upsert(global_entity(1, 1.0, 1.0));
        global.upsert(global_entity(2, 2.0, 2.0));
        let mut local = LocalWorld::new();
        local.insert(global_entity(7, 0.0, 0.0));
        let mut system = SyncSystem::new();

        system.execute(Some(&global), &mut local);
        let before: Vec<Entity> = local.iter().cloned().collect();
        let second = system.execute(Some(&global), &mut local);
        let after: Vec<Entity> = local.iter().cloned().collect();

        assert!(!second.membership_changed());
        assert_eq!(before, after);
    }

    #[test]
    fn test_session_end_detaches_local_state() {
        let mut global = GlobalWorld::new();
        global.upsert(global_entity(1, 0.0, 0.0));
        let mut local = LocalWorld::new();
        let hero_id = local.insert(global_entity(2, 0.0, 0.0));
        global.upsert(global_entity(2, 0.0, 0.0));
        let mut system = SyncSystem::new();
        system.execute(Some(&global), &mut local);
        assert_eq!(local.len(), 2);

        let result = system.execute(None, &mut local);

        assert_eq!(result.removed, vec![GlobalId(1)]);
        assert_eq!(local.len(), 1);
        assert_eq!(local.get(hero_id).and_then(|e| e.global_id()), None);

        // Inactive passes after teardown touch nothing
        let again = system.execute(None, &mut local);
        assert!(!again.membership_changed());
        assert_eq!(local.len(), 1);
    }
}
