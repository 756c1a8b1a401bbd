//! Property-based tests for local/global reconciliation.
//!
//! After one pass the local world tracks exactly the global id set, a
//! second pass over the same global world changes nothing, and leaving the
//! session removes everything the pass created.

use std::collections::BTreeSet;

use proptest::collection::{btree_map, btree_set};
use proptest::prelude::*;

use dungeon_sync::game::component::{Component, DrawComponent, PositionComponent, VelocityComponent};
use dungeon_sync::{Entity, GlobalId, GlobalWorld, LocalId, LocalWorld, Point, SyncSystem};

fn global_entity(id: u32, x: f32, velocity: f32) -> Entity {
    Entity::with_ids("remote", LocalId::next(), Some(GlobalId(id)))
        .with(Component::Position(PositionComponent { position: Point::new(x, 0.0) }))
        .with(Component::Velocity(VelocityComponent { current_x_velocity: velocity, ..Default::default() }))
        .with(Component::Draw(DrawComponent::default()))
}

fn world(entries: &std::collections::BTreeMap<u32, (f32, f32)>) -> GlobalWorld {
    let mut global = GlobalWorld::new();
    global.replace_all(entries.iter().map(|(id, (x, v))| global_entity(*id, *x, *v)));
    global
}

fn local_with(ids: &BTreeSet<u32>) -> LocalWorld {
    let mut local = LocalWorld::new();
    for id in ids {
        local.insert(global_entity(*id, -1.0, 0.0));
    }
    local.insert(Entity::new("offline").with(Component::Position(PositionComponent::default())));
    local
}

fn entries() -> impl Strategy<Value = std::collections::BTreeMap<u32, (f32, f32)>> {
    btree_map(1u32..64, (-100.0f32..100.0, prop_oneof![Just(0.0f32), -3.0f32..3.0]), 0..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn local_converges_to_global(entries in entries(), stale in btree_set(1u32..64, 0..16)) {
        let global = world(&entries);
        let mut local = local_with(&stale);
        let mut system = SyncSystem::new();

        system.execute(Some(&global), &mut local);

        let tracked: BTreeSet<GlobalId> = local.global_ids().collect();
        let expected: BTreeSet<GlobalId> = global.ids().collect();
        prop_assert_eq!(tracked, expected);
        for source in global.iter() {
            let id = source.global_id().unwrap();
            let target = local.find_global(id).unwrap();
            prop_assert_eq!(target.position(), source.position());
        }
        // Entities outside the session are never touched
        prop_assert!(local.iter().any(|e| e.name() == "offline"));
    }

    #[test]
    fn second_pass_is_idempotent(entries in entries(), stale in btree_set(1u32..64, 0..16)) {
        let global = world(&entries);
        let mut local = local_with(&stale);
        let mut system = SyncSystem::new();

        system.execute(Some(&global), &mut local);
        let snapshot: Vec<Entity> = local.iter().cloned().collect();
        let second = system.execute(Some(&global), &mut local);

        prop_assert!(!second.membership_changed());
        let after: Vec<Entity> = local.iter().cloned().collect();
        prop_assert_eq!(after, snapshot);
    }

    #[test]
    fn leaving_session_removes_synchronized(entries in entries()) {
        let global = world(&entries);
        let mut local = local_with(&BTreeSet::new());
        let mut system = SyncSystem::new();

        system.execute(Some(&global), &mut local);
        system.execute(None, &mut local);

        prop_assert_eq!(local.len(), 1);
        prop_assert_eq!(local.global_ids().count(), 0);
        prop_assert_eq!(system.synchronized().count(), 0);
    }
}
