//! Property-based tests for the wire codec.
//!
//! Any value built from registered types must decode back to itself, and
//! the decoder must never panic on arbitrary bytes.

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

use dungeon_sync::game::component::*;
use dungeon_sync::game::strategy::Strategy as Behavior;
use dungeon_sync::network::codec::{from_bytes, to_bytes};
use dungeon_sync::network::protocol::{GameStateUpdateEvent, JoinSessionResponse, UpdateOwnPositionRequest};
use dungeon_sync::{Entity, GlobalId, LocalId, Message, Point, Registry};

fn point() -> impl Strategy<Value = Point> {
    (-1000.0f32..1000.0, -1000.0f32..1000.0).prop_map(|(x, y)| Point::new(x, y))
}

fn behavior() -> impl Strategy<Value = Behavior> {
    prop_oneof![
        Just(Behavior::DefaultCollider),
        Just(Behavior::ItemCollider),
        (0.0f32..20.0).prop_map(|rush_range| Behavior::CollideAi { rush_range }),
        (0.0f32..20.0).prop_map(|attack_range| Behavior::MeleeAi { attack_range }),
        (0.0f32..20.0, 0.0f32..20.0).prop_map(|(attack_range, distance)| Behavior::RangeAi { attack_range, distance }),
        (0.0f32..20.0, 0i32..600).prop_map(|(radius, break_time)| Behavior::RadiusWalk { radius, break_time }),
        (0.0f32..20.0, 0i32..600).prop_map(|(radius, break_time)| Behavior::StaticRadiusWalk { radius, break_time }),
        (0.0f32..20.0, vec(point(), 0..6), 0i32..600).prop_map(|(radius, checkpoints, pause_time)| {
            Behavior::PatrolWalk { radius, checkpoints, pause_time }
        }),
        Just(Behavior::SelfDefendTransition),
        (0.0f32..20.0).prop_map(|range| Behavior::RangeTransition { range }),
        Just(Behavior::DefaultOnDeath),
        Just(Behavior::DropLoot),
        Just(Behavior::DefaultInteraction),
        Just(Behavior::DropItemsInteraction),
    ]
}

fn animation() -> impl Strategy<Value = CoreAnimation> {
    prop_oneof![
        Just(CoreAnimation::IdleLeft),
        Just(CoreAnimation::IdleRight),
        Just(CoreAnimation::RunLeft),
        Just(CoreAnimation::RunRight),
    ]
}

fn component() -> impl Strategy<Value = Component> {
    prop_oneof![
        point().prop_map(|position| Component::Position(PositionComponent { position })),
        (-5.0f32..5.0, -5.0f32..5.0, -5.0f32..5.0, -5.0f32..5.0).prop_map(|(a, b, c, d)| {
            Component::Velocity(VelocityComponent {
                x_velocity: a,
                y_velocity: b,
                current_x_velocity: c,
                current_y_velocity: d,
            })
        }),
        (point(), point(), behavior(), behavior()).prop_map(|(offset, size, on_enter, on_leave)| {
            Component::Collide(CollideComponent { offset, size, on_enter, on_leave })
        }),
        (point(), point()).prop_map(|(start_position, goal_position)| {
            Component::Projectile(ProjectileComponent { start_position, goal_position })
        }),
        any::<i32>().prop_map(|player_id| Component::Multiplayer(MultiplayerComponent { player_id })),
        (any::<i32>(), any::<i32>(), behavior()).prop_map(|(maximal_health, current_health, on_death)| {
            Component::Health(HealthComponent { maximal_health, current_health, on_death })
        }),
        ("[a-z/]{0,24}", animation()).prop_map(|(path, current_animation)| {
            Component::Draw(DrawComponent { path, current_animation })
        }),
        (behavior(), behavior(), behavior())
            .prop_map(|(fight, idle, transition)| Component::Ai(AiComponent { fight, idle, transition })),
        (0.0f32..10.0, any::<bool>(), behavior()).prop_map(|(radius, repeatable, on_interaction)| {
            Component::Interaction(InteractionComponent { radius, repeatable, on_interaction })
        }),
        (any::<i64>(), any::<i64>()).prop_map(|(level, points)| Component::Xp(XpComponent { level, points })),
    ]
}

fn entity() -> impl Strategy<Value = Entity> {
    ("[a-z]{1,12}", any::<u32>(), proptest::option::of(1u32..10_000), vec(component(), 0..8)).prop_map(
        |(name, local, global, components)| {
            let mut entity = Entity::with_ids(name, LocalId(local), global.map(GlobalId));
            for component in components {
                entity.add(component);
            }
            entity
        },
    )
}

fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        any::<u64>().prop_map(|time| Message::PingRequest { time }),
        any::<u64>().prop_map(|time| Message::PingResponse { time }),
        (1u32..1000, point(), -5.0f32..5.0, -5.0f32..5.0).prop_map(|(id, position, x_velocity, y_velocity)| {
            Message::UpdateOwnPositionRequest(UpdateOwnPositionRequest {
                global_id: GlobalId(id),
                position,
                x_velocity,
                y_velocity,
            })
        }),
        vec(entity(), 0..6).prop_map(|entities| Message::GameStateUpdateEvent(GameStateUpdateEvent { entities })),
        (proptest::option::of(1u32..1000), btree_map(1u32..1000, point(), 0..4), vec(entity(), 0..4)).prop_map(
            |(client_id, positions, entities)| {
                Message::JoinSessionResponse(JoinSessionResponse {
                    success: client_id.is_some(),
                    level: None,
                    client_id: client_id.map(GlobalId),
                    hero_positions: positions.into_iter().map(|(k, v)| (GlobalId(k), v)).collect(),
                    entities,
                })
            }
        ),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn strategy_roundtrip(value in behavior()) {
        let registry = Registry::standard();
        let bytes = to_bytes(&value, &registry).unwrap();
        let decoded: Behavior = from_bytes(&bytes, &registry).unwrap();
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn entity_roundtrip(value in entity()) {
        let registry = Registry::standard();
        let bytes = to_bytes(&value, &registry).unwrap();
        let decoded: Entity = from_bytes(&bytes, &registry).unwrap();
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn message_roundtrip(value in message()) {
        let registry = Registry::standard();
        let bytes = value.to_bytes(&registry).unwrap();
        prop_assert_eq!(Message::from_bytes(&bytes, &registry).unwrap(), value);
    }

    #[test]
    fn decode_never_panics(bytes in vec(any::<u8>(), 0..256)) {
        let registry = Registry::standard();
        let _ = Message::from_bytes(&bytes, &registry);
    }

    #[test]
    fn truncated_message_is_an_error(value in message(), cut in 1usize..16) {
        let registry = Registry::standard();
        let bytes = value.to_bytes(&registry).unwrap();
        let end = bytes.len().saturating_sub(cut);
        prop_assert!(Message::from_bytes(&bytes[..end], &registry).is_err());
    }
}
