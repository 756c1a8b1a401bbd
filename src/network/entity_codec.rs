//! Entity Codec
//!
//! An entity is written as:
//!
//! ```text
//! [name][local id][global id?][u32 component count]
//! then per component: [u16 tag][u32 payload length][payload]
//! ```
//!
//! The per-component length lets a decoder skip a component whose tag it
//! does not know, so one unknown component never loses the rest of the
//! entity. Unknown tags at any other level remain fatal.

use tracing::warn;

use crate::core::ids::{GlobalId, LocalId};
use crate::core::point::Point;
use crate::game::component::{
    AiComponent, CollideComponent, Component, ComponentKind, CoreAnimation, DrawComponent,
    HealthComponent, InteractionComponent, MultiplayerComponent, PositionComponent,
    ProjectileComponent, VelocityComponent, XpComponent,
};
use crate::game::entity::Entity;
use crate::game::strategy::Strategy;
use crate::network::codec::{CodecError, Decode, Encode, WireReader, WireWriter};

// =============================================================================
// COMPONENT PAYLOADS
// =============================================================================

impl Encode for Component {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        match self {
            Component::Position(c) => w.write(&c.position),
            Component::Velocity(c) => {
                w.write(&c.x_velocity)?;
                w.write(&c.y_velocity)?;
                w.write(&c.current_x_velocity)?;
                w.write(&c.current_y_velocity)
            }
            Component::Collide(c) => {
                w.write(&c.offset)?;
                w.write(&c.size)?;
                c.on_enter.encode(w)?;
                c.on_leave.encode(w)
            }
            Component::Projectile(c) => {
                w.write(&c.start_position)?;
                w.write(&c.goal_position)
            }
            Component::Multiplayer(c) => w.write(&c.player_id),
            Component::Health(c) => {
                w.write(&c.maximal_health)?;
                w.write(&c.current_health)?;
                c.on_death.encode(w)
            }
            Component::Draw(c) => {
                w.write(&c.path)?;
                w.write(&c.current_animation)
            }
            Component::Ai(c) => {
                c.fight.encode(w)?;
                c.idle.encode(w)?;
                c.transition.encode(w)
            }
            Component::Interaction(c) => {
                w.write(&c.radius)?;
                w.write(&c.repeatable)?;
                c.on_interaction.encode(w)
            }
            Component::Xp(c) => {
                w.write(&c.level)?;
                w.write(&c.points)
            }
        }
    }
}

/// Decodes components straight onto one target entity.
pub struct ComponentReader<'e> {
    target: &'e mut Entity,
}

impl<'e> ComponentReader<'e> {
    /// Bind to the entity that will own the decoded components.
    pub fn new(target: &'e mut Entity) -> Self {
        Self { target }
    }

    /// Decode one component payload of `kind` and attach it.
    pub fn read(&mut self, kind: ComponentKind, r: &mut WireReader<'_, '_>) -> Result<(), CodecError> {
        let component = match kind {
            ComponentKind::Position => Component::Position(PositionComponent { position: r.read()? }),
            ComponentKind::Velocity => Component::Velocity(VelocityComponent {
                x_velocity: r.read()?,
                y_velocity: r.read()?,
                current_x_velocity: r.read()?,
                current_y_velocity: r.read()?,
            }),
            ComponentKind::Collide => Component::Collide(CollideComponent {
                offset: r.read::<Point>()?,
                size: r.read::<Point>()?,
                on_enter: Strategy::decode(r)?,
                on_leave: Strategy::decode(r)?,
            }),
            ComponentKind::Projectile => Component::Projectile(ProjectileComponent {
                start_position: r.read()?,
                goal_position: r.read()?,
            }),
            ComponentKind::Multiplayer => Component::Multiplayer(MultiplayerComponent { player_id: r.read()? }),
            ComponentKind::Health => Component::Health(HealthComponent {
                maximal_health: r.read()?,
                current_health: r.read()?,
                on_death: Strategy::decode(r)?,
            }),
            ComponentKind::Draw => Component::Draw(DrawComponent {
                path: r.read()?,
                current_animation: r.read::<CoreAnimation>()?,
            }),
            ComponentKind::Ai => Component::Ai(AiComponent {
                fight: Strategy::decode(r)?,
                idle: Strategy::decode(r)?,
                transition: Strategy::decode(r)?,
            }),
            ComponentKind::Interaction => Component::Interaction(InteractionComponent {
                radius: r.read()?,
                repeatable: r.read()?,
                on_interaction: Strategy::decode(r)?,
            }),
            ComponentKind::Xp => Component::Xp(XpComponent {
                level: r.read()?,
                points: r.read()?,
            }),
        };
        self.target.add(component);
        Ok(())
    }
}

// =============================================================================
// ENTITY
// =============================================================================

impl Encode for Entity {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        w.write(self.name())?;
        w.write(&self.local_id())?;
        w.write(&self.global_id())?;
        w.write_count(self.component_count())?;
        for component in self.components() {
            w.write_tag(component.kind())?;
            w.write_sized(|w| component.encode(w))?;
        }
        Ok(())
    }
}

impl Decode for Entity {
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
        let name: String = r.read()?;
        let local_id: LocalId = r.read()?;
        let global_id: Option<GlobalId> = r.read()?;
        let mut entity = Entity::with_ids(name, local_id, global_id);

        let count = r.read_count()?;
        let mut reader = ComponentReader::new(&mut entity);
        for _ in 0..count {
            let tag = r.read_raw_tag()?;
            let mut payload = r.read_sized()?;
            match r.registry().kind_of::<ComponentKind>(tag) {
                Ok(kind) => {
                    reader.read(kind, &mut payload)?;
                    payload.finish()?;
                }
                Err(_) => {
                    warn!(tag, bytes = payload.remaining(), "Skipping unknown component tag");
                }
            }
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::{from_bytes, to_bytes, Registry};
    use crate::game::strategy::StrategyKind;

    fn monster() -> Entity {
        let mut e = Entity::with_ids("imp", LocalId(12), Some(GlobalId(5)))
            .with(Component::Position(PositionComponent { position: Point::new(3.5, 1.25) }))
            .with(Component::Velocity(VelocityComponent {
                x_velocity: 0.1,
                y_velocity: 0.1,
                current_x_velocity: -0.1,
                current_y_velocity: 0.0,
            }))
            .with(Component::Collide(CollideComponent::default()))
            .with(Component::Health(HealthComponent {
                maximal_health: 10,
                current_health: 7,
                on_death: Strategy::DropLoot,
            }))
            .with(Component::Ai(AiComponent::default()));
        e.add(Component::Draw(DrawComponent {
            path: "character/monster/imp".into(),
            current_animation: CoreAnimation::RunLeft,
        }));
        e
    }

    #[test]
    fn test_entity_roundtrip() {
        let registry = Registry::standard();
        let entity = monster();
        let bytes = to_bytes(&entity, &registry).unwrap();
        let decoded: Entity = from_bytes(&bytes, &registry).unwrap();
        assert_eq!(decoded, entity);
    }

    #[test]
    fn test_entity_without_global_id_roundtrip() {
        let registry = Registry::standard();
        let entity = Entity::with_ids("chest", LocalId(3), None)
            .with(Component::Interaction(InteractionComponent::default()))
            .with(Component::Xp(XpComponent { level: 2, points: 40 }));
        let bytes = to_bytes(&entity, &registry).unwrap();
        assert_eq!(from_bytes::<Entity>(&bytes, &registry).unwrap(), entity);
    }

    #[test]
    fn test_unknown_component_tag_is_skipped() {
        // Sender knows one component kind more than the receiver
        let mut sender = Registry::new();
        sender.register(ComponentKind::Position).unwrap();
        sender.register(ComponentKind::Health).unwrap();
        sender.register(ComponentKind::Xp).unwrap();
        for kind in StrategyKind::ALL {
            sender.register(kind).unwrap();
        }
        let mut receiver = Registry::new();
        receiver.register(ComponentKind::Position).unwrap();
        receiver.register(ComponentKind::Health).unwrap();
        for kind in StrategyKind::ALL {
            receiver.register(kind).unwrap();
        }

        let entity = Entity::with_ids("hero", LocalId(1), Some(GlobalId(2)))
            .with(Component::Position(PositionComponent { position: Point::new(1.0, 2.0) }))
            .with(Component::Health(HealthComponent::default()))
            .with(Component::Xp(XpComponent { level: 3, points: 9 }));
        let bytes = to_bytes(&entity, &sender).unwrap();

        let decoded: Entity = from_bytes(&bytes, &receiver).unwrap();
        assert_eq!(decoded.component_count(), 2);
        assert!(decoded.has(ComponentKind::Position));
        assert!(decoded.has(ComponentKind::Health));
        assert!(!decoded.has(ComponentKind::Xp));
    }

    #[test]
    fn test_unregistered_component_fails_encode() {
        let mut registry = Registry::new();
        registry.register(ComponentKind::Position).unwrap();
        let entity = Entity::with_ids("x", LocalId(1), None)
            .with(Component::Multiplayer(MultiplayerComponent { player_id: 1 }));
        assert!(matches!(
            to_bytes(&entity, &registry),
            Err(CodecError::UnregisteredType { name: "multiplayer", .. })
        ));
    }

    #[test]
    fn test_component_reader_attaches_to_target() {
        let registry = Registry::standard();
        let bytes = to_bytes(&Component::Xp(XpComponent { level: 1, points: 2 }), &registry).unwrap();
        let mut shell = Entity::with_ids("shell", LocalId(9), None);
        let mut r = WireReader::new(&bytes, &registry);
        ComponentReader::new(&mut shell).read(ComponentKind::Xp, &mut r).unwrap();
        assert!(shell.has(ComponentKind::Xp));
        r.finish().unwrap();
    }

    #[test]
    fn test_truncated_entity_fails() {
        let registry = Registry::standard();
        let bytes = to_bytes(&monster(), &registry).unwrap();
        assert!(from_bytes::<Entity>(&bytes[..bytes.len() - 3], &registry).is_err());
    }
}
