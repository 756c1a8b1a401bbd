//! Entity
//!
//! An entity is a named bag of components with three identity keys.
//! Membership in a world is external: an entity does not know which
//! collection holds it.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::ids::{GlobalId, LocalId};
use crate::core::point::Point;
use crate::game::component::{
    Component, ComponentKind, DrawComponent, PositionComponent, VelocityComponent,
};

/// A game object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Display label, not unique
    name: String,
    /// Process-local handle
    local_id: LocalId,
    /// Session handle, only meaningful while a session is active
    global_id: Option<GlobalId>,
    /// At most one component per kind
    components: BTreeMap<ComponentKind, Component>,
}

impl Entity {
    /// Create an entity with a fresh local id and no components.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_ids(name, LocalId::next(), None)
    }

    /// Create an empty shell with explicit identity (used by decoders).
    pub fn with_ids(name: impl Into<String>, local_id: LocalId, global_id: Option<GlobalId>) -> Self {
        Self {
            name: name.into(),
            local_id,
            global_id,
            components: BTreeMap::new(),
        }
    }

    /// Builder-style component attach.
    pub fn with(mut self, component: Component) -> Self {
        self.add(component);
        self
    }

    /// Display label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-local handle.
    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    /// Session handle, if assigned.
    pub fn global_id(&self) -> Option<GlobalId> {
        self.global_id
    }

    /// Assign or clear the session handle.
    pub fn set_global_id(&mut self, global_id: Option<GlobalId>) {
        self.global_id = global_id;
    }

    /// Attach a component, returning the one it replaced.
    pub fn add(&mut self, component: Component) -> Option<Component> {
        self.components.insert(component.kind(), component)
    }

    /// Detach a component.
    pub fn remove(&mut self, kind: ComponentKind) -> Option<Component> {
        self.components.remove(&kind)
    }

    /// Look up a component by kind.
    pub fn fetch(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.get(&kind)
    }

    /// Whether a component of this kind is attached.
    pub fn has(&self, kind: ComponentKind) -> bool {
        self.components.contains_key(&kind)
    }

    /// All attached components.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Number of attached components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Position component, if attached.
    pub fn position(&self) -> Option<&PositionComponent> {
        match self.components.get(&ComponentKind::Position) {
            Some(Component::Position(p)) => Some(p),
            _ => None,
        }
    }

    /// Mutable position component, if attached.
    pub fn position_mut(&mut self) -> Option<&mut PositionComponent> {
        match self.components.get_mut(&ComponentKind::Position) {
            Some(Component::Position(p)) => Some(p),
            _ => None,
        }
    }

    /// Velocity component, if attached.
    pub fn velocity(&self) -> Option<&VelocityComponent> {
        match self.components.get(&ComponentKind::Velocity) {
            Some(Component::Velocity(v)) => Some(v),
            _ => None,
        }
    }

    /// Mutable velocity component, if attached.
    pub fn velocity_mut(&mut self) -> Option<&mut VelocityComponent> {
        match self.components.get_mut(&ComponentKind::Velocity) {
            Some(Component::Velocity(v)) => Some(v),
            _ => None,
        }
    }

    /// Draw component, if attached.
    pub fn draw(&self) -> Option<&DrawComponent> {
        match self.components.get(&ComponentKind::Draw) {
            Some(Component::Draw(d)) => Some(d),
            _ => None,
        }
    }

    /// Mutable draw component, if attached.
    pub fn draw_mut(&mut self) -> Option<&mut DrawComponent> {
        match self.components.get_mut(&ComponentKind::Draw) {
            Some(Component::Draw(d)) => Some(d),
            _ => None,
        }
    }

    /// Set the position, attaching a position component if missing.
    pub fn place_at(&mut self, point: Point) {
        match self.position_mut() {
            Some(p) => p.position = point,
            None => {
                self.add(Component::Position(PositionComponent { position: point }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_component_per_kind() {
        let mut e = Entity::new("hero");
        assert!(e.add(Component::Position(PositionComponent { position: Point::new(1.0, 1.0) })).is_none());
        let replaced = e.add(Component::Position(PositionComponent { position: Point::new(2.0, 2.0) }));
        assert!(replaced.is_some());
        assert_eq!(e.component_count(), 1);
        assert_eq!(e.position().map(|p| p.position), Some(Point::new(2.0, 2.0)));
    }

    #[test]
    fn test_new_entities_have_distinct_local_ids() {
        let a = Entity::new("a");
        let b = Entity::new("a");
        assert_ne!(a.local_id(), b.local_id());
        assert_eq!(a.global_id(), None);
    }

    #[test]
    fn test_place_at_attaches_position() {
        let mut e = Entity::new("chest");
        assert!(e.position().is_none());
        e.place_at(Point::new(3.0, 4.0));
        assert_eq!(e.position().map(|p| p.position), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_remove_component() {
        let mut e = Entity::new("imp").with(Component::Velocity(VelocityComponent::default()));
        assert!(e.has(ComponentKind::Velocity));
        e.remove(ComponentKind::Velocity);
        assert!(e.velocity().is_none());
    }
}
