//! Behavior Strategies
//!
//! Polymorphic behavior values attached to components: collision callbacks,
//! AI fight/idle/transition behaviors, death and interaction callbacks.
//!
//! The catalogue is closed. Every variant has a stable wire name and must be
//! registered with the codec registry before it can be encoded; there is no
//! default serializable representation.

use serde::{Serialize, Deserialize};

use crate::core::point::Point;

/// What a strategy is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyRole {
    /// Collide enter/leave callback
    Collision,
    /// AI behavior while fighting
    Fight,
    /// AI behavior while idle
    Idle,
    /// AI switch between idle and fight
    Transition,
    /// Health reached zero
    Death,
    /// Interaction with another entity
    Interaction,
}

/// Stable type identifier of a strategy variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// `default_collider`
    DefaultCollider,
    /// `item_collider`
    ItemCollider,
    /// `collide_ai`
    CollideAi,
    /// `melee_ai`
    MeleeAi,
    /// `range_ai`
    RangeAi,
    /// `radius_walk`
    RadiusWalk,
    /// `static_radius_walk`
    StaticRadiusWalk,
    /// `patrol_walk`
    PatrolWalk,
    /// `self_defend_transition`
    SelfDefendTransition,
    /// `range_transition`
    RangeTransition,
    /// `default_on_death`
    DefaultOnDeath,
    /// `drop_loot`
    DropLoot,
    /// `default_interaction`
    DefaultInteraction,
    /// `drop_items_interaction`
    DropItemsInteraction,
}

impl StrategyKind {
    /// Every variant, in default registration order.
    pub const ALL: [StrategyKind; 14] = [
        StrategyKind::DefaultCollider,
        StrategyKind::ItemCollider,
        StrategyKind::CollideAi,
        StrategyKind::MeleeAi,
        StrategyKind::RangeAi,
        StrategyKind::RadiusWalk,
        StrategyKind::StaticRadiusWalk,
        StrategyKind::PatrolWalk,
        StrategyKind::SelfDefendTransition,
        StrategyKind::RangeTransition,
        StrategyKind::DefaultOnDeath,
        StrategyKind::DropLoot,
        StrategyKind::DefaultInteraction,
        StrategyKind::DropItemsInteraction,
    ];

    /// Stable wire name.
    pub const fn name(self) -> &'static str {
        match self {
            StrategyKind::DefaultCollider => "default_collider",
            StrategyKind::ItemCollider => "item_collider",
            StrategyKind::CollideAi => "collide_ai",
            StrategyKind::MeleeAi => "melee_ai",
            StrategyKind::RangeAi => "range_ai",
            StrategyKind::RadiusWalk => "radius_walk",
            StrategyKind::StaticRadiusWalk => "static_radius_walk",
            StrategyKind::PatrolWalk => "patrol_walk",
            StrategyKind::SelfDefendTransition => "self_defend_transition",
            StrategyKind::RangeTransition => "range_transition",
            StrategyKind::DefaultOnDeath => "default_on_death",
            StrategyKind::DropLoot => "drop_loot",
            StrategyKind::DefaultInteraction => "default_interaction",
            StrategyKind::DropItemsInteraction => "drop_items_interaction",
        }
    }

    /// Role this variant plays.
    pub const fn role(self) -> StrategyRole {
        match self {
            StrategyKind::DefaultCollider | StrategyKind::ItemCollider => StrategyRole::Collision,
            StrategyKind::CollideAi | StrategyKind::MeleeAi | StrategyKind::RangeAi => {
                StrategyRole::Fight
            }
            StrategyKind::RadiusWalk
            | StrategyKind::StaticRadiusWalk
            | StrategyKind::PatrolWalk => StrategyRole::Idle,
            StrategyKind::SelfDefendTransition | StrategyKind::RangeTransition => {
                StrategyRole::Transition
            }
            StrategyKind::DefaultOnDeath | StrategyKind::DropLoot => StrategyRole::Death,
            StrategyKind::DefaultInteraction | StrategyKind::DropItemsInteraction => {
                StrategyRole::Interaction
            }
        }
    }
}

/// A behavior value.
///
/// Stateless variants decode to a default instance; stateful ones carry only
/// their configuration, never references to other entities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Strategy {
    /// Collision callback that does nothing special.
    DefaultCollider,
    /// Collision callback that picks up an item.
    ItemCollider,
    /// Rush toward the target once within range.
    CollideAi {
        /// Distance at which the rush starts
        rush_range: f32,
    },
    /// Melee attack within range.
    MeleeAi {
        /// Attack reach
        attack_range: f32,
    },
    /// Ranged attack, keeping distance.
    RangeAi {
        /// Attack reach
        attack_range: f32,
        /// Preferred distance to target
        distance: f32,
    },
    /// Wander inside a radius around the current position.
    RadiusWalk {
        /// Wander radius
        radius: f32,
        /// Pause between walks (frames)
        break_time: i32,
    },
    /// Wander inside a radius around the spawn position.
    StaticRadiusWalk {
        /// Wander radius
        radius: f32,
        /// Pause between walks (frames)
        break_time: i32,
    },
    /// Walk between checkpoints.
    PatrolWalk {
        /// Checkpoint search radius
        radius: f32,
        /// Checkpoints visited in order
        checkpoints: Vec<Point>,
        /// Pause at each checkpoint (frames)
        pause_time: i32,
    },
    /// Fight once attacked.
    SelfDefendTransition,
    /// Fight once the target is in range.
    RangeTransition {
        /// Trigger range
        range: f32,
    },
    /// Remove the entity on death.
    DefaultOnDeath,
    /// Drop carried items on death.
    DropLoot,
    /// Interaction that does nothing special.
    DefaultInteraction,
    /// Interaction that drops carried items.
    DropItemsInteraction,
}

impl Strategy {
    /// Stable type identifier of this variant.
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Strategy::DefaultCollider => StrategyKind::DefaultCollider,
            Strategy::ItemCollider => StrategyKind::ItemCollider,
            Strategy::CollideAi { .. } => StrategyKind::CollideAi,
            Strategy::MeleeAi { .. } => StrategyKind::MeleeAi,
            Strategy::RangeAi { .. } => StrategyKind::RangeAi,
            Strategy::RadiusWalk { .. } => StrategyKind::RadiusWalk,
            Strategy::StaticRadiusWalk { .. } => StrategyKind::StaticRadiusWalk,
            Strategy::PatrolWalk { .. } => StrategyKind::PatrolWalk,
            Strategy::SelfDefendTransition => StrategyKind::SelfDefendTransition,
            Strategy::RangeTransition { .. } => StrategyKind::RangeTransition,
            Strategy::DefaultOnDeath => StrategyKind::DefaultOnDeath,
            Strategy::DropLoot => StrategyKind::DropLoot,
            Strategy::DefaultInteraction => StrategyKind::DefaultInteraction,
            Strategy::DropItemsInteraction => StrategyKind::DropItemsInteraction,
        }
    }

    /// Role this value plays.
    pub const fn role(&self) -> StrategyRole {
        self.kind().role()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_names_are_unique() {
        let names: BTreeSet<_> = StrategyKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), StrategyKind::ALL.len());
    }

    #[test]
    fn test_kind_and_role() {
        let s = Strategy::MeleeAi { attack_range: 1.5 };
        assert_eq!(s.kind(), StrategyKind::MeleeAi);
        assert_eq!(s.role(), StrategyRole::Fight);
        assert_eq!(Strategy::DropLoot.role(), StrategyRole::Death);
        assert_eq!(Strategy::DefaultCollider.role(), StrategyRole::Collision);
    }
}
