//! Component Catalogue
//!
//! The closed set of components an entity may carry, one per kind.
//! Components never reference other entities; ownership is expressed only by
//! which entity holds them.

use serde::{Serialize, Deserialize};

use crate::core::point::Point;
use crate::game::strategy::Strategy;

// =============================================================================
// COMPONENT KIND
// =============================================================================

/// Stable type identifier of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// `position`
    Position,
    /// `velocity`
    Velocity,
    /// `collide`
    Collide,
    /// `projectile`
    Projectile,
    /// `multiplayer`
    Multiplayer,
    /// `health`
    Health,
    /// `draw`
    Draw,
    /// `ai`
    Ai,
    /// `interaction`
    Interaction,
    /// `xp`
    Xp,
}

impl ComponentKind {
    /// Every kind, in default registration order.
    pub const ALL: [ComponentKind; 10] = [
        ComponentKind::Position,
        ComponentKind::Velocity,
        ComponentKind::Collide,
        ComponentKind::Projectile,
        ComponentKind::Multiplayer,
        ComponentKind::Health,
        ComponentKind::Draw,
        ComponentKind::Ai,
        ComponentKind::Interaction,
        ComponentKind::Xp,
    ];

    /// Stable wire name.
    pub const fn name(self) -> &'static str {
        match self {
            ComponentKind::Position => "position",
            ComponentKind::Velocity => "velocity",
            ComponentKind::Collide => "collide",
            ComponentKind::Projectile => "projectile",
            ComponentKind::Multiplayer => "multiplayer",
            ComponentKind::Health => "health",
            ComponentKind::Draw => "draw",
            ComponentKind::Ai => "ai",
            ComponentKind::Interaction => "interaction",
            ComponentKind::Xp => "xp",
        }
    }
}

// =============================================================================
// ANIMATION
// =============================================================================

/// Animation clips every drawable entity provides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreAnimation {
    /// Standing, facing left
    IdleLeft,
    /// Standing, facing right
    #[default]
    IdleRight,
    /// Moving left
    RunLeft,
    /// Moving right
    RunRight,
}

impl CoreAnimation {
    /// Clip name as understood by the rendering layer.
    pub const fn as_str(self) -> &'static str {
        match self {
            CoreAnimation::IdleLeft => "idle-left",
            CoreAnimation::IdleRight => "idle-right",
            CoreAnimation::RunLeft => "run-left",
            CoreAnimation::RunRight => "run-right",
        }
    }

    /// Whether the clip faces left.
    #[inline]
    pub const fn faces_left(self) -> bool {
        matches!(self, CoreAnimation::IdleLeft | CoreAnimation::RunLeft)
    }

    /// Clip for a horizontal velocity, keeping the facing when standing still.
    pub fn from_x_velocity(x: f32, previous: CoreAnimation) -> CoreAnimation {
        if x > 0.0 {
            CoreAnimation::RunRight
        } else if x < 0.0 {
            CoreAnimation::RunLeft
        } else if previous.faces_left() {
            CoreAnimation::IdleLeft
        } else {
            CoreAnimation::IdleRight
        }
    }
}

// =============================================================================
// COMPONENTS
// =============================================================================

/// World position.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionComponent {
    /// Current position
    pub position: Point,
}

/// Configured and current velocity.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityComponent {
    /// Configured speed on x
    pub x_velocity: f32,
    /// Configured speed on y
    pub y_velocity: f32,
    /// Velocity applied this frame on x
    pub current_x_velocity: f32,
    /// Velocity applied this frame on y
    pub current_y_velocity: f32,
}

/// Hitbox with collision callbacks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollideComponent {
    /// Hitbox offset from the position
    pub offset: Point,
    /// Hitbox size
    pub size: Point,
    /// Called when a collision starts
    pub on_enter: Strategy,
    /// Called when a collision ends
    pub on_leave: Strategy,
}

impl CollideComponent {
    /// Default hitbox offset.
    pub const DEFAULT_OFFSET: Point = Point::new(0.25, 0.25);
    /// Default hitbox size.
    pub const DEFAULT_SIZE: Point = Point::new(0.5, 0.5);
}

impl Default for CollideComponent {
    fn default() -> Self {
        Self {
            offset: Self::DEFAULT_OFFSET,
            size: Self::DEFAULT_SIZE,
            on_enter: Strategy::DefaultCollider,
            on_leave: Strategy::DefaultCollider,
        }
    }
}

/// Projectile flight path.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectileComponent {
    /// Launch position
    pub start_position: Point,
    /// Target position
    pub goal_position: Point,
}

/// Marks an entity as belonging to a session player.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiplayerComponent {
    /// Owning player
    pub player_id: i32,
}

/// Hit points with a death callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthComponent {
    /// Maximum hit points
    pub maximal_health: i32,
    /// Current hit points
    pub current_health: i32,
    /// Called once health reaches zero
    pub on_death: Strategy,
}

impl Default for HealthComponent {
    fn default() -> Self {
        Self {
            maximal_health: 1,
            current_health: 1,
            on_death: Strategy::DefaultOnDeath,
        }
    }
}

/// Rendering state consumed by the animation layer.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawComponent {
    /// Animation set to load
    pub path: String,
    /// Clip currently playing
    pub current_animation: CoreAnimation,
}

/// AI behavior set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiComponent {
    /// Behavior while fighting
    pub fight: Strategy,
    /// Behavior while idle
    pub idle: Strategy,
    /// Switch from idle to fight
    pub transition: Strategy,
}

impl Default for AiComponent {
    fn default() -> Self {
        Self {
            fight: Strategy::CollideAi { rush_range: 2.0 },
            idle: Strategy::RadiusWalk { radius: 5.0, break_time: 60 },
            transition: Strategy::RangeTransition { range: 5.0 },
        }
    }
}

/// Interaction trigger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionComponent {
    /// Interaction reach
    pub radius: f32,
    /// Whether it can trigger more than once
    pub repeatable: bool,
    /// Called on interaction
    pub on_interaction: Strategy,
}

impl Default for InteractionComponent {
    fn default() -> Self {
        Self {
            radius: 1.5,
            repeatable: true,
            on_interaction: Strategy::DefaultInteraction,
        }
    }
}

/// Experience progress.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct XpComponent {
    /// Current level
    pub level: i64,
    /// Points into the current level
    pub points: i64,
}

/// A component value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Component {
    /// See [`PositionComponent`]
    Position(PositionComponent),
    /// See [`VelocityComponent`]
    Velocity(VelocityComponent),
    /// See [`CollideComponent`]
    Collide(CollideComponent),
    /// See [`ProjectileComponent`]
    Projectile(ProjectileComponent),
    /// See [`MultiplayerComponent`]
    Multiplayer(MultiplayerComponent),
    /// See [`HealthComponent`]
    Health(HealthComponent),
    /// See [`DrawComponent`]
    Draw(DrawComponent),
    /// See [`AiComponent`]
    Ai(AiComponent),
    /// See [`InteractionComponent`]
    Interaction(InteractionComponent),
    /// See [`XpComponent`]
    Xp(XpComponent),
}

impl Component {
    /// Stable type identifier of this component.
    pub const fn kind(&self) -> ComponentKind {
        match self {
            Component::Position(_) => ComponentKind::Position,
            Component::Velocity(_) => ComponentKind::Velocity,
            Component::Collide(_) => ComponentKind::Collide,
            Component::Projectile(_) => ComponentKind::Projectile,
            Component::Multiplayer(_) => ComponentKind::Multiplayer,
            Component::Health(_) => ComponentKind::Health,
            Component::Draw(_) => ComponentKind::Draw,
            Component::Ai(_) => ComponentKind::Ai,
            Component::Interaction(_) => ComponentKind::Interaction,
            Component::Xp(_) => ComponentKind::Xp,
        }
    }
}
