//! Core value types.
//!
//! Small, copyable primitives shared by the entity model and the wire codec.
//! Every type here has a fixed positional wire shape.

pub mod ids;
pub mod point;

// Re-export core types
pub use ids::{GlobalId, GlobalIdAllocator, LocalId, ConnectionId};
pub use point::{Coordinate, Point};
