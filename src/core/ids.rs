//! Entity and Connection Identifiers
//!
//! Three distinct handle spaces:
//! - `LocalId`: unique within one process, assigned at entity construction
//! - `GlobalId`: unique within a session, assigned by the host
//! - `ConnectionId`: host-side handle for one transport connection
//!
//! All implement Ord so they can key BTreeMaps.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use serde::{Serialize, Deserialize};

static NEXT_LOCAL_ID: AtomicU32 = AtomicU32::new(1);

/// Process-local entity handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(pub u32);

impl LocalId {
    /// Allocate the next unused local id in this process.
    pub fn next() -> Self {
        Self(NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Session-wide entity handle, the reconciliation key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalId(pub u32);

impl GlobalId {
    /// Raw value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host-side handle for a single client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic global id source owned by the host.
///
/// Ids are never reused within one session.
#[derive(Clone, Debug)]
pub struct GlobalIdAllocator {
    next: u32,
}

impl GlobalIdAllocator {
    /// Start allocating at `first`.
    pub const fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Allocate a fresh id.
    pub fn allocate(&mut self) -> GlobalId {
        let id = GlobalId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Make sure future allocations never collide with `id`.
    pub fn reserve(&mut self, id: GlobalId) {
        if id.0 >= self.next {
            self.next = id.0.wrapping_add(1);
        }
    }
}

impl Default for GlobalIdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ids_are_unique() {
        let a = LocalId::next();
        let b = LocalId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_allocator_sequence() {
        let mut alloc = GlobalIdAllocator::starting_at(7);
        assert_eq!(alloc.allocate(), GlobalId(7));
        assert_eq!(alloc.allocate(), GlobalId(8));
    }

    #[test]
    fn test_allocator_reserve_skips_taken_ids() {
        let mut alloc = GlobalIdAllocator::default();
        alloc.reserve(GlobalId(10));
        assert_eq!(alloc.allocate(), GlobalId(11));

        // Reserving a lower id does not rewind
        alloc.reserve(GlobalId(3));
        assert_eq!(alloc.allocate(), GlobalId(12));
    }
}
