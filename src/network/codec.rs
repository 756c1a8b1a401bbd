//! Wire Codec
//!
//! Positional binary encoding with a type-tag registry for polymorphic
//! values.
//!
//! ## Format
//!
//! - Fixed-shape values (points, ids, numbers, strings, level geometry) are
//!   written field by field with bincode (little endian, fixed-width ints).
//!   No field names travel on the wire.
//! - Polymorphic values (messages, components, strategies) are preceded by a
//!   `u16` tag. Tags are registration indices, so both ends must register the
//!   same kinds in the same order.
//! - Collections are a `u32` count followed by that many elements.
//!
//! Encoding an unregistered kind fails with [`CodecError::UnregisteredType`];
//! decoding a tag nobody registered fails with [`CodecError::UnknownType`].

use std::collections::BTreeMap;
use std::fmt;
use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::core::ids::{GlobalId, LocalId};
use crate::core::point::{Coordinate, Point};
use crate::game::component::{ComponentKind, CoreAnimation};
use crate::game::level::Level;
use crate::game::strategy::{Strategy, StrategyKind};
use crate::network::protocol::MessageKind;

/// Wire type tag.
pub type Tag = u16;

// =============================================================================
// ERRORS
// =============================================================================

/// Which tag space a kind lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeFamily {
    /// Top-level protocol messages
    Message,
    /// Entity components
    Component,
    /// Behavior strategies
    Strategy,
}

impl fmt::Display for TypeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeFamily::Message => "message",
            TypeFamily::Component => "component",
            TypeFamily::Strategy => "strategy",
        };
        f.write_str(name)
    }
}

/// Encoding and decoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Tried to encode a kind that was never registered
    #[error("{family} type {name} is not registered")]
    UnregisteredType {
        /// Tag space
        family: TypeFamily,
        /// Stable name of the kind
        name: &'static str,
    },

    /// Read a tag with no registered kind
    #[error("unknown {family} tag {tag}")]
    UnknownType {
        /// Tag space
        family: TypeFamily,
        /// Tag read from the stream
        tag: Tag,
    },

    /// Same kind registered twice
    #[error("{family} type {name} registered twice")]
    DuplicateRegistration {
        /// Tag space
        family: TypeFamily,
        /// Stable name of the kind
        name: &'static str,
    },

    /// Fixed-shape payload failed to (de)serialize
    #[error("payload error: {0}")]
    Payload(#[from] bincode::Error),

    /// Input ended early
    #[error("truncated input: needed {needed} bytes, {remaining} left")]
    Truncated {
        /// Bytes requested
        needed: usize,
        /// Bytes available
        remaining: usize,
    },

    /// Count or length outside what the stream can hold
    #[error("length {0} out of range")]
    LengthOverflow(u64),

    /// Bytes left over after a complete message
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

// =============================================================================
// REGISTRY
// =============================================================================

/// A kind that gets a tag from the registry.
pub trait Registered: Copy + Ord + fmt::Debug + 'static {
    /// Tag space of this kind.
    const FAMILY: TypeFamily;

    /// Stable name, used in errors and logs.
    fn type_name(self) -> &'static str;

    /// This kind's table.
    fn table(registry: &Registry) -> &TagTable<Self>;

    /// This kind's table, mutably.
    fn table_mut(registry: &mut Registry) -> &mut TagTable<Self>;
}

impl Registered for MessageKind {
    const FAMILY: TypeFamily = TypeFamily::Message;
    fn type_name(self) -> &'static str {
        self.name()
    }
    fn table(registry: &Registry) -> &TagTable<Self> {
        &registry.messages
    }
    fn table_mut(registry: &mut Registry) -> &mut TagTable<Self> {
        &mut registry.messages
    }
}

impl Registered for ComponentKind {
    const FAMILY: TypeFamily = TypeFamily::Component;
    fn type_name(self) -> &'static str {
        self.name()
    }
    fn table(registry: &Registry) -> &TagTable<Self> {
        &registry.components
    }
    fn table_mut(registry: &mut Registry) -> &mut TagTable<Self> {
        &mut registry.components
    }
}

impl Registered for StrategyKind {
    const FAMILY: TypeFamily = TypeFamily::Strategy;
    fn type_name(self) -> &'static str {
        self.name()
    }
    fn table(registry: &Registry) -> &TagTable<Self> {
        &registry.strategies
    }
    fn table_mut(registry: &mut Registry) -> &mut TagTable<Self> {
        &mut registry.strategies
    }
}

/// Bidirectional kind/tag table for one family.
#[derive(Clone, Debug)]
pub struct TagTable<K> {
    by_kind: BTreeMap<K, Tag>,
    by_tag: Vec<K>,
}

impl<K> Default for TagTable<K> {
    fn default() -> Self {
        Self { by_kind: BTreeMap::new(), by_tag: Vec::new() }
    }
}

impl<K: Registered> TagTable<K> {
    fn insert(&mut self, kind: K) -> Result<Tag, CodecError> {
        if self.by_kind.contains_key(&kind) {
            return Err(CodecError::DuplicateRegistration { family: K::FAMILY, name: kind.type_name() });
        }
        let tag = Tag::try_from(self.by_tag.len())
            .map_err(|_| CodecError::LengthOverflow(self.by_tag.len() as u64))?;
        self.by_kind.insert(kind, tag);
        self.by_tag.push(kind);
        Ok(tag)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// Kinds in tag order.
    pub fn kinds(&self) -> &[K] {
        &self.by_tag
    }
}

/// Tag assignments for every polymorphic family.
///
/// Built once at startup, then shared read-only by every connection.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    messages: TagTable<MessageKind>,
    components: TagTable<ComponentKind>,
    strategies: TagTable<StrategyKind>,
}

impl Registry {
    /// Empty registry. Nothing can be encoded until kinds are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the full catalogue in canonical order.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.messages.by_tag.extend(MessageKind::ALL);
        registry.components.by_tag.extend(ComponentKind::ALL);
        registry.strategies.by_tag.extend(StrategyKind::ALL);
        registry.messages.by_kind = index(&registry.messages.by_tag);
        registry.components.by_kind = index(&registry.components.by_tag);
        registry.strategies.by_kind = index(&registry.strategies.by_tag);
        registry
    }

    /// Register a kind, returning its tag.
    pub fn register<K: Registered>(&mut self, kind: K) -> Result<Tag, CodecError> {
        K::table_mut(self).insert(kind)
    }

    /// Tag for a kind.
    pub fn tag_of<K: Registered>(&self, kind: K) -> Result<Tag, CodecError> {
        K::table(self)
            .by_kind
            .get(&kind)
            .copied()
            .ok_or(CodecError::UnregisteredType { family: K::FAMILY, name: kind.type_name() })
    }

    /// Kind for a tag.
    pub fn kind_of<K: Registered>(&self, tag: Tag) -> Result<K, CodecError> {
        K::table(self)
            .by_tag
            .get(tag as usize)
            .copied()
            .ok_or(CodecError::UnknownType { family: K::FAMILY, tag })
    }

    /// Whether a kind has a tag.
    pub fn is_registered<K: Registered>(&self, kind: K) -> bool {
        K::table(self).by_kind.contains_key(&kind)
    }

    /// Registered messages.
    pub fn messages(&self) -> &TagTable<MessageKind> {
        &self.messages
    }

    /// Registered components.
    pub fn components(&self) -> &TagTable<ComponentKind> {
        &self.components
    }

    /// Registered strategies.
    pub fn strategies(&self) -> &TagTable<StrategyKind> {
        &self.strategies
    }
}

fn index<K: Registered>(kinds: &[K]) -> BTreeMap<K, Tag> {
    kinds.iter().enumerate().map(|(i, k)| (*k, i as Tag)).collect()
}

// =============================================================================
// WRITER / READER
// =============================================================================

/// Append-only encoder bound to a registry.
pub struct WireWriter<'r> {
    buf: Vec<u8>,
    registry: &'r Registry,
}

impl<'r> WireWriter<'r> {
    /// Empty writer.
    pub fn new(registry: &'r Registry) -> Self {
        Self { buf: Vec::with_capacity(64), registry }
    }

    /// Registry used for tags.
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Write a fixed-shape value.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> {
        bincode::serialize_into(&mut self.buf, value)?;
        Ok(())
    }

    /// Write the tag of a registered kind.
    pub fn write_tag<K: Registered>(&mut self, kind: K) -> Result<(), CodecError> {
        let tag = self.registry.tag_of(kind)?;
        self.buf.extend_from_slice(&tag.to_le_bytes());
        Ok(())
    }

    /// Write a collection count.
    pub fn write_count(&mut self, count: usize) -> Result<(), CodecError> {
        let count = u32::try_from(count).map_err(|_| CodecError::LengthOverflow(count as u64))?;
        self.buf.extend_from_slice(&count.to_le_bytes());
        Ok(())
    }

    /// Write whatever `body` writes, prefixed by its byte length.
    pub fn write_sized<F>(&mut self, body: F) -> Result<(), CodecError>
    where
        F: FnOnce(&mut Self) -> Result<(), CodecError>,
    {
        let at = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        body(self)?;
        let len = self.buf.len() - at - 4;
        let len = u32::try_from(len).map_err(|_| CodecError::LengthOverflow(len as u64))?;
        self.buf[at..at + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish and take the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor-based decoder bound to a registry.
pub struct WireReader<'a, 'r> {
    buf: &'a [u8],
    registry: &'r Registry,
}

impl<'a, 'r> WireReader<'a, 'r> {
    /// Reader over `buf`.
    pub fn new(buf: &'a [u8], registry: &'r Registry) -> Self {
        Self { buf, registry }
    }

    /// Registry used for tags.
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Read a fixed-shape value.
    ///
    /// Declared lengths are checked against the remaining input before
    /// anything is allocated.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        let options = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(self.buf.len() as u64);
        Ok(options.deserialize_from(&mut self.buf)?)
    }

    /// Read a raw tag without resolving it.
    pub fn read_raw_tag(&mut self) -> Result<Tag, CodecError> {
        let bytes = self.take(2)?;
        Ok(Tag::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read and resolve a tag.
    pub fn read_tag<K: Registered>(&mut self) -> Result<K, CodecError> {
        let tag = self.read_raw_tag()?;
        self.registry.kind_of(tag)
    }

    /// Read a collection count.
    ///
    /// Every element takes at least one byte, so a count larger than the
    /// remaining input is rejected before any allocation.
    pub fn read_count(&mut self) -> Result<usize, CodecError> {
        let bytes = self.take(4)?;
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if count > self.buf.len() {
            return Err(CodecError::LengthOverflow(count as u64));
        }
        Ok(count)
    }

    /// Read a length-prefixed block and return a reader over it.
    pub fn read_sized(&mut self) -> Result<WireReader<'a, 'r>, CodecError> {
        let bytes = self.take(4)?;
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let body = self.take(len)?;
        Ok(WireReader::new(body, self.registry))
    }

    /// Consume `n` raw bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.buf.len() {
            return Err(CodecError::Truncated { needed: n, remaining: self.buf.len() });
        }
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Fail if anything is left.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// A value with a wire encoding.
pub trait Encode {
    /// Append this value to the writer.
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError>;
}

/// A value that can be read back from the wire.
pub trait Decode: Sized {
    /// Read one value from the reader.
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError>;
}

/// Encode a single value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T, registry: &Registry) -> Result<Vec<u8>, CodecError> {
    let mut w = WireWriter::new(registry);
    value.encode(&mut w)?;
    Ok(w.into_bytes())
}

/// Decode exactly one value from `bytes`.
pub fn from_bytes<T: Decode>(bytes: &[u8], registry: &Registry) -> Result<T, CodecError> {
    let mut r = WireReader::new(bytes, registry);
    let value = T::decode(&mut r)?;
    r.finish()?;
    Ok(value)
}

macro_rules! fixed_shape {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
                    w.write(self)
                }
            }

            impl Decode for $ty {
                fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
                    r.read()
                }
            }
        )*
    };
}

fixed_shape!(
    bool, i32, u32, i64, u64, f32, String,
    Point, Coordinate, GlobalId, LocalId, CoreAnimation, Level,
);

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        match self {
            Some(value) => {
                w.write(&true)?;
                value.encode(w)
            }
            None => w.write(&false),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
        if r.read::<bool>()? {
            Ok(Some(T::decode(r)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        w.write_count(self.len())?;
        for item in self {
            item.encode(w)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        self.as_slice().encode(w)
    }
}

/// Upper bound on elements reserved up front when decoding a collection.
const PREALLOC_LIMIT: usize = 1024;

/// Reservation for a decoded collection of `count` elements. The count is
/// only bounded by the remaining input, so larger collections grow as
/// elements actually decode.
fn initial_capacity(count: usize) -> usize {
    count.min(PREALLOC_LIMIT)
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
        let count = r.read_count()?;
        let mut items = Vec::with_capacity(initial_capacity(count));
        for _ in 0..count {
            items.push(T::decode(r)?);
        }
        Ok(items)
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        w.write_count(self.len())?;
        for (key, value) in self {
            key.encode(w)?;
            value.encode(w)?;
        }
        Ok(())
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
        let count = r.read_count()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = K::decode(r)?;
            let value = V::decode(r)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

impl Encode for Strategy {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        w.write_tag(self.kind())?;
        match self {
            Strategy::DefaultCollider
            | Strategy::ItemCollider
            | Strategy::SelfDefendTransition
            | Strategy::DefaultOnDeath
            | Strategy::DropLoot
            | Strategy::DefaultInteraction
            | Strategy::DropItemsInteraction => Ok(()),
            Strategy::CollideAi { rush_range } => w.write(rush_range),
            Strategy::MeleeAi { attack_range } => w.write(attack_range),
            Strategy::RangeAi { attack_range, distance } => {
                w.write(attack_range)?;
                w.write(distance)
            }
            Strategy::RadiusWalk { radius, break_time }
            | Strategy::StaticRadiusWalk { radius, break_time } => {
                w.write(radius)?;
                w.write(break_time)
            }
            Strategy::PatrolWalk { radius, checkpoints, pause_time } => {
                w.write(radius)?;
                checkpoints.encode(w)?;
                w.write(pause_time)
            }
            Strategy::RangeTransition { range } => w.write(range),
        }
    }
}

impl Decode for Strategy {
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
        let strategy = match r.read_tag::<StrategyKind>()? {
            StrategyKind::DefaultCollider => Strategy::DefaultCollider,
            StrategyKind::ItemCollider => Strategy::ItemCollider,
            StrategyKind::SelfDefendTransition => Strategy::SelfDefendTransition,
            StrategyKind::DefaultOnDeath => Strategy::DefaultOnDeath,
            StrategyKind::DropLoot => Strategy::DropLoot,
            StrategyKind::DefaultInteraction => Strategy::DefaultInteraction,
            StrategyKind::DropItemsInteraction => Strategy::DropItemsInteraction,
            StrategyKind::CollideAi => Strategy::CollideAi { rush_range: r.read()? },
            StrategyKind::MeleeAi => Strategy::MeleeAi { attack_range: r.read()? },
            StrategyKind::RangeAi => Strategy::RangeAi {
                attack_range: r.read()?,
                distance: r.read()?,
            },
            StrategyKind::RadiusWalk => Strategy::RadiusWalk {
                radius: r.read()?,
                break_time: r.read()?,
            },
            StrategyKind::StaticRadiusWalk => Strategy::StaticRadiusWalk {
                radius: r.read()?,
                break_time: r.read()?,
            },
            StrategyKind::PatrolWalk => Strategy::PatrolWalk {
                radius: r.read()?,
                checkpoints: Vec::<Point>::decode(r)?,
                pause_time: r.read()?,
            },
            StrategyKind::RangeTransition => Strategy::RangeTransition { range: r.read()? },
        };
        Ok(strategy)
    }
}
