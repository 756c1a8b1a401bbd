//! Protocol Messages
//!
//! The session message catalogue. On the wire every message is its registry
//! tag followed by its positional payload; one WebSocket binary frame
//! carries exactly one message. JSON helpers exist for logs and debugging
//! only.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::ids::GlobalId;
use crate::core::point::Point;
use crate::game::entity::Entity;
use crate::game::level::Level;
use crate::game::state::GameState;
use crate::network::codec::{CodecError, Decode, Encode, Registry, WireReader, WireWriter};

// =============================================================================
// MESSAGE KIND
// =============================================================================

/// Stable type identifier of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Latency probe
    PingRequest,
    /// Latency probe echo
    PingResponse,
    /// Claim the host role
    InitServerRequest,
    /// Host role granted or refused
    InitServerResponse,
    /// Host publishes a new map
    LoadMapRequest,
    /// New map broadcast
    LoadMapResponse,
    /// A client reached the exit
    ChangeMapRequest,
    /// Exit acknowledgement
    ChangeMapResponse,
    /// Enter the session with a hero
    JoinSessionRequest,
    /// Join result with the current world
    JoinSessionResponse,
    /// Own hero moved
    UpdateOwnPositionRequest,
    /// Move acknowledgement
    UpdateOwnPositionResponse,
    /// Authoritative entity set
    GameStateUpdateEvent,
}

impl MessageKind {
    /// Every kind, in default registration order.
    pub const ALL: [MessageKind; 13] = [
        MessageKind::PingRequest,
        MessageKind::PingResponse,
        MessageKind::InitServerRequest,
        MessageKind::InitServerResponse,
        MessageKind::LoadMapRequest,
        MessageKind::LoadMapResponse,
        MessageKind::ChangeMapRequest,
        MessageKind::ChangeMapResponse,
        MessageKind::JoinSessionRequest,
        MessageKind::JoinSessionResponse,
        MessageKind::UpdateOwnPositionRequest,
        MessageKind::UpdateOwnPositionResponse,
        MessageKind::GameStateUpdateEvent,
    ];

    /// Stable name.
    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::PingRequest => "ping_request",
            MessageKind::PingResponse => "ping_response",
            MessageKind::InitServerRequest => "init_server_request",
            MessageKind::InitServerResponse => "init_server_response",
            MessageKind::LoadMapRequest => "load_map_request",
            MessageKind::LoadMapResponse => "load_map_response",
            MessageKind::ChangeMapRequest => "change_map_request",
            MessageKind::ChangeMapResponse => "change_map_response",
            MessageKind::JoinSessionRequest => "join_session_request",
            MessageKind::JoinSessionResponse => "join_session_response",
            MessageKind::UpdateOwnPositionRequest => "update_own_position_request",
            MessageKind::UpdateOwnPositionResponse => "update_own_position_response",
            MessageKind::GameStateUpdateEvent => "game_state_update_event",
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Claim the host role for this session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitServerRequest;

/// Answer to [`InitServerRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitServerResponse {
    /// Whether the sender is now the host
    pub success: bool,
    /// Client id of the host, if granted
    pub client_id: Option<GlobalId>,
}

/// Host publishes a freshly generated map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadMapRequest {
    /// Map geometry
    pub level: Level,
    /// Entities placed on the map
    pub entities: Vec<Entity>,
    /// The host's hero
    pub hero: Entity,
}

/// Broadcast after a map was loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadMapResponse {
    /// Whether the map was accepted
    pub success: bool,
    /// New session snapshot, on success
    pub game_state: Option<GameState>,
}

/// A hero reached the exit tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMapRequest;

/// Acknowledges a [`ChangeMapRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMapResponse;

/// Enter the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSessionRequest {
    /// Hero to play; its global id is assigned by the host
    pub hero: Entity,
}

/// Answer to [`JoinSessionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSessionResponse {
    /// Whether the join went through
    pub success: bool,
    /// Current map
    pub level: Option<Level>,
    /// Joining client's id, equal to its hero's global id
    pub client_id: Option<GlobalId>,
    /// Position of every hero in the session
    pub hero_positions: BTreeMap<GlobalId, Point>,
    /// Every session entity, heroes included
    pub entities: Vec<Entity>,
}

impl JoinSessionResponse {
    /// Refusal with no payload.
    pub fn failure() -> Self {
        Self {
            success: false,
            level: None,
            client_id: None,
            hero_positions: BTreeMap::new(),
            entities: Vec::new(),
        }
    }
}

/// Own hero moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOwnPositionRequest {
    /// Hero's global id
    pub global_id: GlobalId,
    /// New position
    pub position: Point,
    /// Current x velocity
    pub x_velocity: f32,
    /// Current y velocity
    pub y_velocity: f32,
}

/// Acknowledges an [`UpdateOwnPositionRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOwnPositionResponse;

/// Authoritative entity set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateUpdateEvent {
    /// Every session entity
    pub entities: Vec<Entity>,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// Any session message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Latency probe carrying the sender's clock (ms)
    PingRequest {
        /// Sender timestamp
        time: u64,
    },
    /// Echo of a ping
    PingResponse {
        /// Echoed timestamp
        time: u64,
    },
    /// See [`InitServerRequest`]
    InitServerRequest(InitServerRequest),
    /// See [`InitServerResponse`]
    InitServerResponse(InitServerResponse),
    /// See [`LoadMapRequest`]
    LoadMapRequest(LoadMapRequest),
    /// See [`LoadMapResponse`]
    LoadMapResponse(LoadMapResponse),
    /// See [`ChangeMapRequest`]
    ChangeMapRequest(ChangeMapRequest),
    /// See [`ChangeMapResponse`]
    ChangeMapResponse(ChangeMapResponse),
    /// See [`JoinSessionRequest`]
    JoinSessionRequest(JoinSessionRequest),
    /// See [`JoinSessionResponse`]
    JoinSessionResponse(JoinSessionResponse),
    /// See [`UpdateOwnPositionRequest`]
    UpdateOwnPositionRequest(UpdateOwnPositionRequest),
    /// See [`UpdateOwnPositionResponse`]
    UpdateOwnPositionResponse(UpdateOwnPositionResponse),
    /// See [`GameStateUpdateEvent`]
    GameStateUpdateEvent(GameStateUpdateEvent),
}

impl Message {
    /// Type identifier.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Message::PingRequest { .. } => MessageKind::PingRequest,
            Message::PingResponse { .. } => MessageKind::PingResponse,
            Message::InitServerRequest(_) => MessageKind::InitServerRequest,
            Message::InitServerResponse(_) => MessageKind::InitServerResponse,
            Message::LoadMapRequest(_) => MessageKind::LoadMapRequest,
            Message::LoadMapResponse(_) => MessageKind::LoadMapResponse,
            Message::ChangeMapRequest(_) => MessageKind::ChangeMapRequest,
            Message::ChangeMapResponse(_) => MessageKind::ChangeMapResponse,
            Message::JoinSessionRequest(_) => MessageKind::JoinSessionRequest,
            Message::JoinSessionResponse(_) => MessageKind::JoinSessionResponse,
            Message::UpdateOwnPositionRequest(_) => MessageKind::UpdateOwnPositionRequest,
            Message::UpdateOwnPositionResponse(_) => MessageKind::UpdateOwnPositionResponse,
            Message::GameStateUpdateEvent(_) => MessageKind::GameStateUpdateEvent,
        }
    }

    /// Encode to one frame payload.
    pub fn to_bytes(&self, registry: &Registry) -> Result<Vec<u8>, CodecError> {
        crate::network::codec::to_bytes(self, registry)
    }

    /// Decode one frame payload. Trailing bytes are an error.
    pub fn from_bytes(data: &[u8], registry: &Registry) -> Result<Self, CodecError> {
        crate::network::codec::from_bytes(data, registry)
    }

    /// Serialize to JSON for logs.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// WIRE ENCODING
// =============================================================================

impl Encode for GameState {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        self.level.encode(w)?;
        self.entities.encode(w)
    }
}

impl Decode for GameState {
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
        Ok(GameState {
            level: Level::decode(r)?,
            entities: Vec::decode(r)?,
        })
    }
}

impl Encode for Message {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), CodecError> {
        w.write_tag(self.kind())?;
        match self {
            Message::PingRequest { time } | Message::PingResponse { time } => w.write(time),
            Message::InitServerRequest(_)
            | Message::ChangeMapRequest(_)
            | Message::ChangeMapResponse(_)
            | Message::UpdateOwnPositionResponse(_) => Ok(()),
            Message::InitServerResponse(m) => {
                w.write(&m.success)?;
                m.client_id.encode(w)
            }
            Message::LoadMapRequest(m) => {
                m.level.encode(w)?;
                m.entities.encode(w)?;
                m.hero.encode(w)
            }
            Message::LoadMapResponse(m) => {
                w.write(&m.success)?;
                m.game_state.encode(w)
            }
            Message::JoinSessionRequest(m) => m.hero.encode(w),
            Message::JoinSessionResponse(m) => {
                w.write(&m.success)?;
                m.level.encode(w)?;
                m.client_id.encode(w)?;
                m.hero_positions.encode(w)?;
                m.entities.encode(w)
            }
            Message::UpdateOwnPositionRequest(m) => {
                w.write(&m.global_id)?;
                w.write(&m.position)?;
                w.write(&m.x_velocity)?;
                w.write(&m.y_velocity)
            }
            Message::GameStateUpdateEvent(m) => m.entities.encode(w),
        }
    }
}

impl Decode for Message {
    fn decode(r: &mut WireReader<'_, '_>) -> Result<Self, CodecError> {
        let message = match r.read_tag::<MessageKind>()? {
            MessageKind::PingRequest => Message::PingRequest { time: r.read()? },
            MessageKind::PingResponse => Message::PingResponse { time: r.read()? },
            MessageKind::InitServerRequest => Message::InitServerRequest(InitServerRequest),
            MessageKind::InitServerResponse => Message::InitServerResponse(InitServerResponse {
                success: r.read()?,
                client_id: Option::decode(r)?,
            }),
            MessageKind::LoadMapRequest => Message::LoadMapRequest(LoadMapRequest {
                level: Level::decode(r)?,
                entities: Vec::decode(r)?,
                hero: Entity::decode(r)?,
            }),
            MessageKind::LoadMapResponse => Message::LoadMapResponse(LoadMapResponse {
                success: r.read()?,
                game_state: Option::decode(r)?,
            }),
            MessageKind::ChangeMapRequest => Message::ChangeMapRequest(ChangeMapRequest),
            MessageKind::ChangeMapResponse => Message::ChangeMapResponse(ChangeMapResponse),
            MessageKind::JoinSessionRequest => Message::JoinSessionRequest(JoinSessionRequest {
                hero: Entity::decode(r)?,
            }),
            MessageKind::JoinSessionResponse => Message::JoinSessionResponse(JoinSessionResponse {
                success: r.read()?,
                level: Option::decode(r)?,
                client_id: Option::decode(r)?,
                hero_positions: BTreeMap::decode(r)?,
                entities: Vec::decode(r)?,
            }),
            MessageKind::UpdateOwnPositionRequest => {
                Message::UpdateOwnPositionRequest(UpdateOwnPositionRequest {
                    global_id: r.read()?,
                    position: r.read()?,
                    x_velocity: r.read()?,
                    y_velocity: r.read()?,
                })
            }
            MessageKind::UpdateOwnPositionResponse => {
                Message::UpdateOwnPositionResponse(UpdateOwnPositionResponse)
            }
            MessageKind::GameStateUpdateEvent => Message::GameStateUpdateEvent(GameStateUpdateEvent {
                entities: Vec::decode(r)?,
            }),
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::LocalId;
    use crate::game::component::{Component, PositionComponent};
    use crate::game::level::DesignLabel;
    use crate::network::codec::TypeFamily;

    fn hero(gid: Option<u32>) -> Entity {
        Entity::with_ids("hero", LocalId(1), gid.map(GlobalId))
            .with(Component::Position(PositionComponent { position: Point::ZERO }))
    }

    #[test]
    fn test_ping_wire_layout() {
        let registry = Registry::standard();
        let bytes = Message::PingRequest { time: 42 }.to_bytes(&registry).unwrap();
        assert_eq!(&bytes[..2], &0u16.to_le_bytes());
        assert_eq!(&bytes[2..], &42u64.to_le_bytes());
    }

    #[test]
    fn test_join_response_roundtrip() {
        let registry = Registry::standard();
        let level = Level::from_layout("S..\n..E", DesignLabel::Forest).unwrap();
        let mut hero_positions = BTreeMap::new();
        hero_positions.insert(GlobalId(7), Point::ZERO);
        let msg = Message::JoinSessionResponse(JoinSessionResponse {
            success: true,
            level: Some(level),
            client_id: Some(GlobalId(7)),
            hero_positions,
            entities: vec![hero(Some(7))],
        });

        let bytes = msg.to_bytes(&registry).unwrap();
        assert_eq!(Message::from_bytes(&bytes, &registry).unwrap(), msg);
    }

    #[test]
    fn test_load_map_roundtrip() {
        let registry = Registry::standard();
        let level = Level::from_layout("S#E", DesignLabel::Temple).unwrap();
        let msg = Message::LoadMapResponse(LoadMapResponse {
            success: true,
            game_state: Some(GameState::new(level, vec![hero(Some(1)), hero(Some(2))])),
        });
        let bytes = msg.to_bytes(&registry).unwrap();
        assert_eq!(Message::from_bytes(&bytes, &registry).unwrap(), msg);
    }

    #[test]
    fn test_unit_messages_are_tag_only() {
        let registry = Registry::standard();
        let bytes = Message::ChangeMapRequest(ChangeMapRequest).to_bytes(&registry).unwrap();
        assert_eq!(bytes.len(), 2);
    }

    #[test]
    fn test_unregistered_message_rejected() {
        let mut registry = Registry::new();
        registry.register(MessageKind::PingRequest).unwrap();
        let err = Message::PingResponse { time: 1 }.to_bytes(&registry).unwrap_err();
        assert!(matches!(err, CodecError::UnregisteredType { family: TypeFamily::Message, .. }));

        let err = Message::from_bytes(&[9, 0], &registry).unwrap_err();
        assert!(matches!(err, CodecError::UnknownType { family: TypeFamily::Message, tag: 9 }));
    }

    #[test]
    fn test_json_debug_dump() {
        let msg = Message::UpdateOwnPositionRequest(UpdateOwnPositionRequest {
            global_id: GlobalId(3),
            position: Point::new(1.5, 2.0),
            x_velocity: -1.0,
            y_velocity: 0.0,
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains("UpdateOwnPositionRequest"));
        assert_eq!(Message::from_json(&json).unwrap(), msg);
    }
}
