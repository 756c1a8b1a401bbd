//! Host Session
//!
//! Authoritative session state held by the hosting process: the current
//! level, every session entity keyed by global id, and which connection
//! plays which hero.
//!
//! `HostSession` is transport-agnostic. Each handler returns the messages to
//! send as [`Outbound`] routing instructions; the server owns the sockets.
//!
//! The host role goes to the first connection that sends
//! `InitServerRequest`. There is no election; if the host connection drops
//! the role is vacated and the next `InitServerRequest` claims it.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::ids::{ConnectionId, GlobalId, GlobalIdAllocator};
use crate::core::point::Point;
use crate::game::component::{Component, VelocityComponent};
use crate::game::entity::Entity;
use crate::game::level::Level;
use crate::game::state::GameState;
use crate::network::config::HostConfig;
use crate::network::protocol::{
    ChangeMapRequest, ChangeMapResponse, GameStateUpdateEvent, InitServerResponse,
    JoinSessionRequest, JoinSessionResponse, LoadMapRequest, LoadMapResponse, Message,
    UpdateOwnPositionRequest, UpdateOwnPositionResponse,
};
use crate::network::transport::TransportError;

/// Session lifecycle failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The host refused or never answered the join
    #[error("Join failed: {0}")]
    JoinFailure(String),

    /// Host-only request from a non-host
    #[error("Connection {0} is not the host")]
    NotHost(ConnectionId),

    /// No level loaded yet
    #[error("No level loaded")]
    NoLevel,

    /// Someone else already holds the host role
    #[error("Session already hosted")]
    AlreadyHosted,

    /// The host server could not start
    #[error("Failed to start host server: {0}")]
    ServerStart(#[from] std::io::Error),

    /// Underlying transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Where a message produced by the session goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Back to the connection that sent the request
    Reply(Message),
    /// To one specific connection
    To(ConnectionId, Message),
    /// To every connection
    Broadcast(Message),
    /// To every connection but one
    BroadcastExcept(ConnectionId, Message),
}

/// Authoritative session state.
#[derive(Debug)]
pub struct HostSession {
    config: HostConfig,
    level: Option<Level>,
    /// Every session entity
    entities: BTreeMap<GlobalId, Entity>,
    /// Hero global id per connection; doubles as the client id
    heroes: BTreeMap<ConnectionId, GlobalId>,
    host_connection: Option<ConnectionId>,
    ids: GlobalIdAllocator,
}

impl HostSession {
    /// Empty session with no level and no host.
    pub fn new(config: HostConfig) -> Self {
        let ids = GlobalIdAllocator::starting_at(config.first_global_id);
        Self {
            config,
            level: None,
            entities: BTreeMap::new(),
            heroes: BTreeMap::new(),
            host_connection: None,
            ids,
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Current level.
    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    /// Session entity by global id.
    pub fn entity(&self, global_id: GlobalId) -> Option<&Entity> {
        self.entities.get(&global_id)
    }

    /// Owned copy of every session entity.
    pub fn snapshot(&self) -> Vec<Entity> {
        self.entities.values().cloned().collect()
    }

    /// Number of session entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Current position of every connected hero.
    pub fn hero_positions(&self) -> BTreeMap<GlobalId, Point> {
        self.heroes
            .values()
            .filter_map(|id| {
                let position = self.entities.get(id)?.position()?.position;
                Some((*id, position))
            })
            .collect()
    }

    /// Hero global id (client id) of a connection.
    pub fn client_id(&self, conn: ConnectionId) -> Option<GlobalId> {
        self.heroes.get(&conn).copied()
    }

    /// Whether the connection holds the host role.
    pub fn is_host(&self, conn: ConnectionId) -> bool {
        self.host_connection == Some(conn)
    }

    /// Whether the client id belongs to the hosting connection.
    pub fn is_host_client(&self, client_id: GlobalId) -> bool {
        self.host_connection
            .and_then(|conn| self.client_id(conn))
            .is_some_and(|id| id == client_id)
    }

    /// Connection holding the host role.
    pub fn host_connection(&self) -> Option<ConnectionId> {
        self.host_connection
    }

    /// Connections that have a hero.
    pub fn player_count(&self) -> usize {
        self.heroes.len()
    }

    // =========================================================================
    // MAP
    // =========================================================================

    /// Install a new level and entity set.
    ///
    /// Entities without a global id get one; existing ids are kept and
    /// reserved. Heroes of connected players survive the change and are moved
    /// to the start tile.
    pub fn load_map(&mut self, level: Level, entities: Vec<Entity>) -> GameState {
        let start = level
            .start_tile()
            .map(|t| t.coordinate.to_point())
            .unwrap_or(self.config.initial_hero_position);

        let mut next = BTreeMap::new();
        for hero_id in self.heroes.values() {
            if let Some(hero) = self.entities.remove(hero_id) {
                next.insert(*hero_id, hero);
            }
        }
        for mut entity in entities {
            let id = match entity.global_id() {
                Some(id) => {
                    self.ids.reserve(id);
                    id
                }
                None => {
                    let id = self.ids.allocate();
                    entity.set_global_id(Some(id));
                    id
                }
            };
            next.insert(id, entity);
        }
        for hero_id in self.heroes.values() {
            if let Some(hero) = next.get_mut(hero_id) {
                hero.place_at(start);
            }
        }

        self.entities = next;
        self.level = Some(level.clone());
        info!(entities = self.entities.len(), "Map loaded");
        GameState::new(level, self.snapshot())
    }

    // =========================================================================
    // MESSAGE HANDLING
    // =========================================================================

    /// Apply one inbound message and return what to send.
    pub fn handle(&mut self, conn: ConnectionId, message: Message) -> Vec<Outbound> {
        debug!(%conn, kind = message.kind().name(), "Host received message");
        match message {
            Message::PingRequest { time } => vec![Outbound::Reply(Message::PingResponse { time })],
            Message::InitServerRequest(_) => self.handle_init_server(conn),
            Message::LoadMapRequest(req) => self.handle_load_map(conn, req),
            Message::ChangeMapRequest(_) => self.handle_change_map(conn),
            Message::JoinSessionRequest(req) => self.handle_join(conn, req),
            Message::UpdateOwnPositionRequest(req) => self.handle_position(req),
            other => {
                warn!(%conn, kind = other.kind().name(), "Host ignoring client-bound message");
                Vec::new()
            }
        }
    }

    /// Forget a connection and broadcast the shrunken world.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        if self.host_connection == Some(conn) {
            warn!(%conn, "Host connection left, host role vacated");
            self.host_connection = None;
        }
        match self.heroes.remove(&conn) {
            Some(hero_id) => {
                self.entities.remove(&hero_id);
                info!(%conn, hero = %hero_id, "Player left session");
                vec![self.state_update()]
            }
            None => Vec::new(),
        }
    }

    fn handle_init_server(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        if let Err(e) = self.claim_host(conn) {
            warn!(%conn, "Init server refused: {}", e);
            return vec![Outbound::Reply(Message::InitServerResponse(InitServerResponse {
                success: false,
                client_id: None,
            }))];
        }
        let client_id = self.client_id_for(conn);
        info!(%conn, client = %client_id, "Host role granted");
        vec![Outbound::Reply(Message::InitServerResponse(InitServerResponse {
            success: true,
            client_id: Some(client_id),
        }))]
    }

    fn handle_load_map(&mut self, conn: ConnectionId, req: LoadMapRequest) -> Vec<Outbound> {
        if !self.is_host(conn) {
            warn!(%conn, "{}", SessionError::NotHost(conn));
            return vec![Outbound::Reply(Message::LoadMapResponse(LoadMapResponse {
                success: false,
                game_state: None,
            }))];
        }

        let LoadMapRequest { level, mut entities, mut hero } = req;
        hero.set_global_id(Some(self.client_id_for(conn)));
        entities.push(hero);
        let state = self.load_map(level, entities);

        vec![Outbound::Broadcast(Message::LoadMapResponse(LoadMapResponse {
            success: true,
            game_state: Some(state),
        }))]
    }

    fn handle_change_map(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        let ack = Outbound::Reply(Message::ChangeMapResponse(ChangeMapResponse));
        match self.host_connection {
            Some(host) if host != conn => {
                debug!(%conn, %host, "Forwarding change map request to host");
                vec![Outbound::To(host, Message::ChangeMapRequest(ChangeMapRequest)), ack]
            }
            Some(_) => vec![ack],
            None => {
                warn!(%conn, "Change map requested with no host");
                vec![ack]
            }
        }
    }

    fn handle_join(&mut self, conn: ConnectionId, req: JoinSessionRequest) -> Vec<Outbound> {
        let Some(level) = self.level.clone() else {
            warn!(%conn, "Join refused: {}", SessionError::NoLevel);
            return vec![Outbound::Reply(Message::JoinSessionResponse(JoinSessionResponse::failure()))];
        };

        let client_id = self.client_id_for(conn);
        let mut hero = req.hero;
        hero.set_global_id(Some(client_id));
        hero.place_at(self.config.initial_hero_position);
        self.entities.insert(client_id, hero);
        info!(%conn, client = %client_id, "Player joined session");

        let response = JoinSessionResponse {
            success: true,
            level: Some(level),
            client_id: Some(client_id),
            hero_positions: self.hero_positions(),
            entities: self.snapshot(),
        };
        vec![
            Outbound::Reply(Message::JoinSessionResponse(response)),
            Outbound::BroadcastExcept(conn, self.update_event()),
        ]
    }

    fn handle_position(&mut self, req: UpdateOwnPositionRequest) -> Vec<Outbound> {
        let ack = Outbound::Reply(Message::UpdateOwnPositionResponse(UpdateOwnPositionResponse));
        let Some(entity) = self.entities.get_mut(&req.global_id) else {
            warn!(entity = %req.global_id, "Position update for unknown entity");
            return vec![ack];
        };

        entity.place_at(req.position);
        match entity.velocity_mut() {
            Some(v) => {
                v.current_x_velocity = req.x_velocity;
                v.current_y_velocity = req.y_velocity;
            }
            None => {
                entity.add(Component::Velocity(VelocityComponent {
                    current_x_velocity: req.x_velocity,
                    current_y_velocity: req.y_velocity,
                    ..VelocityComponent::default()
                }));
            }
        }
        vec![ack, self.state_update()]
    }

    fn claim_host(&mut self, conn: ConnectionId) -> Result<(), SessionError> {
        match self.host_connection {
            Some(host) if host != conn => Err(SessionError::AlreadyHosted),
            _ => {
                self.host_connection = Some(conn);
                Ok(())
            }
        }
    }

    fn client_id_for(&mut self, conn: ConnectionId) -> GlobalId {
        if let Some(id) = self.heroes.get(&conn) {
            return *id;
        }
        let id = self.ids.allocate();
        self.heroes.insert(conn, id);
        id
    }

    fn update_event(&self) -> Message {
        Message::GameStateUpdateEvent(GameStateUpdateEvent { entities: self.snapshot() })
    }

    fn state_update(&self) -> Outbound {
        Outbound::Broadcast(self.update_event())
    }
}
