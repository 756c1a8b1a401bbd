//! Client Session Manager
//!
//! Owns the connection to the host and the client's global world. Inbound
//! messages are applied only from [`ClientSessionManager::pump`], which the
//! game loop calls at the start of a tick; observers are notified after the
//! global world has been updated.
//!
//! Connection state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> JoinRequested -> Joined
//!       ^______________|____________|______________|____________|
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::ids::GlobalId;
use crate::core::point::Point;
use crate::game::entity::Entity;
use crate::game::level::Level;
use crate::game::world::GlobalWorld;
use crate::network::client::{InboundEvent, SessionClient};
use crate::network::codec::Registry;
use crate::network::config::NetworkConfig;
use crate::network::protocol::{
    ChangeMapRequest, InitServerRequest, InitServerResponse, JoinSessionRequest,
    JoinSessionResponse, LoadMapRequest, LoadMapResponse, Message, UpdateOwnPositionRequest,
};
use crate::network::transport::{now_millis, TransportError};

/// Client connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection
    Disconnected,
    /// Connect in flight
    Connecting,
    /// Connected, not part of the session yet
    Connected,
    /// Join sent, waiting for the answer
    JoinRequested,
    /// Part of the session
    Joined,
}

/// Callbacks for session events. Every method defaults to doing nothing.
#[allow(unused_variables)]
pub trait SessionObserver {
    /// Host role granted or refused.
    fn on_init_server_response(&mut self, response: &InitServerResponse) {}
    /// Join answered.
    fn on_join_session_response(&mut self, response: &JoinSessionResponse) {}
    /// A map was loaded by the host.
    fn on_load_map_response(&mut self, response: &LoadMapResponse) {}
    /// Another player reached the exit (host only).
    fn on_change_map_request(&mut self) {}
    /// Own exit request acknowledged.
    fn on_change_map_response(&mut self) {}
    /// The global world was replaced.
    fn on_game_state_update(&mut self, entities: &[Entity]) {}
    /// Own position update acknowledged.
    fn on_update_own_position_response(&mut self) {}
    /// Ping answered.
    fn on_ping_response(&mut self, round_trip: Duration) {}
    /// Connection lost or closed.
    fn on_disconnected(&mut self, reason: Option<&str>) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Client side of a session.
pub struct ClientSessionManager {
    config: NetworkConfig,
    registry: Arc<Registry>,
    client: Option<SessionClient>,
    state: ConnectionState,
    global: GlobalWorld,
    client_id: Option<GlobalId>,
    level: Option<Level>,
    hero_positions: BTreeMap<GlobalId, Point>,
}

impl ClientSessionManager {
    /// Create a disconnected manager.
    pub fn new(config: NetworkConfig, registry: Arc<Registry>) -> Self {
        Self {
            config,
            registry,
            client: None,
            state: ConnectionState::Disconnected,
            global: GlobalWorld::new(),
            client_id: None,
            level: None,
            hero_positions: BTreeMap::new(),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a transport connection is open.
    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Whether this client is part of a running session.
    pub fn is_connected_to_session(&self) -> bool {
        self.state == ConnectionState::Joined
    }

    /// Last known authoritative entity set.
    pub fn global(&self) -> &GlobalWorld {
        &self.global
    }

    /// Global entities, for the synchronization system.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.global.iter()
    }

    /// Own client id (own hero's global id).
    pub fn client_id(&self) -> Option<GlobalId> {
        self.client_id
    }

    /// Current session level.
    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    /// Hero positions from the last join or update.
    pub fn hero_positions(&self) -> &BTreeMap<GlobalId, Point> {
        &self.hero_positions
    }

    /// Connection settings.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Connect to the configured host. Failures are reported once, never
    /// retried.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.client.is_some() {
            self.disconnect();
        }
        self.state = ConnectionState::Connecting;
        match SessionClient::connect(&self.config, self.registry.clone()).await {
            Ok(client) => {
                self.client = Some(client);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Use another host address for the next connect.
    pub fn set_address(&mut self, host: impl Into<String>, port: u16) {
        self.config.host = host.into();
        self.config.port = port;
    }

    /// Claim the host role.
    pub fn init_server(&mut self) -> Result<(), TransportError> {
        self.send(Message::InitServerRequest(InitServerRequest))
    }

    /// Ask to join with `hero`.
    pub fn join_session(&mut self, hero: Entity) -> Result<(), TransportError> {
        self.send(Message::JoinSessionRequest(JoinSessionRequest { hero }))?;
        self.state = ConnectionState::JoinRequested;
        Ok(())
    }

    /// Publish a new map (host only).
    pub fn load_map(&mut self, level: Level, entities: Vec<Entity>, hero: Entity) -> Result<(), TransportError> {
        self.send(Message::LoadMapRequest(LoadMapRequest { level, entities, hero }))
    }

    /// Tell the host our hero reached the exit.
    pub fn request_new_level(&mut self) -> Result<(), TransportError> {
        self.send(Message::ChangeMapRequest(ChangeMapRequest))
    }

    /// Report own hero movement.
    ///
    /// The global copy of the hero takes the reported values right away, so
    /// reconciliation does not pull the hero back while the host's echo is
    /// in flight.
    pub fn send_movement_update(
        &mut self,
        global_id: GlobalId,
        position: Point,
        x_velocity: f32,
        y_velocity: f32,
    ) -> Result<(), TransportError> {
        self.send(Message::UpdateOwnPositionRequest(UpdateOwnPositionRequest {
            global_id,
            position,
            x_velocity,
            y_velocity,
        }))?;
        if let Some(entity) = self.global.get_mut(global_id) {
            entity.place_at(position);
            if let Some(velocity) = entity.velocity_mut() {
                velocity.current_x_velocity = x_velocity;
                velocity.current_y_velocity = y_velocity;
            }
        }
        if let Some(known) = self.hero_positions.get_mut(&global_id) {
            *known = position;
        }
        Ok(())
    }

    /// Measure round-trip latency.
    pub fn ping(&mut self) -> Result<(), TransportError> {
        self.send(Message::PingRequest { time: now_millis() })
    }

    /// Close the connection and forget the session.
    pub fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            info!("Disconnecting from host");
            client.close();
        }
        self.reset();
    }

    fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;
        client.send(&message)
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.global.clear();
        self.client_id = None;
        self.level = None;
        self.hero_positions.clear();
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Apply everything received since the last call. Returns how many
    /// events were processed.
    pub fn pump(&mut self, observer: &mut dyn SessionObserver) -> usize {
        let events = match &self.client {
            Some(client) => client.drain(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            match event {
                InboundEvent::Message(message) => self.apply_message(message, observer),
                InboundEvent::Disconnected(reason) => {
                    warn!(reason = reason.as_deref().unwrap_or("closed"), "Lost connection to host");
                    self.client = None;
                    self.reset();
                    observer.on_disconnected(reason.as_deref());
                    break;
                }
            }
        }
        count
    }

    /// Apply one inbound message to the session view, then notify.
    pub fn apply_message(&mut self, message: Message, observer: &mut dyn SessionObserver) {
        match message {
            Message::InitServerResponse(response) => {
                if response.success {
                    self.client_id = response.client_id;
                }
                observer.on_init_server_response(&response);
            }
            Message::JoinSessionResponse(response) => {
                if response.success {
                    self.client_id = response.client_id;
                    self.level = response.level.clone();
                    self.global.replace_all(response.entities.clone());
                    for (id, position) in &response.hero_positions {
                        if let Some(entity) = self.global.get_mut(*id) {
                            entity.place_at(*position);
                        }
                    }
                    self.hero_positions = response.hero_positions.clone();
                    self.state = ConnectionState::Joined;
                    info!(client = ?self.client_id, entities = self.global.len(), "Joined session");
                } else {
                    self.state = ConnectionState::Connected;
                    warn!("Join refused by host");
                }
                observer.on_join_session_response(&response);
            }
            Message::LoadMapResponse(response) => {
                // Broadcast to every connection; only a client holding an id
                // (the host after init, or a joined guest) takes part.
                if self.client_id.is_none() {
                    debug!(state = ?self.state, "Ignoring map load outside a session");
                    return;
                }
                if let (true, Some(state)) = (response.success, &response.game_state) {
                    self.level = Some(state.level.clone());
                    self.replace_global(state.entities.clone());
                    self.state = ConnectionState::Joined;
                    debug!(entities = self.global.len(), "Map loaded");
                }
                observer.on_load_map_response(&response);
            }
            Message::GameStateUpdateEvent(event) => {
                self.replace_global(event.entities);
                let entities: Vec<Entity> = self.global.to_vec();
                observer.on_game_state_update(&entities);
            }
            Message::ChangeMapRequest(_) => observer.on_change_map_request(),
            Message::ChangeMapResponse(_) => observer.on_change_map_response(),
            Message::UpdateOwnPositionResponse(_) => observer.on_update_own_position_response(),
            Message::PingResponse { time } => {
                let round_trip = Duration::from_millis(now_millis().saturating_sub(time));
                observer.on_ping_response(round_trip);
            }
            other => warn!(kind = other.kind().name(), "Client ignoring host-bound message"),
        }
    }

    /// Take a snapshot as the global world and read hero positions back
    /// from it. The snapshot is authoritative for every entity.
    fn replace_global(&mut self, entities: Vec<Entity>) {
        self.global.replace_all(entities);
        self.hero_positions = self
            .hero_positions
            .keys()
            .filter_map(|id| Some((*id, self.global.get(*id)?.position()?.position)))
            .collect();
    }
}
