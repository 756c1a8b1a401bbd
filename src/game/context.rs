//! Session Context
//!
//! Game-side glue between the local world and the session layer. Holds the
//! game mode, the client session manager, the host server (when hosting),
//! the local world with its hero, and the synchronization system, and
//! drives them once per tick:
//!
//! 1. drain inbound messages into the session manager
//! 2. act on what they reported (load a map, adopt a session, stop)
//! 3. reconcile the local world against the global one

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::ids::LocalId;
use crate::game::entity::Entity;
use crate::game::level::Level;
use crate::game::sync::{SyncResult, SyncSystem};
use crate::game::world::LocalWorld;
use crate::network::codec::Registry;
use crate::network::config::{HostConfig, NetworkConfig};
use crate::network::manager::{ClientSessionManager, SessionObserver};
use crate::network::protocol::{InitServerResponse, JoinSessionResponse, LoadMapResponse};
use crate::network::server::HostServer;
use crate::network::session::SessionError;
use crate::network::transport::TransportError;

/// How this process takes part in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// No session
    SinglePlayer,
    /// Runs the host server and plays on it
    Host,
    /// Connected to someone else's host
    Client,
}

/// Produces the next level and its entities.
pub trait LevelSource {
    /// Generate a level with the entities that populate it.
    fn next_level(&mut self) -> (Level, Vec<Entity>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowUp {
    LoadNextMap,
    AdoptSession,
    StopSystems,
}

/// Records what inbound messages asked for so it can run after the pump.
#[derive(Default)]
struct Pending {
    actions: Vec<FollowUp>,
    round_trip: Option<Duration>,
}

impl SessionObserver for Pending {
    fn on_init_server_response(&mut self, response: &InitServerResponse) {
        if response.success {
            self.actions.push(FollowUp::LoadNextMap);
        } else {
            warn!("Host role refused");
            self.actions.push(FollowUp::StopSystems);
        }
    }

    fn on_join_session_response(&mut self, response: &JoinSessionResponse) {
        if response.success {
            self.actions.push(FollowUp::AdoptSession);
        } else {
            warn!("{}", SessionError::JoinFailure("host refused the join".to_string()));
            self.actions.push(FollowUp::StopSystems);
        }
    }

    fn on_load_map_response(&mut self, response: &LoadMapResponse) {
        if response.success {
            self.actions.push(FollowUp::AdoptSession);
        }
    }

    fn on_change_map_request(&mut self) {
        self.actions.push(FollowUp::LoadNextMap);
    }

    fn on_ping_response(&mut self, round_trip: Duration) {
        self.round_trip = Some(round_trip);
    }

    fn on_disconnected(&mut self, reason: Option<&str>) {
        info!(reason = reason.unwrap_or("closed"), "Session ended");
        self.actions.push(FollowUp::StopSystems);
    }
}

/// Per-process game state around a session.
pub struct SessionContext<L: LevelSource> {
    mode: GameMode,
    network: NetworkConfig,
    host_config: HostConfig,
    registry: Arc<Registry>,
    manager: ClientSessionManager,
    server: Option<HostServer>,
    server_task: Option<JoinHandle<Result<(), SessionError>>>,
    local: LocalWorld,
    sync: SyncSystem,
    hero: LocalId,
    levels: L,
    level: Option<Level>,
    round_trip: Option<Duration>,
}

impl<L: LevelSource> SessionContext<L> {
    /// Create a single-player context around `hero`.
    pub fn new(hero: Entity, levels: L, network: NetworkConfig, host_config: HostConfig) -> Self {
        let registry = Arc::new(Registry::standard());
        let mut local = LocalWorld::new();
        let hero = local.insert(hero);
        Self {
            mode: GameMode::SinglePlayer,
            manager: ClientSessionManager::new(network.clone(), registry.clone()),
            network,
            host_config,
            registry,
            server: None,
            server_task: None,
            local,
            sync: SyncSystem::new(),
            hero,
            levels,
            level: None,
            round_trip: None,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current mode.
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Local entities.
    pub fn local(&self) -> &LocalWorld {
        &self.local
    }

    /// Local entities, mutable for game systems.
    pub fn local_mut(&mut self) -> &mut LocalWorld {
        &mut self.local
    }

    /// The hero entity.
    pub fn hero(&self) -> Option<&Entity> {
        self.local.get(self.hero)
    }

    /// The hero entity, mutable for input handling.
    ///
    /// The hero's global id must not be changed through this reference.
    pub fn hero_mut(&mut self) -> Option<&mut Entity> {
        self.local.get_mut(self.hero)
    }

    /// Session manager.
    pub fn manager(&self) -> &ClientSessionManager {
        &self.manager
    }

    /// Level being played.
    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    /// Last measured ping round trip.
    pub fn last_round_trip(&self) -> Option<Duration> {
        self.round_trip
    }

    /// Whether a session is running and joined.
    pub fn in_session(&self) -> bool {
        self.mode != GameMode::SinglePlayer && self.manager.is_connected_to_session()
    }

    // =========================================================================
    // MODES
    // =========================================================================

    /// Load the next level locally, without a session.
    pub fn start_single_player(&mut self) {
        let (level, entities) = self.levels.next_level();
        self.retain_only_hero();
        for entity in entities {
            self.local.insert(entity);
        }
        if let Some(start) = level.start_tile().map(|t| t.coordinate.to_point()) {
            if let Some(hero) = self.local.get_mut(self.hero) {
                hero.place_at(start);
            }
        }
        info!(entities = self.local.len(), "Loaded single player level");
        self.level = Some(level);
        self.mode = GameMode::SinglePlayer;
    }

    /// Start a host server, connect to it and claim the host role. The map
    /// is loaded once the role is granted, during a later tick.
    pub async fn host_session(&mut self) -> Result<SocketAddr, SessionError> {
        if self.server.is_some() {
            return Err(SessionError::AlreadyHosted);
        }

        let server = HostServer::new(self.network.clone(), self.host_config.clone(), self.registry.clone());
        let listener = server.bind().await?;
        let addr = listener.local_addr()?;
        let runner = server.clone();
        self.server_task = Some(tokio::spawn(async move { runner.serve(listener).await }));
        self.server = Some(server);

        let connect_host = if addr.ip().is_unspecified() { "127.0.0.1".to_string() } else { addr.ip().to_string() };
        self.manager.set_address(connect_host, addr.port());
        if let Err(e) = self.manager.connect().await {
            self.stop_systems();
            return Err(e.into());
        }
        if let Err(e) = self.manager.init_server() {
            self.stop_systems();
            return Err(e.into());
        }

        self.mode = GameMode::Host;
        info!(%addr, "Hosting session");
        Ok(addr)
    }

    /// Connect to the configured host and ask to join with the hero.
    pub async fn join_session(&mut self, host: impl Into<String>, port: u16) -> Result<(), SessionError> {
        let hero = self.hero().cloned().ok_or_else(|| SessionError::JoinFailure("no hero to join with".to_string()))?;
        self.manager.set_address(host, port);
        if let Err(e) = self.manager.connect().await {
            self.stop_systems();
            return Err(e.into());
        }
        if let Err(e) = self.manager.join_session(hero) {
            self.stop_systems();
            return Err(e.into());
        }
        self.mode = GameMode::Client;
        Ok(())
    }

    /// Leave the session and go back to local-only play.
    pub fn stop_systems(&mut self) {
        self.manager.disconnect();
        if let Some(server) = self.server.take() {
            server.shutdown();
        }
        if let Some(task) = self.server_task.take() {
            debug!(finished = task.is_finished(), "Host server stopping");
        }
        if self.mode != GameMode::SinglePlayer {
            warn!(mode = ?self.mode, "Stopping session systems");
        }
        self.mode = GameMode::SinglePlayer;
    }

    // =========================================================================
    // PER TICK
    // =========================================================================

    /// Run one tick of the session layer.
    pub fn tick(&mut self) -> SyncResult {
        let mut pending = Pending::default();
        let processed = self.manager.pump(&mut pending);
        if processed > 0 {
            debug!(processed, "Applied inbound events");
        }
        if pending.round_trip.is_some() {
            self.round_trip = pending.round_trip;
        }
        self.run_follow_ups(pending.actions);

        let global = if self.in_session() { Some(self.manager.global()) } else { None };
        self.sync.execute(global, &mut self.local)
    }

    /// Report the hero's movement to the host. Does nothing outside a
    /// session.
    pub fn send_movement_update(&mut self) -> Result<(), TransportError> {
        if !self.in_session() {
            return Ok(());
        }
        let Some(hero) = self.local.get(self.hero) else {
            return Ok(());
        };
        let (Some(global_id), Some(position)) = (hero.global_id(), hero.position().map(|p| p.position)) else {
            return Ok(());
        };
        let (x_velocity, y_velocity) = hero
            .velocity()
            .map(|v| (v.current_x_velocity, v.current_y_velocity))
            .unwrap_or_default();
        self.manager.send_movement_update(global_id, position, x_velocity, y_velocity)
    }

    /// Measure the round trip to the host; the result shows up in
    /// [`SessionContext::last_round_trip`] after a later tick.
    pub fn ping(&mut self) -> Result<(), TransportError> {
        self.manager.ping()
    }

    /// React to the hero standing on the exit tile. Returns whether a level
    /// change was started.
    pub fn handle_hero_on_end_tile(&mut self) -> bool {
        let Some(position) = self.hero().and_then(|h| h.position()).map(|p| p.position) else {
            return false;
        };
        if !self.level.as_ref().is_some_and(|l| l.is_on_end_tile(position)) {
            return false;
        }

        match self.mode {
            GameMode::SinglePlayer => self.start_single_player(),
            GameMode::Host => self.run_follow_ups(vec![FollowUp::LoadNextMap]),
            GameMode::Client => {
                if let Err(e) = self.manager.request_new_level() {
                    error!("Failed to request a new level: {}", e);
                    self.stop_systems();
                }
            }
        }
        true
    }

    fn run_follow_ups(&mut self, actions: Vec<FollowUp>) {
        for action in actions {
            match action {
                FollowUp::LoadNextMap => self.load_next_map(),
                FollowUp::AdoptSession => self.adopt_session(),
                FollowUp::StopSystems => self.stop_systems(),
            }
        }
    }

    fn load_next_map(&mut self) {
        if self.mode != GameMode::Host {
            warn!(mode = ?self.mode, "Only the host loads maps");
            return;
        }
        let (level, entities) = self.levels.next_level();
        let Some(hero) = self.hero().cloned() else { return };
        info!(entities = entities.len(), "Publishing new map");
        if let Err(e) = self.manager.load_map(level, entities, hero) {
            error!("Failed to publish map: {}", e);
            self.stop_systems();
        }
    }

    /// Bind the hero to its session identity and let the synchronization
    /// system rebuild everything else from the global world.
    fn adopt_session(&mut self) {
        let client_id = self.manager.client_id();
        self.retain_only_hero();
        self.local.set_global_id(self.hero, client_id);

        let spawn = client_id
            .and_then(|id| self.manager.global().get(id))
            .and_then(|e| e.position())
            .map(|p| p.position);
        if let (Some(point), Some(hero)) = (spawn, self.local.get_mut(self.hero)) {
            hero.place_at(point);
        }
        self.level = self.manager.level().cloned();
        info!(client = ?client_id, "Adopted session state");
    }

    fn retain_only_hero(&mut self) {
        let others: Vec<LocalId> = self.local.iter().map(|e| e.local_id()).filter(|id| *id != self.hero).collect();
        for id in others {
            self.local.remove(id);
        }
    }
}
