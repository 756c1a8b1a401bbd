//! Dungeon Sync
//!
//! Headless frame loop demonstrating single player, hosting and joining.
//!
//! ```text
//! dungeon-sync [single|host|join] [--host ADDR] [--port N] [--ticks N]
//! ```

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dungeon_sync::{
    game::component::{Component, DrawComponent, PositionComponent, VelocityComponent},
    game::level::{DesignLabel, Level},
    network::config::{HostConfig, NetworkConfig},
    Entity, GameMode, LevelSource, SessionContext, FRAME_RATE, VERSION,
};

const LAYOUTS: [&str; 2] = [
    "\
##########
#S.....E.#
#........#
##########",
    "\
#######
#S..E.#
#.....#
#...#.#
#######",
];

/// Cycles through the built-in layouts, one monster per level.
struct DemoLevels {
    next: usize,
}

impl LevelSource for DemoLevels {
    fn next_level(&mut self) -> (Level, Vec<Entity>) {
        let layout = LAYOUTS[self.next % LAYOUTS.len()];
        self.next += 1;
        let level = match Level::from_layout(layout, DesignLabel::Default) {
            Ok(level) => level,
            Err(e) => unreachable!("built-in layout is invalid: {e}"),
        };
        let monster = Entity::new("chort")
            .with(Component::Position(PositionComponent { position: (3.0, 2.0).into() }))
            .with(Component::Velocity(VelocityComponent::default()))
            .with(Component::Draw(DrawComponent { path: "character/monster/chort".into(), ..Default::default() }))
            .with(Component::Ai(Default::default()))
            .with(Component::Health(Default::default()));
        (level, vec![monster])
    }
}

struct Args {
    mode: GameMode,
    host: Option<String>,
    port: Option<u16>,
    ticks: u32,
}

fn parse_args() -> Result<Args> {
    let mut args = Args { mode: GameMode::SinglePlayer, host: None, port: None, ticks: 300 };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "single" => args.mode = GameMode::SinglePlayer,
            "host" => args.mode = GameMode::Host,
            "join" => args.mode = GameMode::Client,
            "--host" => args.host = Some(iter.next().context("--host needs an address")?),
            "--port" => args.port = Some(iter.next().context("--port needs a value")?.parse().context("invalid --port")?),
            "--ticks" => args.ticks = iter.next().context("--ticks needs a value")?.parse().context("invalid --ticks")?,
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn hero() -> Entity {
    Entity::new("hero")
        .with(Component::Position(PositionComponent::default()))
        .with(Component::Velocity(VelocityComponent { x_velocity: 0.1, y_velocity: 0.1, ..Default::default() }))
        .with(Component::Draw(DrawComponent { path: "character/knight".into(), ..Default::default() }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    let args = parse_args()?;
    let mut network = NetworkConfig::from_env();
    if let Some(host) = &args.host {
        network.host = host.clone();
    }
    if let Some(port) = args.port {
        network.port = port;
    }

    info!("Dungeon Sync v{}", VERSION);
    info!("Frame Rate: {} Hz, mode {:?}", FRAME_RATE, args.mode);

    let mut context = SessionContext::new(hero(), DemoLevels { next: 0 }, network.clone(), HostConfig::default());
    context.start_single_player();
    match args.mode {
        GameMode::SinglePlayer => {}
        GameMode::Host => {
            let addr = context.host_session().await?;
            info!("Others can join on port {}", addr.port());
        }
        GameMode::Client => context.join_session(network.host.clone(), network.port).await?,
    }

    let mut frames = tokio::time::interval(Duration::from_secs(1) / FRAME_RATE);
    for tick in 0..args.ticks {
        frames.tick().await;

        if let Some(hero) = context.hero_mut() {
            if let Some(velocity) = hero.velocity_mut() {
                velocity.current_x_velocity = velocity.x_velocity;
            }
            let step = hero.velocity().map(|v| v.current_x_velocity).unwrap_or_default();
            if let Some(position) = hero.position_mut() {
                position.position.x += step;
            }
        }
        if let Err(e) = context.send_movement_update() {
            warn!("Movement update failed: {}", e);
        }
        if context.handle_hero_on_end_tile() {
            info!("Hero reached the exit at tick {}", tick);
        }

        let result = context.tick();
        if result.membership_changed() {
            info!(tick, added = result.added.len(), removed = result.removed.len(), "Entities synchronized");
        }
        if tick % FRAME_RATE == 0 && context.in_session() {
            let _ = context.ping();
            if let Some(rtt) = context.last_round_trip() {
                info!("Round trip: {:?}", rtt);
            }
        }
    }

    info!(entities = context.local().len(), mode = ?context.mode(), "Frame loop finished");
    context.stop_systems();
    Ok(())
}
