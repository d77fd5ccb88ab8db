use std::net::SocketAddr;
use std::sync::Arc;

use dungeon::{
    Game, MemoryMobStore, MemoryPlayerStore, MemoryWorldStore, MobStore, Player, PlayerStore,
    SimulationLoop, WorldStore,
};
use net::{ConnectionContext, ConnectionLimiter, ShutdownRx};
use session::SessionRegistry;
use space::{Mover, World};
use tokio::net::TcpListener;
use world_db::WorldDb;

use crate::config::{ServerConfig, StoreBackend};

/// The maze served when no layout file is configured.
pub const DEFAULT_LAYOUT: &str = include_str!("../assets/world1.txt");

type BoxError = Box<dyn std::error::Error>;

/// A bound, seeded server that has not started serving yet.
pub struct Server {
    config: ServerConfig,
    game: Arc<Game>,
    registry: Arc<SessionRegistry>,
    listener: TcpListener,
}

impl Server {
    /// Open the stores, load and seed the world, then bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, BoxError> {
        let game = Arc::new(bootstrap(&config)?);
        let listener = TcpListener::bind(&config.net.addr).await?;
        tracing::info!("TCP server listening on {}", listener.local_addr()?);
        Ok(Self {
            config,
            game,
            registry: Arc::new(SessionRegistry::new()),
            listener,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn game(&self) -> Arc<Game> {
        Arc::clone(&self.game)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Serve clients and run the simulation until `shutdown` fires. Returns
    /// once every connection has closed and the simulation has stopped.
    pub async fn run(self, shutdown: ShutdownRx) {
        let simulation = SimulationLoop::new(
            Arc::clone(&self.game),
            Arc::clone(&self.registry),
            self.config.to_simulation_config(),
        );
        let simulation = tokio::spawn(simulation.run(shutdown.clone()));

        let ctx = ConnectionContext {
            dispatcher: self.game,
            registry: self.registry,
            shutdown,
            max_input_length: self.config.net.max_input_length,
        };
        let limiter = ConnectionLimiter::new(self.config.to_limiter_config());
        net::serve(self.listener, ctx, limiter).await;

        match simulation.await {
            Ok(ticks) => tracing::info!(ticks, "simulation finished"),
            Err(e) => tracing::error!(error = %e, "simulation task failed"),
        }
    }
}

/// Build the game over the configured backend and put the world, seed
/// players and a clean mob population in place.
pub fn bootstrap(config: &ServerConfig) -> Result<Game, BoxError> {
    let (worlds, players, mobs) = open_stores(config)?;
    let game = Game::new(worlds, players, mobs)
        .with_spawn_attempts(config.simulation.spawn_attempts);

    let world = load_world(config)?;
    tracing::info!(
        world_id = world.id(),
        width = world.width(),
        height = world.height(),
        "world loaded"
    );
    if world.id() != config.simulation.world_id {
        tracing::warn!(
            world_id = world.id(),
            simulation_world = %config.simulation.world_id,
            "simulation targets a world that was not loaded"
        );
    }
    let world_id = world.id().to_string();
    game.worlds().save_world(world)?;

    // Mob ids restart at mob-1 each run; persisted mobs would collide.
    let stale = game.mobs_in_world(&world_id)?;
    for mob in &stale {
        game.despawn_mob(&mob.id)?;
    }
    if !stale.is_empty() {
        tracing::info!(count = stale.len(), world_id = %world_id, "cleared mobs from previous run");
    }

    seed_players(&game, config, &world_id)?;
    Ok(game)
}

type Stores = (Arc<dyn WorldStore>, Arc<dyn PlayerStore>, Arc<dyn MobStore>);

fn open_stores(config: &ServerConfig) -> Result<Stores, BoxError> {
    match config.store.backend {
        StoreBackend::Memory => {
            let worlds: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
            let players: Arc<dyn PlayerStore> = Arc::new(MemoryPlayerStore::new());
            let mobs: Arc<dyn MobStore> = Arc::new(MemoryMobStore::new());
            Ok((worlds, players, mobs))
        }
        StoreBackend::Sqlite => {
            let db = Arc::new(WorldDb::open(&config.store.sqlite_path)?);
            let worlds: Arc<dyn WorldStore> = db.clone();
            let players: Arc<dyn PlayerStore> = db.clone();
            let mobs: Arc<dyn MobStore> = db;
            Ok((worlds, players, mobs))
        }
    }
}

fn load_world(config: &ServerConfig) -> Result<World, BoxError> {
    let path = &config.world.layout_path;
    let world = if path.is_empty() {
        World::from_text(&config.world.id, DEFAULT_LAYOUT)?
    } else {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read layout {path}: {e}"))?;
        World::from_text(&config.world.id, &text)?
    };
    Ok(world)
}

/// Place each configured player at the start cell, or on a random free
/// cell when the start cell is not walkable. Existing players are kept.
fn seed_players(game: &Game, config: &ServerConfig, world_id: &str) -> Result<(), BoxError> {
    let Some(world) = game.get_world(world_id)? else {
        return Ok(());
    };
    let (x, y) = (config.player.start_x, config.player.start_y);
    let start_ok = world.is_passable(x, y, Mover::Player);
    let mut rng = rand::rng();

    for id in &config.player.seed_ids {
        if let Some(existing) = game.players().get_player(id)? {
            let stranded = existing.world_id == world_id
                && !world.is_passable(existing.x, existing.y, Mover::Player);
            if stranded {
                tracing::warn!(
                    player_id = %id,
                    pos = %existing.position(),
                    "restored player is inside a wall, respawning"
                );
                game.spawn_player(id, world_id, &mut rng)?;
            } else {
                tracing::info!(player_id = %id, pos = %existing.position(), "player restored");
            }
            continue;
        }
        if start_ok {
            game.players().save_player(&Player::new(id.as_str(), world_id, x, y))?;
            tracing::info!(player_id = %id, x, y, "player seeded");
        } else {
            tracing::warn!(player_id = %id, x, y, "start cell is not walkable, spawning at random");
            game.spawn_player(id, world_id, &mut rng)?;
        }
    }
    Ok(())
}
