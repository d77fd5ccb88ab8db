use std::sync::Arc;
use std::time::{Duration, Instant};

use net::line::encode;
use net::ShutdownRx;
use observability::TickMetrics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use session::{BroadcastReport, SessionRegistry};
use tokio::time::MissedTickBehavior;

use crate::error::GameError;
use crate::game::Game;

/// Simulation loop configuration.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// The single world this loop populates.
    pub world_id: String,
    pub interval: Duration,
    pub target_mobs: usize,
    /// Per-mob chance of trying a step each tick, in `[0, 1]`.
    pub wander_probability: f64,
    pub mob_name: String,
    pub mob_kind: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world_id: "world1".to_string(),
            interval: Duration::from_millis(500),
            target_mobs: 5,
            wander_probability: 0.5,
            mob_name: "Goblin".to_string(),
            mob_kind: "Goblin".to_string(),
        }
    }
}

/// Drives mob population, wandering and the `mobsUpdate` broadcast.
pub struct SimulationLoop {
    game: Arc<Game>,
    registry: Arc<SessionRegistry>,
    config: SimulationConfig,
    rng: StdRng,
    pub current_tick: u64,
}

impl SimulationLoop {
    pub fn new(game: Arc<Game>, registry: Arc<SessionRegistry>, config: SimulationConfig) -> Self {
        Self::with_rng(game, registry, config, StdRng::from_os_rng())
    }

    /// Deterministic variant for tests and replays.
    pub fn with_seed(
        game: Arc<Game>,
        registry: Arc<SessionRegistry>,
        config: SimulationConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(game, registry, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        game: Arc<Game>,
        registry: Arc<SessionRegistry>,
        mut config: SimulationConfig,
        rng: StdRng,
    ) -> Self {
        if !(0.0..=1.0).contains(&config.wander_probability) {
            tracing::warn!(
                wander_probability = config.wander_probability,
                "wander probability out of range, clamping"
            );
            config.wander_probability = if config.wander_probability > 1.0 { 1.0 } else { 0.0 };
        }
        Self {
            game,
            registry,
            config,
            rng,
            current_tick: 0,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Spawn mobs until the world holds `target_mobs`.
    /// Returns `(spawned, failed)`.
    pub fn maintain_population(&mut self) -> (usize, usize) {
        let world_id = self.config.world_id.as_str();
        let live = match self.game.mobs().count_mobs_in_world(world_id) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(world_id, error = %e, "cannot count mobs, skipping spawns");
                return (0, 0);
            }
        };

        let (mut spawned, mut failed) = (0, 0);
        for _ in live..self.config.target_mobs {
            match self.game.spawn_mob(
                world_id,
                &self.config.mob_kind,
                &self.config.mob_name,
                &mut self.rng,
            ) {
                Ok(_) => spawned += 1,
                Err(e) => {
                    tracing::warn!(world_id, error = %e, "mob spawn failed");
                    failed += 1;
                }
            }
        }
        (spawned, failed)
    }

    /// Give every mob in the world a chance to step. Returns how many moved.
    pub fn wander(&mut self) -> usize {
        let mobs = match self.game.mobs_in_world(&self.config.world_id) {
            Ok(mobs) => mobs,
            Err(e) => {
                tracing::warn!(world_id = %self.config.world_id, error = %e, "cannot list mobs");
                return 0;
            }
        };

        let mut moved = 0;
        for mob in mobs {
            if !self.rng.random_bool(self.config.wander_probability) {
                continue;
            }
            match self.game.wander_mob(&mob.id, &mut self.rng) {
                Ok(true) => moved += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(mob_id = %mob.id, error = %e, "mob move failed"),
            }
        }
        moved
    }

    /// Send the current mob list to every session.
    /// Returns the number of mobs sent and the delivery report.
    pub fn broadcast(&self) -> Result<(usize, BroadcastReport), GameError> {
        let mobs = self.game.mobs_update(&self.config.world_id)?;
        let mob_count = mobs.len();
        let line = encode(&net::ServerMessage::MobsUpdate { mobs });
        Ok((mob_count, self.registry.broadcast(&line)))
    }

    /// Execute one tick: spawn, wander, broadcast.
    pub fn step(&mut self) -> TickMetrics {
        let start = Instant::now();

        let (spawned, spawn_failures) = self.maintain_population();
        let moved = self.wander();
        let (mob_count, report) = match self.broadcast() {
            Ok(sent) => sent,
            Err(e) => {
                tracing::warn!(error = %e, "mobs update not sent");
                (0, BroadcastReport::default())
            }
        };

        self.current_tick += 1;
        TickMetrics {
            tick_number: self.current_tick,
            duration_us: start.elapsed().as_micros(),
            spawned,
            spawn_failures,
            moved,
            mob_count,
            sessions_reached: report.delivered,
            sessions_dropped: report.dropped.len(),
        }
    }

    /// Tick on the configured interval until shutdown. A tick in progress
    /// always completes. Returns the number of ticks run.
    pub async fn run(mut self, mut shutdown: ShutdownRx) -> u64 {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            world_id = %self.config.world_id,
            interval_ms = self.config.interval.as_millis() as u64,
            target_mobs = self.config.target_mobs,
            "simulation loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = interval.tick() => {
                    let metrics = self.step();
                    metrics.log(self.config.interval);
                }
            }
        }

        tracing::info!(ticks = self.current_tick, "simulation loop stopped");
        self.current_tick
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use net::{shutdown_channel, ServerMessage};
    use session::{SessionHandle, SessionId};
    use space::{GridPos, Mover, World};

    use super::*;
    use crate::player::Player;
    use crate::store::memory::{MemoryMobStore, MemoryPlayerStore, MemoryWorldStore};
    use crate::store::WorldStore;

    const LAYOUT: [&str; 6] = [
        "##########",
        "#        #",
        "#  ##    #",
        "#     #  #",
        "#   @    #",
        "##########",
    ];

    fn game() -> Arc<Game> {
        let worlds = MemoryWorldStore::new();
        worlds.save_world(World::new("world1", LAYOUT).unwrap()).unwrap();
        Arc::new(Game::new(
            Arc::new(worlds),
            Arc::new(MemoryPlayerStore::new()),
            Arc::new(MemoryMobStore::new()),
        ))
    }

    fn sim(game: Arc<Game>, registry: Arc<SessionRegistry>) -> SimulationLoop {
        SimulationLoop::with_seed(game, registry, SimulationConfig::default(), 42)
    }

    #[test]
    fn population_reaches_target_and_stays() {
        let game = game();
        let mut sim = sim(Arc::clone(&game), Arc::new(SessionRegistry::new()));

        assert_eq!(sim.maintain_population(), (5, 0));
        assert_eq!(sim.maintain_population(), (0, 0));
        assert_eq!(game.mobs().count_mobs_in_world("world1").unwrap(), 5);

        let first = game.mobs_in_world("world1").unwrap()[0].id.clone();
        game.despawn_mob(&first).unwrap();
        assert_eq!(sim.maintain_population(), (1, 0));
    }

    #[test]
    fn spawned_mobs_sit_on_distinct_passable_cells() {
        let game = game();
        game.players()
            .save_player(&Player::new("1", "world1", 1, 1))
            .unwrap();
        let mut sim = sim(Arc::clone(&game), Arc::new(SessionRegistry::new()));
        sim.maintain_population();

        let world = game.get_world("world1").unwrap().unwrap();
        let mobs = game.mobs_in_world("world1").unwrap();
        let cells: BTreeSet<GridPos> = mobs.iter().map(|m| m.position()).collect();
        assert_eq!(cells.len(), mobs.len());
        for cell in cells {
            assert!(world.is_passable(cell.x, cell.y, Mover::Mob));
            assert_ne!(cell, GridPos::new(1, 1));
        }
    }

    #[test]
    fn spawn_failures_are_counted_not_fatal() {
        let worlds = MemoryWorldStore::new();
        worlds.save_world(World::new("world1", ["###", "# #", "###"]).unwrap()).unwrap();
        let game = Arc::new(
            Game::new(
                Arc::new(worlds),
                Arc::new(MemoryPlayerStore::new()),
                Arc::new(MemoryMobStore::new()),
            )
            .with_spawn_attempts(200),
        );
        let mut sim = sim(game, Arc::new(SessionRegistry::new()));

        // One free cell: the first spawn takes it, the rest fail.
        let metrics = sim.step();
        assert_eq!(metrics.spawned, 1);
        assert_eq!(metrics.spawn_failures, 4);
        assert_eq!(metrics.mob_count, 1);
    }

    #[test]
    fn wander_keeps_mobs_on_passable_cells() {
        let game = game();
        let mut sim = SimulationLoop::with_seed(
            Arc::clone(&game),
            Arc::new(SessionRegistry::new()),
            SimulationConfig {
                wander_probability: 1.0,
                ..SimulationConfig::default()
            },
            9,
        );
        sim.maintain_population();

        let world = game.get_world("world1").unwrap().unwrap();
        let mut total_moved = 0;
        for _ in 0..50 {
            total_moved += sim.wander();
            for mob in game.mobs_in_world("world1").unwrap() {
                assert!(world.is_passable(mob.x, mob.y, Mover::Mob));
            }
        }
        assert!(total_moved > 0);
    }

    #[test]
    fn zero_probability_means_no_movement() {
        let game = game();
        let mut sim = SimulationLoop::with_seed(
            Arc::clone(&game),
            Arc::new(SessionRegistry::new()),
            SimulationConfig {
                wander_probability: 0.0,
                ..SimulationConfig::default()
            },
            1,
        );
        sim.maintain_population();
        let before = game.mobs_in_world("world1").unwrap();
        for _ in 0..10 {
            assert_eq!(sim.wander(), 0);
        }
        assert_eq!(game.mobs_in_world("world1").unwrap(), before);
    }

    #[test]
    fn out_of_range_probability_is_clamped() {
        let sim = SimulationLoop::with_seed(
            game(),
            Arc::new(SessionRegistry::new()),
            SimulationConfig {
                wander_probability: 3.0,
                ..SimulationConfig::default()
            },
            1,
        );
        assert_eq!(sim.config().wander_probability, 1.0);
    }

    #[test]
    fn step_broadcasts_full_mob_list() {
        let game = game();
        let registry = Arc::new(SessionRegistry::new());
        let (alive, mut alive_rx) = SessionHandle::channel(SessionId(1));
        let (dead, dead_rx) = SessionHandle::channel(SessionId(2));
        drop(dead_rx);
        registry.register(alive);
        registry.register(dead);

        let mut sim = sim(Arc::clone(&game), Arc::clone(&registry));
        let metrics = sim.step();
        assert_eq!(metrics.tick_number, 1);
        assert_eq!(metrics.mob_count, 5);
        assert_eq!(metrics.sessions_reached, 1);
        assert_eq!(metrics.sessions_dropped, 1);
        assert!(!registry.contains(SessionId(2)));

        let line = alive_rx.try_recv().unwrap();
        let message: ServerMessage = serde_json::from_str(&line).unwrap();
        match message {
            ServerMessage::MobsUpdate { mobs } => {
                assert_eq!(mobs, game.mobs_update("world1").unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
        // One tick, one broadcast.
        assert!(alive_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_at_configured_interval_until_shutdown() {
        let (tx, rx) = shutdown_channel();
        let registry = Arc::new(SessionRegistry::new());
        let (client, mut client_rx) = SessionHandle::channel(SessionId(1));
        registry.register(client);
        let sim = SimulationLoop::with_seed(game(), registry, SimulationConfig::default(), 3);
        let handle = tokio::spawn(sim.run(rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.trigger();
        let ticks = handle.await.unwrap();
        assert!((9..=11).contains(&ticks), "ran {ticks} ticks");

        let mut broadcasts = 0;
        while let Ok(line) = client_rx.try_recv() {
            let message: ServerMessage = serde_json::from_str(&line).unwrap();
            assert!(matches!(message, ServerMessage::MobsUpdate { .. }));
            broadcasts += 1;
        }
        assert_eq!(broadcasts, ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_immediately_when_already_shut_down() {
        let (tx, rx) = shutdown_channel();
        tx.trigger();
        let sim = SimulationLoop::with_seed(
            game(),
            Arc::new(SessionRegistry::new()),
            SimulationConfig::default(),
            3,
        );
        assert_eq!(sim.run(rx).await, 0);
    }
}
