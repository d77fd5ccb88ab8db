use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use net::{ClientRequest, Dispatcher, MobWire, ServerMessage, WorldWire};
use rand::Rng;
use session::SessionId;
use space::{Direction, GridPos, Mover, World};

use crate::error::GameError;
use crate::mob::Mob;
use crate::player::Player;
use crate::store::{MobStore, PlayerStore, WorldStore};

/// Rejection-sampling budget for finding a free spawn cell.
pub const DEFAULT_SPAWN_ATTEMPTS: usize = 100;

/// Game operations over the shared stores.
///
/// Each operation is a read-modify-write against the stores; concurrent
/// updates to one entity resolve last-writer-wins.
pub struct Game {
    worlds: Arc<dyn WorldStore>,
    players: Arc<dyn PlayerStore>,
    mobs: Arc<dyn MobStore>,
    spawn_attempts: usize,
    next_mob_id: AtomicU64,
}

impl Game {
    pub fn new(
        worlds: Arc<dyn WorldStore>,
        players: Arc<dyn PlayerStore>,
        mobs: Arc<dyn MobStore>,
    ) -> Self {
        Self {
            worlds,
            players,
            mobs,
            spawn_attempts: DEFAULT_SPAWN_ATTEMPTS,
            next_mob_id: AtomicU64::new(1),
        }
    }

    pub fn with_spawn_attempts(mut self, attempts: usize) -> Self {
        self.spawn_attempts = attempts;
        self
    }

    pub fn worlds(&self) -> &dyn WorldStore {
        self.worlds.as_ref()
    }

    pub fn players(&self) -> &dyn PlayerStore {
        self.players.as_ref()
    }

    pub fn mobs(&self) -> &dyn MobStore {
        self.mobs.as_ref()
    }

    /// `Ok(None)` for an unknown id.
    pub fn get_world(&self, world_id: &str) -> Result<Option<Arc<World>>, GameError> {
        Ok(self.worlds.get_world(world_id)?)
    }

    pub fn get_player(&self, player_id: &str) -> Result<Player, GameError> {
        self.players
            .get_player(player_id)?
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))
    }

    /// Move a player one cell and persist the new position.
    pub fn move_player(&self, player_id: &str, direction: &str) -> Result<Player, GameError> {
        let mut player = self.get_player(player_id)?;
        let world = self.require_world(&player.world_id)?;
        player.move_in(direction, &world)?;
        self.players.save_player(&player)?;
        Ok(player)
    }

    /// Create a player on a random free cell of `world_id`.
    pub fn spawn_player<R: Rng + ?Sized>(
        &self,
        player_id: &str,
        world_id: &str,
        rng: &mut R,
    ) -> Result<Player, GameError> {
        let world = self.require_world(world_id)?;
        let occupied = self.occupied_cells(world_id)?;
        let pos = self.random_free_cell(&world, Mover::Player, &occupied, rng)?;
        let player = Player::new(player_id, world_id, pos.x, pos.y);
        self.players.save_player(&player)?;
        tracing::info!(player_id, world_id, %pos, "player spawned");
        Ok(player)
    }

    /// Create a mob on a random free cell of `world_id`.
    pub fn spawn_mob<R: Rng + ?Sized>(
        &self,
        world_id: &str,
        kind: &str,
        name: &str,
        rng: &mut R,
    ) -> Result<Mob, GameError> {
        let world = self.require_world(world_id)?;
        let occupied = self.occupied_cells(world_id)?;
        let pos = self.random_free_cell(&world, Mover::Mob, &occupied, rng)?;
        let id = format!("mob-{}", self.next_mob_id.fetch_add(1, Ordering::Relaxed));
        let mob = Mob::spawn(id, name, kind, world_id, pos);
        self.mobs.create_mob(&mob)?;
        tracing::debug!(mob_id = %mob.id, world_id, %pos, "mob spawned");
        Ok(mob)
    }

    /// Try one step in a random direction. Blocked steps leave the mob in
    /// place; returns whether it moved.
    pub fn wander_mob<R: Rng + ?Sized>(&self, mob_id: &str, rng: &mut R) -> Result<bool, GameError> {
        let mut mob = self
            .mobs
            .get_mob(mob_id)?
            .ok_or_else(|| GameError::MobNotFound(mob_id.to_string()))?;
        let world = self.require_world(&mob.world_id)?;
        let players = self.player_cells(&mob.world_id)?;

        let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
        if !mob.wander(direction, &world, &players) {
            return Ok(false);
        }
        self.mobs.save_mob(&mob)?;
        Ok(true)
    }

    pub fn despawn_mob(&self, mob_id: &str) -> Result<Mob, GameError> {
        let mob = self
            .mobs
            .delete_mob(mob_id)?
            .ok_or_else(|| GameError::MobNotFound(mob_id.to_string()))?;
        tracing::debug!(mob_id, world_id = %mob.world_id, "mob despawned");
        Ok(mob)
    }

    pub fn mobs_in_world(&self, world_id: &str) -> Result<Vec<Mob>, GameError> {
        Ok(self.mobs.list_mobs_by_world(world_id)?)
    }

    /// Wire snapshot of every mob in `world_id`, ready to broadcast.
    pub fn mobs_update(&self, world_id: &str) -> Result<Vec<MobWire>, GameError> {
        let mobs = self.mobs_in_world(world_id)?;
        Ok(mobs.iter().map(Mob::to_wire).collect())
    }

    fn require_world(&self, world_id: &str) -> Result<Arc<World>, GameError> {
        self.get_world(world_id)?
            .ok_or_else(|| GameError::WorldNotFound(world_id.to_string()))
    }

    fn player_cells(&self, world_id: &str) -> Result<BTreeSet<GridPos>, GameError> {
        Ok(self
            .players
            .list_players_by_world(world_id)?
            .iter()
            .map(Player::position)
            .collect())
    }

    fn occupied_cells(&self, world_id: &str) -> Result<BTreeSet<GridPos>, GameError> {
        let mut cells = self.player_cells(world_id)?;
        cells.extend(self.mobs.list_mobs_by_world(world_id)?.iter().map(Mob::position));
        Ok(cells)
    }

    fn random_free_cell<R: Rng + ?Sized>(
        &self,
        world: &World,
        mover: Mover,
        occupied: &BTreeSet<GridPos>,
        rng: &mut R,
    ) -> Result<GridPos, GameError> {
        let (width, height) = (world.width() as i32, world.height() as i32);
        for _ in 0..self.spawn_attempts {
            let pos = GridPos::new(rng.random_range(0..width), rng.random_range(0..height));
            if world.is_passable(pos.x, pos.y, mover) && !occupied.contains(&pos) {
                return Ok(pos);
            }
        }
        Err(GameError::SpawnExhausted {
            world_id: world.id().to_string(),
            attempts: self.spawn_attempts,
        })
    }
}

pub fn world_wire(world: &World) -> WorldWire {
    WorldWire {
        id: world.id().to_string(),
        width: world.width(),
        height: world.height(),
        layout: world.rows(),
    }
}

impl Dispatcher for Game {
    fn dispatch(&self, session_id: SessionId, request: ClientRequest) -> ServerMessage {
        let result = match request {
            ClientRequest::GetPlayer { player_id } => self
                .get_player(&player_id)
                .map(|player| ServerMessage::Player {
                    player: player.to_wire(),
                }),
            ClientRequest::Move {
                player_id,
                direction,
            } => self
                .move_player(&player_id, &direction)
                .map(|player| ServerMessage::PlayerUpdate {
                    msg: format!("Player moved to {}", player.position()),
                    player: player.to_wire(),
                }),
            ClientRequest::GetWorld { world_id } => self
                .get_world(&world_id)
                .map(|world| ServerMessage::World {
                    world: world.as_deref().map(world_wire),
                }),
            ClientRequest::Unknown { kind } => {
                tracing::debug!(%session_id, kind = %kind, "unknown message type");
                return ServerMessage::error(format!("unknown message type {kind:?}"));
            }
        };

        result.unwrap_or_else(|e| {
            match &e {
                GameError::Store(_) => tracing::warn!(%session_id, error = %e, "request failed"),
                _ => tracing::debug!(%session_id, error = %e, "request rejected"),
            }
            ServerMessage::error(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::error::StoreError;
    use crate::store::memory::{MemoryMobStore, MemoryPlayerStore, MemoryWorldStore};

    const SESSION: SessionId = SessionId(1);

    fn game_with(rows: &[&str]) -> Game {
        let worlds = MemoryWorldStore::new();
        worlds.save_world(World::new("w", rows).unwrap()).unwrap();
        Game::new(
            Arc::new(worlds),
            Arc::new(MemoryPlayerStore::new()),
            Arc::new(MemoryMobStore::new()),
        )
    }

    fn game() -> Game {
        game_with(&["######", "#   ##", "# #  #", "######"])
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn move_persists_new_position() {
        let game = game();
        game.players().save_player(&Player::new("1", "w", 1, 1)).unwrap();

        let moved = game.move_player("1", "E").unwrap();
        assert_eq!(moved.position(), GridPos::new(2, 1));
        assert_eq!(game.get_player("1").unwrap().position(), GridPos::new(2, 1));
    }

    #[test]
    fn failed_moves_leave_store_untouched() {
        let game = game();
        game.players().save_player(&Player::new("1", "w", 3, 1)).unwrap();

        assert!(matches!(game.move_player("1", "E"), Err(GameError::Move(_))));
        assert!(matches!(game.move_player("1", "north"), Err(GameError::Move(_))));
        assert_eq!(
            game.move_player("ghost", "E"),
            Err(GameError::PlayerNotFound("ghost".to_string()))
        );
        assert_eq!(game.get_player("1").unwrap().position(), GridPos::new(3, 1));
    }

    #[test]
    fn player_in_missing_world_cannot_move() {
        let game = game();
        game.players().save_player(&Player::new("1", "nowhere", 1, 1)).unwrap();
        assert_eq!(
            game.move_player("1", "E"),
            Err(GameError::WorldNotFound("nowhere".to_string()))
        );
    }

    #[test]
    fn spawn_mob_assigns_unique_ids_on_free_cells() {
        let game = game();
        let mut rng = rng();
        game.players().save_player(&Player::new("1", "w", 1, 1)).unwrap();

        let a = game.spawn_mob("w", "Goblin", "Goblin", &mut rng).unwrap();
        let b = game.spawn_mob("w", "Goblin", "Goblin", &mut rng).unwrap();
        assert_eq!(a.id, "mob-1");
        assert_eq!(b.id, "mob-2");
        assert_ne!(a.position(), b.position());
        for mob in [&a, &b] {
            let world = game.get_world("w").unwrap().unwrap();
            assert!(world.is_passable(mob.x, mob.y, Mover::Mob));
            assert_ne!(mob.position(), GridPos::new(1, 1));
        }
        assert_eq!(game.mobs().count_mobs_in_world("w").unwrap(), 2);
    }

    #[test]
    fn spawn_gives_up_when_no_cell_is_free() {
        let game = game_with(&["###", "# #", "###"]).with_spawn_attempts(20);
        let mut rng = rng();
        game.players().save_player(&Player::new("1", "w", 1, 1)).unwrap();

        assert_eq!(
            game.spawn_mob("w", "Goblin", "Goblin", &mut rng),
            Err(GameError::SpawnExhausted {
                world_id: "w".to_string(),
                attempts: 20,
            })
        );
        assert_eq!(game.mobs().count_mobs_in_world("w").unwrap(), 0);
    }

    #[test]
    fn spawn_player_avoids_occupied_cells() {
        let game = game_with(&["####", "#  #", "####"]).with_spawn_attempts(1000);
        let mut rng = rng();
        game.players().save_player(&Player::new("1", "w", 1, 1)).unwrap();

        let spawned = game.spawn_player("2", "w", &mut rng).unwrap();
        assert_eq!(spawned.position(), GridPos::new(2, 1));
        assert_eq!(game.get_player("2").unwrap(), spawned);
    }

    #[test]
    fn wandering_mob_never_enters_player_cell() {
        // Single corridor cell next to the mob holds a player.
        let game = game_with(&["####", "#  #", "####"]);
        let mut rng = rng();
        game.players().save_player(&Player::new("1", "w", 2, 1)).unwrap();
        let mob = Mob::spawn("mob-x", "Goblin", "Goblin", "w", GridPos::new(1, 1));
        game.mobs().create_mob(&mob).unwrap();

        for _ in 0..50 {
            assert!(!game.wander_mob("mob-x", &mut rng).unwrap());
        }
        let stored = game.mobs().get_mob("mob-x").unwrap().unwrap();
        assert_eq!(stored.position(), GridPos::new(1, 1));
    }

    #[test]
    fn wandering_mob_moves_when_free() {
        let game = game_with(&["####", "#  #", "####"]);
        let mut rng = rng();
        let mob = Mob::spawn("mob-x", "Goblin", "Goblin", "w", GridPos::new(1, 1));
        game.mobs().create_mob(&mob).unwrap();

        let moved = (0..200).any(|_| game.wander_mob("mob-x", &mut rng).unwrap());
        assert!(moved);
        let stored = game.mobs().get_mob("mob-x").unwrap().unwrap();
        assert_eq!(stored.position(), GridPos::new(2, 1));
    }

    #[test]
    fn despawn_removes_and_ids_are_not_reused() {
        let game = game();
        let mut rng = rng();
        let mob = game.spawn_mob("w", "Goblin", "Goblin", &mut rng).unwrap();

        assert_eq!(game.despawn_mob(&mob.id).unwrap().id, mob.id);
        assert_eq!(
            game.despawn_mob(&mob.id),
            Err(GameError::MobNotFound(mob.id.clone()))
        );
        let next = game.spawn_mob("w", "Goblin", "Goblin", &mut rng).unwrap();
        assert_eq!(next.id, "mob-2");
    }

    #[test]
    fn dispatch_get_world() {
        let game = game();
        match game.dispatch(SESSION, ClientRequest::GetWorld { world_id: "w".into() }) {
            ServerMessage::World { world: Some(world) } => {
                assert_eq!((world.width, world.height), (6, 4));
                assert_eq!(world.layout[1], "#   ##");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            game.dispatch(SESSION, ClientRequest::GetWorld { world_id: "nope".into() }),
            ServerMessage::World { world: None }
        );
    }

    #[test]
    fn dispatch_move_and_errors() {
        let game = game();
        game.players().save_player(&Player::new("1", "w", 1, 1)).unwrap();

        let reply = game.dispatch(
            SESSION,
            ClientRequest::Move {
                player_id: "1".into(),
                direction: "E".into(),
            },
        );
        let expected = Player::new("1", "w", 2, 1);
        assert_eq!(
            reply,
            ServerMessage::PlayerUpdate {
                msg: "Player moved to (2, 1)".to_string(),
                player: expected.to_wire(),
            }
        );

        assert_eq!(
            game.dispatch(
                SESSION,
                ClientRequest::Move {
                    player_id: "1".into(),
                    direction: "X".into(),
                },
            ),
            ServerMessage::error("invalid direction \"X\"")
        );
        assert_eq!(
            game.dispatch(SESSION, ClientRequest::GetPlayer { player_id: "2".into() }),
            ServerMessage::error("player not found")
        );
        assert_eq!(
            game.dispatch(SESSION, ClientRequest::Unknown { kind: "attack".into() }),
            ServerMessage::error("unknown message type \"attack\"")
        );
    }

    #[test]
    fn dispatch_get_player() {
        let game = game();
        let player = Player::new("1", "w", 1, 1);
        game.players().save_player(&player).unwrap();
        assert_eq!(
            game.dispatch(SESSION, ClientRequest::GetPlayer { player_id: "1".into() }),
            ServerMessage::Player {
                player: player.to_wire()
            }
        );
    }

    struct FailingPlayers;

    impl PlayerStore for FailingPlayers {
        fn get_player(&self, _id: &str) -> Result<Option<Player>, StoreError> {
            Err(StoreError::Backend("disk on fire".to_string()))
        }
        fn save_player(&self, _player: &Player) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk on fire".to_string()))
        }
        fn list_players_by_world(&self, _world_id: &str) -> Result<Vec<Player>, StoreError> {
            Err(StoreError::Backend("disk on fire".to_string()))
        }
    }

    #[test]
    fn store_failures_become_error_replies() {
        let game = Game::new(
            Arc::new(MemoryWorldStore::new()),
            Arc::new(FailingPlayers),
            Arc::new(MemoryMobStore::new()),
        );
        assert_eq!(
            game.dispatch(SESSION, ClientRequest::GetPlayer { player_id: "1".into() }),
            ServerMessage::error("storage backend error: disk on fire")
        );
    }
}
