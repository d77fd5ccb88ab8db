//! Storage contracts for worlds, players and mobs.
//!
//! Every method is a short synchronous critical section, so callers on the
//! async runtime may use them directly. Returned values are copies; mutating
//! them has no effect until they are saved back.

pub mod memory;

use std::sync::Arc;

use space::World;

use crate::error::StoreError;
use crate::mob::Mob;
use crate::player::Player;

pub trait WorldStore: Send + Sync {
    fn get_world(&self, id: &str) -> Result<Option<Arc<World>>, StoreError>;

    /// Insert or replace by id.
    fn save_world(&self, world: World) -> Result<(), StoreError>;
}

pub trait PlayerStore: Send + Sync {
    fn get_player(&self, id: &str) -> Result<Option<Player>, StoreError>;

    /// Insert or replace by id. Concurrent saves of one id: last writer wins.
    fn save_player(&self, player: &Player) -> Result<(), StoreError>;

    /// Players whose `world_id` matches, ordered by id.
    fn list_players_by_world(&self, world_id: &str) -> Result<Vec<Player>, StoreError>;
}

pub trait MobStore: Send + Sync {
    fn get_mob(&self, id: &str) -> Result<Option<Mob>, StoreError>;

    /// Insert or replace by id.
    fn save_mob(&self, mob: &Mob) -> Result<(), StoreError>;

    /// Insert a new mob; fails with `AlreadyExists` if the id is taken.
    fn create_mob(&self, mob: &Mob) -> Result<(), StoreError>;

    /// Remove by id, returning the removed mob.
    fn delete_mob(&self, id: &str) -> Result<Option<Mob>, StoreError>;

    fn count_mobs_in_world(&self, world_id: &str) -> Result<usize, StoreError>;

    /// Mobs whose `world_id` matches, ordered by id.
    fn list_mobs_by_world(&self, world_id: &str) -> Result<Vec<Mob>, StoreError>;
}
