use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use space::World;

use super::{MobStore, PlayerStore, WorldStore};
use crate::error::StoreError;
use crate::mob::Mob;
use crate::player::Player;

#[derive(Debug, Default)]
pub struct MemoryWorldStore {
    worlds: RwLock<BTreeMap<String, Arc<World>>>,
}

impl MemoryWorldStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorldStore for MemoryWorldStore {
    fn get_world(&self, id: &str) -> Result<Option<Arc<World>>, StoreError> {
        Ok(self.worlds.read().get(id).cloned())
    }

    fn save_world(&self, world: World) -> Result<(), StoreError> {
        self.worlds
            .write()
            .insert(world.id().to_string(), Arc::new(world));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPlayerStore {
    players: RwLock<BTreeMap<String, Player>>,
}

impl MemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerStore for MemoryPlayerStore {
    fn get_player(&self, id: &str) -> Result<Option<Player>, StoreError> {
        Ok(self.players.read().get(id).cloned())
    }

    fn save_player(&self, player: &Player) -> Result<(), StoreError> {
        self.players
            .write()
            .insert(player.id.clone(), player.clone());
        Ok(())
    }

    fn list_players_by_world(&self, world_id: &str) -> Result<Vec<Player>, StoreError> {
        Ok(self
            .players
            .read()
            .values()
            .filter(|p| p.world_id == world_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryMobStore {
    mobs: RwLock<BTreeMap<String, Mob>>,
}

impl MemoryMobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MobStore for MemoryMobStore {
    fn get_mob(&self, id: &str) -> Result<Option<Mob>, StoreError> {
        Ok(self.mobs.read().get(id).cloned())
    }

    fn save_mob(&self, mob: &Mob) -> Result<(), StoreError> {
        self.mobs.write().insert(mob.id.clone(), mob.clone());
        Ok(())
    }

    fn create_mob(&self, mob: &Mob) -> Result<(), StoreError> {
        match self.mobs.write().entry(mob.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(mob.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(mob.clone());
                Ok(())
            }
        }
    }

    fn delete_mob(&self, id: &str) -> Result<Option<Mob>, StoreError> {
        Ok(self.mobs.write().remove(id))
    }

    fn count_mobs_in_world(&self, world_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .mobs
            .read()
            .values()
            .filter(|m| m.world_id == world_id)
            .count())
    }

    fn list_mobs_by_world(&self, world_id: &str) -> Result<Vec<Mob>, StoreError> {
        Ok(self
            .mobs
            .read()
            .values()
            .filter(|m| m.world_id == world_id)
            .cloned()
            .collect())
    }
}
