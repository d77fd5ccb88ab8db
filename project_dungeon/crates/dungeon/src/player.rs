use net::PlayerWire;
use space::{step, GridPos, MoveError, Mover, World};

use crate::mob::Mob;

pub const PLAYER_MAX_HEALTH: i32 = 100;
pub const PLAYER_ATTACK: i32 = 50;
pub const PLAYER_DEFENSE: i32 = 5;
pub const PLAYER_RANGE: i32 = 10;

/// A connected adventurer. Identity is the client-supplied string id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub world_id: String,
    pub x: i32,
    pub y: i32,
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
    pub range: i32,
}

impl Player {
    pub fn new(id: impl Into<String>, world_id: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            id: id.into(),
            world_id: world_id.into(),
            x,
            y,
            health: PLAYER_MAX_HEALTH,
            attack: PLAYER_ATTACK,
            defense: PLAYER_DEFENSE,
            range: PLAYER_RANGE,
        }
    }

    pub fn position(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }

    /// Move one cell. On error the position is untouched.
    pub fn move_in(&mut self, direction: &str, world: &World) -> Result<GridPos, MoveError> {
        let to = step(self.position(), direction, world, Mover::Player)?;
        self.x = to.x;
        self.y = to.y;
        Ok(to)
    }

    /// Apply a hit reduced by defense. Returns the damage actually taken.
    pub fn take_damage(&mut self, damage: i32) -> i32 {
        let taken = (damage - self.defense).max(0).min(self.health);
        self.health -= taken;
        taken
    }

    pub fn attack_mob(&self, mob: &mut Mob) -> i32 {
        mob.take_damage(self.attack)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn to_wire(&self) -> PlayerWire {
        PlayerWire {
            id: self.id.clone(),
            world_id: self.world_id.clone(),
            x: self.x,
            y: self.y,
            health: self.health,
            attack: self.attack,
            defense: self.defense,
            range: self.range,
        }
    }
}
