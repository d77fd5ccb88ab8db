use std::collections::BTreeSet;

use net::MobWire;
use space::{step_in, Direction, GridPos, Mover, World};

use crate::player::Player;

pub const MOB_GLYPH: char = 'M';
pub const MOB_MAX_HEALTH: i32 = 100;
pub const MOB_ATTACK: i32 = 10;
pub const MOB_DEFENSE: i32 = 5;
pub const MOB_ATTACK_SPEED: i32 = 1;

/// A server-controlled creature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mob {
    pub id: String,
    pub name: String,
    pub world_id: String,
    pub kind: String,
    pub x: i32,
    pub y: i32,
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
    pub attack_speed: i32,
    pub glyph: char,
}

impl Mob {
    /// A fresh mob with default stats at `pos`.
    pub fn spawn(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        world_id: impl Into<String>,
        pos: GridPos,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            world_id: world_id.into(),
            kind: kind.into(),
            x: pos.x,
            y: pos.y,
            health: MOB_MAX_HEALTH,
            attack: MOB_ATTACK,
            defense: MOB_DEFENSE,
            attack_speed: MOB_ATTACK_SPEED,
            glyph: MOB_GLYPH,
        }
    }

    pub fn position(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }

    /// Step one cell unless the target is impassable for mobs or in
    /// `occupied`. Returns whether the mob moved.
    pub fn wander(
        &mut self,
        direction: Direction,
        world: &World,
        occupied: &BTreeSet<GridPos>,
    ) -> bool {
        match step_in(self.position(), direction, world, Mover::Mob) {
            Ok(to) if !occupied.contains(&to) => {
                self.x = to.x;
                self.y = to.y;
                true
            }
            _ => false,
        }
    }

    /// Apply a hit reduced by defense. Returns the damage actually taken.
    pub fn take_damage(&mut self, damage: i32) -> i32 {
        let taken = (damage - self.defense).max(0).min(self.health);
        self.health -= taken;
        taken
    }

    pub fn attack_player(&self, player: &mut Player) -> i32 {
        player.take_damage(self.attack)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn to_wire(&self) -> MobWire {
        MobWire {
            id: self.id.clone(),
            name: self.name.clone(),
            world_id: self.world_id.clone(),
            x: self.x,
            y: self.y,
            kind: self.kind.clone(),
            health: self.health,
            attack: self.attack,
            defense: self.defense,
            attack_speed: self.attack_speed,
            glyph: self.glyph,
        }
    }
}
