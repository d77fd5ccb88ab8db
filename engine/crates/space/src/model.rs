use crate::direction::Direction;
use crate::world::{GridPos, World};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("invalid direction {0:?}")]
    InvalidDirection(String),

    #[error("cannot move to ({x}, {y}): blocked")]
    Blocked { x: i32, y: i32 },
}

/// Which kind of entity is asking to move; selects the passability rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mover {
    Player,
    Mob,
}

/// Movement law shared by players and mobs.
///
/// Parses the direction token and delegates to [`step_in`]. Pure: the
/// result depends only on the arguments.
pub fn step(from: GridPos, token: &str, world: &World, mover: Mover) -> Result<GridPos, MoveError> {
    let direction: Direction = token.parse()?;
    step_in(from, direction, world, mover)
}

/// One cell in `direction`, or `Blocked` if the target is not passable.
/// No sliding: a blocked move never yields a partial position.
pub fn step_in(
    from: GridPos,
    direction: Direction,
    world: &World,
    mover: Mover,
) -> Result<GridPos, MoveError> {
    let (dx, dy) = direction.delta();
    let to = GridPos::new(from.x + dx, from.y + dy);
    if !world.is_passable(to.x, to.y, mover) {
        return Err(MoveError::Blocked { x: to.x, y: to.y });
    }
    Ok(to)
}
