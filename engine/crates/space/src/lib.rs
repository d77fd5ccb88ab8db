pub mod direction;
pub mod model;
pub mod world;

pub use direction::Direction;
pub use model::{step, step_in, MoveError, Mover};
pub use world::{GridPos, LayoutError, World, FLOOR_GLYPH, PLAYER_GLYPH, WALL_GLYPH};
