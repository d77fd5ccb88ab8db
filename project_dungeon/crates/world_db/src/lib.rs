//! SQLite-backed implementations of the dungeon store contracts.

pub mod db;
pub mod error;
mod mobs;
mod players;
mod schema;
mod worlds;

pub use db::WorldDb;
pub use error::WorldDbError;
