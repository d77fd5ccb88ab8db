pub mod error;
pub mod game;
pub mod mob;
pub mod player;
pub mod simulation;
pub mod store;

pub use error::{GameError, StoreError};
pub use game::Game;
pub use mob::Mob;
pub use player::Player;
pub use simulation::{SimulationConfig, SimulationLoop};
pub use store::memory::{MemoryMobStore, MemoryPlayerStore, MemoryWorldStore};
pub use store::{MobStore, PlayerStore, WorldStore};
