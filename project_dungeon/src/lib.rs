pub mod config;
pub mod server;

pub use config::ServerConfig;
pub use server::{Server, DEFAULT_LAYOUT};
