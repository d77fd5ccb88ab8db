use std::path::Path;
use std::time::Duration;

use dungeon::SimulationConfig;
use net::LimiterConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetSection {
    pub addr: String,
    pub max_connections: usize,
    pub max_connections_per_ip: usize,
    pub max_input_length: usize,
}

impl Default for NetSection {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:4200".to_string(),
            max_connections: 1000,
            max_connections_per_ip: 16,
            max_input_length: net::line::DEFAULT_MAX_LINE_LEN,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickSection {
    pub interval_ms: u64,
}

impl Default for TickSection {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub world_id: String,
    pub target_mobs: usize,
    pub spawn_attempts: usize,
    pub wander_probability: f64,
    pub mob_name: String,
    pub mob_kind: String,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            world_id: "world1".to_string(),
            target_mobs: 5,
            spawn_attempts: 100,
            wander_probability: 0.5,
            mob_name: "Goblin".to_string(),
            mob_kind: "Goblin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub id: String,
    /// Empty means the built-in layout.
    pub layout_path: String,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            id: "world1".to_string(),
            layout_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerSection {
    pub seed_ids: Vec<String>,
    pub start_x: i32,
    pub start_y: i32,
}

impl Default for PlayerSection {
    fn default() -> Self {
        Self {
            seed_ids: vec!["1".to_string()],
            start_x: 2,
            start_y: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub sqlite_path: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_path: "data/dungeon.db".to_string(),
        }
    }
}

/// Top-level dungeon server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub net: NetSection,
    pub tick: TickSection,
    pub simulation: SimulationSection,
    pub world: WorldSection,
    pub player: PlayerSection,
    pub store: StoreSection,
}

impl ServerConfig {
    /// Load configuration from an optional TOML file path.
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match config_path {
            Some(path) if Path::new(path).exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        Ok(config)
    }

    /// Convert tick and simulation sections to the simulation loop's config.
    pub fn to_simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            world_id: self.simulation.world_id.clone(),
            interval: Duration::from_millis(self.tick.interval_ms.max(1)),
            target_mobs: self.simulation.target_mobs,
            wander_probability: self.simulation.wander_probability,
            mob_name: self.simulation.mob_name.clone(),
            mob_kind: self.simulation.mob_kind.clone(),
        }
    }

    /// Convert net section to the connection limiter's config.
    pub fn to_limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            max_connections_total: self.net.max_connections,
            max_connections_per_ip: self.net.max_connections_per_ip,
        }
    }
}

/// Parse CLI arguments and load config.
/// Supports: --config <path>
pub fn parse_cli_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if let Some(val) = args.get(i + 1) {
                    config_path = Some(val.as_str());
                    i += 2;
                } else {
                    eprintln!("--config requires a path argument");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    match ServerConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}
