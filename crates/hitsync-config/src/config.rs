//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Directory name used under the OS configuration directory.
pub const APP_NAME: &str = "hitsync";

/// Longest accepted `world.reach_distance`, in blocks. The fallback trace
/// walks at most this far on the world thread.
pub const MAX_REACH_DISTANCE: f64 = 64.0;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Listener and transport settings.
    pub network: NetworkConfig,
    /// Client targeting-hint settings.
    pub enrichment: EnrichmentConfig,
    /// World-mutation loop settings.
    pub world: WorldConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the listener to.
    pub bind_address: String,
    /// Listener port.
    pub port: u16,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest accepted frame payload in bytes.
    pub max_payload_size: u32,
}

/// Settings for the side channel carrying client ray traces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Plugin-message channel the targeting hints arrive on.
    pub hint_channel: String,
    /// Only accept hints from connections that registered the hint channel.
    pub require_registration: bool,
}

/// World-mutation loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World ticks per second.
    pub tick_rate: u32,
    /// Capacity of the queue feeding the world thread.
    pub task_queue_capacity: usize,
    /// Reach used by the server-side fallback ray trace, in blocks.
    pub reach_distance: f64,
    /// Radius around the spawn point where only exempt actors may build.
    pub spawn_protection_radius: i32,
    /// Whether placed water evaporates (nether-like worlds).
    pub vaporizes_water: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON log file next to the config in debug builds.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 25565,
            max_connections: 256,
            max_payload_size: 1_048_576,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            hint_channel: "hitsync:enrichment".to_string(),
            require_registration: true,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            task_queue_capacity: 4096,
            reach_distance: 5.0,
            spawn_protection_radius: 0,
            vaporizes_water: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: true,
        }
    }
}

/// Resolve `<os config dir>/hitsync`.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.enrichment.hint_channel.is_empty() {
            return invalid("enrichment.hint_channel", "must not be empty");
        }
        if self.world.tick_rate == 0 {
            return invalid("world.tick_rate", "must be at least 1");
        }
        if self.world.task_queue_capacity == 0 {
            return invalid("world.task_queue_capacity", "must be at least 1");
        }
        let reach = self.world.reach_distance;
        if !(reach.is_finite() && reach > 0.0) {
            return invalid("world.reach_distance", "must be a positive number of blocks");
        }
        if reach > MAX_REACH_DISTANCE {
            return invalid("world.reach_distance", "must not exceed 64 blocks");
        }
        if self.world.spawn_protection_radius < 0 {
            return invalid("world.spawn_protection_radius", "must not be negative");
        }
        if self.network.max_connections == 0 {
            return invalid("network.max_connections", "must be at least 1");
        }
        Ok(())
    }

    /// `bind_address:port` as a single string.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind_address, self.network.port)
    }
}
