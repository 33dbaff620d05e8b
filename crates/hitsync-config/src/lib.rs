//! Configuration system for the hitsync server.
//!
//! Settings persist to disk as RON files. Supports CLI overrides via clap,
//! hot-reload detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    APP_NAME, Config, DebugConfig, EnrichmentConfig, MAX_REACH_DISTANCE, NetworkConfig,
    WorldConfig, default_config_dir,
};
pub use error::ConfigError;
