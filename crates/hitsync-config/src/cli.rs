//! Command-line argument parsing for the hitsync server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// hitsync server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "hitsync-server", about = "Targeting-hint reconciliation server")]
pub struct CliArgs {
    /// Address to bind to.
    #[arg(long)]
    pub bind: Option<String>,

    /// Listener port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum concurrent connections.
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Plugin-message channel carrying targeting hints.
    #[arg(long)]
    pub hint_channel: Option<String>,

    /// Accept hints from clients that never registered the hint channel.
    #[arg(long)]
    pub accept_unregistered: bool,

    /// World ticks per second.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.bind {
            self.network.bind_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.port = port;
        }
        if let Some(max) = args.max_connections {
            self.network.max_connections = max;
        }
        if let Some(ref channel) = args.hint_channel {
            self.enrichment.hint_channel = channel.clone();
        }
        if args.accept_unregistered {
            self.enrichment.require_registration = false;
        }
        if let Some(rate) = args.tick_rate {
            self.world.tick_rate = rate;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
