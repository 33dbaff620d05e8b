//! Reference server for bucket targeting-hint reconciliation.
//!
//! Network tasks classify inbound packets and cache hints; a dedicated world
//! thread arbitrates and executes every bucket action.

mod world;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hitsync_config::{CliArgs, Config, default_config_dir};
use hitsync_core::{
    HeldItemSnapshot, InboundMessageRouter, PendingResultStore, RouterConfig, WorldMutationQueue,
};
use hitsync_net::{FrameConfig, GameServer, ServerConfig};
use tracing::{error, info};

use crate::world::WorldThread;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = match args.config.clone() {
        Some(dir) => dir,
        None => match default_config_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let log_dir = config_dir.join("logs");
    hitsync_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let bind_addr: SocketAddr = match config.listen_addr().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(addr = %config.listen_addr(), "invalid listen address: {e}");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(PendingResultStore::new());
    let held = Arc::new(HeldItemSnapshot::new());
    let (queue, tasks) = WorldMutationQueue::bounded(config.world.task_queue_capacity);

    let world = match WorldThread::spawn(
        &config,
        Some(config_dir.clone()),
        tasks,
        Arc::clone(&store),
        Arc::clone(&held),
    ) {
        Ok(world) => world,
        Err(e) => {
            error!("failed to start world thread: {e}");
            return ExitCode::FAILURE;
        }
    };

    let router = InboundMessageRouter::new(
        RouterConfig {
            hint_channel: config.enrichment.hint_channel.clone(),
            require_registration: config.enrichment.require_registration,
        },
        store,
        queue,
        held,
    );
    let server = GameServer::new(
        ServerConfig {
            bind_addr,
            max_connections: config.network.max_connections,
            frame: FrameConfig::with_max_payload(config.network.max_payload_size),
        },
        Arc::new(router),
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("net")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to build async runtime: {e}");
            world.stop();
            return ExitCode::FAILURE;
        }
    };

    info!(%bind_addr, channel = %config.enrichment.hint_channel, "hitsync server starting");
    let result = runtime.block_on(async {
        tokio::select! {
            result = server.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                server.shutdown();
                Ok(())
            }
        }
    });

    world.stop();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
