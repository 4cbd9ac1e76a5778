//! # engine_server
//!
//! Serves a schema-defined world to view clients over NATS.
//!
//! ## Startup Sequence
//!
//! 1. Load and validate the JSON component schema.
//! 2. Seed the world from the scene file, if one is given.
//! 3. Connect to NATS and listen under the subject prefix.
//! 4. Enter the fixed-timestep tick loop until interrupted.

mod config;
mod scene;
mod tick;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine_component::ClientId;
use engine_ecs::World;
use engine_net::NatsNetworkAdapter;
use engine_schema::Schema;
use engine_view::{ServerController, ViewCallbacks, ViewSynchronizer};

use config::ServerConfig;
use scene::Scene;
use tick::TickLoop;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();

    info!(path = %config.schema.display(), "loading schema");
    let schema = Schema::load_file(&config.schema)
        .with_context(|| format!("failed to load schema {}", config.schema.display()))?;
    info!(types = schema.len(), "schema loaded");

    let mut world = World::new(Arc::new(schema));
    match &config.scene {
        Some(path) => {
            info!(path = %path.display(), "loading scene");
            Scene::load_file(path)?.populate(&mut world)?;
        }
        None => warn!("no scene given, world starts empty"),
    }

    let adapter = NatsNetworkAdapter::connect(&config.nats_url, &config.prefix).await?;
    let sync = ViewSynchronizer::new(world, adapter);
    let mut tick_loop = TickLoop::new(config.tick(), sync);
    let mut presence = Presence::default();

    tokio::select! {
        () = tick_loop.run(&mut presence) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for shutdown signal")?;
            info!("interrupted");
        }
    }

    info!(ticks = tick_loop.tick_id(), "server shut down");
    Ok(())
}

/// Keeps a running count of connected view clients.
#[derive(Default)]
struct Presence {
    clients: usize,
}

impl ViewCallbacks for Presence {
    fn on_client_connected(&mut self, _controller: &mut ServerController<'_>, client: ClientId) {
        self.clients += 1;
        info!(%client, clients = self.clients, "view client joined");
    }

    fn on_client_disconnected(
        &mut self,
        _controller: &mut ServerController<'_>,
        client: ClientId,
        reason: &str,
    ) {
        self.clients = self.clients.saturating_sub(1);
        info!(%client, reason, clients = self.clients, "view client left");
    }
}
