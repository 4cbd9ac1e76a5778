//! Server configuration.

use std::path::PathBuf;

use clap::Parser;
use engine_net::nats::{DEFAULT_NATS_URL, NATS_URL_ENV};
use engine_net::subjects::DEFAULT_PREFIX;

use crate::tick::TickConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "engine_server", about = "Entity view replication server over NATS")]
pub struct ServerConfig {
    /// Path to the JSON component schema
    #[arg(short, long, default_value = "schema/view.json")]
    pub schema: PathBuf,

    /// Path to a JSON scene seeding the world
    #[arg(long)]
    pub scene: Option<PathBuf>,

    /// NATS server URL
    #[arg(short, long, env = NATS_URL_ENV, default_value = DEFAULT_NATS_URL)]
    pub nats_url: String,

    /// NATS subject prefix
    #[arg(short, long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Target ticks per second
    #[arg(long, default_value_t = 60.0)]
    pub tick_rate: f64,

    /// Stop after this many ticks (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    pub max_ticks: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn tick(&self) -> TickConfig {
        TickConfig {
            tick_rate: self.tick_rate,
            max_ticks: self.max_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["engine_server"]);
        assert_eq!(config.schema, PathBuf::from("schema/view.json"));
        assert_eq!(config.prefix, "engine.view");
        assert!(config.scene.is_none());
        assert_eq!(config.tick().max_ticks, 0);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::parse_from([
            "engine_server",
            "--prefix",
            "game",
            "--tick-rate",
            "30",
            "--max-ticks",
            "10",
            "--scene",
            "schema/scene.json",
            "-n",
            "nats://example:4222",
        ]);
        assert_eq!(config.prefix, "game");
        assert_eq!(config.nats_url, "nats://example:4222");
        assert_eq!(config.tick().tick_rate, 30.0);
        assert_eq!(config.tick().max_ticks, 10);
        assert_eq!(config.scene, Some(PathBuf::from("schema/scene.json")));
    }
}
