//! Standalone relay binary.
//!
//! Usage:
//!   cargo run -p arena_relay -- [--addr 127.0.0.1:40000] [--max-peers 2] [--config arena.json]
//!
//! The relay hosts a single room. Peers connect, say `Hello`, and from then
//! on every `Send` is forwarded with the relay timestamp attached.

use std::env;

use anyhow::Context;
use arena_relay::Relay;
use arena_shared::config::ArenaConfig;
use tracing::info;

fn parse_args() -> anyhow::Result<ArenaConfig> {
    let args: Vec<String> = env::args().collect();
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text =
                std::fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
            ArenaConfig::from_json_str(&text).with_context(|| format!("parse config {path}"))?
        }
        _ => ArenaConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.relay_addr = args[i + 1].clone();
                i += 2;
            }
            "--max-peers" if i + 1 < args.len() => {
                cfg.max_peers = args[i + 1].parse().context("parse --max-peers")?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg.validate().context("invalid config")?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(addr = %cfg.relay_addr, max_peers = cfg.max_peers, "Starting relay");

    let relay = Relay::bind(&cfg).await.context("bind relay")?;
    relay.run().await
}
