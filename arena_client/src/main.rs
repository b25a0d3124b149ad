//! Headless arena client.
//!
//! Usage:
//!   cargo run -p arena_client -- [--addr 127.0.0.1:40100] [--name alice]
//!       [--tick-hz 60] [--send-rate 20] [--max-peers 2] [--config arena.json]
//!
//! Console commands:
//!   fire | reload | jump      - Trigger an action on the next tick
//!   weapon <id>               - Switch weapon (1 pistol, 2 rifle, 3 bazooka, 4 fireball)
//!   move <right> <forward>    - Hold a movement direction
//!   turn <right> <up>         - Turn the view once
//!   stop                      - Release all held input
//!   repeat                    - Vote for another round once time is up
//!   status                    - Show round, score and weapon state
//!   quit                      - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use arena_client::client::{ClientState, GameClient};
use arena_shared::{
    config::ArenaConfig,
    event::GameEvent,
    physics::SpherePhysics,
    render::{EntityView, Presenter},
};
use tokio::sync::mpsc;
use tracing::info;

/// Prints gameplay events; entities are only counted.
#[derive(Default)]
struct LogPresenter {
    entities: usize,
}

impl Presenter for LogPresenter {
    fn begin_frame(&mut self) {
        self.entities = 0;
    }

    fn present_entity(&mut self, _view: &EntityView) {
        self.entities += 1;
    }

    fn play_event(&mut self, event: &GameEvent) {
        match event {
            GameEvent::RoundFinished(results) => {
                println!("{}", if results.won { "You win!!!" } else { "You lose..." });
                for row in &results.rows {
                    println!("{} => Kills:{} Deaths:{}", row.name, row.kills, row.deaths);
                }
                println!("Type 'repeat' to play again.");
            }
            GameEvent::RoundStarted { seconds_left } => println!("Round started, {seconds_left}s"),
            GameEvent::LocalPlayerDied => println!("You died"),
            GameEvent::ScoreChanged { kills, deaths } => {
                info!(kills, deaths, "Score changed");
            }
            other => tracing::debug!(event = ?other, "Game event"),
        }
    }

    fn end_frame(&mut self) {}
}

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
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().context("parse --tick-hz")?;
                i += 2;
            }
            "--send-rate" if i + 1 < args.len() => {
                cfg.send_rate_hz = args[i + 1].parse().context("parse --send-rate")?;
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
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(relay = %cfg.relay_addr, name = %cfg.player_name, "Starting client");

    let mut client = GameClient::connect(&cfg, Box::new(SpherePhysics::new()))
        .await
        .context("connect")?;

    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Joined. Type 'status' for info, 'quit' to exit.");

    let dt = 1.0 / cfg.tick_hz as f32;
    let tick_interval = Duration::from_secs_f32(dt);
    let mut presenter = LogPresenter::default();

    loop {
        while let Ok(line) = console_rx.try_recv() {
            for out in client.exec_console(&line) {
                println!("{out}");
            }
        }
        if client.state == ClientState::Disconnected {
            break;
        }

        client.pump(dt).await?;
        client.session_mut().present(&mut presenter);

        if client.state == ClientState::Disconnected {
            let reason = client.session().disconnect_reason().unwrap_or("connection lost");
            println!("Disconnected: {reason}");
            break;
        }

        tokio::time::sleep(tick_interval).await;
    }

    Ok(())
}
