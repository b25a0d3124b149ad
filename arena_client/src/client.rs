//! Networked client.
//!
//! The client maintains:
//! - A reliable stream to the relay, split into a reader task and a writer
//! - The shared clock (relay time at welcome + local elapsed time)
//! - The [`Session`] that owns all gameplay state
//! - Held input driven by console commands

use std::{net::SocketAddr, time::Instant};

use anyhow::Context;
use arena_shared::{
    config::ArenaConfig,
    math::Vec2,
    net::{FrameWriter, NetMsg, ReliableConn, PROTOCOL_VERSION},
    physics::{ContactEvent, PhysicsWorld},
};
use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    entity::{Damageable, Ownable},
    input::{Buttons, InputFrame},
    session::{RoomSnapshot, Session},
};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Joined the room, exchanging messages.
    Connected,
    /// Relay closed the stream or refused us.
    Disconnected,
}

/// High-level game client.
pub struct GameClient {
    pub state: ClientState,
    session: Session,
    writer: FrameWriter,
    inbox: mpsc::Receiver<NetMsg>,
    reader: JoinHandle<()>,
    clock_base: f64,
    clock_start: Instant,
    held: InputFrame,
    /// Buttons pressed by console commands, consumed by the next tick.
    pressed: Buttons,
}

impl GameClient {
    /// Connects to the relay and joins the room.
    pub async fn connect(
        cfg: &ArenaConfig,
        physics: Box<dyn PhysicsWorld>,
    ) -> anyhow::Result<Self> {
        let relay_addr: SocketAddr = cfg.relay_addr.parse().context("parse relay_addr")?;
        info!(relay = %relay_addr, name = %cfg.player_name, "Connecting to relay");

        let mut conn = ReliableConn::connect(relay_addr).await?;
        conn.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
            name: cfg.player_name.clone(),
        })
        .await?;

        let welcome = conn.recv().await.context("await welcome")?;
        let clock_start = Instant::now();
        let snapshot = RoomSnapshot::try_from(welcome)?;
        let clock_base = snapshot.server_time;
        info!(
            peer = %snapshot.me,
            master = %snapshot.master,
            peers = snapshot.peers.len(),
            "Joined room"
        );

        let session = Session::new(snapshot, cfg.clone(), physics).context("create session")?;

        let (mut reader, writer) = conn.into_split();
        let (tx, inbox) = mpsc::channel(256);
        let reader = tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(msg) => {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Relay stream closed");
                        break;
                    }
                }
            }
        });

        let mut client = Self {
            state: ClientState::Connected,
            session,
            writer,
            inbox,
            reader,
            clock_base,
            clock_start,
            held: InputFrame::default(),
            pressed: Buttons::empty(),
        };
        client.flush().await?;
        Ok(client)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Shared clock in seconds.
    pub fn server_time(&self) -> f64 {
        self.clock_base + self.clock_start.elapsed().as_secs_f64()
    }

    /// One client tick: apply inbound messages, advance the session, send
    /// everything it queued.
    pub async fn pump(&mut self, dt: f32) -> anyhow::Result<()> {
        loop {
            match self.inbox.try_recv() {
                Ok(msg) => self.session.handle(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.state == ClientState::Connected {
                        warn!("Lost connection to relay");
                    }
                    self.state = ClientState::Disconnected;
                    break;
                }
            }
        }
        if self.session.disconnect_reason().is_some() {
            self.state = ClientState::Disconnected;
        }

        // Headless arena: the floor is everywhere.
        if let Some(id) = self.session.local_player().map(|p| p.id()) {
            self.session.on_contact(ContactEvent::Grounded(id));
        }

        let mut input = self.held;
        input.buttons |= std::mem::take(&mut self.pressed);
        self.session.tick(self.server_time(), dt, &input);
        self.held.look_delta = Vec2::ZERO;

        self.flush().await
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        for msg in self.session.drain_outbox() {
            self.writer.send(&msg).await.context("send to relay")?;
        }
        Ok(())
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> Vec<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Vec::new();
        };

        match command {
            "fire" => {
                self.pressed |= Buttons::FIRE;
                Vec::new()
            }
            "reload" => {
                self.pressed |= Buttons::RELOAD;
                Vec::new()
            }
            "jump" => {
                self.pressed |= Buttons::JUMP;
                Vec::new()
            }
            "weapon" => match tokens.get(1).and_then(|t| t.parse::<u8>().ok()) {
                Some(id) => match self.session.change_weapon(id) {
                    Ok(true) => vec![format!("Switched to weapon {id}")],
                    Ok(false) => vec![format!("Weapon {id} not switched")],
                    Err(e) => vec![format!("Error: {e}")],
                },
                None => vec!["Usage: weapon <1-4>".to_string()],
            },
            "move" => match parse_pair(&tokens[1..]) {
                Some(axis) => {
                    self.held.move_axis = axis;
                    Vec::new()
                }
                None => vec!["Usage: move <right> <forward>".to_string()],
            },
            "turn" => match parse_pair(&tokens[1..]) {
                Some(delta) => {
                    self.held.look_delta = delta;
                    Vec::new()
                }
                None => vec!["Usage: turn <right> <up>".to_string()],
            },
            "stop" => {
                self.held = InputFrame::default();
                Vec::new()
            }
            "repeat" => {
                if self.session.want_repeat() {
                    vec!["Voted for another round".to_string()]
                } else {
                    vec!["Round is not over".to_string()]
                }
            }
            "status" => self.status(),
            "quit" | "exit" => {
                self.state = ClientState::Disconnected;
                vec!["Bye".to_string()]
            }
            other => vec![format!("Unknown command: {other}")],
        }
    }

    fn status(&self) -> Vec<String> {
        let s = &self.session;
        let mut out = vec![
            format!("State: {:?}", self.state),
            format!("Peer: {} (master {})", s.me(), s.master()),
            format!(
                "Round: {:?}, {}s left",
                s.round().state(),
                s.round().seconds_left()
            ),
            format!("Kills: {} Deaths: {}", s.kills(), s.deaths()),
        ];
        if let Some(p) = s.local_player() {
            out.push(format!(
                "Health: {} Weapon: {} Ammo: {}{}",
                p.health().current(),
                p.arsenal().current().name,
                p.arsenal().ammo(),
                if p.arsenal().is_reloading() {
                    " (reloading)"
                } else {
                    ""
                }
            ));
        }
        out.push(format!(
            "Rockets: {} Targets: {} Bonuses: {}",
            s.rockets().count(),
            s.targets().count(),
            s.bonuses().alive()
        ));
        out
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn parse_pair(tokens: &[&str]) -> Option<Vec2> {
    match tokens {
        [x, y, ..] => Some(Vec2::new(x.parse().ok()?, y.parse().ok()?)),
        _ => None,
    }
}
