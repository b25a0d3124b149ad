//! Socket layer of the relay.
//!
//! Each accepted connection goes through a handshake task (`Hello`), then a
//! reader task forwards its frames to the routing loop and a writer task
//! drains its outbound queue. The routing loop owns the [`Room`] and is the
//! only place that mutates it.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use anyhow::Context;
use arena_shared::{
    config::ArenaConfig,
    net::{FrameWriter, NetMsg, PeerId, ReliableConn, ReliableListener, PROTOCOL_VERSION},
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

use crate::room::{Outgoing, Room};

/// How long a fresh connection may take to send `Hello`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

enum Event {
    Handshake { name: String, conn: ReliableConn },
    Msg { peer: PeerId, msg: NetMsg },
    Closed { peer: PeerId },
}

/// Relay server: one room, RPC forwarding, property store, shared clock.
pub struct Relay {
    listener: ReliableListener,
    room: Room,
    started: Instant,
    writers: HashMap<PeerId, mpsc::UnboundedSender<NetMsg>>,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
}

impl Relay {
    /// Binds the listener at `cfg.relay_addr`.
    pub async fn bind(cfg: &ArenaConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.relay_addr.parse().context("parse relay_addr")?;
        let listener = ReliableListener::bind(addr).await?;
        let (events_tx, events_rx) = mpsc::channel(1024);
        Ok(Self {
            listener,
            room: Room::new(cfg.max_peers),
            started: Instant::now(),
            writers: HashMap::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Seconds since the relay started.
    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Runs the routing loop until the listener fails.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "Relay running");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (conn, addr) = accepted?;
                    debug!(%addr, "Connection accepted");
                    tokio::spawn(handshake(conn, addr, self.events_tx.clone()));
                }
                Some(event) = self.events_rx.recv() => self.on_event(event),
            }
        }
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Handshake { name, conn } => self.admit(name, conn),
            Event::Msg { peer, msg } => {
                let out = self.room.handle(peer, msg, self.now());
                self.dispatch(out);
            }
            Event::Closed { peer } => {
                if self.writers.remove(&peer).is_some() {
                    info!(peer = %peer, "Peer disconnected");
                    let out = self.room.leave(peer);
                    self.dispatch(out);
                }
            }
        }
    }

    fn admit(&mut self, name: String, mut conn: ReliableConn) {
        let (peer, out) = match self.room.join(&name, self.now()) {
            Ok(joined) => joined,
            Err(e) => {
                warn!(%name, error = %e, "Refusing peer");
                tokio::spawn(async move {
                    let reason = e.to_string();
                    if let Err(e) = conn.send(&NetMsg::Disconnect { reason }).await {
                        debug!(error = %e, "Could not deliver refusal");
                    }
                });
                return;
            }
        };

        let (mut reader, writer) = conn.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        self.writers.insert(peer, tx);
        tokio::spawn(write_loop(peer, writer, rx));

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(msg) => {
                        if events.send(Event::Msg { peer, msg }).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!(peer = %peer, error = %e, "Read ended");
                        let _ = events.send(Event::Closed { peer }).await;
                        return;
                    }
                }
            }
        });

        self.dispatch(out);
    }

    fn dispatch(&mut self, out: Outgoing) {
        for (peer, msg) in out {
            let Some(tx) = self.writers.get(&peer) else {
                continue;
            };
            if tx.send(msg).is_err() {
                debug!(peer = %peer, "Writer gone");
            }
        }
    }
}

async fn handshake(mut conn: ReliableConn, addr: SocketAddr, events: mpsc::Sender<Event>) {
    let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await;
    let name = match hello {
        Ok(Ok(NetMsg::Hello { protocol, name })) if protocol == PROTOCOL_VERSION => name,
        Ok(Ok(NetMsg::Hello { protocol, .. })) => {
            warn!(%addr, protocol, "Protocol mismatch");
            let reason = format!("protocol {protocol} unsupported, expected {PROTOCOL_VERSION}");
            let _ = conn.send(&NetMsg::Disconnect { reason }).await;
            return;
        }
        Ok(Ok(other)) => {
            warn!(%addr, msg = ?other, "Expected Hello");
            return;
        }
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "Handshake read failed");
            return;
        }
        Err(_) => {
            warn!(%addr, "Handshake timed out");
            return;
        }
    };
    let _ = events.send(Event::Handshake { name, conn }).await;
}

async fn write_loop(peer: PeerId, mut writer: FrameWriter, mut rx: mpsc::UnboundedReceiver<NetMsg>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = writer.send(&msg).await {
            debug!(peer = %peer, error = %e, "Write failed");
            return;
        }
    }
}

/// Binds a relay on an ephemeral localhost port.
pub async fn bind_ephemeral(max_peers: u32) -> anyhow::Result<(Relay, ArenaConfig)> {
    let mut cfg = ArenaConfig {
        relay_addr: "127.0.0.1:0".to_string(),
        max_peers,
        ..ArenaConfig::default()
    };
    cfg.round.max_players = cfg.round.max_players.min(max_peers);
    let relay = Relay::bind(&cfg).await?;
    cfg.relay_addr = relay.local_addr()?.to_string();
    Ok((relay, cfg))
}
