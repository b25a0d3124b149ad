//! In-process match harness.
//!
//! [`LoopbackMatch`] wires several [`Session`]s to one relay [`Room`] with a
//! manual clock. Every step ticks each session, then routes outboxes through
//! the room until no peer has anything left to say.

use std::collections::BTreeMap;

use anyhow::Context;
use arena_client::{input::InputFrame, RoomSnapshot, Session};
use arena_relay::Room;
use arena_shared::{
    config::ArenaConfig,
    net::{NetMsg, PeerId},
    physics::SpherePhysics,
};
use tracing::debug;

/// Routing passes per flush before giving up on a chatty match.
const MAX_FLUSH_PASSES: usize = 64;

pub struct LoopbackMatch {
    cfg: ArenaConfig,
    room: Room,
    sessions: BTreeMap<PeerId, Session>,
    clock: f64,
    seed: u64,
}

impl LoopbackMatch {
    pub fn new(cfg: ArenaConfig) -> Self {
        Self {
            room: Room::new(cfg.max_peers),
            cfg,
            sessions: BTreeMap::new(),
            clock: 10.0,
            seed: 0x5eed,
        }
    }

    pub fn now(&self) -> f64 {
        self.clock
    }

    pub fn session(&self, peer: PeerId) -> &Session {
        &self.sessions[&peer]
    }

    pub fn session_mut(&mut self, peer: PeerId) -> &mut Session {
        self.sessions
            .get_mut(&peer)
            .unwrap_or_else(|| panic!("no session for {peer}"))
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.sessions.keys().copied()
    }

    /// Joins a new peer and settles all resulting traffic.
    pub fn join(&mut self, name: &str) -> anyhow::Result<PeerId> {
        let mut cfg = self.cfg.clone();
        cfg.player_name = name.to_string();

        let (peer, out) = self.room.join(name, self.clock)?;
        let mut rest = Vec::new();
        let mut welcome = None;
        for (to, msg) in out {
            if to == peer {
                welcome = Some(msg);
            } else {
                rest.push((to, msg));
            }
        }
        let welcome = welcome.context("room sent no welcome")?;
        let snapshot = RoomSnapshot::try_from(welcome)?;
        let session = Session::seeded(
            snapshot,
            cfg,
            Box::new(SpherePhysics::new()),
            self.seed + peer.0 as u64,
        )?;
        self.sessions.insert(peer, session);

        self.deliver(rest);
        self.flush();
        Ok(peer)
    }

    /// Drops a peer as if its connection closed.
    pub fn leave(&mut self, peer: PeerId) {
        self.sessions.remove(&peer);
        let out = self.room.leave(peer);
        self.deliver(out);
        self.flush();
    }

    /// Advances the clock by `dt` with idle input everywhere.
    pub fn step(&mut self, dt: f32) {
        self.step_with(dt, |_| InputFrame::default());
    }

    /// Advances the clock by `dt`, asking `input` for each peer's frame.
    pub fn step_with(&mut self, dt: f32, mut input: impl FnMut(PeerId) -> InputFrame) {
        self.clock += dt as f64;
        let now = self.clock;
        for (&peer, session) in self.sessions.iter_mut() {
            session.tick(now, dt, &input(peer));
        }
        self.flush();
    }

    /// Runs `steps` idle ticks of `dt`.
    pub fn run(&mut self, steps: usize, dt: f32) {
        for _ in 0..steps {
            self.step(dt);
        }
    }

    /// Routes queued traffic until every outbox is empty.
    pub fn flush(&mut self) {
        for _ in 0..MAX_FLUSH_PASSES {
            let mut outgoing = Vec::new();
            for (&peer, session) in self.sessions.iter_mut() {
                for msg in session.drain_outbox() {
                    outgoing.extend(self.room.handle(peer, msg, self.clock));
                }
            }
            if outgoing.is_empty() {
                return;
            }
            self.deliver(outgoing);
        }
        debug!("Flush pass limit reached");
    }

    fn deliver(&mut self, out: Vec<(PeerId, NetMsg)>) {
        for (to, msg) in out {
            if let Some(session) = self.sessions.get_mut(&to) {
                session.handle(msg);
            }
        }
    }
}

/// Test config: a short round so finish/repeat flows stay cheap.
pub fn quick_config() -> ArenaConfig {
    let mut cfg = ArenaConfig::default();
    cfg.round.round_time = 5.0;
    cfg
}
