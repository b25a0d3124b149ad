//! Match session.
//!
//! `Session` is the single owner of everything a peer knows about the match:
//! the entity maps, the round, the scores, and the master-side timers. It is
//! synchronous and transport-free. Relay messages go in through
//! [`Session::handle`], outbound traffic collects in an outbox that the
//! caller drains after every tick.

mod bonuses;
mod combat;

use std::collections::BTreeMap;

use anyhow::Context;
use arena_shared::{
    config::ArenaConfig,
    event::{EventQueue, GameEvent, ResultRow, RoundResults},
    math::{Vec2, Vec3},
    net::{EntityId, EntityKind, NetMsg, Payload, PeerId, PeerInfo, Rpc, StateUpdate, Target},
    physics::{ContactEvent, PhysicsWorld},
    render::Presenter,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

use crate::{
    bonus::BonusBoard,
    entity::{Damageable, NetEntity, Ownable, StateStreamable},
    hazard::{LavaZone, LAVA_DAMAGE},
    input::{Buttons, InputFrame},
    player::{random_spawn, Player},
    rocket::Rocket,
    round::{GameRound, RoundState, START_TIME_KEY},
    sync::Warp,
    target::{respawn_position, TargetSpawner, TestTarget},
};

/// Player property holding the kill count.
pub const KILLS_KEY: &str = "kills";
/// Player property holding the death count.
pub const DEATHS_KEY: &str = "deaths";

/// Room state handed over by the relay on join.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub me: PeerId,
    pub master: PeerId,
    /// Shared clock at the moment of the snapshot, seconds.
    pub server_time: f64,
    pub peers: Vec<PeerInfo>,
    pub room: BTreeMap<String, i64>,
}

impl TryFrom<NetMsg> for RoomSnapshot {
    type Error = anyhow::Error;

    fn try_from(msg: NetMsg) -> Result<Self, Self::Error> {
        match msg {
            NetMsg::Welcome {
                peer,
                master,
                server_time,
                peers,
                room,
            } => Ok(Self {
                me: peer,
                master,
                server_time,
                peers,
                room,
            }),
            NetMsg::Disconnect { reason } => anyhow::bail!("relay refused the join: {reason}"),
            other => anyhow::bail!("expected welcome, got {other:?}"),
        }
    }
}

fn owned_states<'a, E>(
    entities: impl Iterator<Item = &'a E> + 'a,
) -> impl Iterator<Item = StateUpdate> + 'a
where
    E: StateStreamable + 'a,
{
    entities
        .filter(|e| e.is_mine() && e.net().visible)
        .map(|e| StateUpdate {
            entity: e.id(),
            sample: e.write_state(),
        })
}

fn sync_state_rpc(player: &Player) -> Rpc {
    Rpc::SyncState {
        entity: player.id(),
        health: player.health().current(),
        weapon: player.arsenal().current().id,
        rotations: player.rotations(),
    }
}

pub struct Session {
    me: PeerId,
    master: PeerId,
    cfg: ArenaConfig,
    warp: Warp,
    peers: BTreeMap<PeerId, PeerInfo>,
    room: BTreeMap<String, i64>,
    physics: Box<dyn PhysicsWorld>,
    rng: StdRng,

    players: BTreeMap<EntityId, Player>,
    rockets: BTreeMap<EntityId, Rocket>,
    targets: BTreeMap<EntityId, TestTarget>,
    local_player: Option<EntityId>,
    next_serial: u32,
    targets_spawned: bool,

    round: GameRound,
    last_round_state: RoundState,
    repeat_votes: u32,
    kills: i64,
    deaths: i64,

    spawner: TargetSpawner,
    bonuses: BonusBoard,
    lava: LavaZone,

    outbox: Vec<NetMsg>,
    events: EventQueue,
    send_accum: f32,
    now: f64,
    disconnected: Option<String>,
}

impl Session {
    pub fn new(
        snapshot: RoomSnapshot,
        cfg: ArenaConfig,
        physics: Box<dyn PhysicsWorld>,
    ) -> anyhow::Result<Self> {
        Self::with_rng(snapshot, cfg, physics, StdRng::from_entropy())
    }

    /// Deterministic session for bots and tests.
    pub fn seeded(
        snapshot: RoomSnapshot,
        cfg: ArenaConfig,
        physics: Box<dyn PhysicsWorld>,
        seed: u64,
    ) -> anyhow::Result<Self> {
        Self::with_rng(snapshot, cfg, physics, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        snapshot: RoomSnapshot,
        cfg: ArenaConfig,
        physics: Box<dyn PhysicsWorld>,
        rng: StdRng,
    ) -> anyhow::Result<Self> {
        cfg.validate().context("invalid arena config")?;
        let warp = Warp::from(&cfg.sync);
        let round = GameRound::new(&cfg.round);
        let peers = snapshot.peers.into_iter().map(|p| (p.id, p)).collect();

        let mut session = Self {
            me: snapshot.me,
            master: snapshot.master,
            cfg,
            warp,
            peers,
            room: snapshot.room,
            physics,
            rng,
            players: BTreeMap::new(),
            rockets: BTreeMap::new(),
            targets: BTreeMap::new(),
            local_player: None,
            next_serial: 1,
            targets_spawned: false,
            last_round_state: round.state(),
            round,
            repeat_votes: 0,
            kills: 0,
            deaths: 0,
            spawner: TargetSpawner::default(),
            bonuses: BonusBoard::default(),
            lava: LavaZone::default(),
            outbox: Vec::new(),
            events: EventQueue::default(),
            send_accum: 0.0,
            now: snapshot.server_time,
            disconnected: None,
        };
        session.start();
        Ok(session)
    }

    // ─── Accessors ───

    pub fn me(&self) -> PeerId {
        self.me
    }

    pub fn master(&self) -> PeerId {
        self.master
    }

    pub fn is_master(&self) -> bool {
        self.me == self.master
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn round(&self) -> &GameRound {
        &self.round
    }

    pub fn kills(&self) -> i64 {
        self.kills
    }

    pub fn deaths(&self) -> i64 {
        self.deaths
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.values()
    }

    pub fn room_property(&self, key: &str) -> Option<i64> {
        self.room.get(key).copied()
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.local_player.and_then(|id| self.players.get(&id))
    }

    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Player owned by `peer`, if spawned here.
    pub fn player_of(&self, peer: PeerId) -> Option<&Player> {
        self.players.values().find(|p| p.authority().owner == peer)
    }

    pub fn rockets(&self) -> impl Iterator<Item = &Rocket> {
        self.rockets.values()
    }

    pub fn targets(&self) -> impl Iterator<Item = &TestTarget> {
        self.targets.values()
    }

    pub fn bonuses(&self) -> &BonusBoard {
        &self.bonuses
    }

    pub fn spawner(&self) -> &TargetSpawner {
        &self.spawner
    }

    pub fn physics(&self) -> &dyn PhysicsWorld {
        self.physics.as_ref()
    }

    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnected.as_deref()
    }

    pub fn drain_outbox(&mut self) -> Vec<NetMsg> {
        std::mem::take(&mut self.outbox)
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    /// Score table for every peer in the room.
    pub fn results(&self) -> RoundResults {
        let rows: Vec<ResultRow> = self
            .peers
            .values()
            .map(|p| {
                let (kills, deaths) = if p.id == self.me {
                    (self.kills, self.deaths)
                } else {
                    (
                        p.properties.get(KILLS_KEY).copied().unwrap_or(0),
                        p.properties.get(DEATHS_KEY).copied().unwrap_or(0),
                    )
                };
                ResultRow {
                    peer: p.id,
                    name: p.name.clone(),
                    kills,
                    deaths,
                }
            })
            .collect();
        let won = rows.iter().all(|r| r.kills <= self.kills);
        RoundResults { rows, won }
    }

    // ─── Room lifecycle ───

    fn start(&mut self) {
        if self.round.state() == RoundState::WaitingForPlayers {
            self.clear_scores();
        }
        self.round.on_player_connected(self.peers.len() as u32);
        if self.round.state() != RoundState::ReadyToStart {
            info!(peers = self.peers.len(), "Waiting for players");
            return;
        }
        if self.is_master() {
            self.start_round_in_room();
        } else if let Some(start_ms) = self.room_property(START_TIME_KEY) {
            self.start_round(start_ms);
        }
        self.enter_game();
    }

    fn start_round_in_room(&mut self) {
        let start_ms = (self.now * 1000.0) as i64;
        self.room.insert(START_TIME_KEY.to_string(), start_ms);
        self.outbox.push(NetMsg::SetRoomProperty {
            key: START_TIME_KEY.to_string(),
            value: start_ms,
        });
        self.start_round(start_ms);
    }

    fn start_round(&mut self, start_ms: i64) {
        let was = self.round.state();
        self.round.on_game_started(start_ms, self.now);
        if was == RoundState::ReadyToStart && self.round.state() == RoundState::Running {
            self.repeat_votes = 0;
            let seconds_left = self.round.seconds_left().max(0);
            info!(start_ms, seconds_left, "Round started");
            self.events.push(GameEvent::RoundStarted { seconds_left });
        }
    }

    fn enter_game(&mut self) {
        if self.local_player.is_some() {
            self.rebirth_in_game();
        } else {
            self.create_player();
        }
        if self.is_master() && !self.targets_spawned {
            self.spawn_targets();
        }
    }

    fn update_round(&mut self) {
        self.round.is_running(self.now);
        let state = self.round.state();
        if state == RoundState::Finished && self.last_round_state == RoundState::Running {
            let results = self.results();
            info!(
                won = results.won,
                kills = self.kills,
                deaths = self.deaths,
                "Round finished"
            );
            self.events.push(GameEvent::RoundFinished(results));
        }
        self.last_round_state = state;
    }

    /// Local vote for another round. Only valid once the round is over.
    pub fn want_repeat(&mut self) -> bool {
        if self.round.state() != RoundState::Finished {
            return false;
        }
        self.round.on_player_want_repeat();
        self.repeat_votes += 1;
        self.send(Target::Others, Rpc::WantRepeat);
        self.round.on_player_connected(self.repeat_votes);
        self.clear_scores();
        if self.round.state() == RoundState::ReadyToStart {
            self.start_round_in_room();
            self.rebirth_in_game();
        }
        true
    }

    fn another_player_wants_repeat(&mut self) {
        self.repeat_votes += 1;
        self.round.on_player_connected(self.repeat_votes);
        if self.round.state() == RoundState::ReadyToStart {
            self.start_round_in_room();
            self.rebirth_in_game();
        }
    }

    // ─── Scores ───

    fn set_player_property(&mut self, key: &str, value: i64) {
        if let Some(me) = self.peers.get_mut(&self.me) {
            me.properties.insert(key.to_string(), value);
        }
        self.outbox.push(NetMsg::SetPlayerProperty {
            key: key.to_string(),
            value,
        });
    }

    fn clear_scores(&mut self) {
        self.kills = 0;
        self.deaths = 0;
        self.set_player_property(KILLS_KEY, 0);
        self.set_player_property(DEATHS_KEY, 0);
        self.events.push(GameEvent::ScoreChanged {
            kills: 0,
            deaths: 0,
        });
    }

    fn increase_kills(&mut self) {
        self.kills += 1;
        self.set_player_property(KILLS_KEY, self.kills);
        info!(kills = self.kills, "Kill scored");
        self.events.push(GameEvent::ScoreChanged {
            kills: self.kills,
            deaths: self.deaths,
        });
    }

    // ─── Entities ───

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId::new(self.me, self.next_serial);
        self.next_serial += 1;
        id
    }

    fn peer_name(&self, peer: PeerId) -> String {
        self.peers
            .get(&peer)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| peer.to_string())
    }

    fn nets(&self) -> impl Iterator<Item = &NetEntity> + '_ {
        self.players
            .values()
            .map(|p| p.net())
            .chain(self.rockets.values().map(|r| r.net()))
            .chain(self.targets.values().map(|t| t.net()))
    }

    fn net_mut(&mut self, entity: EntityId) -> Option<&mut NetEntity> {
        if let Some(p) = self.players.get_mut(&entity) {
            return Some(p.net_mut());
        }
        if let Some(r) = self.rockets.get_mut(&entity) {
            return Some(r.net_mut());
        }
        self.targets.get_mut(&entity).map(|t| t.net_mut())
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.players.contains_key(&entity)
            || self.rockets.contains_key(&entity)
            || self.targets.contains_key(&entity)
    }

    fn is_damageable(&self, entity: EntityId) -> bool {
        self.players.contains_key(&entity) || self.targets.contains_key(&entity)
    }

    fn damageable_mut(&mut self, entity: EntityId) -> Option<&mut dyn Damageable> {
        if let Some(p) = self.players.get_mut(&entity) {
            return Some(p);
        }
        self.targets
            .get_mut(&entity)
            .map(|t| t as &mut dyn Damageable)
    }

    fn local_alive(&self) -> bool {
        self.local_player().is_some_and(|p| p.health().is_alive())
    }

    fn create_player(&mut self) {
        let id = self.allocate_id();
        let position = random_spawn(&mut self.rng);
        let name = self.peer_name(self.me);
        let player = match Player::new(
            id,
            self.me,
            name,
            position,
            self.cfg.sync.player_buffer,
            self.warp,
        ) {
            Ok(player) => player,
            Err(err) => {
                warn!(%err, "Failed to create player");
                return;
            }
        };
        self.physics.upsert_body(id, player.body());
        self.players.insert(id, player);
        self.local_player = Some(id);
        info!(entity = %id, ?position, "Player created");
        self.send(
            Target::Others,
            Rpc::Spawn {
                entity: id,
                kind: EntityKind::Player,
                position,
                rotations: Vec2::ZERO,
            },
        );
        self.events.push(GameEvent::LocalPlayerBorn { position });
    }

    fn spawn_targets(&mut self) {
        self.targets_spawned = true;
        for _ in 0..self.cfg.round.target_count {
            let id = self.allocate_id();
            let position = respawn_position(&mut self.rng);
            match TestTarget::new(id, self.me, position, self.cfg.sync.target_buffer, self.warp) {
                Ok(mut target) => {
                    target.pick_destination(&mut self.rng);
                    self.targets.insert(id, target);
                    self.send(
                        Target::Others,
                        Rpc::Spawn {
                            entity: id,
                            kind: EntityKind::Target,
                            position,
                            rotations: Vec2::ZERO,
                        },
                    );
                }
                Err(err) => warn!(%err, "Failed to create target"),
            }
        }
        info!(count = self.targets.len(), "Targets spawned");
    }

    fn spawn_proxy(
        &mut self,
        entity: EntityId,
        kind: EntityKind,
        position: Vec3,
        rotations: Vec2,
        timestamp: f64,
    ) {
        if self.contains(entity) {
            debug!(%entity, "Entity already known");
            return;
        }
        let sync = &self.cfg.sync;
        let created = match kind {
            EntityKind::Player => {
                let name = self.peer_name(entity.owner);
                Player::new(entity, self.me, name, position, sync.player_buffer, self.warp).map(
                    |mut p| {
                        p.net_mut().seed(position, rotations, timestamp);
                        self.players.insert(entity, p);
                    },
                )
            }
            EntityKind::Rocket => {
                Rocket::new(entity, self.me, position, rotations, sync.rocket_buffer, self.warp)
                    .map(|mut r| {
                        r.net_mut().seed(position, rotations, timestamp);
                        self.rockets.insert(entity, r);
                    })
            }
            EntityKind::Target => {
                TestTarget::new(entity, self.me, position, sync.target_buffer, self.warp).map(
                    |mut t| {
                        t.net_mut().seed(position, rotations, timestamp);
                        self.targets.insert(entity, t);
                    },
                )
            }
        };
        match created {
            Ok(()) => debug!(%entity, ?kind, "Proxy spawned"),
            Err(err) => warn!(%entity, %err, "Failed to spawn proxy"),
        }
    }

    fn despawn(&mut self, entity: EntityId) {
        let removed = self.players.remove(&entity).is_some()
            || self.rockets.remove(&entity).is_some()
            || self.targets.remove(&entity).is_some();
        if removed {
            self.physics.remove_body(entity);
            self.lava.forget(entity);
        } else {
            debug!(%entity, "Despawn for unknown entity");
        }
    }

    fn on_birth(&mut self, entity: EntityId, position: Vec3, timestamp: f64) {
        if let Some(p) = self.players.get_mut(&entity) {
            p.rebirth(position, timestamp);
        } else if let Some(t) = self.targets.get_mut(&entity) {
            t.create_at(position, timestamp);
        } else {
            debug!(%entity, "Birth for unknown entity");
        }
    }

    /// Respawns the local player at a random spot.
    pub fn rebirth_in_game(&mut self) {
        let Some(id) = self.local_player else {
            return;
        };
        let position = random_spawn(&mut self.rng);
        let now = self.now;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.rebirth(position, now);
        info!(entity = %id, ?position, "Player reborn");
        self.send(Target::Others, Rpc::Birth { entity: id, position });
        self.events.push(GameEvent::LocalPlayerBorn { position });
    }

    fn respawn_target(&mut self, entity: EntityId) {
        let position = respawn_position(&mut self.rng);
        match self.targets.get_mut(&entity) {
            Some(t) if t.is_mine() => {
                t.create_at(position, self.now);
                t.pick_destination(&mut self.rng);
            }
            _ => {
                debug!(%entity, "Queued target is not ours to respawn");
                return;
            }
        }
        debug!(%entity, ?position, "Target respawned");
        self.send(Target::Others, Rpc::Birth { entity, position });
        self.send(
            Target::Others,
            Rpc::SyncTargets {
                dead: self.spawner.queued(),
                cooldown: self.spawner.cooldown(),
            },
        );
    }

    // ─── Messaging ───

    /// Queues an RPC. `All` and messages addressed to this peer run locally
    /// right away instead of taking a round trip through the relay.
    fn send(&mut self, target: Target, rpc: Rpc) {
        match target {
            Target::All => {
                self.outbox.push(NetMsg::Send {
                    target: Target::Others,
                    payload: Payload::Rpc(rpc.clone()),
                });
                self.handle_rpc(self.me, self.now, rpc);
            }
            Target::Peer(peer) if peer == self.me => self.handle_rpc(self.me, self.now, rpc),
            _ => self.outbox.push(NetMsg::Send {
                target,
                payload: Payload::Rpc(rpc),
            }),
        }
    }

    /// Applies one relay message.
    pub fn handle(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::Deliver {
                sender,
                timestamp,
                payload,
            } => match payload {
                Payload::State(update) => self.read_state(update, timestamp),
                Payload::Rpc(rpc) => self.handle_rpc(sender, timestamp, rpc),
            },
            NetMsg::PeerJoined(info) => self.on_peer_joined(info),
            NetMsg::PeerLeft { peer, master } => {
                self.peers.remove(&peer);
                self.master = master;
                info!(peer = %peer, master = %master, "Peer left");
                if self.is_master() {
                    info!("Became master");
                }
            }
            NetMsg::RoomPropertyChanged { key, value } => {
                self.room.insert(key.clone(), value);
                if key == START_TIME_KEY && self.round.state() == RoundState::ReadyToStart {
                    self.start_round(value);
                }
            }
            NetMsg::PlayerPropertyChanged { peer, key, value } => {
                if let Some(info) = self.peers.get_mut(&peer) {
                    info.properties.insert(key, value);
                }
            }
            NetMsg::Disconnect { reason } => {
                warn!(%reason, "Disconnected by relay");
                self.disconnected = Some(reason);
            }
            unexpected @ (NetMsg::Hello { .. }
            | NetMsg::Welcome { .. }
            | NetMsg::Send { .. }
            | NetMsg::SetRoomProperty { .. }
            | NetMsg::SetPlayerProperty { .. }) => {
                debug!(?unexpected, "Ignoring unexpected relay message");
            }
        }
    }

    fn read_state(&mut self, update: StateUpdate, timestamp: f64) {
        let StateUpdate { entity, sample } = update;
        if let Some(p) = self.players.get_mut(&entity) {
            p.read_state(sample, timestamp);
        } else if let Some(r) = self.rockets.get_mut(&entity) {
            r.read_state(sample, timestamp);
        } else if let Some(t) = self.targets.get_mut(&entity) {
            t.read_state(sample, timestamp);
        } else {
            debug!(%entity, "State for unknown entity");
        }
    }

    fn on_peer_joined(&mut self, info: PeerInfo) {
        let newcomer = info.id;
        info!(peer = %newcomer, name = %info.name, "Peer joined");
        self.peers.insert(newcomer, info);

        let spawns: Vec<Rpc> = self
            .nets()
            .filter(|n| n.authority.local)
            .map(|n| Rpc::Spawn {
                entity: n.id,
                kind: n.kind,
                position: n.transform.position,
                rotations: n.transform.rotations,
            })
            .collect();
        for spawn in spawns {
            self.send(Target::Peer(newcomer), spawn);
        }
        if let Some(rpc) = self.local_player().map(sync_state_rpc) {
            self.send(Target::Peer(newcomer), rpc);
        }
        if self.is_master() {
            self.send(
                Target::Peer(newcomer),
                Rpc::SyncBonuses {
                    slots: self.bonuses.snapshot(),
                    countdown: self.bonuses.countdown(),
                },
            );
            self.send(
                Target::Peer(newcomer),
                Rpc::SyncTargets {
                    dead: self.spawner.queued(),
                    cooldown: self.spawner.cooldown(),
                },
            );
        }

        self.round.on_player_connected(self.peers.len() as u32);
        if self.is_master() && self.round.state() == RoundState::ReadyToStart {
            self.start_round_in_room();
            self.enter_game();
        }
    }

    fn handle_rpc(&mut self, sender: PeerId, timestamp: f64, rpc: Rpc) {
        match rpc {
            Rpc::Spawn {
                entity,
                kind,
                position,
                rotations,
            } => self.spawn_proxy(entity, kind, position, rotations, timestamp),
            Rpc::Despawn { entity } => self.despawn(entity),
            Rpc::Birth { entity, position } => self.on_birth(entity, position, timestamp),
            Rpc::Damage {
                entity,
                amount,
                alive,
            } => self.on_remote_damage(sender, entity, amount, alive),
            Rpc::KillCredit => self.increase_kills(),
            Rpc::SyncState {
                entity,
                health,
                weapon,
                rotations,
            } => match self.players.get_mut(&entity) {
                Some(p) if !p.is_mine() => {
                    if let Err(err) = p.apply_sync_state(health, weapon, rotations) {
                        warn!(%entity, %err, "Rejected state sync");
                    }
                }
                Some(_) => {}
                None => debug!(%entity, "State sync for unknown player"),
            },
            Rpc::ChangeWeapon { entity, weapon } => match self.players.get_mut(&entity) {
                Some(p) if !p.is_mine() => {
                    if let Err(err) = p.arsenal_mut().set_weapon(weapon) {
                        warn!(%entity, %err, "Rejected weapon change");
                    }
                }
                Some(_) => {}
                None => debug!(%entity, "Weapon change for unknown player"),
            },
            Rpc::ShowShot { entity } => self.events.push(GameEvent::Shot { entity }),
            Rpc::StartReload { entity } => {
                if let Some(p) = self.players.get_mut(&entity) {
                    p.arsenal_mut().reload();
                    self.events.push(GameEvent::Reload { entity });
                }
            }
            Rpc::ShowExplosion { position, radius } => {
                self.events.push(GameEvent::Explosion { position, radius })
            }
            Rpc::WantRepeat => self.another_player_wants_repeat(),
            Rpc::ConsumeBonus { slot, consumer } => self.on_consume_bonus(slot, consumer),
            Rpc::AddReward { bonus } => self.add_reward(bonus),
            Rpc::SyncBonuses { slots, countdown } => self.bonuses.apply_sync(&slots, countdown),
            Rpc::SyncTargets { dead, cooldown } => {
                for id in &dead {
                    if let Some(t) = self.targets.get_mut(id) {
                        if !t.is_mine() && t.health().is_alive() {
                            t.health_mut().set(0);
                            t.die();
                        }
                    }
                }
                self.spawner.sync(dead, cooldown);
            }
        }
    }

    // ─── Frame ───

    /// Advances the match by one fixed step. `now` is the shared clock.
    pub fn tick(&mut self, now: f64, dt: f32, input: &InputFrame) {
        self.now = now;
        self.update_round();
        if self.round.state() == RoundState::Running {
            self.apply_input(input, dt);
        }

        if let Some(id) = self.local_player {
            let due = self
                .players
                .get_mut(&id)
                .is_some_and(|p| p.tick_respawn(dt));
            if due {
                self.rebirth_in_game();
            }
        }
        for player in self.players.values_mut() {
            player.tick_weapon(dt);
        }

        let expired: Vec<EntityId> = self
            .rockets
            .values_mut()
            .filter_map(|r| r.fly(dt).then(|| r.id()))
            .collect();
        for id in expired {
            self.explode(id);
        }
        for target in self.targets.values_mut() {
            target.wander(dt, &mut self.rng);
        }

        let master = self.is_master();
        if let Some(id) = self.spawner.tick(dt, master) {
            self.respawn_target(id);
        }
        if self.bonuses.tick(dt, master, &mut self.rng) {
            debug!(alive = self.bonuses.alive(), "Bonus spawned");
            self.broadcast_bonuses();
        }
        for id in self.lava.tick(dt) {
            self.add_damage(id, LAVA_DAMAGE);
        }

        let elapsed = dt as f64;
        for p in self.players.values_mut() {
            p.net_mut().follow_replica(elapsed);
        }
        for r in self.rockets.values_mut() {
            r.net_mut().follow_replica(elapsed);
        }
        for t in self.targets.values_mut() {
            t.net_mut().follow_replica(elapsed);
        }

        self.sync_bodies();
        self.stream_states(dt);
    }

    fn apply_input(&mut self, input: &InputFrame, dt: f32) {
        let Some(id) = self.local_player else {
            return;
        };
        if let Some(weapon) = input.weapon_request() {
            if let Err(err) = self.change_weapon(weapon) {
                warn!(%err, "Weapon change failed");
            }
        }
        if let Some(player) = self.players.get_mut(&id) {
            player.apply_input(input, dt);
        }
        if input.buttons.contains(Buttons::JUMP) {
            self.jump();
        }
        if input.buttons.contains(Buttons::RELOAD) {
            self.reload();
        }
        if input.buttons.contains(Buttons::FIRE) {
            self.fire();
        }
    }

    fn sync_bodies(&mut self) {
        for p in self.players.values() {
            self.physics.upsert_body(p.id(), p.body());
        }
        for r in self.rockets.values() {
            self.physics.upsert_body(r.id(), r.body());
        }
        for t in self.targets.values() {
            self.physics.upsert_body(t.id(), t.body());
        }
    }

    fn stream_states(&mut self, dt: f32) {
        self.send_accum += dt;
        let interval = 1.0 / self.cfg.send_rate_hz as f32;
        if self.send_accum < interval {
            return;
        }
        self.send_accum = (self.send_accum - interval).min(interval);

        let updates: Vec<StateUpdate> = owned_states(self.players.values())
            .chain(owned_states(self.rockets.values()))
            .chain(owned_states(self.targets.values()))
            .collect();
        for update in updates {
            self.outbox.push(NetMsg::Send {
                target: Target::Others,
                payload: Payload::State(update),
            });
        }
    }

    /// Feeds a physics notification from the front end.
    pub fn on_contact(&mut self, event: ContactEvent) {
        match event {
            ContactEvent::Grounded(entity) => {
                if let Some(p) = self.players.get_mut(&entity).filter(|p| p.is_mine()) {
                    p.set_grounded(true);
                }
            }
            ContactEvent::Impact(entity) => self.explode(entity),
            ContactEvent::HazardEnter(entity) => {
                let owned_alive = self
                    .damageable_mut(entity)
                    .is_some_and(|d| d.is_mine() && d.health().is_alive());
                if owned_alive && self.lava.on_enter(entity) {
                    self.add_damage(entity, LAVA_DAMAGE);
                }
            }
            ContactEvent::HazardExit(entity) => self.lava.on_exit(entity),
            ContactEvent::BonusTouched { entity, slot } => {
                if Some(entity) != self.local_player || !self.local_alive() {
                    return;
                }
                if self.bonuses.hide(slot) {
                    let consumer = self.me;
                    self.send(Target::All, Rpc::ConsumeBonus { slot, consumer });
                }
            }
            ContactEvent::BodyMoved { entity, position } => {
                if let Some(net) = self.net_mut(entity) {
                    if net.authority.local {
                        net.transform.position = position;
                    }
                }
            }
        }
    }

    /// Draws every entity and plays queued events. Consumes the event queue.
    pub fn present(&mut self, presenter: &mut dyn Presenter) {
        presenter.begin_frame();
        for view in self.nets().map(NetEntity::view) {
            presenter.present_entity(&view);
        }
        for event in self.events.drain() {
            presenter.play_event(&event);
        }
        presenter.end_frame();
    }
}
