//! Networked entity building blocks.
//!
//! Every replicated object is owned by exactly one peer. The owner simulates
//! it and writes poses into the state stream; every other peer only feeds
//! those poses through a [`Replica`] and presents the interpolated result.

use arena_shared::{
    math::{Vec2, Vec3},
    net::{EntityId, EntityKind, PeerId, PoseSample},
    physics::BodyDesc,
    render::EntityView,
};
use tracing::debug;

use crate::{
    damage::Health,
    sync::{SyncBuffer, SyncError, Warp},
};

/// Who may mutate an entity. Fixed at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    pub owner: PeerId,
    /// `owner` is this peer.
    pub local: bool,
}

impl Authority {
    pub fn new(owner: PeerId, me: PeerId) -> Self {
        Self {
            owner,
            local: owner == me,
        }
    }
}

/// World placement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    /// Yaw/pitch in degrees.
    pub rotations: Vec2,
}

/// Receive side of the state stream for one entity.
#[derive(Debug, Clone)]
pub struct Replica {
    buffer: SyncBuffer,
    last_timestamp: Option<f64>,
}

impl Replica {
    pub fn new(capacity: usize, warp: Warp) -> Result<Self, SyncError> {
        Ok(Self {
            buffer: SyncBuffer::new(capacity, warp)?,
            last_timestamp: None,
        })
    }

    pub fn buffer(&self) -> &SyncBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut SyncBuffer {
        &mut self.buffer
    }

    /// Feeds one stream sample. Returns `false` when the sample was dropped
    /// for not being newer than the last accepted one.
    pub fn receive_state(&mut self, sample: PoseSample, timestamp: f64) -> bool {
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                debug!(timestamp, last, "Dropping stale state sample");
                return false;
            }
        }
        self.last_timestamp = Some(timestamp);
        self.buffer
            .add_new_state(sample.position, sample.rotations, sample.animation, timestamp);
        true
    }

    /// Discards buffered motion and restarts playback at `position`.
    pub fn teleport(&mut self, position: Vec3, timestamp: f64) {
        self.seed(position, Vec2::ZERO, timestamp);
    }

    pub fn seed(&mut self, position: Vec3, rotations: Vec2, timestamp: f64) {
        self.buffer.reset();
        self.last_timestamp = Some(timestamp);
        self.buffer.add_new_state(position, rotations, 0, timestamp);
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
        self.last_timestamp = None;
    }

    /// Advances playback. Returns `false` while nothing has been received.
    pub fn update(&mut self, elapsed: f64) -> bool {
        self.buffer.update(elapsed);
        self.buffer.virtual_time().is_some()
    }

    /// Current interpolated pose.
    pub fn pose(&self) -> PoseSample {
        PoseSample {
            position: self.buffer.position(),
            rotations: self.buffer.rotations(),
            animation: self.buffer.animation(),
        }
    }
}

/// State shared by every networked entity kind.
#[derive(Debug, Clone)]
pub struct NetEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub authority: Authority,
    pub transform: Transform,
    pub animation: u8,
    pub visible: bool,
    pub replica: Replica,
}

impl NetEntity {
    pub fn new(
        id: EntityId,
        kind: EntityKind,
        me: PeerId,
        transform: Transform,
        capacity: usize,
        warp: Warp,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            id,
            kind,
            authority: Authority::new(id.owner, me),
            transform,
            animation: 0,
            visible: true,
            replica: Replica::new(capacity, warp)?,
        })
    }

    /// Pose the owner writes into the stream.
    pub fn write_state(&self) -> PoseSample {
        PoseSample {
            position: self.transform.position,
            rotations: self.transform.rotations,
            animation: self.animation,
        }
    }

    /// Stream input. Owners never consume their own stream.
    pub fn read_state(&mut self, sample: PoseSample, timestamp: f64) {
        if self.authority.local {
            debug!(entity = %self.id, "Ignoring state for owned entity");
            return;
        }
        self.replica.receive_state(sample, timestamp);
    }

    /// Non-owner tick: copy the buffer output into the transform.
    pub fn follow_replica(&mut self, elapsed: f64) {
        if self.authority.local {
            return;
        }
        if self.replica.update(elapsed) {
            let pose = self.replica.pose();
            self.transform.position = pose.position;
            self.transform.rotations = pose.rotations;
            self.animation = pose.animation;
        }
    }

    /// Jumps to `position` with a fresh look direction and buffer.
    pub fn teleport(&mut self, position: Vec3, timestamp: f64) {
        self.transform = Transform {
            position,
            rotations: Vec2::ZERO,
        };
        self.animation = 0;
        if self.authority.local {
            self.replica.reset();
        } else {
            self.replica.teleport(position, timestamp);
        }
    }

    /// Proxy creation: start playback at the pose the owner announced.
    pub fn seed(&mut self, position: Vec3, rotations: Vec2, timestamp: f64) {
        self.transform = Transform {
            position,
            rotations,
        };
        self.animation = 0;
        if !self.authority.local {
            self.replica.seed(position, rotations, timestamp);
        }
    }

    /// Physics registration: a sphere resting on the entity origin.
    /// Replicas are kinematic, hidden entities drop out of queries.
    pub fn body(&self, radius: f32) -> BodyDesc {
        BodyDesc {
            position: self.transform.position + Vec3::UP * radius,
            radius,
            simulated: self.authority.local && self.visible,
            queryable: self.visible,
        }
    }

    pub fn view(&self) -> EntityView {
        EntityView {
            id: self.id,
            kind: self.kind,
            position: self.transform.position,
            rotations: self.transform.rotations,
            animation: self.animation,
            visible: self.visible,
            local: self.authority.local,
        }
    }
}

/// Entities with a single owning peer.
pub trait Ownable {
    fn net(&self) -> &NetEntity;
    fn net_mut(&mut self) -> &mut NetEntity;

    fn id(&self) -> EntityId {
        self.net().id
    }

    fn authority(&self) -> Authority {
        self.net().authority
    }

    fn is_mine(&self) -> bool {
        self.net().authority.local
    }
}

/// Entities replicated through the state stream.
pub trait StateStreamable: Ownable {
    fn write_state(&self) -> PoseSample;
    fn read_state(&mut self, sample: PoseSample, timestamp: f64);
}

/// Entities that take damage.
pub trait Damageable: Ownable {
    fn health(&self) -> &Health;
    fn health_mut(&mut self) -> &mut Health;
}
