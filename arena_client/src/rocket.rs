//! Rockets and splash damage.

use arena_shared::{
    math::{forward_from_rotations, Vec2, Vec3},
    net::{EntityId, EntityKind, PeerId, PoseSample},
    physics::BodyDesc,
};

use crate::{
    entity::{NetEntity, Ownable, StateStreamable, Transform},
    sync::{SyncError, Warp},
};

pub const ROCKET_SPEED: f32 = 25.0;
/// Seconds before a rocket that hit nothing blows up.
pub const ROCKET_LIFETIME: f32 = 5.0;
pub const EXPLOSION_RADIUS: f32 = 4.0;
pub const MAX_SPLASH_DAMAGE: i32 = 60;
pub const ROCKET_RADIUS: f32 = 0.25;

/// Damage at `distance` from the blast centre, falling off linearly to zero
/// at `radius`.
pub fn splash_damage(max_damage: i32, radius: f32, distance: f32) -> i32 {
    if radius <= 0.0 {
        return 0;
    }
    let falloff = (1.0 - distance / radius).clamp(0.0, 1.0);
    (max_damage as f32 * falloff).floor() as i32
}

#[derive(Debug, Clone)]
pub struct Rocket {
    net: NetEntity,
    velocity: Vec3,
    age: f32,
    exploded: bool,
}

impl Rocket {
    pub fn new(
        id: EntityId,
        me: PeerId,
        position: Vec3,
        rotations: Vec2,
        capacity: usize,
        warp: Warp,
    ) -> Result<Self, SyncError> {
        let transform = Transform {
            position,
            rotations,
        };
        Ok(Self {
            net: NetEntity::new(id, EntityKind::Rocket, me, transform, capacity, warp)?,
            velocity: Vec3::ZERO,
            age: 0.0,
            exploded: false,
        })
    }

    /// Sets flight velocity along the launch rotation.
    pub fn launch(&mut self) {
        self.velocity = forward_from_rotations(self.net.transform.rotations) * ROCKET_SPEED;
    }

    pub fn position(&self) -> Vec3 {
        self.net.transform.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Owner flight step. Returns `true` once the lifetime is over and the
    /// rocket should explode.
    pub fn fly(&mut self, dt: f32) -> bool {
        if !self.net.authority.local || self.exploded {
            return false;
        }
        self.age += dt;
        if self.age > ROCKET_LIFETIME {
            return true;
        }
        self.net.transform.position += self.velocity * dt;
        false
    }

    /// Marks the rocket as exploded. Only the first call returns `true`.
    pub fn mark_exploded(&mut self) -> bool {
        !std::mem::replace(&mut self.exploded, true)
    }

    pub fn has_exploded(&self) -> bool {
        self.exploded
    }

    /// Rockets collide but never show up in gameplay queries.
    pub fn body(&self) -> BodyDesc {
        BodyDesc {
            queryable: false,
            ..self.net.body(ROCKET_RADIUS)
        }
    }
}

impl Ownable for Rocket {
    fn net(&self) -> &NetEntity {
        &self.net
    }

    fn net_mut(&mut self) -> &mut NetEntity {
        &mut self.net
    }
}

impl StateStreamable for Rocket {
    fn write_state(&self) -> PoseSample {
        self.net.write_state()
    }

    fn read_state(&mut self, sample: PoseSample, timestamp: f64) {
        self.net.read_state(sample, timestamp);
    }
}
