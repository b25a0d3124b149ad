//! Player avatar.

use arena_shared::{
    math::{forward_from_rotations, wrap_degrees, Vec2, Vec3},
    net::{EntityId, EntityKind, PeerId, PoseSample},
    physics::{BodyDesc, PhysicsWorld},
};
use rand::Rng;
use tracing::debug;

use crate::{
    damage::{Health, RespawnTimer},
    entity::{Damageable, NetEntity, Ownable, StateStreamable, Transform},
    input::InputFrame,
    sync::{SyncError, Warp},
    weapons::{Arsenal, WeaponError},
};

pub const MAX_HEALTH: i32 = 100;
pub const JUMP_IMPULSE: f32 = 5.0;
/// Units per second at full stick.
pub const MOVE_SPEED: f32 = 5.0;
/// Degrees per unit of look input.
pub const LOOK_SENSITIVITY: f32 = 300.0;
pub const PITCH_MIN: f32 = -65.0;
pub const PITCH_MAX: f32 = 89.0;
pub const RESPAWN_DELAY: f32 = 2.4;
pub const SPAWN_EXTENT: f32 = 25.0;
pub const SPAWN_HEIGHT: f32 = 1.0;
pub const EYE_HEIGHT: f32 = 1.5;
pub const BODY_RADIUS: f32 = 1.0;

/// Animation codes carried by the state stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Animation {
    Idle = 0,
    Walk = 1,
    WalkBack = 2,
    WalkLeft = 3,
    WalkRight = 4,
    Jump = 5,
}

impl Animation {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Walk cycle for a move input (`x` right, `y` forward).
    pub fn from_move(axis: Vec2) -> Self {
        let (x, z) = (axis.x, axis.y);
        if z > 0.0 {
            if x > 0.0 && x > z {
                Animation::WalkRight
            } else if x <= 0.0 && x < -z {
                Animation::WalkLeft
            } else {
                Animation::Walk
            }
        } else if x > 0.0 && x > -z {
            Animation::WalkRight
        } else if x <= 0.0 && x < z {
            Animation::WalkLeft
        } else {
            Animation::WalkBack
        }
    }
}

/// Random spawn spot on the arena floor.
pub fn random_spawn<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-SPAWN_EXTENT..SPAWN_EXTENT),
        SPAWN_HEIGHT,
        rng.gen_range(-SPAWN_EXTENT..SPAWN_EXTENT),
    )
}

#[derive(Debug, Clone)]
pub struct Player {
    net: NetEntity,
    name: String,
    health: Health,
    arsenal: Arsenal,
    grounded: bool,
    respawn: RespawnTimer,
}

impl Player {
    pub fn new(
        id: EntityId,
        me: PeerId,
        name: impl Into<String>,
        position: Vec3,
        capacity: usize,
        warp: Warp,
    ) -> Result<Self, SyncError> {
        let transform = Transform {
            position,
            rotations: Vec2::ZERO,
        };
        Ok(Self {
            net: NetEntity::new(id, EntityKind::Player, me, transform, capacity, warp)?,
            name: name.into(),
            health: Health::new(MAX_HEALTH),
            arsenal: Arsenal::default(),
            grounded: false,
            respawn: RespawnTimer::new(RESPAWN_DELAY),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arsenal(&self) -> &Arsenal {
        &self.arsenal
    }

    pub fn arsenal_mut(&mut self) -> &mut Arsenal {
        &mut self.arsenal
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn set_grounded(&mut self, grounded: bool) {
        self.grounded = grounded;
    }

    pub fn is_respawning(&self) -> bool {
        self.respawn.is_armed()
    }

    pub fn position(&self) -> Vec3 {
        self.net.transform.position
    }

    pub fn rotations(&self) -> Vec2 {
        self.net.transform.rotations
    }

    pub fn eye(&self) -> Vec3 {
        self.net.transform.position + Vec3::UP * EYE_HEIGHT
    }

    /// Unit view direction.
    pub fn aim(&self) -> Vec3 {
        forward_from_rotations(self.net.transform.rotations)
    }

    /// Where muzzle-launched projectiles appear.
    pub fn muzzle(&self) -> Vec3 {
        self.eye() + self.aim() - Vec3::UP * 0.2
    }

    pub fn body(&self) -> BodyDesc {
        self.net.body(BODY_RADIUS)
    }

    /// Owner tick: look, walk, and pick the animation code to stream.
    pub fn apply_input(&mut self, input: &InputFrame, dt: f32) {
        if !self.net.authority.local || !self.health.is_alive() {
            return;
        }

        if input.has_look() {
            let rot = &mut self.net.transform.rotations;
            rot.x = wrap_degrees(rot.x + input.look_delta.x * LOOK_SENSITIVITY);
            let mut pitch = rot.y - input.look_delta.y * LOOK_SENSITIVITY;
            if pitch > 180.0 {
                pitch -= 360.0;
            }
            rot.y = pitch.clamp(PITCH_MIN, PITCH_MAX);
        }

        let mut animation = Animation::Idle;
        if input.has_move() {
            let yaw = self.net.transform.rotations.x.to_radians();
            let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
            let right = Vec3::new(yaw.cos(), 0.0, -yaw.sin());
            let step = (right * input.move_axis.x + forward * input.move_axis.y) * (MOVE_SPEED * dt);
            self.net.transform.position += step;
            animation = Animation::from_move(input.move_axis);
        }
        if !self.grounded {
            animation = Animation::Jump;
        }
        self.net.animation = animation.code();
    }

    /// Jumps if standing on the ground.
    pub fn jump(&mut self, physics: &mut dyn PhysicsWorld) -> bool {
        if !self.net.authority.local || !self.grounded || !self.health.is_alive() {
            return false;
        }
        physics.apply_impulse(self.net.id, Vec3::UP * JUMP_IMPULSE);
        self.grounded = false;
        true
    }

    /// Hides the body; owners also start the respawn countdown.
    pub fn die(&mut self) {
        self.net.visible = false;
        if self.net.authority.local {
            self.respawn.arm();
        }
    }

    /// Counts down the respawn delay. Returns `true` when it is time to rebirth.
    pub fn tick_respawn(&mut self, dt: f32) -> bool {
        self.respawn.tick(dt)
    }

    /// Full health at `position` with a fresh look direction.
    pub fn rebirth(&mut self, position: Vec3, timestamp: f64) {
        self.respawn.disarm();
        self.health.restore();
        self.grounded = false;
        self.net.visible = true;
        self.net.teleport(position, timestamp);
    }

    /// Owner's correction of health, weapon and look direction.
    pub fn apply_sync_state(
        &mut self,
        health: i32,
        weapon: u8,
        rotations: Vec2,
    ) -> Result<(), WeaponError> {
        self.health.set(health);
        self.net.visible = self.health.is_alive();
        self.net.transform.rotations = rotations;
        self.net.replica.buffer_mut().set_rotations(rotations);
        self.arsenal.set_weapon(weapon)?;
        Ok(())
    }

    /// Weapon cooldowns. Returns `true` when a reload completed.
    pub fn tick_weapon(&mut self, dt: f32) -> bool {
        let reloaded = self.arsenal.tick(dt);
        if reloaded {
            debug!(entity = %self.net.id, "Reload finished");
        }
        reloaded
    }
}

impl Ownable for Player {
    fn net(&self) -> &NetEntity {
        &self.net
    }

    fn net_mut(&mut self) -> &mut NetEntity {
        &mut self.net
    }
}

impl StateStreamable for Player {
    fn write_state(&self) -> PoseSample {
        self.net.write_state()
    }

    fn read_state(&mut self, sample: PoseSample, timestamp: f64) {
        self.net.read_state(sample, timestamp);
    }
}

impl Damageable for Player {
    fn health(&self) -> &Health {
        &self.health
    }

    fn health_mut(&mut self) -> &mut Health {
        &mut self.health
    }
}
