//! Wandering test targets and the master's respawn queue.

use std::collections::VecDeque;

use arena_shared::{
    math::{Vec2, Vec3},
    net::{EntityId, EntityKind, PeerId, PoseSample},
    physics::BodyDesc,
};
use rand::Rng;

use crate::{
    damage::Health,
    entity::{Damageable, NetEntity, Ownable, StateStreamable, Transform},
    sync::{SyncError, Warp},
};

pub const TARGET_HEALTH: i32 = 75;
pub const TARGET_SPEED: f32 = 3.5;
pub const TARGET_RADIUS: f32 = 1.0;
/// Destinations are picked inside `[-WANDER_EXTENT, WANDER_EXTENT]²`.
pub const WANDER_EXTENT: f32 = 50.0;
/// A destination closer than this is considered reached.
pub const ARRIVE_DISTANCE: f32 = 3.0;
/// Seconds between respawns while the queue is non-empty.
pub const RESPAWN_COOLDOWN: f32 = 5.0;
pub const RESPAWN_EXTENT: f32 = 40.0;
pub const RESPAWN_HEIGHT: f32 = 3.0;

/// Random rebirth spot for a target.
pub fn respawn_position<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-RESPAWN_EXTENT..RESPAWN_EXTENT),
        RESPAWN_HEIGHT,
        rng.gen_range(-RESPAWN_EXTENT..RESPAWN_EXTENT),
    )
}

#[derive(Debug, Clone)]
pub struct TestTarget {
    net: NetEntity,
    health: Health,
    destination: Vec3,
}

impl TestTarget {
    pub fn new(
        id: EntityId,
        me: PeerId,
        position: Vec3,
        capacity: usize,
        warp: Warp,
    ) -> Result<Self, SyncError> {
        let transform = Transform {
            position,
            rotations: Vec2::ZERO,
        };
        Ok(Self {
            net: NetEntity::new(id, EntityKind::Target, me, transform, capacity, warp)?,
            health: Health::new(TARGET_HEALTH),
            destination: position,
        })
    }

    pub fn position(&self) -> Vec3 {
        self.net.transform.position
    }

    pub fn destination(&self) -> Vec3 {
        self.destination
    }

    pub fn pick_destination<R: Rng>(&mut self, rng: &mut R) {
        self.destination = Vec3::new(
            rng.gen_range(-WANDER_EXTENT..WANDER_EXTENT),
            self.net.transform.position.y,
            rng.gen_range(-WANDER_EXTENT..WANDER_EXTENT),
        );
    }

    /// Owner AI: walk toward the destination, pick a new one on arrival.
    pub fn wander<R: Rng>(&mut self, dt: f32, rng: &mut R) {
        if !self.net.authority.local || !self.health.is_alive() {
            return;
        }
        let to_goal = (self.destination - self.net.transform.position).flat();
        if to_goal.len() < ARRIVE_DISTANCE {
            self.pick_destination(rng);
            return;
        }
        let dir = to_goal.normalized();
        self.net.transform.position += dir * (TARGET_SPEED * dt);
        self.net.transform.rotations.x = dir.x.atan2(dir.z).to_degrees().rem_euclid(360.0);
        self.net.animation = 1;
    }

    pub fn die(&mut self) {
        self.net.visible = false;
        self.net.animation = 0;
    }

    /// Brings the target back at `position` with full health.
    pub fn create_at(&mut self, position: Vec3, timestamp: f64) {
        self.health.restore();
        self.net.visible = true;
        self.net.teleport(position, timestamp);
        self.destination = position;
    }

    pub fn body(&self) -> BodyDesc {
        self.net.body(TARGET_RADIUS)
    }
}

impl Ownable for TestTarget {
    fn net(&self) -> &NetEntity {
        &self.net
    }

    fn net_mut(&mut self) -> &mut NetEntity {
        &mut self.net
    }
}

impl StateStreamable for TestTarget {
    fn write_state(&self) -> PoseSample {
        self.net.write_state()
    }

    fn read_state(&mut self, sample: PoseSample, timestamp: f64) {
        self.net.read_state(sample, timestamp);
    }
}

impl Damageable for TestTarget {
    fn health(&self) -> &Health {
        &self.health
    }

    fn health_mut(&mut self) -> &mut Health {
        &mut self.health
    }
}

/// Dead targets waiting to be re-created. Replicated on every peer; only the
/// master acts on expiry.
#[derive(Debug, Clone)]
pub struct TargetSpawner {
    queue: VecDeque<EntityId>,
    /// Negative while idle.
    cooldown: f32,
}

impl Default for TargetSpawner {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            cooldown: -1.0,
        }
    }
}

impl TargetSpawner {
    pub fn queued(&self) -> Vec<EntityId> {
        self.queue.iter().copied().collect()
    }

    pub fn cooldown(&self) -> f32 {
        self.cooldown
    }

    pub fn is_idle(&self) -> bool {
        self.cooldown < 0.0
    }

    /// Queues a dead target and returns the state to broadcast.
    pub fn on_target_death(&mut self, target: EntityId) -> (Vec<EntityId>, f32) {
        if self.is_idle() {
            self.cooldown = RESPAWN_COOLDOWN;
        }
        if !self.queue.contains(&target) {
            self.queue.push_back(target);
        }
        (self.queued(), self.cooldown)
    }

    /// Replaces local state with the master's.
    pub fn sync(&mut self, dead: Vec<EntityId>, cooldown: f32) {
        self.queue = dead.into();
        self.cooldown = cooldown;
    }

    /// Counts down. On expiry the master pops the next target to re-create;
    /// other peers only stop their clock and wait for the next sync.
    pub fn tick(&mut self, dt: f32, master: bool) -> Option<EntityId> {
        if self.is_idle() {
            return None;
        }
        self.cooldown -= dt;
        if self.cooldown > 0.0 {
            return None;
        }
        self.cooldown = -1.0;
        if !master {
            return None;
        }
        let next = self.queue.pop_front();
        if !self.queue.is_empty() {
            self.cooldown = RESPAWN_COOLDOWN;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn target(owner: u32, me: u32) -> TestTarget {
        TestTarget::new(
            EntityId::new(PeerId(owner), 3),
            PeerId(me),
            Vec3::new(0.0, 3.0, 0.0),
            5,
            Warp::default(),
        )
        .unwrap()
    }

    fn tid(n: u32) -> EntityId {
        EntityId::new(PeerId(1), n)
    }

    #[test]
    fn wander_moves_toward_destination() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut t = target(1, 1);
        t.destination = Vec3::new(10.0, 3.0, 0.0);
        t.wander(1.0, &mut rng);
        assert!((t.position().x - TARGET_SPEED).abs() < 1e-4);
        assert!((t.net().transform.rotations.x - 90.0).abs() < 1e-3);
    }

    #[test]
    fn arrival_picks_a_new_destination() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut t = target(1, 1);
        t.destination = Vec3::new(1.0, 3.0, 1.0);
        t.wander(0.1, &mut rng);
        let d = t.destination();
        assert!(d.x.abs() <= WANDER_EXTENT && d.z.abs() <= WANDER_EXTENT);
        assert_eq!(t.position(), Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn proxies_and_dead_targets_stand_still() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut proxy = target(2, 1);
        proxy.destination = Vec3::new(10.0, 3.0, 0.0);
        proxy.wander(1.0, &mut rng);
        assert_eq!(proxy.position(), Vec3::new(0.0, 3.0, 0.0));

        let mut dead = target(1, 1);
        dead.destination = Vec3::new(10.0, 3.0, 0.0);
        dead.health_mut().apply_local(TARGET_HEALTH);
        dead.wander(1.0, &mut rng);
        assert_eq!(dead.position(), Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn create_restores_health_and_visibility() {
        let mut t = target(1, 1);
        t.health_mut().apply_local(100);
        t.die();
        assert!(!t.body().queryable);

        t.create_at(Vec3::new(5.0, 3.0, 5.0), 2.0);
        assert!(t.health().is_alive());
        assert_eq!(t.health().current(), TARGET_HEALTH);
        assert!(t.body().queryable);
        assert_eq!(t.position(), Vec3::new(5.0, 3.0, 5.0));
    }

    #[test]
    fn spawner_pops_one_target_per_cooldown() {
        let mut s = TargetSpawner::default();
        assert!(s.is_idle());
        let (dead, cooldown) = s.on_target_death(tid(1));
        assert_eq!(dead, vec![tid(1)]);
        assert_eq!(cooldown, RESPAWN_COOLDOWN);

        s.tick(2.0, true);
        let (dead, cooldown) = s.on_target_death(tid(2));
        assert_eq!(dead, vec![tid(1), tid(2)]);
        assert_eq!(cooldown, 3.0);

        assert_eq!(s.tick(3.0, true), Some(tid(1)));
        assert_eq!(s.cooldown(), RESPAWN_COOLDOWN);
        assert_eq!(s.tick(4.0, true), None);
        assert_eq!(s.tick(1.0, true), Some(tid(2)));
        assert!(s.is_idle());
        assert_eq!(s.tick(10.0, true), None);
    }

    #[test]
    fn followers_wait_for_the_master() {
        let mut s = TargetSpawner::default();
        s.sync(vec![tid(4)], 1.0);
        assert_eq!(s.tick(2.0, false), None);
        assert!(s.is_idle());
        assert_eq!(s.queued(), vec![tid(4)]);
    }

    #[test]
    fn duplicate_deaths_queue_once() {
        let mut s = TargetSpawner::default();
        s.on_target_death(tid(1));
        let (dead, _) = s.on_target_death(tid(1));
        assert_eq!(dead.len(), 1);
    }

    #[test]
    fn respawn_spots_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let p = respawn_position(&mut rng);
            assert!(p.x.abs() <= RESPAWN_EXTENT && p.z.abs() <= RESPAWN_EXTENT);
            assert_eq!(p.y, RESPAWN_HEIGHT);
        }
    }
}
