//! Physics collaborator interface.
//!
//! Collision detection and rigid-body integration belong to the engine. The
//! gameplay core only needs a handful of queries plus contact notifications,
//! which the front end feeds back as [`ContactEvent`]s.

use std::collections::BTreeMap;

use crate::{math::Vec3, net::EntityId};

/// Body registration for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub position: Vec3,
    pub radius: f32,
    /// Dynamic body driven by this peer. Replicas are kinematic.
    pub simulated: bool,
    /// Visible to overlap and ray queries.
    pub queryable: bool,
}

/// Overlap query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    pub entity: EntityId,
    /// Point on the body closest to the query centre.
    pub closest: Vec3,
}

/// Raycast result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: EntityId,
    pub point: Vec3,
    pub distance: f32,
}

/// Contact notifications raised by the engine for locally simulated bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactEvent {
    /// Body touched the ground.
    Grounded(EntityId),
    /// Rocket hit something.
    Impact(EntityId),
    /// Body entered the hazard volume.
    HazardEnter(EntityId),
    /// Body left the hazard volume.
    HazardExit(EntityId),
    /// Body overlapped the bonus pickup in `slot`.
    BonusTouched { entity: EntityId, slot: usize },
    /// Engine moved a simulated body (gravity, jump impulse).
    BodyMoved { entity: EntityId, position: Vec3 },
}

/// Physics backend trait.
pub trait PhysicsWorld: Send {
    /// Registers or updates a body.
    fn upsert_body(&mut self, entity: EntityId, body: BodyDesc);
    fn remove_body(&mut self, entity: EntityId);
    fn apply_impulse(&mut self, entity: EntityId, impulse: Vec3);
    /// Queryable bodies intersecting the sphere.
    fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<Overlap>;
    /// Nearest queryable body along the ray, skipping `ignore`. `dir` must be
    /// normalized.
    fn raycast(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
        ignore: Option<EntityId>,
    ) -> Option<RayHit>;
}

/// No-op physics.
#[derive(Default)]
pub struct NullPhysics;

impl PhysicsWorld for NullPhysics {
    fn upsert_body(&mut self, _entity: EntityId, _body: BodyDesc) {}
    fn remove_body(&mut self, _entity: EntityId) {}
    fn apply_impulse(&mut self, _entity: EntityId, _impulse: Vec3) {}
    fn overlap_sphere(&self, _center: Vec3, _radius: f32) -> Vec<Overlap> {
        Vec::new()
    }
    fn raycast(
        &self,
        _origin: Vec3,
        _dir: Vec3,
        _max_distance: f32,
        _ignore: Option<EntityId>,
    ) -> Option<RayHit> {
        None
    }
}

/// Headless physics that models every body as a sphere.
///
/// Good enough for bots and tests: queries are exact for spheres, impulses
/// on simulated bodies are recorded but not integrated.
#[derive(Debug, Default)]
pub struct SpherePhysics {
    bodies: BTreeMap<EntityId, BodyDesc>,
    impulses: Vec<(EntityId, Vec3)>,
}

impl SpherePhysics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self, entity: EntityId) -> Option<&BodyDesc> {
        self.bodies.get(&entity)
    }

    /// Impulses applied since the last call.
    pub fn take_impulses(&mut self) -> Vec<(EntityId, Vec3)> {
        std::mem::take(&mut self.impulses)
    }
}

impl PhysicsWorld for SpherePhysics {
    fn upsert_body(&mut self, entity: EntityId, body: BodyDesc) {
        self.bodies.insert(entity, body);
    }

    fn remove_body(&mut self, entity: EntityId) {
        self.bodies.remove(&entity);
    }

    fn apply_impulse(&mut self, entity: EntityId, impulse: Vec3) {
        if self.bodies.get(&entity).is_some_and(|b| b.simulated) {
            self.impulses.push((entity, impulse));
        }
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<Overlap> {
        self.bodies
            .iter()
            .filter(|(_, b)| b.queryable)
            .filter_map(|(id, b)| {
                let offset = center - b.position;
                let closest = if offset.len() <= b.radius {
                    center
                } else {
                    b.position + offset.normalized() * b.radius
                };
                (closest.distance(center) <= radius).then_some(Overlap {
                    entity: *id,
                    closest,
                })
            })
            .collect()
    }

    fn raycast(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
        ignore: Option<EntityId>,
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let candidates = self
            .bodies
            .iter()
            .filter(|(id, b)| b.queryable && Some(**id) != ignore);
        for (id, b) in candidates {
            // Ray/sphere intersection, nearest non-negative root.
            let to_origin = origin - b.position;
            let half_b = to_origin.dot(dir);
            let c = to_origin.len_sq() - b.radius * b.radius;
            let disc = half_b * half_b - c;
            if disc < 0.0 {
                continue;
            }
            let sqrt = disc.sqrt();
            let mut t = -half_b - sqrt;
            if t < 0.0 {
                t = -half_b + sqrt;
            }
            if t < 0.0 || t > max_distance {
                continue;
            }
            if best.map_or(true, |hit| t < hit.distance) {
                best = Some(RayHit {
                    entity: *id,
                    point: origin + dir * t,
                    distance: t,
                });
            }
        }
        best
    }
}
