//! Lava floor.

use std::collections::{BTreeMap, BTreeSet};

use arena_shared::net::EntityId;

pub const LAVA_DAMAGE: i32 = 15;
/// Seconds between burns while standing in lava.
pub const LAVA_INTERVAL: f32 = 1.0;

/// Tracks owned entities touching the lava.
#[derive(Debug, Clone, Default)]
pub struct LavaZone {
    timeouts: BTreeMap<EntityId, f32>,
    left: BTreeSet<EntityId>,
}

impl LavaZone {
    /// Contact began. Returns `true` when the entity should burn right away.
    pub fn on_enter(&mut self, entity: EntityId) -> bool {
        self.left.remove(&entity);
        if self.timeouts.contains_key(&entity) {
            return false;
        }
        self.timeouts.insert(entity, LAVA_INTERVAL);
        true
    }

    /// Contact ended. The entity stops burning at its next interval.
    pub fn on_exit(&mut self, entity: EntityId) {
        if self.timeouts.contains_key(&entity) {
            self.left.insert(entity);
        }
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.timeouts.remove(&entity);
        self.left.remove(&entity);
    }

    /// Entities due another burn.
    pub fn tick(&mut self, dt: f32) -> Vec<EntityId> {
        let mut burning = Vec::new();
        let left = &mut self.left;
        self.timeouts.retain(|id, timeout| {
            *timeout -= dt;
            if *timeout > 0.0 {
                return true;
            }
            if left.remove(id) {
                return false;
            }
            *timeout += LAVA_INTERVAL;
            burning.push(*id);
            true
        });
        burning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::net::PeerId;

    fn id(n: u32) -> EntityId {
        EntityId::new(PeerId(1), n)
    }

    #[test]
    fn burns_on_contact_and_every_interval() {
        let mut lava = LavaZone::default();
        assert!(lava.on_enter(id(1)));
        assert!(!lava.on_enter(id(1)));
        assert!(lava.tick(0.5).is_empty());
        assert_eq!(lava.tick(0.5), vec![id(1)]);
        assert!(lava.tick(0.9).is_empty());
        assert_eq!(lava.tick(0.2), vec![id(1)]);
    }

    #[test]
    fn leaving_stops_the_burn() {
        let mut lava = LavaZone::default();
        lava.on_enter(id(1));
        lava.on_exit(id(1));
        assert!(lava.tick(1.0).is_empty());
        assert!(lava.tick(5.0).is_empty());
        assert!(lava.on_enter(id(1)));
    }

    #[test]
    fn re_entering_before_the_interval_keeps_burning() {
        let mut lava = LavaZone::default();
        lava.on_enter(id(2));
        lava.on_exit(id(2));
        assert!(!lava.on_enter(id(2)));
        assert_eq!(lava.tick(1.0), vec![id(2)]);
    }
}
