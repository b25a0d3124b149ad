//! Bonus pickups. The master decides what spawns where; every peer keeps a
//! copy of the board and its countdown.

use arena_shared::{math::Vec3, net::BonusKind};
use rand::{seq::SliceRandom, Rng};

/// Seconds between bonus spawns.
pub const BONUS_RESPAWN: f32 = 25.0;
pub const MAX_ALIVE_BONUSES: usize = 3;
/// Fraction of max health a health bonus restores.
pub const HEALTH_BONUS_DIVISOR: i32 = 2;

pub const SPAWN_POINTS: [Vec3; 6] = [
    Vec3::new(-20.0, 1.0, -20.0),
    Vec3::new(20.0, 1.0, -20.0),
    Vec3::new(-20.0, 1.0, 20.0),
    Vec3::new(20.0, 1.0, 20.0),
    Vec3::new(0.0, 1.0, -30.0),
    Vec3::new(0.0, 1.0, 30.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    kind: BonusKind,
    /// Consumed locally, waiting for the master's verdict.
    hidden: bool,
}

#[derive(Debug, Clone)]
pub struct BonusBoard {
    slots: [Option<Slot>; SPAWN_POINTS.len()],
    countdown: f32,
}

impl Default for BonusBoard {
    fn default() -> Self {
        Self {
            slots: [None; SPAWN_POINTS.len()],
            countdown: BONUS_RESPAWN,
        }
    }
}

impl BonusBoard {
    pub fn countdown(&self) -> f32 {
        self.countdown
    }

    pub fn alive(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Bonus in `slot` that can still be picked up.
    pub fn visible(&self, slot: usize) -> Option<BonusKind> {
        self.slots
            .get(slot)
            .copied()
            .flatten()
            .filter(|s| !s.hidden)
            .map(|s| s.kind)
    }

    /// Counts down. On expiry the master fills a random free slot and
    /// returns `true`; the new board must then be broadcast.
    pub fn tick<R: Rng>(&mut self, dt: f32, master: bool, rng: &mut R) -> bool {
        self.countdown -= dt;
        if self.countdown > 0.0 {
            return false;
        }
        self.countdown = BONUS_RESPAWN;
        if !master || self.alive() >= MAX_ALIVE_BONUSES {
            return false;
        }
        let free: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].is_none())
            .collect();
        let Some(&slot) = free.choose(rng) else {
            return false;
        };
        let kind = if rng.gen_bool(0.5) {
            BonusKind::Health
        } else {
            BonusKind::Bullets
        };
        self.slots[slot] = Some(Slot {
            kind,
            hidden: false,
        });
        true
    }

    /// Local pickup. Returns `false` when there is nothing to take.
    pub fn hide(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(Some(s)) if !s.hidden => {
                s.hidden = true;
                true
            }
            _ => false,
        }
    }

    /// Master side of a pickup: removes the bonus and returns what to grant.
    pub fn grant(&mut self, slot: usize) -> Option<BonusKind> {
        self.slots.get_mut(slot)?.take().map(|s| s.kind)
    }

    /// Board as broadcast by the master.
    pub fn snapshot(&self) -> Vec<Option<BonusKind>> {
        self.slots.iter().map(|s| s.map(|s| s.kind)).collect()
    }

    /// Replaces the board with the master's.
    pub fn apply_sync(&mut self, slots: &[Option<BonusKind>], countdown: f32) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = slots.get(i).copied().flatten().map(|kind| Slot {
                kind,
                hidden: false,
            });
        }
        self.countdown = countdown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn only_the_master_spawns() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut follower = BonusBoard::default();
        assert!(!follower.tick(BONUS_RESPAWN, false, &mut rng));
        assert_eq!(follower.alive(), 0);
        assert_eq!(follower.countdown(), BONUS_RESPAWN);

        let mut master = BonusBoard::default();
        assert!(!master.tick(10.0, true, &mut rng));
        assert!(master.tick(15.0, true, &mut rng));
        assert_eq!(master.alive(), 1);
    }

    #[test]
    fn alive_bonuses_are_capped() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut board = BonusBoard::default();
        for _ in 0..10 {
            board.tick(BONUS_RESPAWN, true, &mut rng);
        }
        assert_eq!(board.alive(), MAX_ALIVE_BONUSES);
    }

    #[test]
    fn pickup_hides_then_master_grants_once() {
        let mut master = BonusBoard::default();
        master.apply_sync(&[None, Some(BonusKind::Health)], 12.0);
        assert_eq!(master.countdown(), 12.0);

        let mut consumer = master.clone();
        assert!(consumer.hide(1));
        assert!(!consumer.hide(1));
        assert_eq!(consumer.visible(1), None);
        assert!(!consumer.hide(0));

        assert_eq!(master.grant(1), Some(BonusKind::Health));
        assert_eq!(master.grant(1), None);
        assert_eq!(master.grant(99), None);

        consumer.apply_sync(&master.snapshot(), master.countdown());
        assert_eq!(consumer.alive(), 0);
    }
}
