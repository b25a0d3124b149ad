//! Damage and death bookkeeping.
//!
//! There is no central gameplay authority. A hit is applied twice: once
//! optimistically by the attacker on its local copy of the victim, and once
//! by every other peer when the `Damage` RPC arrives. [`Health`] makes sure
//! each copy dies at most once no matter how those two paths interleave.

/// Life state of a damageable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead,
}

/// Result of applying damage to one copy of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The copy was already dead; nothing changed.
    Ignored,
    Survived,
    /// This call performed the Alive -> Dead transition.
    Killed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    current: i32,
    max: i32,
    state: LifeState,
}

impl Health {
    pub fn new(max: i32) -> Self {
        Self {
            current: max,
            max,
            state: LifeState::Alive,
        }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == LifeState::Alive
    }

    /// Damage dealt by this peer.
    pub fn apply_local(&mut self, amount: i32) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::Ignored;
        }
        self.subtract(amount)
    }

    /// Damage reported by another peer. `alive` is the sender's post-damage
    /// view; a sender that saw the victim die wins without re-subtracting.
    pub fn resolve_remote(&mut self, amount: i32, alive: bool) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::Ignored;
        }
        if !alive {
            self.current = self.current.min(0);
            self.state = LifeState::Dead;
            return DamageOutcome::Killed;
        }
        self.subtract(amount)
    }

    fn subtract(&mut self, amount: i32) -> DamageOutcome {
        self.current -= amount;
        if self.current <= 0 {
            self.state = LifeState::Dead;
            DamageOutcome::Killed
        } else {
            DamageOutcome::Survived
        }
    }

    /// Adds `amount`, clamped to `[0, max]`.
    pub fn heal(&mut self, amount: i32) {
        if self.is_alive() {
            self.current = (self.current + amount).clamp(0, self.max);
        }
    }

    /// Authoritative correction from the owner.
    pub fn set(&mut self, value: i32) {
        self.current = value.min(self.max);
        self.state = if self.current > 0 {
            LifeState::Alive
        } else {
            LifeState::Dead
        };
    }

    /// Back to full health.
    pub fn restore(&mut self) {
        self.current = self.max;
        self.state = LifeState::Alive;
    }
}

/// One-shot countdown armed on death.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespawnTimer {
    delay: f32,
    remaining: Option<f32>,
}

impl RespawnTimer {
    pub fn new(delay: f32) -> Self {
        Self {
            delay,
            remaining: None,
        }
    }

    pub fn arm(&mut self) {
        self.remaining = Some(self.delay);
    }

    pub fn disarm(&mut self) {
        self.remaining = None;
    }

    pub fn is_armed(&self) -> bool {
        self.remaining.is_some()
    }

    /// Returns `true` on the tick the countdown expires.
    pub fn tick(&mut self, dt: f32) -> bool {
        let Some(remaining) = self.remaining.as_mut() else {
            return false;
        };
        *remaining -= dt;
        if *remaining <= 0.0 {
            self.remaining = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lethal_local_hit_kills_once() {
        let mut hp = Health::new(100);
        assert_eq!(hp.apply_local(100), DamageOutcome::Killed);
        assert_eq!(hp.apply_local(100), DamageOutcome::Ignored);
        assert_eq!(hp.state(), LifeState::Dead);
    }

    #[test]
    fn duplicate_death_rpc_is_ignored() {
        let mut owner = Health::new(100);
        assert_eq!(owner.resolve_remote(40, false), DamageOutcome::Killed);
        assert_eq!(owner.resolve_remote(40, false), DamageOutcome::Ignored);
        assert_eq!(owner.resolve_remote(40, true), DamageOutcome::Ignored);
    }

    #[test]
    fn optimistic_and_rpc_paths_die_once() {
        // Attacker's proxy of the victim, then the echo of another peer's
        // damage for the same blow.
        let mut proxy = Health::new(100);
        let mut transitions = 0;
        for outcome in [proxy.apply_local(120), proxy.resolve_remote(120, false)] {
            if outcome == DamageOutcome::Killed {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);

        // Owner receives the attacker's RPC.
        let mut owner = Health::new(100);
        assert_eq!(owner.resolve_remote(120, false), DamageOutcome::Killed);
        assert!(owner.current() <= 0, "a trusted death empties the bar");
    }

    #[test]
    fn second_of_two_attackers_gets_the_kill() {
        // Victim owner at 60. Attacker A hits for 50 and attacker B for 30;
        // each saw the victim survive its own hit.
        let mut owner = Health::new(60);
        let a = owner.resolve_remote(50, true);
        let b = owner.resolve_remote(30, true);
        assert_eq!(a, DamageOutcome::Survived);
        assert_eq!(b, DamageOutcome::Killed);
        assert_eq!(owner.resolve_remote(30, true), DamageOutcome::Ignored);
    }

    #[test]
    fn stale_attacker_view_is_trusted() {
        // Attacker's copy still said 10 HP, the owner had healed to 60.
        let mut attacker_view = Health::new(100);
        attacker_view.set(10);
        assert_eq!(attacker_view.apply_local(15), DamageOutcome::Killed);

        let mut owner = Health::new(100);
        owner.set(60);
        assert_eq!(
            owner.resolve_remote(15, attacker_view.is_alive()),
            DamageOutcome::Killed
        );
    }

    #[test]
    fn heal_clamps_to_max() {
        let mut hp = Health::new(100);
        hp.apply_local(80);
        hp.heal(50);
        assert_eq!(hp.current(), 70);
        hp.heal(50);
        assert_eq!(hp.current(), 100);
    }

    #[test]
    fn restore_revives() {
        let mut hp = Health::new(75);
        hp.apply_local(75);
        assert!(!hp.is_alive());
        hp.restore();
        assert!(hp.is_alive());
        assert_eq!(hp.current(), 75);
    }

    #[test]
    fn respawn_timer_fires_once() {
        let mut timer = RespawnTimer::new(2.4);
        assert!(!timer.tick(10.0));
        timer.arm();
        assert!(!timer.tick(1.0));
        assert!(!timer.tick(1.0));
        assert!(timer.tick(0.5));
        assert!(!timer.is_armed());
        assert!(!timer.tick(1.0));
    }
}
