//! Damage resolution and the local player's weapons.

use arena_shared::{
    event::GameEvent,
    math::{Vec2, Vec3},
    net::{EntityId, EntityKind, PeerId, Rpc, Target},
};
use tracing::{debug, info, warn};

use super::{Session, DEATHS_KEY};
use crate::{
    damage::DamageOutcome,
    entity::{Damageable, Ownable},
    rocket::{splash_damage, Rocket, EXPLOSION_RADIUS, MAX_SPLASH_DAMAGE},
    round::RoundState,
    weapons::{FireMode, FireResult, WeaponError, HITSCAN_DAMAGE, MAX_RANGE, RAY_OFFSET},
};

impl Session {
    /// Damage dealt by this peer. Applies to the local copy right away and
    /// tells every other peer, the victim's owner included.
    pub fn add_damage(&mut self, entity: EntityId, amount: i32) -> DamageOutcome {
        let Some(victim) = self.damageable_mut(entity) else {
            debug!(%entity, "Damage for unknown entity");
            return DamageOutcome::Ignored;
        };
        if !victim.health().is_alive() {
            return DamageOutcome::Ignored;
        }
        let position = victim.net().transform.position;
        let mine = victim.is_mine();
        let outcome = victim.health_mut().apply_local(amount);
        let alive = victim.health().is_alive();

        self.events.push(GameEvent::Hit { entity, position });
        self.send(
            Target::Others,
            Rpc::Damage {
                entity,
                amount,
                alive,
            },
        );
        match outcome {
            DamageOutcome::Killed => {
                self.on_death(entity);
                if mine && self.targets.contains_key(&entity) {
                    self.increase_kills();
                }
            }
            DamageOutcome::Survived if mine => self.repath(entity),
            _ => {}
        }
        outcome
    }

    pub(super) fn on_remote_damage(&mut self, sender: PeerId, entity: EntityId, amount: i32, alive: bool) {
        let Some(victim) = self.damageable_mut(entity) else {
            debug!(%entity, "Damage for unknown entity");
            return;
        };
        let position = victim.net().transform.position;
        let mine = victim.is_mine();
        let outcome = victim.health_mut().resolve_remote(amount, alive);
        self.events.push(GameEvent::Hit { entity, position });
        match outcome {
            DamageOutcome::Killed => {
                debug!(%entity, attacker = %sender, "Killed by remote damage");
                self.on_death(entity);
                if mine {
                    self.send(Target::Peer(sender), Rpc::KillCredit);
                }
            }
            DamageOutcome::Survived if mine => self.repath(entity),
            DamageOutcome::Survived => {}
            DamageOutcome::Ignored => debug!(%entity, "Damage on dead entity ignored"),
        }
    }

    fn repath(&mut self, entity: EntityId) {
        if let Some(t) = self.targets.get_mut(&entity) {
            if t.is_mine() {
                t.pick_destination(&mut self.rng);
            }
        }
    }

    fn on_death(&mut self, entity: EntityId) {
        self.lava.forget(entity);
        if let Some(player) = self.players.get_mut(&entity) {
            player.die();
            if Some(entity) == self.local_player {
                self.deaths += 1;
                self.set_player_property(DEATHS_KEY, self.deaths);
                info!(deaths = self.deaths, "Local player died");
                self.events.push(GameEvent::ScoreChanged {
                    kills: self.kills,
                    deaths: self.deaths,
                });
                self.events.push(GameEvent::LocalPlayerDied);
            }
            return;
        }
        if let Some(target) = self.targets.get_mut(&entity) {
            target.die();
            if target.is_mine() {
                let (dead, cooldown) = self.spawner.on_target_death(entity);
                self.send(Target::Others, Rpc::SyncTargets { dead, cooldown });
            }
        }
    }

    // Weapons

    /// Pulls the trigger of the local player's weapon.
    pub fn fire(&mut self) -> Option<FireResult> {
        if !self.in_play() {
            return None;
        }
        let id = self.local_player?;
        let player = self.players.get_mut(&id)?;
        if !player.health().is_alive() {
            return None;
        }
        let result = player.arsenal_mut().fire();
        let (eye, aim, muzzle, rotations) =
            (player.eye(), player.aim(), player.muzzle(), player.rotations());

        match result {
            FireResult::Fired(mode) => {
                match mode {
                    FireMode::Hitscan => self.shoot_ray(id, eye + aim * RAY_OFFSET, aim),
                    FireMode::Rocket => self.launch_rocket(eye + aim, rotations),
                    FireMode::MuzzleRocket => {
                        self.launch_rocket(muzzle, rotations);
                        self.send(Target::All, Rpc::StartReload { entity: id });
                    }
                }
                self.events.push(GameEvent::Shot { entity: id });
                self.send(Target::Others, Rpc::ShowShot { entity: id });
            }
            FireResult::Reloading => {
                self.events.push(GameEvent::Reload { entity: id });
                self.send(Target::Others, Rpc::StartReload { entity: id });
            }
            FireResult::Blocked => {}
        }
        Some(result)
    }

    fn shoot_ray(&mut self, shooter: EntityId, origin: Vec3, dir: Vec3) {
        let Some(hit) = self.physics.raycast(origin, dir, MAX_RANGE, Some(shooter)) else {
            return;
        };
        if self.is_damageable(hit.entity) {
            self.add_damage(hit.entity, HITSCAN_DAMAGE);
        }
    }

    fn launch_rocket(&mut self, position: Vec3, rotations: Vec2) {
        let id = self.allocate_id();
        let mut rocket = match Rocket::new(
            id,
            self.me,
            position,
            rotations,
            self.cfg.sync.rocket_buffer,
            self.warp,
        ) {
            Ok(rocket) => rocket,
            Err(err) => {
                warn!(%err, "Failed to create rocket");
                return;
            }
        };
        rocket.launch();
        self.physics.upsert_body(id, rocket.body());
        self.rockets.insert(id, rocket);
        debug!(entity = %id, "Rocket launched");
        self.send(
            Target::Others,
            Rpc::Spawn {
                entity: id,
                kind: EntityKind::Rocket,
                position,
                rotations,
            },
        );
    }

    pub(super) fn explode(&mut self, id: EntityId) {
        let Some(rocket) = self.rockets.get_mut(&id) else {
            return;
        };
        if !rocket.is_mine() || !rocket.mark_exploded() {
            return;
        }
        let position = rocket.position();
        self.events.push(GameEvent::Explosion {
            position,
            radius: EXPLOSION_RADIUS,
        });
        self.send(
            Target::Others,
            Rpc::ShowExplosion {
                position,
                radius: EXPLOSION_RADIUS,
            },
        );

        for overlap in self.physics.overlap_sphere(position, EXPLOSION_RADIUS) {
            if !self.is_damageable(overlap.entity) {
                continue;
            }
            let distance = overlap.closest.distance(position);
            let damage = splash_damage(MAX_SPLASH_DAMAGE, EXPLOSION_RADIUS, distance);
            if damage > 0 {
                self.add_damage(overlap.entity, damage);
            }
        }

        self.send(Target::Others, Rpc::Despawn { entity: id });
        self.rockets.remove(&id);
        self.physics.remove_body(id);
    }

    fn in_play(&self) -> bool {
        self.round.state() == RoundState::Running
    }

    pub fn reload(&mut self) -> bool {
        if !self.in_play() {
            return false;
        }
        let Some(id) = self.local_player else {
            return false;
        };
        let started = self
            .players
            .get_mut(&id)
            .is_some_and(|p| p.health().is_alive() && p.arsenal_mut().reload());
        if started {
            self.events.push(GameEvent::Reload { entity: id });
            self.send(Target::Others, Rpc::StartReload { entity: id });
        }
        started
    }

    pub fn jump(&mut self) -> bool {
        if !self.in_play() {
            return false;
        }
        let Some(id) = self.local_player else {
            return false;
        };
        match self.players.get_mut(&id) {
            Some(player) => player.jump(self.physics.as_mut()),
            None => false,
        }
    }

    /// Returns `Ok(false)` when the weapon was already equipped or the round
    /// is not running.
    pub fn change_weapon(&mut self, weapon: u8) -> Result<bool, WeaponError> {
        if !self.in_play() {
            return Ok(false);
        }
        let Some(id) = self.local_player else {
            return Ok(false);
        };
        let Some(player) = self.players.get_mut(&id) else {
            return Ok(false);
        };
        let changed = player.arsenal_mut().set_weapon(weapon)?;
        if changed {
            debug!(weapon, "Weapon changed");
            self.send(Target::Others, Rpc::ChangeWeapon { entity: id, weapon });
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        input::InputFrame,
        player::MAX_HEALTH,
        session::tests::{deliver, my_player_id, peer, sent, session},
        target::TARGET_HEALTH,
        weapons::DEFAULT_WEAPON,
    };
    use arena_shared::{net::NetMsg, physics::ContactEvent};

    #[test]
    fn trusted_death_is_synced_to_newcomers_as_dead() {
        let mut s = session(1, &[1, 2]);
        let me = my_player_id(&s);
        s.handle(deliver(
            2,
            Rpc::Damage {
                entity: me,
                amount: 10,
                alive: false,
            },
        ));
        let health = s.local_player().unwrap().health();
        assert!(!health.is_alive());
        assert!(health.current() <= 0);

        s.handle(NetMsg::PeerLeft {
            peer: PeerId(2),
            master: PeerId(1),
        });
        s.drain_outbox();
        s.handle(NetMsg::PeerJoined(peer(3)));
        let synced: Vec<i32> = sent(&s.drain_outbox())
            .into_iter()
            .filter_map(|(t, r)| match r {
                Rpc::SyncState { health, .. } if t == Target::Peer(PeerId(3)) => Some(health),
                _ => None,
            })
            .collect();
        assert_eq!(synced.len(), 1);
        assert!(synced[0] <= 0, "dead owner synced as {}", synced[0]);
    }

    #[test]
    fn controls_are_inert_before_the_round_runs() {
        let mut s = session(2, &[1, 2]);
        assert_eq!(s.round().state(), RoundState::ReadyToStart);
        assert!(s.local_player().is_some());
        s.drain_outbox();

        assert_eq!(s.change_weapon(1), Ok(false));
        assert!(!s.reload());
        assert!(!s.jump());
        assert!(s.fire().is_none());
        assert!(!sent(&s.drain_outbox())
            .iter()
            .any(|(_, r)| matches!(r, Rpc::ChangeWeapon { .. } | Rpc::StartReload { .. })));
    }

    #[test]
    fn remote_kill_credits_the_attacker_once() {
        let mut s = session(1, &[1, 2]);
        let me = my_player_id(&s);
        s.drain_outbox();
        s.drain_events();

        let hit = Rpc::Damage {
            entity: me,
            amount: MAX_HEALTH,
            alive: true,
        };
        s.handle(deliver(2, hit.clone()));
        s.handle(deliver(2, hit));

        assert_eq!(s.deaths(), 1);
        assert!(!s.local_player().unwrap().health().is_alive());
        let credits: Vec<_> = sent(&s.drain_outbox())
            .into_iter()
            .filter(|(_, r)| *r == Rpc::KillCredit)
            .collect();
        assert_eq!(credits, vec![(Target::Peer(PeerId(2)), Rpc::KillCredit)]);
        let events = s.drain_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == GameEvent::LocalPlayerDied)
                .count(),
            1
        );
    }

    #[test]
    fn owned_target_kill_scores_locally() {
        let mut s = session(1, &[1, 2]);
        let target = s.targets().next().unwrap().id();
        s.drain_outbox();

        assert_eq!(s.add_damage(target, 10), DamageOutcome::Survived);
        assert_eq!(
            s.add_damage(target, TARGET_HEALTH),
            DamageOutcome::Killed
        );
        assert_eq!(s.add_damage(target, 1), DamageOutcome::Ignored);
        assert_eq!(s.kills(), 1);
        assert_eq!(s.spawner().queued(), vec![target]);

        let rpcs = sent(&s.drain_outbox());
        assert!(rpcs.contains(&(
            Target::Others,
            Rpc::Damage {
                entity: target,
                amount: TARGET_HEALTH,
                alive: false
            }
        )));
        assert!(rpcs
            .iter()
            .any(|(_, r)| matches!(r, Rpc::SyncTargets { dead, .. } if dead == &vec![target])));
    }

    #[test]
    fn fireball_launches_a_rocket_and_reloads() {
        let mut s = session(1, &[1, 2]);
        let me = my_player_id(&s);
        assert_eq!(
            s.local_player().unwrap().arsenal().current().id,
            DEFAULT_WEAPON
        );
        s.drain_outbox();

        assert_eq!(s.fire(), Some(FireResult::Fired(FireMode::MuzzleRocket)));
        assert_eq!(s.rockets().count(), 1);
        assert!(s.local_player().unwrap().arsenal().is_reloading());
        assert_eq!(s.fire(), Some(FireResult::Blocked));

        let rpcs = sent(&s.drain_outbox());
        assert!(rpcs.contains(&(Target::Others, Rpc::StartReload { entity: me })));
        assert!(rpcs.iter().any(|(t, r)| *t == Target::Others
            && matches!(r, Rpc::Spawn { kind: EntityKind::Rocket, .. })));
        assert!(rpcs.contains(&(Target::Others, Rpc::ShowShot { entity: me })));
    }

    #[test]
    fn rocket_explodes_once_and_despawns() {
        let mut s = session(1, &[1, 2]);
        s.fire();
        let rocket = s.rockets().next().unwrap().id();
        s.drain_outbox();

        s.on_contact(ContactEvent::Impact(rocket));
        s.on_contact(ContactEvent::Impact(rocket));
        assert_eq!(s.rockets().count(), 0);

        let rpcs = sent(&s.drain_outbox());
        let explosions = rpcs
            .iter()
            .filter(|(_, r)| matches!(r, Rpc::ShowExplosion { .. }))
            .count();
        assert_eq!(explosions, 1);
        assert!(rpcs.contains(&(Target::Others, Rpc::Despawn { entity: rocket })));
    }

    #[test]
    fn hitscan_damages_the_first_body_on_the_ray() {
        let mut s = session(1, &[1, 2]);
        let origin = s.local_player().unwrap().position();
        let enemy = EntityId::new(PeerId(2), 1);
        s.handle(deliver(
            2,
            Rpc::Spawn {
                entity: enemy,
                kind: EntityKind::Player,
                position: origin + Vec3::new(0.0, 0.0, 10.0),
                rotations: Vec2::ZERO,
            },
        ));
        s.tick(100.0, 0.0, &InputFrame::default());
        assert_eq!(s.change_weapon(1), Ok(true));
        s.drain_outbox();

        assert_eq!(s.fire(), Some(FireResult::Fired(FireMode::Hitscan)));
        assert_eq!(s.player(enemy).unwrap().health().current(), MAX_HEALTH - 1);
        assert!(sent(&s.drain_outbox()).contains(&(
            Target::Others,
            Rpc::Damage {
                entity: enemy,
                amount: 1,
                alive: true
            }
        )));
    }
}
