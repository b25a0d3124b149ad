//! Bonus pickups: the master grants, the consumer applies the reward.

use arena_shared::net::{BonusKind, PeerId, Rpc, Target};
use tracing::{debug, info};

use super::{sync_state_rpc, Session};
use crate::{bonus::HEALTH_BONUS_DIVISOR, entity::Damageable};

impl Session {
    pub(super) fn broadcast_bonuses(&mut self) {
        self.send(
            Target::Others,
            Rpc::SyncBonuses {
                slots: self.bonuses.snapshot(),
                countdown: self.bonuses.countdown(),
            },
        );
    }

    pub(super) fn on_consume_bonus(&mut self, slot: usize, consumer: PeerId) {
        if !self.is_master() {
            return;
        }
        let Some(bonus) = self.bonuses.grant(slot) else {
            debug!(slot, consumer = %consumer, "Bonus already taken");
            return;
        };
        info!(slot, ?bonus, consumer = %consumer, "Bonus granted");
        self.send(Target::Peer(consumer), Rpc::AddReward { bonus });
        self.broadcast_bonuses();
    }

    pub(super) fn add_reward(&mut self, bonus: BonusKind) {
        let Some(id) = self.local_player else {
            return;
        };
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        match bonus {
            BonusKind::Health => {
                let amount = player.health().max() / HEALTH_BONUS_DIVISOR;
                player.health_mut().heal(amount);
                let rpc = sync_state_rpc(player);
                self.send(Target::Others, rpc);
            }
            BonusKind::Bullets => player.arsenal_mut().refill(),
        }
    }
}
