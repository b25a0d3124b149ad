//! Presentation events.
//!
//! The gameplay core never talks to the renderer or the HUD directly. It
//! queues [`GameEvent`]s which the front end drains once per frame.

use crate::{
    math::Vec3,
    net::{EntityId, PeerId},
};

/// Something the front end should show or play.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Hit particle at a damaged entity.
    Hit { entity: EntityId, position: Vec3 },
    /// Muzzle flash / shoot animation on a player.
    Shot { entity: EntityId },
    /// Reload animation on a player.
    Reload { entity: EntityId },
    Explosion { position: Vec3, radius: f32 },
    LocalPlayerDied,
    LocalPlayerBorn { position: Vec3 },
    ScoreChanged { kills: i64, deaths: i64 },
    RoundStarted { seconds_left: i32 },
    RoundFinished(RoundResults),
}

/// Final table shown when a round is over.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResults {
    pub rows: Vec<ResultRow>,
    /// Nobody scored more kills than the local player.
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub peer: PeerId,
    pub name: String,
    pub kills: i64,
    pub deaths: i64,
}

/// FIFO of events produced during a tick.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    /// Pushes an event into the queue.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Drains all queued events.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
