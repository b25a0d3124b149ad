//! `arena_client`
//!
//! Peer-side systems:
//! - Snapshot interpolation with adaptive time-warp (`sync`)
//! - Authority-gated networked entities: players, rockets, test targets
//! - Two-path damage reconciliation and the round state machine
//! - Master-owned timers: target respawn queue, bonuses
//! - The `Session` orchestrator and the networked `GameClient`

pub mod bonus;
pub mod client;
pub mod damage;
pub mod entity;
pub mod hazard;
pub mod input;
pub mod player;
pub mod rocket;
pub mod round;
pub mod session;
pub mod sync;
pub mod target;
pub mod weapons;

pub use client::GameClient;
pub use session::{RoomSnapshot, Session};
