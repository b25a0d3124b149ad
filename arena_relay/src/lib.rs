//! `arena_relay`
//!
//! Minimal managed relay for arena peers:
//! - One room with a configurable peer limit
//! - Master designation (lowest connected id)
//! - RPC and state forwarding stamped with the relay clock
//! - Room and player property store with change broadcasts

pub mod relay;
pub mod room;

pub use relay::{bind_ephemeral, Relay};
pub use room::{JoinError, Room};
