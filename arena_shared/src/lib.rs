//! `arena_shared`
//!
//! Shared libraries used by both the peer client and the relay.
//!
//! Design goals:
//! - Plain data types with explicit serialization for everything on the wire.
//! - Collaborators (physics, presentation) behind traits, injected by the app.
//! - No `unsafe`.

pub mod config;
pub mod event;
pub mod math;
pub mod net;
pub mod physics;
pub mod render;

