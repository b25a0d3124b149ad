//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! Define traits that a renderer implementation would satisfy.

use crate::{
    event::GameEvent,
    math::{Vec2, Vec3},
    net::{EntityId, EntityKind},
};

/// What the renderer needs to draw one entity this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityView {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec3,
    pub rotations: Vec2,
    pub animation: u8,
    pub visible: bool,
    /// Owned by this peer (first-person body hidden, nameplate off).
    pub local: bool,
}

/// A minimal presentation API.
pub trait Presenter {
    fn begin_frame(&mut self);
    fn present_entity(&mut self, view: &EntityView);
    fn play_event(&mut self, event: &GameEvent);
    fn end_frame(&mut self);
}

/// A no-op presenter useful for headless runs.
#[derive(Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn begin_frame(&mut self) {}
    fn present_entity(&mut self, _view: &EntityView) {}
    fn play_event(&mut self, _event: &GameEvent) {}
    fn end_frame(&mut self) {}
}
