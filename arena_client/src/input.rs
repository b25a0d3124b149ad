//! Input handling.
//!
//! Device sampling lives in the front end. The gameplay core consumes one
//! [`InputFrame`] per tick.

use arena_shared::math::Vec2;

bitflags::bitflags! {
    /// Buttons held or pressed this tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u8 {
        const JUMP = 1 << 0;
        const FIRE = 1 << 1;
        const RELOAD = 1 << 2;
        const WEAPON1 = 1 << 3;
        const WEAPON2 = 1 << 4;
        const WEAPON3 = 1 << 5;
    }
}

/// User input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    /// Joystick/keys: `x` strafes right, `y` moves forward. Each in `[-1, 1]`.
    pub move_axis: Vec2,
    /// Look delta this tick: `x` turns right, `y` looks up.
    pub look_delta: Vec2,
    pub buttons: Buttons,
}

impl InputFrame {
    pub fn has_move(&self) -> bool {
        self.move_axis.len_sq() > 0.0
    }

    pub fn has_look(&self) -> bool {
        self.look_delta.len_sq() > 0.0
    }

    /// Weapon slot requested this tick, lowest slot wins.
    pub fn weapon_request(&self) -> Option<u8> {
        if self.buttons.contains(Buttons::WEAPON1) {
            Some(1)
        } else if self.buttons.contains(Buttons::WEAPON2) {
            Some(2)
        } else if self.buttons.contains(Buttons::WEAPON3) {
            Some(3)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weapon_buttons_map_to_slots() {
        let mut frame = InputFrame::default();
        assert_eq!(frame.weapon_request(), None);
        frame.buttons = Buttons::WEAPON3 | Buttons::FIRE;
        assert_eq!(frame.weapon_request(), Some(3));
        frame.buttons |= Buttons::WEAPON2;
        assert_eq!(frame.weapon_request(), Some(2));
    }

    #[test]
    fn idle_frame_has_no_motion() {
        let frame = InputFrame::default();
        assert!(!frame.has_move());
        assert!(!frame.has_look());
    }
}
