//! Snapshot interpolation.
//!
//! Owners stream poses at a coarse, irregular rate; the client renders at its
//! own rate. Each replicated entity owns one [`SyncBuffer`] which plays its
//! samples back on a virtual clock:
//!
//! - Samples queue in `pending` and are admitted into a window of at most
//!   `capacity` samples, sliding only once playback has passed `window[1]`.
//! - `update` advances the virtual clock and blends the pair of samples that
//!   brackets it.
//! - The advance is warped: when the bracketing sample sits early in the
//!   window playback is behind and speeds up, when it sits late playback is
//!   about to starve and slows down. This keeps virtual time hovering around
//!   the middle of the window.

use std::{collections::VecDeque, fmt};

use arena_shared::{
    config::SyncTuning,
    math::{lerp_degrees, Vec2, Vec3},
};

/// One timestamped pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSample {
    pub position: Vec3,
    pub rotations: Vec2,
    pub animation: u8,
    /// Shared-clock seconds.
    pub timestamp: f64,
}

/// Playback speed factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Warp {
    pub acceleration: f64,
    pub deceleration: f64,
}

impl Default for Warp {
    fn default() -> Self {
        Self {
            acceleration: 1.25,
            deceleration: 0.75,
        }
    }
}

impl From<&SyncTuning> for Warp {
    fn from(tuning: &SyncTuning) -> Self {
        Self {
            acceleration: tuning.acceleration,
            deceleration: tuning.deceleration,
        }
    }
}

/// Buffer construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    CapacityTooSmall(usize),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::CapacityTooSmall(n) => {
                write!(f, "sync buffer needs a capacity of at least 2, got {}", n)
            }
        }
    }
}

impl std::error::Error for SyncError {}

/// Bounded interpolation buffer for one entity.
#[derive(Debug, Clone)]
pub struct SyncBuffer {
    capacity: usize,
    warp: Warp,
    pending: VecDeque<StateSample>,
    window: VecDeque<StateSample>,
    virtual_time: Option<f64>,
    active: Option<StateSample>,

    position: Vec3,
    rotations: Vec2,
    animation: u8,
}

impl SyncBuffer {
    /// Creates an empty buffer. The window needs room for a bracketing pair.
    pub fn new(capacity: usize, warp: Warp) -> Result<Self, SyncError> {
        if capacity < 2 {
            return Err(SyncError::CapacityTooSmall(capacity));
        }
        Ok(Self {
            capacity,
            warp,
            pending: VecDeque::new(),
            window: VecDeque::with_capacity(capacity),
            virtual_time: None,
            active: None,
            position: Vec3::ZERO,
            rotations: Vec2::ZERO,
            animation: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Interpolated position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Interpolated yaw/pitch.
    pub fn rotations(&self) -> Vec2 {
        self.rotations
    }

    /// Animation code of the current interval.
    pub fn animation(&self) -> u8 {
        self.animation
    }

    /// Snaps the rotation output, e.g. after an authoritative correction.
    pub fn set_rotations(&mut self, rotations: Vec2) {
        self.rotations = rotations;
    }

    pub fn virtual_time(&self) -> Option<f64> {
        self.virtual_time
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops every sample and the playback clock. Required before reuse
    /// after a respawn so old targets do not blend into the new life.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.window.clear();
        self.virtual_time = None;
        self.active = None;
        self.rotations = Vec2::ZERO;
    }

    /// Queues a sample and admits what the window can take.
    pub fn add_new_state(&mut self, position: Vec3, rotations: Vec2, animation: u8, timestamp: f64) {
        self.pending.push_back(StateSample {
            position,
            rotations,
            animation,
            timestamp,
        });
        self.admit();
    }

    fn admit(&mut self) {
        while self.window.len() < self.capacity {
            match self.pending.pop_front() {
                Some(sample) => self.window.push_back(sample),
                None => return,
            }
        }

        let Some(time) = self.virtual_time else {
            return;
        };
        while self.window[1].timestamp < time {
            let Some(sample) = self.pending.pop_front() else {
                break;
            };
            self.window.pop_front();
            self.window.push_back(sample);
        }
    }

    fn present(&mut self, sample: StateSample) {
        self.position = sample.position;
        self.rotations = sample.rotations;
        self.animation = sample.animation;
    }

    /// Advances playback by `elapsed` wall seconds and refreshes the outputs.
    pub fn update(&mut self, elapsed: f64) {
        let Some(time) = self.virtual_time else {
            if let Some(first) = self.window.front().copied() {
                self.virtual_time = Some(first.timestamp);
                self.active = Some(first);
                self.present(first);
            }
            return;
        };

        // Interpolation starts once the window is full; until then the
        // seeded pose is held.
        if self.window.len() < self.capacity {
            return;
        }

        let next_time = time + elapsed;
        let last_slot = self.capacity - 1;
        // A slide may have evicted the previous lower bound.
        let oldest = self.window[0];
        let mut active = match self.active {
            Some(active) if active.timestamp >= oldest.timestamp => active,
            _ => oldest,
        };
        let mut next = None;
        let mut step = 0;
        while step < last_slot {
            let candidate = self.window[step + 1];
            step += 1;
            if candidate.timestamp > next_time {
                next = Some(candidate);
                break;
            }
            if step < last_slot {
                active = candidate;
            }
        }
        self.active = Some(active);

        let Some(next) = next else {
            // Starved: keep the clock running so the window can slide as soon
            // as data arrives, and hold the last pose meanwhile.
            self.virtual_time = Some(next_time);
            self.admit();
            return;
        };

        let interval = next.timestamp - active.timestamp;
        let mut delta = next_time - active.timestamp;
        let half = (self.capacity + 1) / 2;
        if step < half {
            delta *= self.warp.acceleration;
        } else if step > half {
            delta *= self.warp.deceleration;
        }

        let warped = (active.timestamp + delta).min(next.timestamp).max(time);
        self.virtual_time = Some(warped);

        let progress = if interval > 0.0 {
            ((warped - active.timestamp) / interval).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let t = progress as f32;

        self.position = active.position.lerp(next.position, t);
        self.rotations = Vec2::new(
            blend_axis(active.rotations.x, next.rotations.x, t),
            blend_axis(active.rotations.y, next.rotations.y, t),
        );
        self.animation = if progress > 0.0 {
            next.animation
        } else {
            active.animation
        };

        self.admit();
    }
}

fn blend_axis(from: f32, to: f32, t: f32) -> f32 {
    if from == to {
        from
    } else {
        lerp_degrees(from, to, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> SyncBuffer {
        SyncBuffer::new(capacity, Warp::default()).unwrap()
    }

    fn push_x(buf: &mut SyncBuffer, x: f32, t: f64) {
        buf.add_new_state(Vec3::new(x, 0.0, 0.0), Vec2::ZERO, 0, t);
    }

    #[test]
    fn capacity_below_two_fails_fast() {
        assert_eq!(
            SyncBuffer::new(1, Warp::default()).unwrap_err(),
            SyncError::CapacityTooSmall(1)
        );
        assert!(SyncBuffer::new(0, Warp::default()).is_err());
    }

    #[test]
    fn two_slot_midpoint_has_no_warp() {
        let mut buf = buffer(2);
        push_x(&mut buf, 0.0, 0.0);
        push_x(&mut buf, 10.0, 1.0);

        buf.update(0.0);
        assert_eq!(buf.position(), Vec3::ZERO);

        // Bracketing step 1 equals ceil(2 / 2): neither factor applies.
        buf.update(0.5);
        assert_eq!(buf.position(), Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(buf.virtual_time(), Some(0.5));
    }

    #[test]
    fn early_bracket_accelerates() {
        let mut buf = buffer(5);
        for i in 0..5 {
            push_x(&mut buf, i as f32 * 10.0, i as f64);
        }
        buf.update(0.0);
        buf.update(0.5);
        assert!((buf.position().x - 6.25).abs() < 1e-4);
        assert_eq!(buf.virtual_time(), Some(0.625));
    }

    #[test]
    fn late_bracket_decelerates() {
        let mut buf = buffer(5);
        for i in 0..5 {
            push_x(&mut buf, i as f32 * 10.0, i as f64);
        }
        buf.update(0.0);
        buf.update(3.5);
        // Bracket (t=3, t=4) found at step 4 > 3.
        assert!((buf.position().x - 33.75).abs() < 1e-4);
        assert_eq!(buf.virtual_time(), Some(3.375));
    }

    #[test]
    fn reset_then_single_sample_presents_it_exactly() {
        let mut buf = buffer(5);
        for i in 0..5 {
            push_x(&mut buf, i as f32, i as f64);
        }
        buf.update(0.0);
        buf.update(1.3);

        buf.reset();
        let pos = Vec3::new(4.0, 1.0, -2.0);
        let rot = Vec2::new(90.0, -10.0);
        buf.add_new_state(pos, rot, 3, 50.0);
        buf.update(0.0);

        assert_eq!(buf.position(), pos);
        assert_eq!(buf.rotations(), rot);
        assert_eq!(buf.animation(), 3);
        assert_eq!(buf.virtual_time(), Some(50.0));
    }

    #[test]
    fn single_sample_is_held() {
        let mut buf = buffer(2);
        push_x(&mut buf, 7.0, 1.0);
        buf.update(0.0);
        for _ in 0..10 {
            buf.update(0.1);
        }
        assert_eq!(buf.position(), Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn burst_never_overflows_window() {
        let mut buf = buffer(5);
        for i in 0..50 {
            push_x(&mut buf, i as f32, i as f64 * 0.05);
            assert!(buf.window_len() <= 5);
        }
        assert_eq!(buf.window_len(), 5);
        assert_eq!(buf.pending_len(), 45);

        buf.update(0.0);
        for _ in 0..200 {
            buf.update(0.05);
            assert!(buf.window_len() <= 5);
        }
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn starvation_holds_pose_then_recovers() {
        let mut buf = buffer(2);
        push_x(&mut buf, 0.0, 0.0);
        push_x(&mut buf, 10.0, 1.0);
        buf.update(0.0);
        buf.update(0.9);
        let held = buf.position();

        // Past the newest sample: clock keeps running, pose is held.
        buf.update(0.5);
        assert_eq!(buf.position(), held);
        assert!(buf.virtual_time().unwrap() > 1.0);

        push_x(&mut buf, 20.0, 2.0);
        assert_eq!(buf.pending_len(), 0, "window slides once data arrives");
        buf.update(0.1);
        assert!(buf.position().x > held.x);
        assert!(buf.position().x <= 20.0);
    }

    #[test]
    fn blend_stays_inside_bracketing_samples() {
        let mut buf = buffer(5);
        // Irregular spacing, alternating y, strictly increasing timestamps.
        let gaps = [0.05, 0.2, 0.01, 0.13, 0.3, 0.07, 0.02, 0.25, 0.11, 0.09];
        let steps = [0.016, 0.033, 0.008, 0.05, 0.016, 0.1];
        let mut t = 0.0;
        let mut last_x = f32::MIN;
        for (i, gap) in gaps.iter().cycle().take(60).enumerate() {
            t += gap;
            let y = if i % 2 == 0 { 1.0 } else { -1.0 };
            buf.add_new_state(Vec3::new(i as f32, y, 0.0), Vec2::ZERO, 0, t);
            buf.update(steps[i % steps.len()]);

            let pos = buf.position();
            assert!((-1.0..=1.0).contains(&pos.y), "overshoot in y: {pos:?}");
            assert!(pos.x >= last_x, "motion went backwards: {} < {}", pos.x, last_x);
            assert!(pos.x <= i as f32);
            last_x = pos.x;
        }
    }

    #[test]
    fn virtual_time_never_regresses() {
        let mut buf = buffer(5);
        for i in 0..5 {
            push_x(&mut buf, i as f32, i as f64);
        }
        buf.update(0.0);
        let mut last = buf.virtual_time().unwrap();
        for _ in 0..40 {
            buf.update(0.03);
            let now = buf.virtual_time().unwrap();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn yaw_wraps_the_short_way() {
        let mut buf = buffer(2);
        buf.add_new_state(Vec3::ZERO, Vec2::new(350.0, 0.0), 0, 0.0);
        buf.add_new_state(Vec3::ZERO, Vec2::new(10.0, 0.0), 0, 1.0);
        buf.update(0.0);
        buf.update(0.5);
        assert_eq!(buf.rotations().x, 0.0);
    }

    #[test]
    fn equal_axis_is_copied_untouched() {
        let mut buf = buffer(2);
        buf.add_new_state(Vec3::ZERO, Vec2::new(-30.0, 12.5), 0, 0.0);
        buf.add_new_state(Vec3::ZERO, Vec2::new(-30.0, 40.0), 0, 1.0);
        buf.update(0.0);
        buf.update(0.5);
        // Yaw unchanged stays exactly as sent, not re-wrapped.
        assert_eq!(buf.rotations().x, -30.0);
        assert!((buf.rotations().y - 26.25).abs() < 1e-4);
    }

    #[test]
    fn animation_steps_to_next_sample() {
        let mut buf = buffer(2);
        buf.add_new_state(Vec3::ZERO, Vec2::ZERO, 1, 0.0);
        buf.add_new_state(Vec3::ZERO, Vec2::ZERO, 5, 1.0);
        buf.update(0.0);
        assert_eq!(buf.animation(), 1);
        buf.update(0.0);
        assert_eq!(buf.animation(), 1, "no progress keeps the active code");
        buf.update(0.01);
        assert_eq!(buf.animation(), 5);
    }

    #[test]
    fn rotation_override_sticks_until_next_blend() {
        let mut buf = buffer(2);
        buf.set_rotations(Vec2::new(45.0, 5.0));
        assert_eq!(buf.rotations(), Vec2::new(45.0, 5.0));
        buf.reset();
        assert_eq!(buf.rotations(), Vec2::ZERO);
    }
}
