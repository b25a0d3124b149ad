//! Round lifecycle.

use arena_shared::config::RoundConfig;

/// Room property carrying the round start on the shared clock, in ms.
pub const START_TIME_KEY: &str = "startTime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    WaitingForPlayers,
    ReadyToStart,
    Running,
    Finished,
}

/// Timed round. Moves forward only, except for [`GameRound::on_player_want_repeat`].
#[derive(Debug, Clone)]
pub struct GameRound {
    max_players: u32,
    round_time: f32,
    start: f64,
    elapsed: f64,
    state: RoundState,
}

impl GameRound {
    pub fn new(cfg: &RoundConfig) -> Self {
        Self {
            max_players: cfg.max_players,
            round_time: cfg.round_time,
            start: 0.0,
            elapsed: 0.0,
            state: RoundState::WaitingForPlayers,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn round_time(&self) -> f32 {
        self.round_time
    }

    /// Start time in shared-clock seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn on_player_connected(&mut self, count: u32) {
        if self.state == RoundState::WaitingForPlayers && count == self.max_players {
            self.state = RoundState::ReadyToStart;
        }
    }

    /// Starts a ready round at `start_ms` on the shared clock. A start in the
    /// past leaves only the remainder of the round.
    pub fn on_game_started(&mut self, start_ms: i64, now: f64) {
        if self.state == RoundState::ReadyToStart {
            self.start = start_ms as f64 / 1000.0;
            self.elapsed = (now - self.start).max(0.0);
            self.state = RoundState::Running;
        }
    }

    /// Samples the clock; finishes the round once time is up.
    pub fn is_running(&mut self, now: f64) -> bool {
        self.elapsed = now - self.start;
        if self.state == RoundState::Running && self.elapsed >= self.round_time as f64 {
            self.state = RoundState::Finished;
        }
        self.state == RoundState::Running
    }

    pub fn seconds_left(&self) -> i32 {
        (self.round_time as f64 - self.elapsed) as i32
    }

    pub fn on_player_want_repeat(&mut self) {
        self.state = RoundState::WaitingForPlayers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round() -> GameRound {
        GameRound::new(&RoundConfig::default())
    }

    #[test]
    fn ready_only_at_max_players() {
        let mut r = round();
        r.on_player_connected(1);
        assert_eq!(r.state(), RoundState::WaitingForPlayers);
        r.on_player_connected(2);
        assert_eq!(r.state(), RoundState::ReadyToStart);
        r.on_player_connected(2);
        assert_eq!(r.state(), RoundState::ReadyToStart);
    }

    #[test]
    fn start_requires_ready() {
        let mut r = round();
        r.on_game_started(5_000, 5.0);
        assert_eq!(r.state(), RoundState::WaitingForPlayers);
        assert!(!r.is_running(6.0));
    }

    #[test]
    fn countdown_and_finish() {
        let mut r = round();
        r.on_player_connected(2);
        r.on_game_started(10_000, 10.0);
        assert_eq!(r.seconds_left(), 60);
        assert_eq!(r.start(), 10.0);

        assert!(r.is_running(25.5));
        assert_eq!(r.seconds_left(), 44);

        assert!(!r.is_running(70.0));
        assert_eq!(r.state(), RoundState::Finished);
        assert!(!r.is_running(71.0));
    }

    #[test]
    fn late_start_counts_down_from_the_shared_start() {
        let mut r = round();
        r.on_player_connected(2);
        r.on_game_started(50_000, 100.0);
        assert_eq!(r.state(), RoundState::Running);
        assert_eq!(r.seconds_left(), 10);
        assert!(r.is_running(105.0));
        assert_eq!(r.seconds_left(), 5);
    }

    #[test]
    fn want_repeat_goes_back_to_waiting() {
        let mut r = round();
        r.on_player_connected(2);
        r.on_game_started(0, 0.0);
        r.is_running(61.0);
        assert_eq!(r.state(), RoundState::Finished);

        r.on_player_want_repeat();
        assert_eq!(r.state(), RoundState::WaitingForPlayers);
        r.on_player_connected(2);
        r.on_game_started(100_000, 100.0);
        assert!(r.is_running(101.0));
    }
}
