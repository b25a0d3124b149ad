//! Configuration system.
//!
//! Loads arena configuration from JSON strings/files (file IO left to app).
//! Every field has a default so partial documents are accepted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Relay address, e.g. `127.0.0.1:40000`.
    #[serde(default = "default_relay_addr")]
    pub relay_addr: String,
    /// Fixed simulation/render tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// How often owned entities push their pose into the state stream.
    #[serde(default = "default_send_rate_hz")]
    pub send_rate_hz: u32,
    /// Player nickname.
    #[serde(default = "default_player_name")]
    pub player_name: String,
    /// Peers admitted to one room by the relay.
    #[serde(default = "default_max_peers")]
    pub max_peers: u32,
    #[serde(default)]
    pub round: RoundConfig,
    #[serde(default)]
    pub sync: SyncTuning,
}

/// Round rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Connected players needed before the round may start.
    pub max_players: u32,
    /// Round duration in seconds.
    pub round_time: f32,
    /// Test targets spawned by the master when the first round starts.
    pub target_count: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            max_players: 2,
            round_time: 60.0,
            target_count: 3,
        }
    }
}

/// Interpolation buffer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncTuning {
    pub player_buffer: usize,
    pub rocket_buffer: usize,
    pub target_buffer: usize,
    /// Playback speed-up applied while virtual time lags the window.
    pub acceleration: f64,
    /// Playback slow-down applied while virtual time runs ahead.
    pub deceleration: f64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            player_buffer: 5,
            rocket_buffer: 2,
            target_buffer: 5,
            acceleration: 1.25,
            deceleration: 0.75,
        }
    }
}

fn default_relay_addr() -> String {
    "127.0.0.1:40000".to_string()
}

fn default_tick_hz() -> u32 {
    60
}

fn default_send_rate_hz() -> u32 {
    20
}

fn default_player_name() -> String {
    "default player".to_string()
}

fn default_max_peers() -> u32 {
    2
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            relay_addr: default_relay_addr(),
            tick_hz: default_tick_hz(),
            send_rate_hz: default_send_rate_hz(),
            player_name: default_player_name(),
            max_peers: default_max_peers(),
            round: RoundConfig::default(),
            sync: SyncTuning::default(),
        }
    }
}

impl ArenaConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Rejects configurations the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.send_rate_hz == 0 {
            return Err(ConfigError::ZeroSendRate);
        }
        if self.max_peers == 0 {
            return Err(ConfigError::ZeroPeers);
        }
        if self.round.max_players == 0 || self.round.max_players > self.max_peers {
            return Err(ConfigError::InvalidMaxPlayers(self.round.max_players));
        }
        if !(self.round.round_time > 0.0) {
            return Err(ConfigError::InvalidRoundTime);
        }
        self.sync.validate()
    }
}

impl SyncTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for capacity in [self.player_buffer, self.rocket_buffer, self.target_buffer] {
            if capacity < 2 {
                return Err(ConfigError::BufferTooSmall(capacity));
            }
        }
        if !(self.acceleration >= 1.0) || !(self.deceleration > 0.0 && self.deceleration <= 1.0) {
            return Err(ConfigError::InvalidWarp);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroTickRate,
    ZeroSendRate,
    ZeroPeers,
    InvalidMaxPlayers(u32),
    InvalidRoundTime,
    BufferTooSmall(usize),
    InvalidWarp,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickRate => write!(f, "tick_hz must be positive"),
            ConfigError::ZeroSendRate => write!(f, "send_rate_hz must be positive"),
            ConfigError::ZeroPeers => write!(f, "max_peers must be positive"),
            ConfigError::InvalidMaxPlayers(n) => {
                write!(f, "round.max_players {} must be in 1..=max_peers", n)
            }
            ConfigError::InvalidRoundTime => write!(f, "round.round_time must be positive"),
            ConfigError::BufferTooSmall(n) => {
                write!(f, "sync buffer capacity {} is below the minimum of 2", n)
            }
            ConfigError::InvalidWarp => write!(
                f,
                "sync warp factors need acceleration >= 1 and 0 < deceleration <= 1"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ArenaConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = ArenaConfig::from_json_str(r#"{ "player_name": "rex", "tick_hz": 30 }"#)
            .unwrap();
        assert_eq!(cfg.player_name, "rex");
        assert_eq!(cfg.tick_hz, 30);
        assert_eq!(cfg.send_rate_hz, 20);
        assert_eq!(cfg.sync.player_buffer, 5);
        assert_eq!(cfg.round.max_players, 2);
    }

    #[test]
    fn tiny_buffer_is_rejected() {
        let mut cfg = ArenaConfig::default();
        cfg.sync.rocket_buffer = 1;
        assert_eq!(cfg.validate(), Err(ConfigError::BufferTooSmall(1)));
    }

    #[test]
    fn inverted_warp_is_rejected() {
        let mut cfg = ArenaConfig::default();
        cfg.sync.acceleration = 0.5;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidWarp));
    }

    #[test]
    fn more_players_than_room_is_rejected() {
        let mut cfg = ArenaConfig::default();
        cfg.round.max_players = 3;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidMaxPlayers(3)));
    }
}
