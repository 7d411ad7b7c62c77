use crate::room::RoomSettings;
use clap::Parser;
use shared::MATCH_DURATION_SECS;
use std::time::Duration;

/// Authoritative match server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Network ticks per second; physics always steps at 60 Hz
    #[arg(short, long, default_value = "60")]
    pub tick_rate: u32,

    /// Maximum concurrent sessions across all rooms
    #[arg(short, long, default_value = "32")]
    pub max_clients: usize,

    /// Humans per room
    #[arg(long, default_value = "4")]
    pub room_capacity: usize,

    /// Simulation speed multiplier, for tests and debugging
    #[arg(long, default_value = "1.0")]
    pub time_scale: f32,

    /// Match length in seconds
    #[arg(long, default_value_t = MATCH_DURATION_SECS)]
    pub match_duration: f32,

    /// Seconds a finished room lingers before it is torn down
    #[arg(long, default_value = "5")]
    pub end_grace_secs: u64,

    /// Seconds an unused duplicate room survives
    #[arg(long, default_value = "10")]
    pub duplicate_grace_secs: u64,

    /// Seconds of silence before a session is dropped
    #[arg(long, default_value = "5")]
    pub session_timeout_secs: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            match_duration: self.match_duration,
            time_scale: self.time_scale,
            capacity: self.room_capacity.max(2),
            end_grace: Duration::from_secs(self.end_grace_secs),
            duplicate_grace: Duration::from_secs(self.duplicate_grace_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["server"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.match_duration, MATCH_DURATION_SECS);
        assert_eq!(config.session_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_room_settings_from_flags() {
        let config = ServerConfig::parse_from([
            "server",
            "--time-scale",
            "4",
            "--match-duration",
            "30",
            "--end-grace-secs",
            "2",
            "--room-capacity",
            "1",
        ]);
        let settings = config.room_settings();
        assert_eq!(settings.time_scale, 4.0);
        assert_eq!(settings.match_duration, 30.0);
        assert_eq!(settings.end_grace, Duration::from_secs(2));
        assert_eq!(settings.capacity, 2);
    }

    #[test]
    fn test_tick_duration() {
        let config = ServerConfig::parse_from(["server", "--tick-rate", "50"]);
        assert_eq!(config.tick_duration(), Duration::from_millis(20));
    }
}
