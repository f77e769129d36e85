use shared::{DEFAULT_COUNTDOWN, DEFAULT_PORT, DEFAULT_TICK_RATE, DEFAULT_WIN_SCORE};
use std::time::Duration;

/// Match rules and pacing shared by every session's game loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Simulation and broadcast ticks per second
    pub tick_rate: u32,
    /// Score that ends the match
    pub win_score: u32,
    /// First value of the pre-match countdown
    pub countdown_from: u8,
    /// Delay between countdown steps
    pub countdown_interval: Duration,
    /// End the match in favour of the remaining peer when the other leaves
    pub forfeit_on_leave: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            win_score: DEFAULT_WIN_SCORE,
            countdown_from: DEFAULT_COUNTDOWN,
            countdown_interval: Duration::from_secs(1),
            forfeit_on_leave: false,
        }
    }
}

impl GameConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
