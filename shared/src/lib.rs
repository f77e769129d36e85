use serde::{Deserialize, Serialize};

pub mod codec;

pub use codec::{encode_frame, read_frame, write_frame, ProtocolError, MAX_FRAME_LEN};

pub const FIELD_WIDTH: i32 = 800;
pub const FIELD_HEIGHT: i32 = 600;
pub const PADDLE_WIDTH: i32 = 10;
pub const PADDLE_HEIGHT: i32 = 100;
pub const BALL_SIZE: i32 = 15;
pub const PADDLE_SPEED: i32 = 7;
pub const BALL_SPEED: i32 = 5;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_WIN_SCORE: u32 = 10;
pub const DEFAULT_COUNTDOWN: u8 = 3;

/// Paddle movement requested by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Stop,
}

impl Direction {
    /// Vertical step sign applied to the paddle each tick (screen y grows downward).
    pub fn delta(self) -> i8 {
        match self {
            Direction::Up => -1,
            Direction::Down => 1,
            Direction::Stop => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    Search,
    Ready,
    Reset,
    Move(Direction),
}

/// Lifecycle stage of a peer within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Searching,
    Ready,
    Countdown,
    Playing,
    Finished,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    Win,
    Lose,
    /// The other peer left before the match was decided.
    OpponentLeft,
}

/// Authoritative simulation state as sent to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub paddle1_y: i32,
    pub paddle2_y: i32,
    pub ball_x: i32,
    pub ball_y: i32,
    pub ball_dx: i32,
    pub ball_dy: i32,
    pub score1: u32,
    pub score2: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent outside active play, individualized per peer.
    Phase {
        state: Phase,
        partner_ready: bool,
        countdown: u8,
    },
    /// Sent once when the countdown completes.
    Started { game_state: GameSnapshot },
    /// Sent every tick while playing.
    Snapshot(GameSnapshot),
    Finished { result: MatchResult },
}

impl ServerMessage {
    /// The phase a client should display after receiving this message.
    pub fn phase(&self) -> Phase {
        match self {
            ServerMessage::Phase { state, .. } => *state,
            ServerMessage::Started { .. } | ServerMessage::Snapshot(_) => Phase::Playing,
            ServerMessage::Finished { .. } => Phase::Finished,
        }
    }
}
