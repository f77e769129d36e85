//! Headless peer that searches, readies up and plays matches against the server.
//!
//! The server never tells a peer which paddle it controls, so the bot finds
//! out by nudging its paddle in a random direction and watching which paddle
//! follows.

use clap::Parser;
use log::{debug, info, warn};
use rand::Rng;
use shared::{
    read_frame, write_frame, ClientMessage, Direction, GameSnapshot, MatchResult, Phase,
    ServerMessage, BALL_SIZE, PADDLE_HEIGHT,
};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;

/// Snapshots to wait after a nudge before judging which paddle moved
const PROBE_TICKS: u32 = 10;

/// Distance from the paddle centre within which the bot holds still
const DEAD_ZONE: i32 = 10;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3001")]
    server: String,

    /// Chance per tick that the bot ignores the ball
    #[arg(short, long, default_value = "0.1")]
    miss_chance: f64,

    /// Number of matches to play before exiting
    #[arg(short = 'n', long, default_value = "1")]
    matches: u32,
}

struct Probe {
    delta: i8,
    before: GameSnapshot,
    waited: u32,
}

struct Bot {
    miss_chance: f64,
    side: Option<usize>,
    probe: Option<Probe>,
    heading: Direction,
    sent_ready: bool,
}

impl Bot {
    fn new(miss_chance: f64) -> Self {
        Self {
            miss_chance: miss_chance.clamp(0.0, 1.0),
            side: None,
            probe: None,
            heading: Direction::Stop,
            sent_ready: false,
        }
    }

    fn reset(&mut self) {
        self.side = None;
        self.probe = None;
        self.heading = Direction::Stop;
        self.sent_ready = false;
    }

    /// Picks a random nudge to learn which paddle is ours.
    fn start_probe(&mut self, from: GameSnapshot) -> Direction {
        let direction = if rand::thread_rng().gen_bool(0.5) {
            Direction::Up
        } else {
            Direction::Down
        };
        self.probe = Some(Probe {
            delta: direction.delta(),
            before: from,
            waited: 0,
        });
        direction
    }

    /// Returns the paddle that moved with our nudge, if only one did.
    fn resolve_probe(probe: &Probe, now: &GameSnapshot) -> Option<usize> {
        let moved = [
            (now.paddle1_y - probe.before.paddle1_y).signum(),
            (now.paddle2_y - probe.before.paddle2_y).signum(),
        ];
        let ours: Vec<usize> = (0..2)
            .filter(|&i| moved[i] == i32::from(probe.delta))
            .collect();
        match ours.as_slice() {
            [side] => Some(*side),
            _ => None,
        }
    }

    /// Chooses the next direction for a snapshot.
    fn steer(&mut self, snapshot: &GameSnapshot) -> Direction {
        let Some(side) = self.side else {
            return match self.probe.as_mut() {
                None => self.start_probe(*snapshot),
                Some(probe) => {
                    probe.waited += 1;
                    if probe.waited < PROBE_TICKS {
                        return self.heading;
                    }
                    match Self::resolve_probe(probe, snapshot) {
                        Some(side) => {
                            info!("Controlling paddle {}", side + 1);
                            self.side = Some(side);
                            self.probe = None;
                            Direction::Stop
                        }
                        None => self.start_probe(*snapshot),
                    }
                }
            };
        };

        if rand::thread_rng().gen_bool(self.miss_chance) {
            return self.heading;
        }

        let paddle_y = if side == 0 {
            snapshot.paddle1_y
        } else {
            snapshot.paddle2_y
        };
        let paddle_centre = paddle_y + PADDLE_HEIGHT / 2;
        let ball_centre = snapshot.ball_y + BALL_SIZE / 2;

        if ball_centre < paddle_centre - DEAD_ZONE {
            Direction::Up
        } else if ball_centre > paddle_centre + DEAD_ZONE {
            Direction::Down
        } else {
            Direction::Stop
        }
    }

    /// Reacts to one server message. Returns the match result once finished.
    async fn handle<W>(
        &mut self,
        writer: &mut W,
        message: ServerMessage,
    ) -> Result<Option<MatchResult>, Box<dyn std::error::Error>>
    where
        W: AsyncWrite + Unpin,
    {
        match message {
            ServerMessage::Phase {
                state,
                partner_ready,
                countdown,
            } => {
                debug!(
                    "Phase {:?} (partner ready: {}, countdown: {})",
                    state, partner_ready, countdown
                );
                if state == Phase::Ready && !self.sent_ready {
                    info!("Opponent found, sending ready");
                    write_frame(writer, &ClientMessage::Ready).await?;
                    self.sent_ready = true;
                }
            }
            ServerMessage::Started { game_state } => {
                info!("Match started");
                let direction = self.start_probe(game_state);
                self.send_heading(writer, direction).await?;
            }
            ServerMessage::Snapshot(snapshot) => {
                let direction = self.steer(&snapshot);
                self.send_heading(writer, direction).await?;
            }
            ServerMessage::Finished { result } => return Ok(Some(result)),
        }
        Ok(None)
    }

    /// Sends a move only when the heading changes.
    async fn send_heading<W>(
        &mut self,
        writer: &mut W,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        W: AsyncWrite + Unpin,
    {
        if direction != self.heading {
            write_frame(writer, &ClientMessage::Move(direction)).await?;
            self.heading = direction;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    stream.set_nodelay(true)?;
    info!("Connected to {}", args.server);

    let (mut reader, mut writer) = stream.into_split();
    let mut bot = Bot::new(args.miss_chance);
    let mut record = (0u32, 0u32);

    for round in 1..=args.matches {
        info!("Searching for match {}/{}", round, args.matches);
        bot.reset();
        write_frame(&mut writer, &ClientMessage::Search).await?;

        let result = loop {
            match read_frame::<_, ServerMessage>(&mut reader).await {
                Ok(Some(message)) => {
                    if let Some(result) = bot.handle(&mut writer, message).await? {
                        break result;
                    }
                }
                Ok(None) => {
                    warn!("Server closed the connection");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => warn!("Skipping unreadable message: {}", e),
                Err(e) => return Err(e.into()),
            }
        };

        match result {
            MatchResult::Win | MatchResult::OpponentLeft => record.0 += 1,
            MatchResult::Lose => record.1 += 1,
        }
        info!("Match {} result: {:?}", round, result);

        write_frame(&mut writer, &ClientMessage::Reset).await?;
    }

    info!("Finished: {} won, {} lost", record.0, record.1);
    Ok(())
}
