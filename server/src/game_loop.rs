//! Per-session game loop
//!
//! One task per paired session. It waits until both peers are seated, then
//! runs a fixed-rate tick that drives the phase machine:
//!
//! - searching, searching → ready, ready
//! - ready, ready with both flags set → countdown N..1 → playing
//! - playing → physics step and snapshot broadcast every tick
//! - a score reaching the win threshold → finished, session removed
//!
//! The loop never waits on client input; it samples the latest stored input
//! each tick. It ends when the match is decided or the session is vacated.

use crate::config::GameConfig;
use crate::game::GameState;
use crate::registry::SharedRegistry;
use crate::session::{Session, Side};
use log::{debug, info};
use shared::{MatchResult, Phase, ServerMessage};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

pub struct GameLoop {
    session: Arc<Session>,
    registry: SharedRegistry,
    config: Arc<GameConfig>,
    game: GameState,
}

/// Starts the game loop for a session that has just reached two peers.
pub fn spawn_game_loop(
    session: Arc<Session>,
    registry: SharedRegistry,
    config: Arc<GameConfig>,
) -> JoinHandle<()> {
    let game_loop = GameLoop::new(session, registry, config);
    tokio::spawn(game_loop.run())
}

impl GameLoop {
    pub fn new(session: Arc<Session>, registry: SharedRegistry, config: Arc<GameConfig>) -> Self {
        Self {
            session,
            registry,
            config,
            game: GameState::new(),
        }
    }

    pub async fn run(mut self) {
        let id = self.session.id();

        if !self.wait_for_peers().await {
            debug!("Session {} vacated before both peers were seated", id);
            self.finalize().await;
            return;
        }

        info!("Session {} game loop started", id);

        let mut ticker = interval(self.config.tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if self.session.is_closed() || self.session.connected_count() == 0 {
                debug!("Session {} vacated, stopping game loop", id);
                self.finalize().await;
                return;
            }

            if self.tick().await == Flow::Finished {
                self.finalize().await;
                return;
            }
        }
    }

    /// Blocks until both slots are connected. Returns false if the session
    /// emptied or was closed first.
    async fn wait_for_peers(&self) -> bool {
        let mut occupancy = self.session.subscribe_occupancy();
        loop {
            if self.session.is_closed() {
                return false;
            }
            match *occupancy.borrow_and_update() {
                0 => return false,
                2 => return true,
                _ => {}
            }
            if occupancy.changed().await.is_err() {
                return false;
            }
        }
    }

    /// One iteration of phase check, physics and broadcast.
    async fn tick(&mut self) -> Flow {
        let session = Arc::clone(&self.session);

        if self.config.forfeit_on_leave && session.connected_count() < 2 {
            self.forfeit();
            return Flow::Finished;
        }

        if session.phases() == [Phase::Searching, Phase::Searching] {
            session.set_phase(Phase::Ready);
            session.clear_ready();
            info!("Session {} is ready", session.id());
        }

        if session.phases() == [Phase::Ready, Phase::Ready]
            && session.is_ready(Side::Left)
            && session.is_ready(Side::Right)
        {
            self.run_countdown().await;
        }

        if !session.is_started() {
            session.broadcast_phases();
            return Flow::Continue;
        }

        let scorer = self.game.step(session.inputs());
        if let Some(side) = scorer {
            debug!(
                "Session {}: {:?} scored ({}-{})",
                session.id(),
                side,
                self.game.scores[0],
                self.game.scores[1]
            );
        }

        if let Some(winner) = self.game.winner(self.config.win_score) {
            self.announce_winner(winner);
            return Flow::Finished;
        }

        session.broadcast(&ServerMessage::Snapshot(self.game.snapshot()));

        if self.game.tick % 600 == 0 {
            debug!(
                "Session {} tick {}: score {}-{}",
                session.id(),
                self.game.tick,
                self.game.scores[0],
                self.game.scores[1]
            );
        }

        Flow::Continue
    }

    /// Counts down from the configured value, then starts play.
    async fn run_countdown(&mut self) {
        let session = Arc::clone(&self.session);
        info!("Session {} counting down", session.id());

        for seconds in (1..=self.config.countdown_from).rev() {
            session.set_countdown(seconds);
            session.set_phase(Phase::Countdown);
            session.broadcast_phases();
            sleep(self.config.countdown_interval).await;
        }

        session.set_phase(Phase::Playing);
        session.mark_started();
        session.broadcast(&ServerMessage::Started {
            game_state: self.game.snapshot(),
        });
        info!("Session {} started playing", session.id());
    }

    fn announce_winner(&self, winner: Side) {
        let session = &self.session;
        session.set_phase(Phase::Finished);
        for side in Side::BOTH {
            let result = if side == winner {
                MatchResult::Win
            } else {
                MatchResult::Lose
            };
            session.send_to(side, ServerMessage::Finished { result });
        }
        info!(
            "Session {} finished: {:?} won {}-{}",
            session.id(),
            winner,
            self.game.scores[0],
            self.game.scores[1]
        );
    }

    fn forfeit(&self) {
        let session = &self.session;
        session.set_phase(Phase::Finished);
        for side in Side::BOTH {
            session.send_to(
                side,
                ServerMessage::Finished {
                    result: MatchResult::OpponentLeft,
                },
            );
        }
        info!("Session {} ended: opponent left", session.id());
    }

    /// Removes the session from the registry; harmless if already removed.
    async fn finalize(&self) {
        let mut registry = self.registry.lock().await;
        registry.remove(self.session.id());
    }
}
