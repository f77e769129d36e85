//! Integration tests for the match server
//!
//! These tests run a real server on an ephemeral port and drive it with
//! framed TCP clients, covering matchmaking, the ready/countdown handshake,
//! full matches and connection cleanup.

use server::config::{GameConfig, ServerConfig};
use server::network::Server;
use server::registry::SharedRegistry;
use shared::{
    read_frame, write_frame, ClientMessage, Direction, MatchResult, Phase, ServerMessage,
    FIELD_HEIGHT, FIELD_WIDTH, PADDLE_HEIGHT,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(10);

fn fast_config(win_score: u32) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        game: GameConfig {
            tick_rate: 1000,
            win_score,
            countdown_from: 3,
            countdown_interval: Duration::from_millis(20),
            forfeit_on_leave: false,
        },
    }
}

async fn start_server(config: ServerConfig) -> (SocketAddr, SharedRegistry) {
    let server = Server::new(config).await.expect("Failed to start server");
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(server.run());
    (addr, registry)
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr)
        .await
        .expect("Failed to connect to server")
}

async fn send(stream: &mut TcpStream, message: ClientMessage) {
    write_frame(stream, &message)
        .await
        .expect("Failed to send message");
}

async fn recv(stream: &mut TcpStream) -> ServerMessage {
    timeout(WAIT, read_frame(stream))
        .await
        .expect("Timed out waiting for server")
        .expect("Protocol error")
        .expect("Server closed the connection")
}

/// Reads messages until one satisfies `accept`, returning it.
async fn recv_until<F>(stream: &mut TcpStream, mut accept: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        let message = recv(stream).await;
        if accept(&message) {
            return message;
        }
    }
}

async fn wait_for_sessions(registry: &SharedRegistry, expected: usize) {
    timeout(WAIT, async {
        while registry.lock().await.len() != expected {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Registry never reached the expected size");
}

/// Connects two peers and waits until both see the ready phase.
async fn paired(addr: SocketAddr) -> (TcpStream, TcpStream) {
    let mut a = connect(addr).await;
    send(&mut a, ClientMessage::Search).await;
    let first = recv(&mut a).await;
    assert_eq!(first.phase(), Phase::Searching);

    let mut b = connect(addr).await;
    send(&mut b, ClientMessage::Search).await;

    for stream in [&mut a, &mut b] {
        let ready = recv_until(stream, |m| m.phase() == Phase::Ready).await;
        assert_eq!(
            ready,
            ServerMessage::Phase {
                state: Phase::Ready,
                partner_ready: false,
                countdown: 3,
            }
        );
    }

    (a, b)
}

/// MATCHMAKING TESTS
mod matchmaking_tests {
    use super::*;

    #[tokio::test]
    async fn lone_searcher_waits_in_searching() {
        let (addr, registry) = start_server(fast_config(10)).await;

        let mut a = connect(addr).await;
        send(&mut a, ClientMessage::Search).await;

        assert_eq!(
            recv(&mut a).await,
            ServerMessage::Phase {
                state: Phase::Searching,
                partner_ready: false,
                countdown: 3,
            }
        );
        wait_for_sessions(&registry, 1).await;
    }

    #[tokio::test]
    async fn two_searchers_share_a_session() {
        let (addr, registry) = start_server(fast_config(10)).await;

        let (_a, _b) = paired(addr).await;
        assert_eq!(registry.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn third_searcher_opens_a_new_session() {
        let (addr, registry) = start_server(fast_config(10)).await;

        let (_a, _b) = paired(addr).await;

        let mut c = connect(addr).await;
        send(&mut c, ClientMessage::Search).await;
        assert_eq!(recv(&mut c).await.phase(), Phase::Searching);

        wait_for_sessions(&registry, 2).await;
    }

    #[tokio::test]
    async fn repeated_search_keeps_the_same_seat() {
        let (addr, registry) = start_server(fast_config(10)).await;

        let mut a = connect(addr).await;
        send(&mut a, ClientMessage::Search).await;
        send(&mut a, ClientMessage::Search).await;

        assert_eq!(recv(&mut a).await.phase(), Phase::Searching);
        assert_eq!(recv(&mut a).await.phase(), Phase::Searching);
        assert_eq!(registry.lock().await.len(), 1);
    }
}

/// MATCH LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn partner_ready_is_reported_to_the_opponent() {
        let (addr, _registry) = start_server(fast_config(10)).await;
        let (mut a, mut b) = paired(addr).await;

        send(&mut a, ClientMessage::Ready).await;

        let seen = recv_until(&mut b, |m| {
            matches!(
                m,
                ServerMessage::Phase {
                    partner_ready: true,
                    ..
                }
            )
        })
        .await;
        assert_eq!(seen.phase(), Phase::Ready);

        // A's own view still reports the partner as not ready
        let own = recv(&mut a).await;
        assert_eq!(
            own,
            ServerMessage::Phase {
                state: Phase::Ready,
                partner_ready: false,
                countdown: 3,
            }
        );
    }

    #[tokio::test]
    async fn countdown_precedes_a_centred_start() {
        let (addr, _registry) = start_server(fast_config(10)).await;
        let (mut a, mut b) = paired(addr).await;

        send(&mut a, ClientMessage::Ready).await;
        send(&mut b, ClientMessage::Ready).await;

        let mut countdown = Vec::new();
        let started = loop {
            match recv(&mut a).await {
                ServerMessage::Phase {
                    state: Phase::Countdown,
                    countdown: value,
                    ..
                } => countdown.push(value),
                message @ ServerMessage::Started { .. } => break message,
                _ => {}
            }
        };
        assert_eq!(countdown, vec![3, 2, 1]);

        let ServerMessage::Started { game_state } = started else {
            unreachable!();
        };
        assert_eq!(game_state.ball_x, FIELD_WIDTH / 2);
        assert_eq!(game_state.ball_y, FIELD_HEIGHT / 2);
        assert_eq!(game_state.paddle1_y, (FIELD_HEIGHT - PADDLE_HEIGHT) / 2);
        assert_eq!(game_state.paddle2_y, (FIELD_HEIGHT - PADDLE_HEIGHT) / 2);
        assert_eq!((game_state.ball_dx, game_state.ball_dy), (5, 5));
        assert_eq!((game_state.score1, game_state.score2), (0, 0));

        let started_b = recv_until(&mut b, |m| matches!(m, ServerMessage::Started { .. })).await;
        assert_eq!(started_b, ServerMessage::Started { game_state });
    }

    #[tokio::test]
    async fn full_match_reports_win_and_loss() {
        let (addr, registry) = start_server(fast_config(1)).await;
        let (mut a, mut b) = paired(addr).await;

        send(&mut a, ClientMessage::Ready).await;
        send(&mut b, ClientMessage::Ready).await;

        let finished_a =
            recv_until(&mut a, |m| matches!(m, ServerMessage::Finished { .. })).await;
        let finished_b =
            recv_until(&mut b, |m| matches!(m, ServerMessage::Finished { .. })).await;

        // With both paddles idle the first serve gets past the right paddle
        assert_eq!(
            finished_a,
            ServerMessage::Finished {
                result: MatchResult::Win
            }
        );
        assert_eq!(
            finished_b,
            ServerMessage::Finished {
                result: MatchResult::Lose
            }
        );

        wait_for_sessions(&registry, 0).await;
    }

    #[tokio::test]
    async fn snapshots_follow_paddle_input() {
        let (addr, _registry) = start_server(fast_config(10)).await;
        let (mut a, mut b) = paired(addr).await;

        send(&mut a, ClientMessage::Ready).await;
        send(&mut b, ClientMessage::Ready).await;
        recv_until(&mut a, |m| matches!(m, ServerMessage::Started { .. })).await;

        send(&mut a, ClientMessage::Move(Direction::Up)).await;

        let top = recv_until(&mut a, |m| {
            matches!(m, ServerMessage::Snapshot(s) if s.paddle1_y == 0)
        })
        .await;
        let ServerMessage::Snapshot(snapshot) = top else {
            unreachable!();
        };
        assert_eq!(snapshot.paddle2_y, (FIELD_HEIGHT - PADDLE_HEIGHT) / 2);
    }

    #[tokio::test]
    async fn search_after_finish_starts_a_new_match() {
        let (addr, registry) = start_server(fast_config(1)).await;
        let (mut a, mut b) = paired(addr).await;

        send(&mut a, ClientMessage::Ready).await;
        send(&mut b, ClientMessage::Ready).await;
        recv_until(&mut a, |m| matches!(m, ServerMessage::Finished { .. })).await;
        recv_until(&mut b, |m| matches!(m, ServerMessage::Finished { .. })).await;
        wait_for_sessions(&registry, 0).await;

        send(&mut a, ClientMessage::Search).await;
        assert_eq!(recv(&mut a).await.phase(), Phase::Searching);
        send(&mut b, ClientMessage::Search).await;

        recv_until(&mut a, |m| m.phase() == Phase::Ready).await;
        recv_until(&mut b, |m| m.phase() == Phase::Ready).await;
        assert_eq!(registry.lock().await.len(), 1);
    }
}

/// CONNECTION HANDLING TESTS
mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn malformed_frame_is_skipped() {
        let (addr, _registry) = start_server(fast_config(10)).await;
        let mut a = connect(addr).await;

        // Well-formed frame carrying a payload that is not a message
        a.write_all(&[0, 0, 0, 2, 0xff, 0xff]).await.unwrap();
        send(&mut a, ClientMessage::Search).await;

        assert_eq!(recv(&mut a).await.phase(), Phase::Searching);
    }

    #[tokio::test]
    async fn oversized_frame_drops_the_connection() {
        let (addr, registry) = start_server(fast_config(10)).await;
        let mut a = connect(addr).await;
        send(&mut a, ClientMessage::Search).await;
        assert_eq!(recv(&mut a).await.phase(), Phase::Searching);

        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        wait_for_sessions(&registry, 0).await;
    }

    #[tokio::test]
    async fn lone_searcher_disconnect_removes_session() {
        let (addr, registry) = start_server(fast_config(10)).await;

        let mut a = connect(addr).await;
        send(&mut a, ClientMessage::Search).await;
        assert_eq!(recv(&mut a).await.phase(), Phase::Searching);
        wait_for_sessions(&registry, 1).await;

        drop(a);
        wait_for_sessions(&registry, 0).await;
    }

    #[tokio::test]
    async fn reset_releases_the_seat() {
        let (addr, registry) = start_server(fast_config(10)).await;

        let mut a = connect(addr).await;
        send(&mut a, ClientMessage::Search).await;
        assert_eq!(recv(&mut a).await.phase(), Phase::Searching);

        send(&mut a, ClientMessage::Reset).await;
        wait_for_sessions(&registry, 0).await;

        // The next searcher starts fresh instead of joining the old session
        let mut b = connect(addr).await;
        send(&mut b, ClientMessage::Search).await;
        assert_eq!(recv(&mut b).await.phase(), Phase::Searching);
        wait_for_sessions(&registry, 1).await;
    }

    #[tokio::test]
    async fn both_peers_leaving_mid_match_removes_session() {
        let (addr, registry) = start_server(fast_config(10)).await;
        let (mut a, mut b) = paired(addr).await;

        send(&mut a, ClientMessage::Ready).await;
        send(&mut b, ClientMessage::Ready).await;
        recv_until(&mut a, |m| matches!(m, ServerMessage::Started { .. })).await;

        drop(a);
        // The remaining peer keeps receiving snapshots
        recv_until(&mut b, |m| matches!(m, ServerMessage::Snapshot(_))).await;
        assert_eq!(registry.lock().await.len(), 1);

        drop(b);
        wait_for_sessions(&registry, 0).await;
    }

    #[tokio::test]
    async fn forfeit_ends_match_for_remaining_peer() {
        let mut config = fast_config(10);
        config.game.forfeit_on_leave = true;
        let (addr, registry) = start_server(config).await;
        let (mut a, mut b) = paired(addr).await;

        send(&mut a, ClientMessage::Ready).await;
        send(&mut b, ClientMessage::Ready).await;
        recv_until(&mut b, |m| matches!(m, ServerMessage::Started { .. })).await;

        drop(a);

        let finished =
            recv_until(&mut b, |m| matches!(m, ServerMessage::Finished { .. })).await;
        assert_eq!(
            finished,
            ServerMessage::Finished {
                result: MatchResult::OpponentLeft
            }
        );
        wait_for_sessions(&registry, 0).await;
    }
}
