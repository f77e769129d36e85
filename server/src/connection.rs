//! Per-connection handling
//!
//! Each accepted TCP stream gets a reader task (this handler) and a writer
//! task. The writer drains a bounded queue of `ServerMessage`s; the session
//! and its game loop never wait on a slow socket, and a peer that stops
//! reading loses messages once its queue is full. The handler reads
//! frames in arrival order and applies them to the peer's seat.

use crate::config::GameConfig;
use crate::game_loop::spawn_game_loop;
use crate::registry::SharedRegistry;
use crate::session::{outbound_channel, ConnectionId, Outbound, PeerLink, Session, Side};
use log::{debug, info, warn};
use shared::{read_frame, write_frame, ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// The session and side a connection currently occupies.
#[derive(Debug, Clone)]
pub struct Seat {
    pub session: Arc<Session>,
    pub side: Side,
}

pub struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    registry: SharedRegistry,
    config: Arc<GameConfig>,
    outbound: Outbound,
    seat: Option<Seat>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        registry: SharedRegistry,
        config: Arc<GameConfig>,
        outbound: Outbound,
    ) -> Self {
        Self {
            id,
            addr,
            registry,
            config,
            outbound,
            seat: None,
        }
    }

    pub fn seat(&self) -> Option<&Seat> {
        self.seat.as_ref()
    }

    /// Applies one client message.
    pub async fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Reset => {
                debug!("Connection {} reset", self.id);
                self.leave().await;
            }
            ClientMessage::Search => self.search().await,
            ClientMessage::Ready => match &self.seat {
                Some(seat) => {
                    seat.session.set_ready(seat.side);
                    debug!(
                        "Connection {} ready in session {}",
                        self.id,
                        seat.session.id()
                    );
                }
                None => debug!("Connection {} sent ready without a session", self.id),
            },
            ClientMessage::Move(direction) => {
                if let Some(seat) = &self.seat {
                    seat.session.set_input(seat.side, direction.delta());
                }
            }
        }
    }

    async fn search(&mut self) {
        let stale = self
            .seat
            .as_ref()
            .is_some_and(|seat| seat.session.is_closed());
        if stale {
            self.seat = None;
        }

        if self.seat.is_none() {
            let link = PeerLink::new(self.id, self.outbound.clone());

            let mut registry = self.registry.lock().await;
            let (session, side) = registry.pair_or_create(link);
            if side == Side::Right {
                spawn_game_loop(
                    Arc::clone(&session),
                    Arc::clone(&self.registry),
                    Arc::clone(&self.config),
                );
            }
            drop(registry);

            self.seat = Some(Seat { session, side });
        }

        if let Some(seat) = &self.seat {
            seat.session.broadcast_phases();
        }
    }

    /// Vacates the current seat, removing the session once nobody is left.
    pub async fn leave(&mut self) {
        let Some(seat) = self.seat.take() else {
            return;
        };

        let mut registry = self.registry.lock().await;
        let remaining = seat.session.detach(seat.side, self.id);
        if remaining == 0 {
            registry.remove(seat.session.id());
        }
        debug!(
            "Connection {} left session {} ({} peer(s) remain)",
            self.id,
            seat.session.id(),
            remaining
        );
    }

    /// Reads frames until the peer goes away, then vacates the seat.
    pub async fn run<R>(mut self, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match read_frame::<_, ClientMessage>(&mut reader).await {
                Ok(Some(message)) => self.handle_message(message).await,
                Ok(None) => {
                    info!("Client {} closed the connection", self.addr);
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    debug!("Dropping malformed message from {}: {}", self.addr, e);
                }
                Err(e) => {
                    warn!("Connection error from {}: {}", self.addr, e);
                    break;
                }
            }
        }

        self.leave().await;
    }
}

/// Drains the outbound queue onto the socket until the queue closes or a write fails.
pub async fn write_outbound<W>(mut writer: W, mut outbound: mpsc::Receiver<ServerMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &message).await {
            debug!("Stopping writer after failed send: {}", e);
            break;
        }
    }
}

/// Serves one accepted connection to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
    registry: SharedRegistry,
    config: Arc<GameConfig>,
) {
    info!("Client {} connected from {}", id, addr);

    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }

    let (reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = outbound_channel();
    let writer_task = tokio::spawn(write_outbound(writer, outbound_rx));

    Connection::new(id, addr, registry, config, outbound_tx)
        .run(reader)
        .await;

    // The session no longer holds our sender, so the writer has nothing
    // left to deliver once this handler is gone.
    writer_task.abort();
    info!("Client {} disconnected", addr);
}
