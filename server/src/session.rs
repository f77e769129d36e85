//! Per-match shared state
//!
//! A session is shared between the two connection handlers of its peers and
//! the session's game loop. Fields follow a single-writer split:
//! - handlers write their own ready flag, input and disconnect state
//! - the game loop writes phase transitions, the countdown and `started`
//!
//! Peer slots and phases sit behind a short-lived mutex that is never held
//! across an await; everything else is a single atomic word.

use log::debug;
use shared::{Phase, ServerMessage};
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

pub type SessionId = u64;
pub type ConnectionId = u64;

/// Frames a peer may have queued before further messages to it are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Outbound queue drained by a connection's writer task.
pub type Outbound = mpsc::Sender<ServerMessage>;

/// Creates a peer's outbound queue, bounded at [`OUTBOUND_CAPACITY`].
pub fn outbound_channel() -> (Outbound, mpsc::Receiver<ServerMessage>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// Which paddle a peer controls. Left is the peer that created the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Handle a session uses to reach one connected peer.
#[derive(Debug, Clone)]
pub struct PeerLink {
    pub connection: ConnectionId,
    pub outbound: Outbound,
}

impl PeerLink {
    pub fn new(connection: ConnectionId, outbound: Outbound) -> Self {
        Self {
            connection,
            outbound,
        }
    }

    /// Queues a message for the peer without waiting. The message is dropped
    /// if the peer's queue is full or its writer is gone.
    fn send(&self, message: ServerMessage) {
        match self.outbound.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full for connection {}", self.connection);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Dropped message for closed connection {}", self.connection);
            }
        }
    }
}

#[derive(Debug)]
struct PeerSlot {
    link: Option<PeerLink>,
    phase: Phase,
}

#[derive(Debug)]
struct Lobby {
    slots: [PeerSlot; 2],
    /// Set once a second peer has joined; a paired session never rejoins matchmaking.
    paired: bool,
}

impl Lobby {
    fn connected(&self) -> usize {
        self.slots.iter().filter(|slot| slot.link.is_some()).count()
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    lobby: Mutex<Lobby>,
    ready: [AtomicBool; 2],
    inputs: [AtomicI8; 2],
    countdown: AtomicU8,
    started: AtomicBool,
    closed: AtomicBool,
    occupancy: watch::Sender<usize>,
}

impl Session {
    /// Creates a session with `link` searching on the left side.
    pub fn new(id: SessionId, link: PeerLink, countdown: u8) -> Self {
        let (occupancy, _) = watch::channel(1);
        Self {
            id,
            lobby: Mutex::new(Lobby {
                slots: [
                    PeerSlot {
                        link: Some(link),
                        phase: Phase::Searching,
                    },
                    PeerSlot {
                        link: None,
                        phase: Phase::Disconnected,
                    },
                ],
                paired: false,
            }),
            ready: [AtomicBool::new(false), AtomicBool::new(false)],
            inputs: [AtomicI8::new(0), AtomicI8::new(0)],
            countdown: AtomicU8::new(countdown),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            occupancy,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    fn lobby(&self) -> MutexGuard<'_, Lobby> {
        self.lobby.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if a searching peer is waiting alone and nobody has joined yet.
    pub fn is_open(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        let lobby = self.lobby();
        !lobby.paired
            && lobby.connected() == 1
            && lobby.slots[0].link.is_some()
            && lobby.slots[0].phase == Phase::Searching
    }

    /// Seats a second peer on the right side.
    pub(crate) fn attach(&self, link: PeerLink) -> Side {
        let side = Side::Right;
        let connected = {
            let mut lobby = self.lobby();
            lobby.slots[side.index()] = PeerSlot {
                link: Some(link),
                phase: Phase::Searching,
            };
            lobby.paired = true;
            lobby.connected()
        };
        self.ready[side.index()].store(false, Ordering::Release);
        self.inputs[side.index()].store(0, Ordering::Relaxed);
        self.occupancy.send_replace(connected);
        side
    }

    /// Empties `side` if it still belongs to `connection`.
    /// Returns the number of peers that remain connected.
    pub fn detach(&self, side: Side, connection: ConnectionId) -> usize {
        let connected = {
            let mut lobby = self.lobby();
            let slot = &mut lobby.slots[side.index()];
            if slot.link.as_ref().map(|link| link.connection) == Some(connection) {
                slot.link = None;
                slot.phase = Phase::Disconnected;
                self.ready[side.index()].store(false, Ordering::Release);
                self.inputs[side.index()].store(0, Ordering::Relaxed);
            }
            lobby.connected()
        };
        self.occupancy.send_replace(connected);
        connected
    }

    pub fn connected_count(&self) -> usize {
        self.lobby().connected()
    }

    pub fn is_connected(&self, side: Side) -> bool {
        self.lobby().slots[side.index()].link.is_some()
    }

    /// Watches the number of connected peers.
    pub fn subscribe_occupancy(&self) -> watch::Receiver<usize> {
        self.occupancy.subscribe()
    }

    pub fn phases(&self) -> [Phase; 2] {
        let lobby = self.lobby();
        [lobby.slots[0].phase, lobby.slots[1].phase]
    }

    /// Moves every connected peer to `phase`. Empty slots stay disconnected.
    pub fn set_phase(&self, phase: Phase) {
        let mut lobby = self.lobby();
        for slot in lobby.slots.iter_mut().filter(|slot| slot.link.is_some()) {
            slot.phase = phase;
        }
    }

    pub fn set_ready(&self, side: Side) {
        self.ready[side.index()].store(true, Ordering::Release);
    }

    pub fn is_ready(&self, side: Side) -> bool {
        self.ready[side.index()].load(Ordering::Acquire)
    }

    pub fn clear_ready(&self) {
        for flag in &self.ready {
            flag.store(false, Ordering::Release);
        }
    }

    pub fn set_input(&self, side: Side, delta: i8) {
        self.inputs[side.index()].store(delta, Ordering::Relaxed);
    }

    pub fn inputs(&self) -> [i8; 2] {
        [
            self.inputs[0].load(Ordering::Relaxed),
            self.inputs[1].load(Ordering::Relaxed),
        ]
    }

    pub fn countdown(&self) -> u8 {
        self.countdown.load(Ordering::Acquire)
    }

    pub fn set_countdown(&self, seconds: u8) {
        self.countdown.store(seconds, Ordering::Release);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Called by the registry when the session is removed.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Sends a message to one peer if that side is connected.
    pub fn send_to(&self, side: Side, message: ServerMessage) {
        if let Some(link) = &self.lobby().slots[side.index()].link {
            link.send(message);
        }
    }

    /// Sends the same message to every connected peer.
    pub fn broadcast(&self, message: &ServerMessage) {
        let lobby = self.lobby();
        for link in lobby.slots.iter().filter_map(|slot| slot.link.as_ref()) {
            link.send(message.clone());
        }
    }

    /// Sends each connected peer its own phase, its partner's ready flag and
    /// the current countdown.
    pub fn broadcast_phases(&self) {
        let countdown = self.countdown();
        let lobby = self.lobby();
        for side in Side::BOTH {
            let slot = &lobby.slots[side.index()];
            if let Some(link) = &slot.link {
                link.send(ServerMessage::Phase {
                    state: slot.phase,
                    partner_ready: self.is_ready(side.opponent()),
                    countdown,
                });
            }
        }
    }
}
