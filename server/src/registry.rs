//! Session registry and matchmaking
//!
//! The registry owns every live session and hands out session ids. It is
//! shared behind a single async mutex; pairing, creation, removal and the
//! decision to start a game loop all happen while that lock is held, which
//! keeps two handlers from racing into the same slot or starting two loops
//! for one session.

use crate::session::{PeerLink, Session, SessionId, Side};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The process-wide registry as passed to handlers and game loops.
pub type SharedRegistry = Arc<Mutex<SessionRegistry>>;

pub struct SessionRegistry {
    /// Live sessions indexed by id
    sessions: HashMap<SessionId, Arc<Session>>,
    /// Next id to hand out; ids are never reused
    next_session_id: SessionId,
    /// Countdown seeded into new sessions
    countdown: u8,
}

impl SessionRegistry {
    pub fn new(countdown: u8) -> Self {
        Self {
            sessions: HashMap::new(),
            next_session_id: 0,
            countdown,
        }
    }

    pub fn shared(countdown: u8) -> SharedRegistry {
        Arc::new(Mutex::new(Self::new(countdown)))
    }

    /// Pairs `link` with a peer that is waiting alone, or opens a new session.
    ///
    /// Returns the session and the side the new peer was seated on. A result
    /// of `Side::Right` means the session just reached two peers and the
    /// caller must start its game loop before releasing the lock.
    pub fn pair_or_create(&mut self, link: PeerLink) -> (Arc<Session>, Side) {
        let connection = link.connection;

        let open = self
            .sessions
            .values()
            .find(|session| session.is_open())
            .cloned();

        if let Some(session) = open {
            let side = session.attach(link);
            info!(
                "Connection {} joined session {} as {:?}",
                connection,
                session.id(),
                side
            );
            return (session, side);
        }

        let id = self.next_session_id;
        self.next_session_id += 1;

        let session = Arc::new(Session::new(id, link, self.countdown));
        self.sessions.insert(id, Arc::clone(&session));
        info!("Connection {} opened session {}", connection, id);

        (session, Side::Left)
    }

    /// Removes a session and marks it closed. Returns false if it was already gone.
    pub fn remove(&mut self, id: SessionId) -> bool {
        if let Some(session) = self.sessions.remove(&id) {
            session.close();
            info!("Session {} removed", id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).cloned()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Returns the number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
