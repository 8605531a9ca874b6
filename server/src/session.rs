//! Player session ownership and lifecycle for the synchronization server
//!
//! This module handles the server-side registry of connected players:
//! - Session creation with stable, never-reused ids
//! - Connection lifecycle state (new, active, erroring, pending removal)
//! - Per-session inbound framing and outbound partial-send queues
//! - Movement state transitions driven by client commands
//!
//! The registry is the single owner of every session and its buffers; the
//! tick driver borrows them for the duration of one tick only.

use crate::framing::{MessageBuffer, SendQueue};
use crate::transport::Connection;
use log::{debug, info, warn};
use shared::{travel_seconds, ClientCommand, GridPos, MoveProgress};
use std::collections::BTreeMap;

pub type PlayerId = u32;

/// Lifecycle of one connection.
///
/// `New` sessions have not completed their handshake; `Active` sessions
/// receive the shared per-tick broadcasts; `Erroring` sessions had a
/// transport failure and await their departure announcement; a
/// `PendingRemoval` session has been announced to every peer and is safe
/// to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Active,
    Erroring,
    PendingRemoval,
}

/// Next handshake part to enqueue for a `New` session.
///
/// The part currently in flight lives in the session's outbound queue, so
/// a short write resumes exactly where the transport stopped: completed
/// parts are never resent and the chunk is never re-requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    MapChunk,
    Roster,
    MovesInProgress,
    Done,
}

/// Server-side state for one connected player.
#[derive(Debug)]
pub struct PlayerSession<C> {
    /// Unique id, assigned monotonically, stable for the connection's life.
    pub id: PlayerId,
    /// Last confirmed stationary position.
    pub pos_start: GridPos,
    /// Current movement target; equals `pos_start` while stationary.
    pub pos_dest: GridPos,
    /// Interpolation parameters; meaningful only while moving.
    pub movement: MoveProgress,
    /// Carried object id, always 0 in this core but kept on the wire.
    pub holding_id: i32,
    pub state: ConnectionState,
    pub handshake: HandshakeStage,
    /// Whether the arrival of this session was broadcast to peers.
    pub announced: bool,
    /// Set when a move starts, cleared once a moves broadcast carried it.
    pub has_unannounced_move: bool,
    pub inbound: MessageBuffer,
    pub outbound: SendQueue,
    pub conn: C,
}

impl<C: Connection> PlayerSession<C> {
    fn new(id: PlayerId, conn: C) -> Self {
        Self {
            id,
            pos_start: GridPos::default(),
            pos_dest: GridPos::default(),
            movement: MoveProgress::default(),
            holding_id: 0,
            state: ConnectionState::New,
            handshake: HandshakeStage::MapChunk,
            announced: false,
            has_unannounced_move: false,
            inbound: MessageBuffer::new(),
            outbound: SendQueue::new(),
            conn,
        }
    }

    pub fn is_stationary(&self) -> bool {
        self.pos_start == self.pos_dest
    }

    /// Applies a parsed client command. Only MOVE mutates state in this
    /// core; USE, GRAB and DROP are accepted and ignored, as is a MOVE
    /// issued while already in flight.
    pub fn apply_command(&mut self, command: ClientCommand, now: f64) {
        match command {
            ClientCommand::Move { x, y } => {
                if !self.is_stationary() {
                    return;
                }
                let dest = GridPos::new(x, y);
                if dest == self.pos_start {
                    return;
                }
                self.movement = MoveProgress::begin(now, travel_seconds(&self.pos_start, &dest));
                self.pos_dest = dest;
                self.has_unannounced_move = true;
            }
            ClientCommand::Use { .. } | ClientCommand::Grab { .. } | ClientCommand::Drop { .. } => {}
            ClientCommand::Unknown => {}
        }
    }

    /// Finalizes the current move once strictly more than its total time
    /// has elapsed. Returns true when the session just arrived, making it
    /// update-eligible exactly once.
    pub fn finish_move_if_complete(&mut self, now: f64) -> bool {
        if self.is_stationary() || !self.movement.is_complete(now) {
            return false;
        }
        self.pos_start = self.pos_dest;
        self.has_unannounced_move = false;
        true
    }

    /// Records a transport failure. A session already announced as removed
    /// stays `PendingRemoval`; everything else becomes `Erroring`.
    pub fn mark_error(&mut self) {
        if self.state != ConnectionState::PendingRemoval {
            self.state = ConnectionState::Erroring;
        }
    }
}

/// Owns every connected session, keyed by stable id.
///
/// Iteration order is id order, which keeps broadcasts deterministic.
/// Ids are never reused; removal of one session can never skip or
/// double-process a neighbor because per-tick passes iterate an id
/// snapshot taken up front.
pub struct SessionRegistry<C> {
    sessions: BTreeMap<PlayerId, PlayerSession<C>>,
    next_id: PlayerId,
}

impl<C: Connection> SessionRegistry<C> {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Registers a connection as a fresh session at the origin.
    pub fn create_session(&mut self, conn: C) -> PlayerId {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.insert(id, PlayerSession::new(id, conn));
        info!("player {} joined", id);
        id
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerSession<C>> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerSession<C>> {
        self.sessions.get_mut(&id)
    }

    /// Snapshot of all ids, for iteration that survives removals.
    pub fn ids(&self) -> Vec<PlayerId> {
        self.sessions.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerSession<C>> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn record_incoming_bytes(&mut self, id: PlayerId, bytes: &[u8]) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.inbound.extend(bytes);
        }
    }

    /// Extracts at most one complete framed message for the session.
    pub fn try_extract_message(&mut self, id: PlayerId) -> Option<String> {
        self.sessions.get_mut(&id)?.inbound.next_message()
    }

    pub fn apply_command(&mut self, id: PlayerId, command: ClientCommand, now: f64) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.apply_command(command, now);
        } else {
            debug!("command for unknown player {} dropped", id);
        }
    }

    pub fn mark_error(&mut self, id: PlayerId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.mark_error();
        }
    }

    /// Sessions whose departure has been announced to every peer.
    pub fn sessions_due_for_removal(&self) -> Vec<PlayerId> {
        self.sessions
            .values()
            .filter(|s| s.state == ConnectionState::PendingRemoval)
            .map(|s| s.id)
            .collect()
    }

    /// Releases the session and closes its connection. A close failure is
    /// logged and swallowed; it must not abort the tick.
    pub fn remove_session(&mut self, id: PlayerId) {
        if let Some(mut session) = self.sessions.remove(&id) {
            if let Err(e) = session.conn.close() {
                warn!("failed to close connection of player {}: {}", id, e);
            }
            info!("removed player {}", id);
        }
    }
}
