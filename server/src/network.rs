//! Tick loop and transport driver coordinating the synchronization engine.
//!
//! Every tick runs a fixed sequence: accept at most one connection, drain
//! and apply client input, compose the shared broadcast payloads, drive
//! per-session sends (handshake or shared payloads), then reap sessions
//! whose departure has been announced. Nothing in the tick blocks; a
//! short write parks the remainder in the session's outbound queue for
//! the next tick.

use crate::broadcast::{
    compose_incremental_update, compose_moves_broadcast, compose_roster, TickChanges,
};
use crate::map::ChunkProvider;
use crate::session::{ConnectionState, HandshakeStage, PlayerId, PlayerSession, SessionRegistry};
use crate::transport::{Connection, Listener};
use log::{debug, info, warn};
use shared::ClientCommand;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};

const READ_CHUNK_BYTES: usize = 512;

const TICK_STATS_INTERVAL: u64 = 100;

/// The authoritative state server: owns the listener, the session
/// registry and the chunk collaborator, and advances them one tick at a
/// time.
pub struct Server<L: Listener> {
    listener: L,
    pub registry: SessionRegistry<L::Conn>,
    chunks: Box<dyn ChunkProvider>,
    tick_duration: Duration,
    tick: u64,
    connections_accepted: u64,
    epoch: Instant,
}

impl<L: Listener> Server<L> {
    pub fn new(listener: L, chunks: Box<dyn ChunkProvider>, tick_duration: Duration) -> Self {
        Self {
            listener,
            registry: SessionRegistry::new(),
            chunks,
            tick_duration,
            tick: 0,
            connections_accepted: 0,
            epoch: Instant::now(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs the fixed-rate tick loop until `shutdown` resolves. The
    /// signal is observed at tick boundaries only; on exit every
    /// remaining session is closed unconditionally.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("server ticking every {:?}", self.tick_duration);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let now = self.epoch.elapsed().as_secs_f64();
                    self.tick_at(now);
                }
            }
        }

        info!("shutting down, closing {} sessions", self.registry.len());
        for id in self.registry.ids() {
            self.registry.remove_session(id);
        }
    }

    /// One full synchronization pass at wall-clock time `now` (seconds).
    pub fn tick_at(&mut self, now: f64) {
        self.tick = self.tick.wrapping_add(1);

        // 1. Accept at most one pending connection.
        match self.listener.accept_one() {
            Ok(Some((conn, addr))) => {
                self.connections_accepted += 1;
                let id = self.registry.create_session(conn);
                info!("got connection from {} as player {}", addr, id);
            }
            Ok(None) => {}
            Err(e) => warn!("accept failed: {}", e),
        }

        // 2. Drain input, apply commands, record state transitions.
        let mut changes = TickChanges::default();
        for id in self.registry.ids() {
            self.service_session_input(id, now, &mut changes);
        }

        // 3. Compose this tick's shared payloads.
        let update = compose_incremental_update(&self.registry, &changes);
        let moves = compose_moves_broadcast(&mut self.registry, now, true);

        // 4. Drive sends.
        for id in self.registry.ids() {
            self.service_session_output(id, now, update.as_deref(), moves.as_deref());
        }

        // 5. Reap sessions whose departure has been announced.
        for id in self.registry.sessions_due_for_removal() {
            self.registry.remove_session(id);
        }

        if self.tick % TICK_STATS_INTERVAL == 0 && !self.registry.is_empty() {
            debug!(
                "tick {}: {} sessions live, {} connections accepted",
                self.tick,
                self.registry.len(),
                self.connections_accepted
            );
        }
    }

    /// Reads available bytes, applies at most one framed message, then
    /// records which broadcast class the session belongs to this tick.
    fn service_session_input(&mut self, id: PlayerId, now: f64, changes: &mut TickChanges) {
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };

        if matches!(session.state, ConnectionState::New | ConnectionState::Active) {
            let mut buf = [0u8; READ_CHUNK_BYTES];
            loop {
                match session.conn.try_recv(&mut buf) {
                    Ok(Some(0)) => {
                        debug!("player {} closed its connection", id);
                        session.mark_error();
                        break;
                    }
                    Ok(Some(n)) => session.inbound.extend(&buf[..n]),
                    Ok(None) => break,
                    Err(e) => {
                        debug!("receive failed for player {}: {}", id, e);
                        session.mark_error();
                        break;
                    }
                }
            }

            if session.state != ConnectionState::Erroring {
                if let Some(message) = session.inbound.next_message() {
                    debug!("player {} sent {:?}", id, message);
                    session.apply_command(ClientCommand::parse(&message), now);
                }
            }
        }

        match session.state {
            ConnectionState::New if !session.announced => {
                // Their first position is an update for everyone already here.
                session.announced = true;
                changes.updated.push(id);
            }
            ConnectionState::Erroring => {
                // A session peers never learned about vanishes without a
                // departure line; everyone else departs with exactly one.
                if session.announced {
                    changes.departed.push(id);
                }
                session.state = ConnectionState::PendingRemoval;
            }
            ConnectionState::PendingRemoval => {}
            _ => {
                if session.finish_move_if_complete(now) {
                    changes.updated.push(id);
                }
            }
        }
    }

    /// Advances the handshake for new sessions, or queues and flushes the
    /// shared payloads for active ones. Erroring sessions are skipped.
    fn service_session_output(
        &mut self,
        id: PlayerId,
        now: f64,
        update: Option<&str>,
        moves: Option<&str>,
    ) {
        let state = match self.registry.get(id) {
            Some(session) => session.state,
            None => return,
        };

        match state {
            ConnectionState::Erroring | ConnectionState::PendingRemoval => {}
            ConnectionState::New => self.advance_handshake(id, now),
            ConnectionState::Active => {
                let Some(session) = self.registry.get_mut(id) else {
                    return;
                };
                if let Some(payload) = update {
                    session.outbound.push_bytes(payload.as_bytes());
                }
                if let Some(payload) = moves {
                    session.outbound.push_bytes(payload.as_bytes());
                }
                Self::flush_outbound(session);
            }
        }
    }

    /// Pushes the handshake forward as far as the transport allows this
    /// tick: chunk, then roster, then the in-flight move snapshot, each
    /// fully transmitted before the next is queued. A short write leaves
    /// the remainder queued; completed parts are never resent and the
    /// chunk is never re-requested.
    fn advance_handshake(&mut self, id: PlayerId, now: f64) {
        loop {
            {
                let Some(session) = self.registry.get_mut(id) else {
                    return;
                };
                Self::flush_outbound(session);
                if session.state != ConnectionState::New || !session.outbound.is_empty() {
                    return;
                }
            }

            let stage = match self.registry.get(id) {
                Some(session) => session.handshake,
                None => return,
            };

            match stage {
                HandshakeStage::MapChunk => {
                    let pos = match self.registry.get(id) {
                        Some(session) => session.pos_start,
                        None => return,
                    };
                    let chunk = self.chunks.chunk_bytes(pos.x, pos.y);
                    let Some(session) = self.registry.get_mut(id) else {
                        return;
                    };
                    session.outbound.push_bytes(&chunk);
                    session.handshake = HandshakeStage::Roster;
                }
                HandshakeStage::Roster => {
                    let roster = compose_roster(&self.registry, id);
                    let Some(session) = self.registry.get_mut(id) else {
                        return;
                    };
                    session.outbound.push_bytes(roster.as_bytes());
                    session.handshake = HandshakeStage::MovesInProgress;
                }
                HandshakeStage::MovesInProgress => {
                    let snapshot = compose_moves_broadcast(&mut self.registry, now, false);
                    let Some(session) = self.registry.get_mut(id) else {
                        return;
                    };
                    if let Some(payload) = snapshot {
                        session.outbound.push_bytes(payload.as_bytes());
                    }
                    session.handshake = HandshakeStage::Done;
                }
                HandshakeStage::Done => {
                    let Some(session) = self.registry.get_mut(id) else {
                        return;
                    };
                    session.state = ConnectionState::Active;
                    info!("handshake complete for player {}", id);
                    return;
                }
            }
        }
    }

    /// Writes queued bytes until the transport stops accepting them. A
    /// send failure marks the session erroring; it is never retried.
    fn flush_outbound(session: &mut PlayerSession<L::Conn>) {
        while !session.outbound.is_empty() {
            match session.conn.try_send(session.outbound.as_slice()) {
                Ok(Some(taken)) => session.outbound.consume(taken),
                Ok(None) => return,
                Err(e) => {
                    debug!("send failed for player {}: {}", session.id, e);
                    session.mark_error();
                    return;
                }
            }
        }
    }
}
