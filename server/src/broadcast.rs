//! Per-tick broadcast composition.
//!
//! Three payload classes leave this module: the handshake roster a new
//! session receives once, the incremental update shared by every active
//! session, and the moves-in-progress broadcast carrying interpolation
//! parameters. Shared payloads are composed once per tick and reused
//! verbatim for every recipient; an empty payload is composed as `None`
//! and never sent.

use crate::session::{PlayerId, SessionRegistry};
use crate::transport::Connection;
use shared::{
    departure_line, move_line, position_line, MESSAGE_TERMINATOR, PLAYER_MOVES_HEADER,
    PLAYER_UPDATE_HEADER,
};

/// Sessions that changed during the input pass of one tick.
///
/// `departed` sessions are announced with the sentinel coordinates and
/// listed ahead of the position updates.
#[derive(Debug, Default)]
pub struct TickChanges {
    pub updated: Vec<PlayerId>,
    pub departed: Vec<PlayerId>,
}

impl TickChanges {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.departed.is_empty()
    }
}

/// Builds the shared `PLAYER_UPDATE` payload for this tick, or `None`
/// when no session changed.
pub fn compose_incremental_update<C: Connection>(
    registry: &SessionRegistry<C>,
    changes: &TickChanges,
) -> Option<String> {
    if changes.is_empty() {
        return None;
    }

    let mut message = String::from(PLAYER_UPDATE_HEADER);
    for &id in &changes.departed {
        if let Some(session) = registry.get(id) {
            message.push_str(&departure_line(session.id, session.holding_id));
        }
    }
    for &id in &changes.updated {
        if let Some(session) = registry.get(id) {
            message.push_str(&position_line(session.id, session.holding_id, &session.pos_start));
        }
    }
    message.push(MESSAGE_TERMINATOR as char);
    Some(message)
}

/// Builds the `PLAYER_MOVES_START` payload, or `None` when no line
/// qualifies.
///
/// With `new_only` set this is the shared per-tick broadcast: only moves
/// not yet announced are included, and their flag is cleared on
/// inclusion. Without it, every in-flight move is included regardless of
/// the flag, which is the snapshot a handshake carries.
pub fn compose_moves_broadcast<C: Connection>(
    registry: &mut SessionRegistry<C>,
    now: f64,
    new_only: bool,
) -> Option<String> {
    let mut message = String::from(PLAYER_MOVES_HEADER);
    let mut lines = 0;

    for id in registry.ids() {
        let Some(session) = registry.get_mut(id) else {
            continue;
        };
        if session.is_stationary() {
            continue;
        }
        if new_only && !session.has_unannounced_move {
            continue;
        }
        if new_only {
            session.has_unannounced_move = false;
        }
        message.push_str(&move_line(
            session.id,
            &session.pos_start,
            &session.pos_dest,
            session.movement.total_seconds,
            session.movement.eta_seconds(now),
        ));
        lines += 1;
    }

    if lines == 0 {
        return None;
    }
    message.push(MESSAGE_TERMINATOR as char);
    Some(message)
}

/// Builds the full-roster snapshot for one recipient's handshake: one
/// line per registered session, the recipient's own line last as the
/// wire format requires.
pub fn compose_roster<C: Connection>(
    registry: &SessionRegistry<C>,
    recipient: PlayerId,
) -> String {
    let mut message = String::from(PLAYER_UPDATE_HEADER);
    let mut own_line = None;

    for session in registry.iter() {
        let line = position_line(session.id, session.holding_id, &session.pos_start);
        if session.id == recipient {
            own_line = Some(line);
        } else {
            message.push_str(&line);
        }
    }
    if let Some(line) = own_line {
        message.push_str(&line);
    }
    message.push(MESSAGE_TERMINATOR as char);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockConnection;
    use shared::ClientCommand;

    fn registry_with(count: usize) -> (SessionRegistry<MockConnection>, Vec<PlayerId>) {
        let mut registry = SessionRegistry::new();
        let ids = (0..count)
            .map(|_| registry.create_session(MockConnection::new()))
            .collect();
        (registry, ids)
    }

    #[test]
    fn test_no_changes_composes_nothing() {
        let (registry, _) = registry_with(3);
        assert_eq!(
            compose_incremental_update(&registry, &TickChanges::default()),
            None
        );
    }

    #[test]
    fn test_update_contains_changed_sessions_only() {
        let (mut registry, ids) = registry_with(3);
        registry.get_mut(ids[1]).unwrap().pos_start = shared::GridPos::new(5, 0);
        registry.get_mut(ids[1]).unwrap().pos_dest = shared::GridPos::new(5, 0);

        let changes = TickChanges {
            updated: vec![ids[1]],
            departed: vec![],
        };
        let message = compose_incremental_update(&registry, &changes).unwrap();
        assert_eq!(message, "PLAYER_UPDATE\n1 0 5 0\n#");
    }

    #[test]
    fn test_departures_precede_updates_and_use_sentinel() {
        let (registry, ids) = registry_with(3);
        let changes = TickChanges {
            updated: vec![ids[0]],
            departed: vec![ids[2]],
        };
        let message = compose_incremental_update(&registry, &changes).unwrap();
        assert_eq!(message, "PLAYER_UPDATE\n2 0 X X\n0 0 0 0\n#");
    }

    #[test]
    fn test_moves_broadcast_empty_when_everyone_stationary() {
        let (mut registry, _) = registry_with(2);
        assert_eq!(compose_moves_broadcast(&mut registry, 0.0, true), None);
        assert_eq!(compose_moves_broadcast(&mut registry, 0.0, false), None);
    }

    #[test]
    fn test_moves_broadcast_announces_new_move_once() {
        let (mut registry, ids) = registry_with(2);
        registry.apply_command(ids[0], ClientCommand::Move { x: 5, y: 0 }, 100.0);

        let message = compose_moves_broadcast(&mut registry, 101.0, true).unwrap();
        assert_eq!(
            message,
            "PLAYER_MOVES_START\n0 0 0 5 0 5.000000 4.000000\n#"
        );
        assert!(!registry.get(ids[0]).unwrap().has_unannounced_move);

        // Announced once: the next new-only pass skips the same move
        assert_eq!(compose_moves_broadcast(&mut registry, 102.0, true), None);
    }

    #[test]
    fn test_handshake_snapshot_includes_already_announced_moves() {
        let (mut registry, ids) = registry_with(2);
        registry.apply_command(ids[0], ClientCommand::Move { x: 5, y: 0 }, 100.0);
        compose_moves_broadcast(&mut registry, 100.0, true).unwrap();

        let snapshot = compose_moves_broadcast(&mut registry, 102.0, false).unwrap();
        assert_eq!(
            snapshot,
            "PLAYER_MOVES_START\n0 0 0 5 0 5.000000 3.000000\n#"
        );
        // The unfiltered pass never touches the announcement flag
        assert!(!registry.get(ids[0]).unwrap().has_unannounced_move);
    }

    #[test]
    fn test_roster_lists_every_session_with_recipient_last() {
        let (mut registry, ids) = registry_with(3);
        registry.get_mut(ids[2]).unwrap().pos_start = shared::GridPos::new(-4, 7);

        let message = compose_roster(&registry, ids[0]);
        assert_eq!(message, "PLAYER_UPDATE\n1 0 0 0\n2 0 -4 7\n0 0 0 0\n#");
    }

    #[test]
    fn test_roster_for_sole_session_is_just_itself() {
        let (registry, ids) = registry_with(1);
        let message = compose_roster(&registry, ids[0]);
        assert_eq!(message, "PLAYER_UPDATE\n0 0 0 0\n#");
    }
}
