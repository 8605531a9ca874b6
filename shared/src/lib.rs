pub const DEFAULT_PORT: u16 = 5077;
pub const GRID_UNITS_PER_SECOND: f64 = 1.0;

pub const MESSAGE_TERMINATOR: u8 = b'#';
pub const PLAYER_UPDATE_HEADER: &str = "PLAYER_UPDATE\n";
pub const PLAYER_MOVES_HEADER: &str = "PLAYER_MOVES_START\n";

/// Tokens standing in for coordinates in a departure line.
pub const DEPARTURE_SENTINEL: &str = "X X";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Move { x: i32, y: i32 },
    Use { x: i32, y: i32 },
    Grab { x: i32, y: i32 },
    Drop { x: i32, y: i32 },
    Unknown,
}

impl ClientCommand {
    /// Parses one framed client message of the form `<COMMAND> <X> <Y>`.
    ///
    /// Parsing is purely syntactic: an unrecognized command name or a
    /// malformed integer yields `Unknown`, never an error. Tokens past the
    /// third are ignored.
    pub fn parse(message: &str) -> ClientCommand {
        let mut tokens = message.split_whitespace();
        let (name, x_token, y_token) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(name), Some(x), Some(y)) => (name, x, y),
            _ => return ClientCommand::Unknown,
        };

        let (x, y) = match (x_token.parse::<i32>(), y_token.parse::<i32>()) {
            (Ok(x), Ok(y)) => (x, y),
            _ => return ClientCommand::Unknown,
        };

        match name {
            "MOVE" => ClientCommand::Move { x, y },
            "USE" => ClientCommand::Use { x, y },
            "GRAB" => ClientCommand::Grab { x, y },
            "DROP" => ClientCommand::Drop { x, y },
            _ => ClientCommand::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in grid units.
    pub fn distance(&self, other: &GridPos) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Seconds needed to walk from `start` to `dest` at constant speed.
pub fn travel_seconds(start: &GridPos, dest: &GridPos) -> f64 {
    start.distance(dest) / GRID_UNITS_PER_SECOND
}

/// Interpolation parameters for one in-flight move.
///
/// Only meaningful while the owning session's start and destination differ;
/// a stationary session carries stale values here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveProgress {
    pub start_time: f64,
    pub total_seconds: f64,
}

impl MoveProgress {
    pub fn begin(start_time: f64, total_seconds: f64) -> Self {
        Self {
            start_time,
            total_seconds,
        }
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.start_time
    }

    pub fn eta_seconds(&self, now: f64) -> f64 {
        self.total_seconds - self.elapsed(now)
    }

    /// A move exactly at the boundary is still in progress for one more
    /// tick; completion requires strictly more elapsed time than the total.
    pub fn is_complete(&self, now: f64) -> bool {
        self.elapsed(now) > self.total_seconds
    }
}

/// One roster or update line: `<id> <holding_id> <x> <y>`.
pub fn position_line(id: u32, holding_id: i32, pos: &GridPos) -> String {
    format!("{} {} {} {}\n", id, holding_id, pos.x, pos.y)
}

/// Update line announcing a removed session to its peers.
pub fn departure_line(id: u32, holding_id: i32) -> String {
    format!("{} {} {}\n", id, holding_id, DEPARTURE_SENTINEL)
}

/// One moves-broadcast line: id, start, destination, duration and eta.
pub fn move_line(id: u32, start: &GridPos, dest: &GridPos, total_seconds: f64, eta_seconds: f64) -> String {
    format!(
        "{} {} {} {} {} {:.6} {:.6}\n",
        id, start.x, start.y, dest.x, dest.y, total_seconds, eta_seconds
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_parse_move() {
        assert_eq!(
            ClientCommand::parse("MOVE 5 0"),
            ClientCommand::Move { x: 5, y: 0 }
        );
        assert_eq!(
            ClientCommand::parse("MOVE -3 12"),
            ClientCommand::Move { x: -3, y: 12 }
        );
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(
            ClientCommand::parse("USE 1 2"),
            ClientCommand::Use { x: 1, y: 2 }
        );
        assert_eq!(
            ClientCommand::parse("GRAB 0 0"),
            ClientCommand::Grab { x: 0, y: 0 }
        );
        assert_eq!(
            ClientCommand::parse("DROP 7 -7"),
            ClientCommand::Drop { x: 7, y: -7 }
        );
    }

    #[test]
    fn test_parse_unknown_command_name() {
        assert_eq!(ClientCommand::parse("FOO 1 2"), ClientCommand::Unknown);
        assert_eq!(ClientCommand::parse("move 1 2"), ClientCommand::Unknown);
    }

    #[test]
    fn test_parse_malformed_coordinates() {
        assert_eq!(ClientCommand::parse("MOVE a 2"), ClientCommand::Unknown);
        assert_eq!(ClientCommand::parse("MOVE 1 2.5"), ClientCommand::Unknown);
        assert_eq!(ClientCommand::parse("MOVE 1"), ClientCommand::Unknown);
        assert_eq!(ClientCommand::parse("MOVE"), ClientCommand::Unknown);
        assert_eq!(ClientCommand::parse(""), ClientCommand::Unknown);
        assert_eq!(ClientCommand::parse("   "), ClientCommand::Unknown);
    }

    #[test]
    fn test_parse_ignores_extra_tokens() {
        assert_eq!(
            ClientCommand::parse("MOVE 5 0 garbage"),
            ClientCommand::Move { x: 5, y: 0 }
        );
    }

    #[test]
    fn test_parse_never_panics_on_arbitrary_input() {
        let inputs = [
            "\u{0}\u{1}\u{2}",
            "MOVE 99999999999999999999 0",
            "MOVE  5  0",
            "\nMOVE\n5\n0\n",
            "####",
            "PLAYER_UPDATE",
        ];
        for input in inputs {
            let _ = ClientCommand::parse(input);
        }
        // Whitespace-tolerant parsing still resolves the valid ones
        assert_eq!(
            ClientCommand::parse("MOVE  5  0"),
            ClientCommand::Move { x: 5, y: 0 }
        );
        // An integer too large for i32 is malformed, not fatal
        assert_eq!(
            ClientCommand::parse("MOVE 99999999999999999999 0"),
            ClientCommand::Unknown
        );
    }

    #[test]
    fn test_distance() {
        let origin = GridPos::new(0, 0);
        assert_approx_eq!(origin.distance(&GridPos::new(5, 0)), 5.0);
        assert_approx_eq!(origin.distance(&GridPos::new(3, 4)), 5.0);
        assert_approx_eq!(origin.distance(&origin), 0.0);
        assert_approx_eq!(GridPos::new(-3, 0).distance(&GridPos::new(0, 4)), 5.0);
    }

    #[test]
    fn test_travel_seconds_unit_speed() {
        let start = GridPos::new(0, 0);
        let dest = GridPos::new(5, 0);
        assert_approx_eq!(travel_seconds(&start, &dest), 5.0);
    }

    #[test]
    fn test_move_progress_in_flight() {
        let progress = MoveProgress::begin(10.0, 5.0);
        assert!(!progress.is_complete(12.0));
        assert_approx_eq!(progress.elapsed(12.0), 2.0);
        assert_approx_eq!(progress.eta_seconds(12.0), 3.0);
        assert!(progress.eta_seconds(12.0) > 0.0);
    }

    #[test]
    fn test_move_progress_boundary_is_still_in_flight() {
        let progress = MoveProgress::begin(10.0, 5.0);
        assert!(!progress.is_complete(15.0));
        assert!(progress.is_complete(15.0 + 1e-9));
    }

    #[test]
    fn test_position_line_format() {
        assert_eq!(position_line(0, 0, &GridPos::new(5, 0)), "0 0 5 0\n");
        assert_eq!(position_line(12, 3, &GridPos::new(-1, 9)), "12 3 -1 9\n");
    }

    #[test]
    fn test_departure_line_format() {
        assert_eq!(departure_line(1, 0), "1 0 X X\n");
    }

    #[test]
    fn test_move_line_format() {
        let line = move_line(0, &GridPos::new(0, 0), &GridPos::new(5, 0), 5.0, 4.0);
        assert_eq!(line, "0 0 0 5 0 5.000000 4.000000\n");
    }
}
