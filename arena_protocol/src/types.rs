// Core value types for the arena protocol.
//
// These are small, validated newtypes shared by `message.rs` (wire encoding)
// and the server's board and session code. Validation happens at
// construction, so a `Position` is always a real cell and a `QueuePosition`
// is always a transmittable rank.

use std::fmt;
use std::num::NonZeroU8;

/// One of the two symbols a player is assigned for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// The single character used for this mark on the wire.
    pub fn wire_char(self) -> char {
        match self {
            Mark::X => 'x',
            Mark::O => 'o',
        }
    }

    /// Parse a wire character. Either case is accepted.
    pub fn from_wire_char(c: char) -> Option<Mark> {
        match c {
            'x' | 'X' => Some(Mark::X),
            'o' | 'O' => Some(Mark::O),
            _ => None,
        }
    }

    /// The other mark.
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_char())
    }
}

/// A board cell, numbered 1-9 left to right, top to bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position(u8);

impl Position {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 9;

    /// Returns `None` when `n` is outside 1-9.
    pub fn new(n: u8) -> Option<Position> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(Position(n))
    }

    /// Parse a decimal move token such as `"5"`.
    pub fn parse(token: &str) -> Option<Position> {
        token.parse::<u8>().ok().and_then(Position::new)
    }

    /// The 1-based cell number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// The 0-based index into a 9-cell array.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// All nine positions in order.
    pub fn all() -> impl Iterator<Item = Position> {
        (Self::MIN..=Self::MAX).map(Position)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consecutive wins by one connection, saturating at 255 so it always fits
/// the one-byte `W` payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WinStreak(pub u8);

impl WinStreak {
    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// 1-based rank in the matchmaking queue as transmitted in a `Q` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueuePosition(NonZeroU8);

impl QueuePosition {
    /// Map a 1-based rank to its wire value. Ranks beyond 255 are capped.
    /// Rank 0 has no wire representation and yields `None`.
    pub fn from_rank(rank: usize) -> Option<QueuePosition> {
        let capped = u8::try_from(rank).unwrap_or(u8::MAX);
        NonZeroU8::new(capped).map(QueuePosition)
    }

    pub fn from_byte(byte: u8) -> Option<QueuePosition> {
        NonZeroU8::new(byte).map(QueuePosition)
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for QueuePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
