// Protocol messages for client-server communication.
//
// Two enums define the full vocabulary:
// - `ServerMessage`: sent by the arena server to a player.
// - `ClientMessage`: sent by a player to the server.
//
// Every message is one line of text. Encoders here produce the payload
// without the trailing newline; `framing.rs` adds and strips it. The board
// snapshot has one fixed-width grammar (`BoardSnapshot::encode`/`decode`)
// shared by both ends, so clients never guess at the server's spacing.
//
// `Q` (queue position) and `W` (win streak) carry a single raw byte rather
// than a decimal string. That byte may be any value, including `\n`, which
// is why clients decode through `framing::read_server_message` instead of
// splitting on newlines first.
//
// Client messages are positional: a bare `Y` or `5` only means something
// relative to the prompt the server last sent. `ClientMessage::parse`
// classifies the token; the session decides what it means.

use crate::error::ProtocolError;
use crate::types::{Mark, Position, QueuePosition, WinStreak};

/// Prompt sent to a winner, expecting a `Y`/`N` reply.
pub const REPLAY_PROMPT: &str = "Do you want to play again? (Y/N)";

/// Notice sent to the remaining player when the opponent disconnects.
pub const OPPONENT_LEFT: &str = "Opponent has left the game. You win by default.";

/// Encoded length of a board snapshot line (without newline).
pub const SNAPSHOT_LEN: usize = 109;

/// Width of one `square N: C` field.
const FIELD_LEN: usize = 11;

/// Full board state as seen by one recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub cells: [Option<Mark>; 9],
    /// True if it is now the recipient's turn.
    pub your_turn: bool,
}

impl BoardSnapshot {
    pub fn cell(&self, position: Position) -> Option<Mark> {
        self.cells[position.index()]
    }

    /// `square 1: C square 2: C ... square 9: C T`, exactly one character
    /// per cell (space when empty) and one space between fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::with_capacity(SNAPSHOT_LEN);
        for position in Position::all() {
            if position.get() > 1 {
                out.push(' ');
            }
            out.push_str("square ");
            out.push(char::from(b'0' + position.get()));
            out.push_str(": ");
            out.push(self.cell(position).map_or(' ', Mark::wire_char));
        }
        out.push(' ');
        out.push(if self.your_turn { '1' } else { '0' });
        out.into_bytes()
    }

    pub fn decode(line: &[u8]) -> Result<BoardSnapshot, ProtocolError> {
        if line.len() != SNAPSHOT_LEN {
            return Err(ProtocolError::MalformedBoard("wrong length"));
        }
        let mut cells = [None; 9];
        for position in Position::all() {
            let offset = position.index() * (FIELD_LEN + 1);
            let field = &line[offset..offset + FIELD_LEN];
            if &field[..7] != b"square " || field[7] != b'0' + position.get() {
                return Err(ProtocolError::MalformedBoard("bad field label"));
            }
            if &field[8..10] != b": " {
                return Err(ProtocolError::MalformedBoard("bad label separator"));
            }
            cells[position.index()] = match field[10] {
                b' ' => None,
                other => Some(
                    Mark::from_wire_char(char::from(other))
                        .ok_or(ProtocolError::MalformedBoard("bad cell value"))?,
                ),
            };
            if line[offset + FIELD_LEN] != b' ' {
                return Err(ProtocolError::MalformedBoard("bad field separator"));
            }
        }
        let your_turn = match line[SNAPSHOT_LEN - 1] {
            b'1' => true,
            b'0' => false,
            _ => return Err(ProtocolError::MalformedBoard("bad turn flag")),
        };
        Ok(BoardSnapshot { cells, your_turn })
    }
}

/// Messages sent by the server to a player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    /// Mark assigned for the session about to start.
    AssignMark(Mark),
    /// Now waiting in an otherwise empty queue.
    Waiting,
    /// Current 1-based queue rank.
    QueuePosition(QueuePosition),
    /// Full board plus whose turn it is.
    Board(BoardSnapshot),
    /// Last move rejected.
    InvalidMove,
    /// Recipient won; carries the updated streak.
    Won(WinStreak),
    Lost,
    Tie,
    ReplayPrompt,
    OpponentLeft,
}

impl ServerMessage {
    /// Wire bytes without the trailing newline.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ServerMessage::AssignMark(mark) => vec![mark.wire_char() as u8],
            ServerMessage::Waiting => b"w".to_vec(),
            ServerMessage::QueuePosition(position) => vec![b'Q', position.get()],
            ServerMessage::Board(snapshot) => snapshot.encode(),
            ServerMessage::InvalidMove => b"I".to_vec(),
            ServerMessage::Won(streak) => vec![b'W', streak.get()],
            ServerMessage::Lost => b"L".to_vec(),
            ServerMessage::Tie => b"T".to_vec(),
            ServerMessage::ReplayPrompt => REPLAY_PROMPT.as_bytes().to_vec(),
            ServerMessage::OpponentLeft => OPPONENT_LEFT.as_bytes().to_vec(),
        }
    }

    /// Decode one line (newline already stripped).
    pub fn decode(line: &[u8]) -> Result<ServerMessage, ProtocolError> {
        let message = match line {
            [b'Q'] => return Err(ProtocolError::MissingPayload { tag: 'Q' }),
            [b'W'] => return Err(ProtocolError::MissingPayload { tag: 'W' }),
            [b'Q', byte] => ServerMessage::QueuePosition(
                QueuePosition::from_byte(*byte).ok_or(ProtocolError::InvalidQueuePosition)?,
            ),
            [b'W', byte] => ServerMessage::Won(WinStreak(*byte)),
            b"w" => ServerMessage::Waiting,
            b"I" => ServerMessage::InvalidMove,
            b"L" => ServerMessage::Lost,
            b"T" => ServerMessage::Tie,
            [b'x' | b'X'] => ServerMessage::AssignMark(Mark::X),
            [b'o' | b'O'] => ServerMessage::AssignMark(Mark::O),
            _ if line.starts_with(b"square ") => {
                ServerMessage::Board(BoardSnapshot::decode(line)?)
            }
            _ if line == REPLAY_PROMPT.as_bytes() => ServerMessage::ReplayPrompt,
            _ if line == OPPONENT_LEFT.as_bytes() => ServerMessage::OpponentLeft,
            _ => {
                return Err(ProtocolError::UnknownMessage(
                    String::from_utf8_lossy(line).into_owned(),
                ));
            }
        };
        Ok(message)
    }
}

/// Messages sent by a player to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    /// Claim a cell.
    Move(Position),
    /// Leave the session or the queue.
    Quit,
    /// Answer to `ReplayPrompt`.
    Replay(bool),
    /// Anything else, including out-of-range numbers. Kept verbatim for logs.
    Unrecognized(String),
}

impl ClientMessage {
    /// Classify one line of client input. Surrounding whitespace is ignored;
    /// letters are case-insensitive.
    pub fn parse(line: &str) -> ClientMessage {
        let token = line.trim();
        if token.eq_ignore_ascii_case("q") {
            ClientMessage::Quit
        } else if token.eq_ignore_ascii_case("y") {
            ClientMessage::Replay(true)
        } else if token.eq_ignore_ascii_case("n") {
            ClientMessage::Replay(false)
        } else if let Some(position) = Position::parse(token) {
            ClientMessage::Move(position)
        } else {
            ClientMessage::Unrecognized(token.to_string())
        }
    }

    /// Parse raw wire bytes, replacing invalid UTF-8.
    pub fn parse_bytes(line: &[u8]) -> ClientMessage {
        ClientMessage::parse(&String::from_utf8_lossy(line))
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            ClientMessage::Move(position) => position.to_string().into_bytes(),
            ClientMessage::Quit => b"Q".to_vec(),
            ClientMessage::Replay(true) => b"Y".to_vec(),
            ClientMessage::Replay(false) => b"N".to_vec(),
            ClientMessage::Unrecognized(text) => text.clone().into_bytes(),
        }
    }
}
