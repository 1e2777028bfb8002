// Server-side handle on one connected player.
//
// A `PlayerConnection` owns the player's socket (split into a buffered
// reader and writer over cloned handles), the mark and turn flag for the
// session it is currently in, and its running win streak. It is owned by
// exactly one place at a time: the accept thread, the matchmaking queue, or
// a game session. Moving it between them is how ownership of the player is
// handed off, so no locking happens here.
//
// Failure model: sending is best-effort. A write error marks the
// connection dead instead of returning an error, and the owner notices via
// `is_alive()` / `probe()` at its next decision point. Reading distinguishes
// end-of-stream (`None`) from input lines; a line that does not parse is
// still returned (as `ClientMessage::Unrecognized`) so the session can
// answer it with `I`.
//
// `probe()` is the only non-blocking read. It is used while a player waits
// in the queue, where nobody is reading from the socket, to notice peers
// that closed or sent `Q`. Partial lines survive across probes in
// `pending`.

use std::fmt;
use std::io::{self, BufReader, BufWriter, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arena_protocol::{ClientMessage, Mark, ServerMessage, WinStreak, read_line, write_line};
use tracing::{debug, info};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Longest a single send may block on a peer that stopped reading. A send
/// that times out marks the connection dead like any other write error.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-unique connection identifier, used for logging and queue
/// bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct PlayerConnection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    /// Bytes of an unterminated line left by a non-blocking read.
    pending: Vec<u8>,
    mark: Option<Mark>,
    has_turn: bool,
    streak: WinStreak,
    alive: bool,
}

impl PlayerConnection {
    /// Wrap an accepted stream. The stream must be in blocking mode.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let peer = stream.peer_addr().ok();
        let reader = BufReader::new(stream.try_clone()?);
        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        Ok(Self {
            id,
            peer,
            reader,
            writer: BufWriter::new(stream),
            pending: Vec::new(),
            mark: None,
            has_turn: false,
            streak: WinStreak::default(),
            alive: true,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn mark(&self) -> Option<Mark> {
        self.mark
    }

    pub fn has_turn(&self) -> bool {
        self.has_turn
    }

    pub fn set_turn(&mut self, has_turn: bool) {
        self.has_turn = has_turn;
    }

    /// Bind to a session with the given mark and turn flag.
    pub fn assign(&mut self, mark: Mark, has_turn: bool) {
        self.mark = Some(mark);
        self.has_turn = has_turn;
    }

    /// Forget the session binding before going back to the queue.
    pub fn clear_assignment(&mut self) {
        self.mark = None;
        self.has_turn = false;
    }

    pub fn streak(&self) -> WinStreak {
        self.streak
    }

    pub fn increment_streak(&mut self) -> WinStreak {
        self.streak.increment();
        self.streak
    }

    pub fn reset_streak(&mut self) {
        self.streak.reset();
    }

    /// Write one message line. Failures mark the connection dead.
    pub fn send(&mut self, message: &ServerMessage) {
        if !self.alive {
            return;
        }
        if let Err(e) = write_line(&mut self.writer, &message.encode()) {
            debug!(connection = %self.id, error = %e, "write failed, marking connection dead");
            self.alive = false;
        }
    }

    /// Block until the next input line arrives. `None` means the peer is
    /// gone (end of stream, read error, or an oversized line).
    pub fn receive(&mut self) -> Option<ClientMessage> {
        if !self.alive {
            return None;
        }
        loop {
            match read_line(&mut self.reader, &mut self.pending) {
                Ok(Some(line)) => return Some(ClientMessage::parse_bytes(&line)),
                Ok(None) => {
                    debug!(connection = %self.id, "peer closed the stream");
                    self.alive = false;
                    return None;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(connection = %self.id, error = %e, "read failed, marking connection dead");
                    self.alive = false;
                    return None;
                }
            }
        }
    }

    /// Non-blocking liveness check for a queued player.
    ///
    /// Drains whatever input is already buffered: end of stream or a read
    /// error marks the connection dead, a `Q` line closes it, and any other
    /// line is discarded since queued players have nothing to say.
    /// Returns whether the connection is still alive.
    pub fn probe(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        if let Err(e) = self.reader.get_ref().set_nonblocking(true) {
            debug!(connection = %self.id, error = %e, "cannot probe socket");
            self.alive = false;
            return false;
        }
        loop {
            match read_line(&mut self.reader, &mut self.pending) {
                Ok(Some(line)) => match ClientMessage::parse_bytes(&line) {
                    ClientMessage::Quit => {
                        info!(connection = %self.id, "player quit while queued");
                        self.close();
                        break;
                    }
                    other => {
                        debug!(connection = %self.id, input = ?other, "ignoring input while queued");
                    }
                },
                Ok(None) => {
                    debug!(connection = %self.id, "queued peer closed the stream");
                    self.alive = false;
                    break;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(connection = %self.id, error = %e, "probe read failed");
                    self.alive = false;
                    break;
                }
            }
        }
        if self.alive {
            if let Err(e) = self.reader.get_ref().set_nonblocking(false) {
                debug!(connection = %self.id, error = %e, "cannot restore blocking mode");
                self.alive = false;
            }
        }
        self.alive
    }

    /// Flush and shut the socket down in both directions.
    pub fn close(&mut self) {
        let _ = self.writer.flush();
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        self.alive = false;
    }
}

impl fmt::Debug for PlayerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerConnection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("mark", &self.mark)
            .field("has_turn", &self.has_turn)
            .field("streak", &self.streak)
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}
