// Test-only player for arena integration tests.
//
// Wraps the real `ArenaClient` (from `arena_server::client`) in a
// synchronous, assertion-friendly API: every wait has a timeout and panics
// with what it saw instead, and queue-position updates (which arrive on the
// scheduler's own cadence) can be skipped so scenarios read as the game
// flow they test.
//
// See also: `tests/matchmaking.rs` for the scenarios.

use std::net::SocketAddr;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};

use arena_protocol::{BoardSnapshot, Mark, Position, ServerMessage, WinStreak};
use arena_server::client::ArenaClient;
use arena_server::{ServerConfig, ServerHandle, start_server};

/// Default timeout for blocking waits.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between condition checks in `wait_until`.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Scheduler tick used by tests.
pub const TEST_TICK_MS: u64 = 20;

/// Start a server on a random localhost port with a fast tick.
pub fn start_test_server(max_sessions: usize) -> (ServerHandle, SocketAddr) {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        tick_ms: TEST_TICK_MS,
        max_sessions,
        seed: Some(42),
        ..ServerConfig::default()
    };
    start_server(config).expect("start_server failed")
}

/// Poll `condition` until it holds or the timeout passes.
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
        thread::sleep(POLL_INTERVAL);
    }
}

pub struct TestPlayer {
    client: ArenaClient,
}

impl TestPlayer {
    pub fn connect(addr: SocketAddr) -> Self {
        let client = ArenaClient::connect(&addr.to_string()).expect("TestPlayer::connect failed");
        Self { client }
    }

    /// Next message of any kind.
    pub fn next_message(&mut self) -> ServerMessage {
        match self.client.recv_timeout(POLL_TIMEOUT) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => panic!("timed out waiting for a server message"),
            Err(RecvTimeoutError::Disconnected) => panic!("server closed the connection"),
        }
    }

    /// Next message that is not a queue-position update.
    pub fn next_non_queue(&mut self) -> ServerMessage {
        loop {
            match self.next_message() {
                ServerMessage::QueuePosition(_) => continue,
                other => return other,
            }
        }
    }

    /// Assert the next non-queue message.
    pub fn expect(&mut self, expected: ServerMessage) {
        let got = self.next_non_queue();
        assert_eq!(got, expected);
    }

    /// Skip queue updates until told position `n`.
    pub fn expect_queue_position(&mut self, n: u8) {
        loop {
            match self.next_message() {
                ServerMessage::QueuePosition(p) if p.get() == n => return,
                ServerMessage::QueuePosition(_) => continue,
                other => panic!("expected queue position {n}, got {other:?}"),
            }
        }
    }

    /// Wait for the start of a session; returns the mark and checks the
    /// opening board.
    pub fn expect_game_start(&mut self) -> Mark {
        let mark = match self.next_non_queue() {
            ServerMessage::AssignMark(mark) => mark,
            other => panic!("expected a mark, got {other:?}"),
        };
        let opening = self.board();
        assert!(opening.cells.iter().all(Option::is_none));
        assert_eq!(opening.your_turn, mark == Mark::X);
        mark
    }

    pub fn board(&mut self) -> BoardSnapshot {
        match self.next_non_queue() {
            ServerMessage::Board(snapshot) => snapshot,
            other => panic!("expected a board, got {other:?}"),
        }
    }

    pub fn expect_win(&mut self, streak: u8) {
        self.expect(ServerMessage::Won(WinStreak(streak)));
    }

    /// Assert that no non-queue message arrives within `wait`.
    pub fn expect_quiet(&mut self, wait: Duration) {
        let deadline = Instant::now() + wait;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return;
            }
            match self.client.recv_timeout(left) {
                Ok(ServerMessage::QueuePosition(_)) => continue,
                Ok(other) => panic!("expected silence, got {other:?}"),
                Err(RecvTimeoutError::Timeout) => return,
                Err(RecvTimeoutError::Disconnected) => panic!("server closed the connection"),
            }
        }
    }

    /// Drain until the server closes the stream.
    pub fn expect_closed(&mut self) {
        loop {
            match self.client.recv_timeout(POLL_TIMEOUT) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => panic!("server kept the connection open"),
            }
        }
    }

    pub fn play(&mut self, n: u8) {
        let position = Position::new(n).expect("square out of range");
        self.client.send_move(position).expect("send_move failed");
    }

    pub fn send_raw(&mut self, line: &str) {
        self.client.send_raw(line).expect("send_raw failed");
    }

    pub fn reply(&mut self, again: bool) {
        self.client.reply(again).expect("reply failed");
    }

    pub fn quit(&mut self) {
        self.client.quit().expect("quit failed");
    }

    pub fn disconnect(self) {
        self.client.disconnect();
    }
}

/// Play `moves` alternately starting with `x`, checking that every move
/// but the last is broadcast to both players. The final move's result is
/// left for the caller to read.
pub fn play_moves(x: &mut TestPlayer, o: &mut TestPlayer, moves: &[u8]) {
    let Some((&last, rest)) = moves.split_last() else {
        return;
    };
    for (i, &n) in rest.iter().enumerate() {
        let x_moves = i % 2 == 0;
        if x_moves {
            x.play(n);
        } else {
            o.play(n);
        }
        let x_view = x.board();
        let o_view = o.board();
        assert_eq!(x_view.cells, o_view.cells);
        assert_eq!(x_view.your_turn, !x_moves);
        assert_eq!(o_view.your_turn, x_moves);
    }
    if rest.len() % 2 == 0 {
        x.play(last);
    } else {
        o.play(last);
    }
}

/// Connect two players in order so the first plays X, and wait for their
/// game to start.
pub fn paired_players(addr: SocketAddr) -> (TestPlayer, TestPlayer) {
    let mut x = TestPlayer::connect(addr);
    x.expect(ServerMessage::Waiting);
    let mut o = TestPlayer::connect(addr);
    assert_eq!(x.expect_game_start(), Mark::X);
    assert_eq!(o.expect_game_start(), Mark::O);
    (x, o)
}
