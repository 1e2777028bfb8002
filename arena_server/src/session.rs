// One game of tic-tac-toe between two paired players.
//
// A `GameSession` owns both `PlayerConnection`s for the length of the game
// and runs on a worker-pool thread. It is a small state machine:
//
//   AwaitingMove(mark) --valid move, no result--> AwaitingMove(opponent)
//   AwaitingMove(mark) --bad / occupied move-----> AwaitingMove(mark)  (sends I)
//   AwaitingMove(mark) --move completes a line---> Won(mark)
//   AwaitingMove(mark) --move fills the board----> Draw
//   AwaitingMove(mark) --quit / end of stream----> Disconnected(mark)
//
// Only the player whose turn it is gets read; input from the other player
// sits in its socket until its turn comes (or until it is probed in the
// queue afterwards). Each terminal state hands the surviving players back
// to the `Coordinator`, which sends their queue positions.
//
// The final move is not broadcast as a board; the result messages (`W`,
// `L`, `T`) end the game for the clients.

use std::fmt;
use std::sync::Arc;

use arena_prng::ArenaRng;
use arena_protocol::{ClientMessage, Mark, Position, ServerMessage, WinStreak};
use tracing::{debug, info};

use crate::board::Board;
use crate::matchmaking::Coordinator;
use crate::player::{ConnectionId, PlayerConnection};

/// Identifies a session in logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingMove(Mark),
    Won(Mark),
    Draw,
    /// The player holding this mark quit or dropped.
    Disconnected(Mark),
}

/// How a session ended, for logging and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Won {
        winner: ConnectionId,
        streak: WinStreak,
        /// Whether the winner accepted the replay prompt.
        replay: bool,
    },
    Draw,
    Abandoned {
        quitter: ConnectionId,
    },
}

pub struct GameSession {
    id: SessionId,
    x: PlayerConnection,
    o: PlayerConnection,
    board: Board,
    state: SessionState,
    coordinator: Arc<Coordinator>,
    rng: ArenaRng,
}

impl GameSession {
    /// Bind two players to a new game and send the opening messages.
    /// `first` plays X and moves first.
    pub fn new(
        id: SessionId,
        mut first: PlayerConnection,
        mut second: PlayerConnection,
        coordinator: Arc<Coordinator>,
        rng: ArenaRng,
    ) -> Self {
        first.assign(Mark::X, true);
        second.assign(Mark::O, false);
        first.send(&ServerMessage::AssignMark(Mark::X));
        second.send(&ServerMessage::AssignMark(Mark::O));
        info!(session = %id, x = %first.id(), o = %second.id(), "session started");

        let mut session = Self {
            id,
            x: first,
            o: second,
            board: Board::new(),
            state: SessionState::AwaitingMove(Mark::X),
            coordinator,
            rng,
        };
        session.broadcast_board();
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Play to completion and requeue whoever should go back in line.
    pub fn run(mut self) -> SessionOutcome {
        loop {
            match self.state {
                SessionState::AwaitingMove(mark) => self.state = self.play_turn(mark),
                SessionState::Won(mark) => return self.finish_win(mark),
                SessionState::Draw => return self.finish_draw(),
                SessionState::Disconnected(mark) => return self.finish_disconnect(mark),
            }
        }
    }

    fn player_mut(&mut self, mark: Mark) -> &mut PlayerConnection {
        match mark {
            Mark::X => &mut self.x,
            Mark::O => &mut self.o,
        }
    }

    /// The player holding `mark` and its opponent.
    fn pair_mut(&mut self, mark: Mark) -> (&mut PlayerConnection, &mut PlayerConnection) {
        match mark {
            Mark::X => (&mut self.x, &mut self.o),
            Mark::O => (&mut self.o, &mut self.x),
        }
    }

    fn broadcast_board(&mut self) {
        let for_x = self.board.snapshot(self.x.has_turn());
        let for_o = self.board.snapshot(self.o.has_turn());
        self.x.send(&ServerMessage::Board(for_x));
        self.o.send(&ServerMessage::Board(for_o));
    }

    fn play_turn(&mut self, mark: Mark) -> SessionState {
        let session = self.id;
        let player = self.player_mut(mark);
        match player.receive() {
            None | Some(ClientMessage::Quit) => SessionState::Disconnected(mark),
            Some(ClientMessage::Move(position)) => self.apply_move(mark, position),
            Some(other) => {
                debug!(%session, connection = %player.id(), input = ?other, "rejecting input");
                player.send(&ServerMessage::InvalidMove);
                SessionState::AwaitingMove(mark)
            }
        }
    }

    fn apply_move(&mut self, mark: Mark, position: Position) -> SessionState {
        if let Err(e) = self.board.place(position, mark) {
            debug!(session = %self.id, %mark, error = %e, "rejecting move");
            self.player_mut(mark).send(&ServerMessage::InvalidMove);
            return SessionState::AwaitingMove(mark);
        }
        debug!(session = %self.id, %mark, %position, "move applied");

        let (mover, other) = self.pair_mut(mark);
        mover.set_turn(false);
        other.set_turn(true);
        if self.board.has_win(mark) {
            return SessionState::Won(mark);
        }
        if self.board.is_full() {
            return SessionState::Draw;
        }
        self.broadcast_board();
        SessionState::AwaitingMove(mark.opponent())
    }

    fn finish_win(self, mark: Mark) -> SessionOutcome {
        let GameSession {
            id, x, o, coordinator, ..
        } = self;
        let (mut winner, mut loser) = match mark {
            Mark::X => (x, o),
            Mark::O => (o, x),
        };

        let streak = winner.increment_streak();
        loser.reset_streak();
        winner.send(&ServerMessage::Won(streak));
        loser.send(&ServerMessage::Lost);
        winner.send(&ServerMessage::ReplayPrompt);

        let winner_id = winner.id();
        let replay = matches!(winner.receive(), Some(ClientMessage::Replay(true)));
        info!(session = %id, winner = %winner_id, streak = streak.get(), replay, "session won");

        if replay {
            coordinator.requeue_front(winner);
        } else {
            winner.close();
        }
        coordinator.requeue_back(loser);

        SessionOutcome::Won {
            winner: winner_id,
            streak,
            replay,
        }
    }

    fn finish_draw(mut self) -> SessionOutcome {
        self.x.send(&ServerMessage::Tie);
        self.o.send(&ServerMessage::Tie);
        let x_first = self.rng.coin_flip();
        info!(session = %self.id, x_first, "session drawn");

        let GameSession {
            x, o, coordinator, ..
        } = self;
        if x_first {
            coordinator.requeue_draw_pair(x, o);
        } else {
            coordinator.requeue_draw_pair(o, x);
        }
        SessionOutcome::Draw
    }

    fn finish_disconnect(self, mark: Mark) -> SessionOutcome {
        let GameSession {
            id, x, o, coordinator, ..
        } = self;
        let (mut quitter, mut remaining) = match mark {
            Mark::X => (x, o),
            Mark::O => (o, x),
        };

        let quitter_id = quitter.id();
        quitter.close();
        remaining.send(&ServerMessage::OpponentLeft);
        let streak = remaining.increment_streak();
        remaining.send(&ServerMessage::Won(streak));
        info!(session = %id, quitter = %quitter_id, winner = %remaining.id(), "session abandoned");

        coordinator.requeue_back(remaining);
        SessionOutcome::Abandoned {
            quitter: quitter_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use arena_protocol::{BoardSnapshot, QueuePosition};

    use super::*;
    use crate::test_support::{Peer, connection};

    struct Game {
        x: Peer,
        o: Peer,
        x_id: ConnectionId,
        o_id: ConnectionId,
        coordinator: Arc<Coordinator>,
        handle: JoinHandle<SessionOutcome>,
    }

    fn start_with(coordinator: Arc<Coordinator>, seed: u64, x_streak: u8) -> Game {
        let (mut x_peer, mut x_conn) = connection();
        let (mut o_peer, o_conn) = connection();
        for _ in 0..x_streak {
            x_conn.increment_streak();
        }
        let (x_id, o_id) = (x_conn.id(), o_conn.id());
        let session = GameSession::new(
            SessionId(1),
            x_conn,
            o_conn,
            Arc::clone(&coordinator),
            ArenaRng::new(seed),
        );
        assert_eq!(session.state(), SessionState::AwaitingMove(Mark::X));
        let handle = thread::spawn(move || session.run());

        assert_eq!(x_peer.recv(), ServerMessage::AssignMark(Mark::X));
        assert_eq!(o_peer.recv(), ServerMessage::AssignMark(Mark::O));
        assert_eq!(x_peer.recv(), ServerMessage::Board(empty(true)));
        assert_eq!(o_peer.recv(), ServerMessage::Board(empty(false)));
        Game {
            x: x_peer,
            o: o_peer,
            x_id,
            o_id,
            coordinator,
            handle,
        }
    }

    fn start() -> Game {
        start_with(Arc::new(Coordinator::new(9)), 1, 0)
    }

    fn empty(your_turn: bool) -> BoardSnapshot {
        BoardSnapshot {
            cells: [None; 9],
            your_turn,
        }
    }

    fn board(peer: &mut Peer) -> BoardSnapshot {
        match peer.recv() {
            ServerMessage::Board(snapshot) => snapshot,
            other => panic!("expected board, got {other:?}"),
        }
    }

    fn pos(n: u8) -> Position {
        Position::new(n).unwrap()
    }

    fn q(n: usize) -> ServerMessage {
        ServerMessage::QueuePosition(QueuePosition::from_rank(n).unwrap())
    }

    impl Game {
        /// Play a move that neither ends the game nor is rejected.
        fn play(&mut self, mark: Mark, n: u8) {
            let mover = match mark {
                Mark::X => &mut self.x,
                Mark::O => &mut self.o,
            };
            mover.send(&n.to_string());
            let x_view = board(&mut self.x);
            let o_view = board(&mut self.o);
            assert_eq!(x_view.cells, o_view.cells);
            assert_eq!(x_view.cell(pos(n)), Some(mark));
            assert_eq!(x_view.your_turn, mark == Mark::O);
            assert_eq!(o_view.your_turn, mark == Mark::X);
        }
    }

    #[test]
    fn move_is_broadcast_and_turn_passes() {
        let mut game = start();
        game.play(Mark::X, 5);
        game.play(Mark::O, 1);
        drop(game.x);
        drop(game.o);
        let _ = game.handle.join();
    }

    #[test]
    fn occupied_and_garbage_moves_are_rejected() {
        let mut game = start();
        game.play(Mark::X, 5);

        game.o.send("5");
        assert_eq!(game.o.recv(), ServerMessage::InvalidMove);
        game.o.send("abc");
        assert_eq!(game.o.recv(), ServerMessage::InvalidMove);
        game.o.send("10");
        assert_eq!(game.o.recv(), ServerMessage::InvalidMove);
        game.o.send("0");
        assert_eq!(game.o.recv(), ServerMessage::InvalidMove);
        assert!(game.x.is_quiet(Duration::from_millis(100)));

        // Turn stayed with O.
        game.play(Mark::O, 1);

        // X retries O's square, then plays a fresh one.
        game.x.send("1");
        assert_eq!(game.x.recv(), ServerMessage::InvalidMove);
        game.play(Mark::X, 2);
        drop(game.x);
        drop(game.o);
        let _ = game.handle.join();
    }

    #[test]
    fn win_with_replay_requeues_winner_first() {
        let coordinator = Arc::new(Coordinator::new(9));
        let (mut waiting_peer, waiting) = connection();
        let waiting_id = waiting.id();
        coordinator.enqueue(waiting);
        assert_eq!(waiting_peer.recv(), ServerMessage::Waiting);

        let mut game = start_with(Arc::clone(&coordinator), 1, 2);
        game.play(Mark::X, 1);
        game.play(Mark::O, 4);
        game.play(Mark::X, 2);
        game.play(Mark::O, 5);
        game.x.send("3");

        assert_eq!(game.x.recv(), ServerMessage::Won(WinStreak(3)));
        assert_eq!(game.x.recv(), ServerMessage::ReplayPrompt);
        assert_eq!(game.o.recv(), ServerMessage::Lost);
        game.x.send("y");

        assert_eq!(game.x.recv(), q(1));
        assert_eq!(game.o.recv(), q(3));
        let outcome = game.handle.join().unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Won {
                winner: game.x_id,
                streak: WinStreak(3),
                replay: true,
            }
        );
        assert_eq!(
            game.coordinator.queued_players(),
            vec![
                (game.x_id, WinStreak(3)),
                (waiting_id, WinStreak(0)),
                (game.o_id, WinStreak(0)),
            ]
        );
    }

    #[test]
    fn o_can_win() {
        let mut game = start();
        game.play(Mark::X, 1);
        game.play(Mark::O, 3);
        game.play(Mark::X, 2);
        game.play(Mark::O, 5);
        game.play(Mark::X, 4);
        game.o.send("7");

        assert_eq!(game.o.recv(), ServerMessage::Won(WinStreak(1)));
        assert_eq!(game.o.recv(), ServerMessage::ReplayPrompt);
        assert_eq!(game.x.recv(), ServerMessage::Lost);
        game.o.send("N");

        assert!(game.o.is_closed());
        assert_eq!(game.x.recv(), q(1));
        let outcome = game.handle.join().unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Won {
                winner: game.o_id,
                streak: WinStreak(1),
                replay: false,
            }
        );
        assert_eq!(game.coordinator.queued_ids(), vec![game.x_id]);
    }

    #[test]
    fn winning_move_passes_the_turn_flag() {
        let (_x_peer, x) = connection();
        let (_o_peer, o) = connection();
        let mut session = GameSession::new(
            SessionId(7),
            x,
            o,
            Arc::new(Coordinator::new(9)),
            ArenaRng::new(1),
        );
        for (mark, n) in [(Mark::X, 1), (Mark::O, 4), (Mark::X, 2), (Mark::O, 5)] {
            assert_eq!(session.apply_move(mark, pos(n)), SessionState::AwaitingMove(mark.opponent()));
        }
        assert_eq!(session.apply_move(Mark::X, pos(3)), SessionState::Won(Mark::X));
        assert!(!session.x.has_turn());
        assert!(session.o.has_turn());
    }

    #[test]
    fn loser_streak_resets_when_o_wins() {
        let mut game = start_with(Arc::new(Coordinator::new(9)), 1, 2);
        game.play(Mark::X, 1);
        game.play(Mark::O, 3);
        game.play(Mark::X, 2);
        game.play(Mark::O, 5);
        game.play(Mark::X, 4);
        game.o.send("7");

        assert_eq!(game.o.recv(), ServerMessage::Won(WinStreak(1)));
        assert_eq!(game.o.recv(), ServerMessage::ReplayPrompt);
        assert_eq!(game.x.recv(), ServerMessage::Lost);
        game.o.send("Y");

        assert_eq!(game.o.recv(), q(1));
        assert_eq!(game.x.recv(), q(2));
        game.handle.join().unwrap();
        assert_eq!(
            game.coordinator.queued_players(),
            vec![(game.o_id, WinStreak(1)), (game.x_id, WinStreak(0))]
        );
    }

    #[test]
    fn loser_who_left_is_not_requeued() {
        let mut game = start();
        game.play(Mark::X, 1);
        game.play(Mark::O, 4);
        game.play(Mark::X, 2);
        game.play(Mark::O, 5);
        drop(game.o);
        game.x.send("3");
        assert_eq!(game.x.recv(), ServerMessage::Won(WinStreak(1)));
        assert_eq!(game.x.recv(), ServerMessage::ReplayPrompt);
        game.x.send("Y");
        assert_eq!(game.x.recv(), q(1));
        game.handle.join().unwrap();
        assert_eq!(game.coordinator.queued_ids(), vec![game.x_id]);
    }

    fn play_to_draw(game: &mut Game) {
        // x o x / x o o / o x x
        for (mark, n) in [
            (Mark::X, 1),
            (Mark::O, 2),
            (Mark::X, 3),
            (Mark::O, 5),
            (Mark::X, 4),
            (Mark::O, 6),
            (Mark::X, 8),
            (Mark::O, 7),
        ] {
            game.play(mark, n);
        }
        game.x.send("9");
        assert_eq!(game.x.recv(), ServerMessage::Tie);
        assert_eq!(game.o.recv(), ServerMessage::Tie);
    }

    #[test]
    fn draw_requeues_both_in_random_order() {
        let mut saw_x_first = false;
        let mut saw_o_first = false;
        for seed in 0..40 {
            let mut game = start_with(Arc::new(Coordinator::new(9)), seed, 0);
            play_to_draw(&mut game);
            assert_eq!(game.handle.join().unwrap(), SessionOutcome::Draw);

            let ids = game.coordinator.queued_ids();
            assert_eq!(ids.len(), 2);
            if ids[0] == game.x_id {
                saw_x_first = true;
                assert_eq!(game.x.recv(), q(1));
                assert_eq!(game.o.recv(), q(2));
            } else {
                saw_o_first = true;
                assert_eq!(game.o.recv(), q(1));
                assert_eq!(game.x.recv(), q(2));
            }
            if saw_x_first && saw_o_first {
                return;
            }
        }
        panic!("draw order never varied");
    }

    #[test]
    fn draw_order_is_reproducible_for_a_seed() {
        let order = |seed| {
            let mut game = start_with(Arc::new(Coordinator::new(9)), seed, 0);
            play_to_draw(&mut game);
            game.handle.join().unwrap();
            game.coordinator.queued_ids()[0] == game.x_id
        };
        assert_eq!(order(17), order(17));
    }

    #[test]
    fn disconnect_awards_win_to_remaining_player() {
        let mut game = start();
        drop(game.x);

        assert_eq!(game.o.recv(), ServerMessage::OpponentLeft);
        assert_eq!(game.o.recv(), ServerMessage::Won(WinStreak(1)));
        assert_eq!(game.o.recv(), q(1));
        assert_eq!(
            game.handle.join().unwrap(),
            SessionOutcome::Abandoned { quitter: game.x_id }
        );
        assert_eq!(game.coordinator.queued_players(), vec![(game.o_id, WinStreak(1))]);
    }

    #[test]
    fn quit_mid_game_closes_quitter() {
        let mut game = start();
        game.play(Mark::X, 5);
        game.o.send("q");

        assert!(game.o.is_closed());
        assert_eq!(game.x.recv(), ServerMessage::OpponentLeft);
        assert_eq!(game.x.recv(), ServerMessage::Won(WinStreak(1)));
        assert_eq!(game.x.recv(), q(1));
        assert_eq!(
            game.handle.join().unwrap(),
            SessionOutcome::Abandoned { quitter: game.o_id }
        );
        assert_eq!(game.coordinator.queued_ids(), vec![game.x_id]);
    }
}
