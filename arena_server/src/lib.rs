// arena_server: matchmaking server for two-player tic-tac-toe.
//
// Players connect over TCP and wait in a FIFO queue. A scheduler tick pairs
// the two players at the front into a game session, which runs on a worker
// thread until someone wins, the board fills, or a player leaves. Finished
// players go back into the queue: a winner who asks to play again goes to
// the front, a loser to the back, and a drawn pair to the back in random
// order.
//
// Module overview:
// - `board.rs`:        The 3x3 board, placement, and win/full detection.
// - `player.rs`:       `PlayerConnection`, one player's socket, mark, turn
//                      flag, and win streak, with blocking receive and a
//                      non-blocking `probe()` for queued players.
// - `matchmaking.rs`:  `Coordinator`, the shared queue with pairing,
//                      requeueing, queue-position bookkeeping, and the
//                      active-session cap.
// - `session.rs`:      `GameSession`, the per-game state machine.
// - `pool.rs`:         `WorkerPool` that runs sessions.
// - `server.rs`:       Accept thread, scheduler tick, `start_server`.
// - `client.rs`:       `ArenaClient`, used by the `arena-client` binary and
//                      integration tests.
// - `config.rs`, `cli.rs`, `logging.rs`, `error.rs`: ambient plumbing.
//
// Dependencies: `arena_protocol` (message grammar and framing) and
// `arena_prng` (draw-order coin flips).
//
// The server runs as a standalone binary (`main.rs`) or embedded via the
// library API (`start_server`), which is how the tests drive it.

pub mod board;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod matchmaking;
pub mod player;
pub mod pool;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::ServerConfig;
pub use error::{ArenaError, Result};
pub use server::{ServerHandle, start_server};
