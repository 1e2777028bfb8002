// arena_protocol: wire protocol for the tic-tac-toe matchmaking arena.
//
// This crate defines the message vocabulary and framing spoken between the
// arena server (`arena_server`) and its players over a persistent byte
// stream. It is shared by both sides and does no networking of its own.
//
// Module overview:
// - `types.rs`:    Validated value types: `Mark`, `Position`, `WinStreak`,
//                  `QueuePosition`.
// - `message.rs`:  `ServerMessage` / `ClientMessage` and the fixed-width
//                  `BoardSnapshot` grammar, each with paired encode/decode.
// - `framing.rs`:  Newline framing over any `BufRead`/`Write`, including the
//                  grammar-aware client-side reader for raw-byte payloads.
// - `error.rs`:    `ProtocolError`.
//
// Design decisions:
// - **Text lines, not JSON.** The protocol is a compact, positional text
//   format; clients track which prompt is outstanding.
// - **Raw payload bytes.** `Q` and `W` carry one raw byte (1-255 and 0-255)
//   rather than digits. The client decoder reads these positionally.
// - **No async runtime.** Framing works on `std::io` traits so both blocking
//   sockets and in-memory buffers can use it.

pub mod error;
pub mod framing;
pub mod message;
pub mod types;

pub use error::ProtocolError;
pub use framing::{MAX_LINE_LEN, read_line, read_server_message, write_line};
pub use message::{BoardSnapshot, ClientMessage, OPPONENT_LEFT, REPLAY_PROMPT, ServerMessage};
pub use types::{Mark, Position, QueuePosition, WinStreak};
