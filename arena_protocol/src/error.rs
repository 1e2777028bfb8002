// Protocol decode errors.

use std::io;

/// Errors raised while decoding server messages from the wire.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("line exceeds {max} bytes without a newline")]
    LineTooLong { max: usize },

    #[error("unknown message: {0:?}")]
    UnknownMessage(String),

    #[error("malformed board snapshot: {0}")]
    MalformedBoard(&'static str),

    #[error("message {tag:?} is missing its payload byte")]
    MissingPayload { tag: char },

    #[error("queue position must be 1-255, got 0")]
    InvalidQueuePosition,

    #[error("stream ended in the middle of a message")]
    UnexpectedEof,
}
