// Error types for the arena server.
//
// Only setup failures surface as `ArenaError` from the public API: binding
// the listener, spawning threads, loading config, or (for the client
// library) connecting. Per-connection problems during play are never
// errors at this level; the session or coordinator logs them and drops the
// connection.

use std::io;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, ArenaError>;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// The listening endpoint could not be bound. Fatal for the process.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
