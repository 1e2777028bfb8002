// TCP client for playing on an arena server.
//
// Architecture mirrors the server's view of a player from the other side:
// - `connect()` opens the stream and spawns a background reader thread.
// - The reader thread calls `read_server_message()` in a loop (which knows
//   the `Q`/`W` raw-byte frames) and pushes each `ServerMessage` into an
//   `mpsc` channel.
// - The caller holds a `BufWriter<TcpStream>` for sending.
// - `poll()` drains the inbox without blocking; `recv_timeout()` waits for
//   one message.
//
// Used by the `arena-client` binary and by the integration tests.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arena_protocol::{ClientMessage, Position, ServerMessage, read_server_message, write_line};
use tracing::debug;

use crate::error::{ArenaError, Result};

pub struct ArenaClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    closed: bool,
    _reader_thread: Option<JoinHandle<()>>,
}

impl ArenaClient {
    /// Connect to `addr` (`host:port`) and start reading.
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| ArenaError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::Builder::new()
            .name("arena-client-reader".into())
            .spawn(move || reader_loop(reader, tx))?;

        Ok(Self {
            writer: BufWriter::new(stream),
            inbox: rx,
            closed: false,
            _reader_thread: Some(reader_thread),
        })
    }

    pub fn send(&mut self, message: &ClientMessage) -> Result<()> {
        write_line(&mut self.writer, &message.encode())?;
        Ok(())
    }

    /// Send an arbitrary input line, valid or not.
    pub fn send_raw(&mut self, line: &str) -> Result<()> {
        write_line(&mut self.writer, line.as_bytes())?;
        Ok(())
    }

    pub fn send_move(&mut self, position: Position) -> Result<()> {
        self.send(&ClientMessage::Move(position))
    }

    pub fn reply(&mut self, again: bool) -> Result<()> {
        self.send(&ClientMessage::Replay(again))
    }

    pub fn quit(&mut self) -> Result<()> {
        self.send(&ClientMessage::Quit)
    }

    /// Drain all messages received so far (non-blocking).
    pub fn poll(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        loop {
            match self.inbox.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        messages
    }

    /// Wait up to `timeout` for the next message. `Disconnected` means the
    /// server closed the stream and everything it sent has been consumed.
    pub fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<ServerMessage, RecvTimeoutError> {
        let result = self.inbox.recv_timeout(timeout);
        if let Err(RecvTimeoutError::Disconnected) = result {
            self.closed = true;
        }
        result
    }

    /// True once the reader thread has seen the end of the stream and the
    /// inbox has been drained.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close both directions of the socket.
    pub fn disconnect(self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

/// Reader thread: decode server lines until the stream ends.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    loop {
        match read_server_message(&mut reader) {
            Ok(Some(message)) => {
                if tx.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "client reader stopped");
                break;
            }
        }
    }
}
