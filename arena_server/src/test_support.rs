// Loopback socket helpers shared by the unit tests.

use std::io::{BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use arena_protocol::{ServerMessage, read_server_message, write_line};

use crate::player::PlayerConnection;

/// Create a connected pair of loopback TCP streams.
pub fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    (client, server)
}

/// The remote end of a `PlayerConnection`, driven by a test.
pub struct Peer {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Peer {
    pub fn send(&mut self, line: &str) {
        write_line(&mut self.writer, line.as_bytes()).unwrap();
    }

    /// Write raw bytes with no trailing newline.
    pub fn send_fragment(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).unwrap();
    }

    pub fn recv(&mut self) -> ServerMessage {
        read_server_message(&mut self.reader)
            .unwrap()
            .expect("server closed the connection")
    }

    /// True if nothing arrives within `wait`.
    pub fn is_quiet(&mut self, wait: Duration) -> bool {
        self.writer.set_read_timeout(Some(wait)).unwrap();
        let result = read_server_message(&mut self.reader);
        self.writer
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        match result {
            Err(arena_protocol::ProtocolError::Io(e)) => {
                matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
            }
            _ => false,
        }
    }

    /// Drain remaining messages; true if the server side then closed the
    /// stream, false if it stayed open past the read timeout.
    pub fn is_closed(&mut self) -> bool {
        loop {
            match read_server_message(&mut self.reader) {
                Ok(Some(_)) => continue,
                Ok(None) => return true,
                Err(arena_protocol::ProtocolError::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return false;
                }
                Err(_) => return true,
            }
        }
    }
}

/// A server-side connection plus the test's handle on the other end.
pub fn connection() -> (Peer, PlayerConnection) {
    let (client, server) = tcp_pair();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let peer = Peer {
        reader: BufReader::new(client.try_clone().unwrap()),
        writer: client,
    };
    (peer, PlayerConnection::new(server).unwrap())
}

/// Give the kernel a moment to deliver a FIN or a queued line.
pub fn settle() {
    std::thread::sleep(Duration::from_millis(50));
}
