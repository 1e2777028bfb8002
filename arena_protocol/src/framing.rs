// Newline-delimited framing over byte streams.
//
// Server side: `write_line` emits one message and flushes immediately, and
// `read_line` pulls client lines into a caller-owned pending buffer. Keeping
// the buffer outside the call lets the server poll a queued connection with
// a non-blocking socket: a partial line read before `WouldBlock` stays in the
// buffer and is completed on the next call.
//
// Client side: `read_server_message` is grammar-aware. `Q` and `W` are
// always exactly three bytes (tag, raw payload byte, newline), so they are
// read positionally; everything else is read as a line and decoded.
//
// `MAX_LINE_LEN` bounds how much an unterminated line may buffer.

use std::io::{self, BufRead, Read, Write};

use crate::error::ProtocolError;
use crate::message::ServerMessage;

/// Longest accepted line, excluding the newline.
pub const MAX_LINE_LEN: usize = 1024;

/// Write one message followed by `\n`, then flush.
pub fn write_line<W: Write>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Read one line into `pending`, returning it once complete.
///
/// Returns `Ok(Some(line))` with the newline (and any `\r` before it)
/// stripped, and `InvalidData` if the line outgrows `MAX_LINE_LEN`. At end
/// of stream an unterminated trailing fragment is returned as a last line;
/// after that, `Ok(None)`.
/// Errors such as `WouldBlock` leave the partial line in `pending`.
pub fn read_line<R: BufRead>(reader: &mut R, pending: &mut Vec<u8>) -> io::Result<Option<Vec<u8>>> {
    let budget = (MAX_LINE_LEN + 1).saturating_sub(pending.len()) as u64;
    reader.by_ref().take(budget).read_until(b'\n', pending)?;

    if pending.last() == Some(&b'\n') {
        pending.pop();
        if pending.last() == Some(&b'\r') {
            pending.pop();
        }
        return Ok(Some(std::mem::take(pending)));
    }
    if pending.len() > MAX_LINE_LEN {
        pending.clear();
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {MAX_LINE_LEN} bytes"),
        ));
    }
    // No newline within budget means the stream ended.
    if pending.is_empty() {
        return Ok(None);
    }
    if pending.last() == Some(&b'\r') {
        pending.pop();
    }
    Ok(Some(std::mem::take(pending)))
}

/// Read and decode one server message. Returns `Ok(None)` at a clean end of
/// stream.
pub fn read_server_message<R: BufRead>(reader: &mut R) -> Result<Option<ServerMessage>, ProtocolError> {
    let tag = match reader.fill_buf()?.first() {
        Some(&tag) => tag,
        None => return Ok(None),
    };

    if tag == b'Q' || tag == b'W' {
        let mut frame = [0u8; 3];
        reader.read_exact(&mut frame).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ProtocolError::UnexpectedEof,
            _ => ProtocolError::Io(e),
        })?;
        if frame[2] != b'\n' {
            return Err(ProtocolError::MissingPayload {
                tag: char::from(tag),
            });
        }
        return ServerMessage::decode(&frame[..2]).map(Some);
    }

    let mut pending = Vec::new();
    match read_line(reader, &mut pending) {
        Ok(Some(line)) => ServerMessage::decode(&line).map(Some),
        Ok(None) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Err(ProtocolError::LineTooLong {
            max: MAX_LINE_LEN,
        }),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor};

    use super::*;
    use crate::message::{BoardSnapshot, OPPONENT_LEFT};
    use crate::types::{Mark, QueuePosition, WinStreak};

    #[test]
    fn write_line_appends_newline() {
        let mut buf = Vec::new();
        write_line(&mut buf, b"I").unwrap();
        write_line(&mut buf, b"T").unwrap();
        assert_eq!(buf, b"I\nT\n");
    }

    #[test]
    fn read_line_strips_crlf() {
        let mut cursor = Cursor::new(b"5\r\nQ\n".to_vec());
        let mut pending = Vec::new();
        assert_eq!(read_line(&mut cursor, &mut pending).unwrap(), Some(b"5".to_vec()));
        assert_eq!(read_line(&mut cursor, &mut pending).unwrap(), Some(b"Q".to_vec()));
        assert_eq!(read_line(&mut cursor, &mut pending).unwrap(), None);
    }

    #[test]
    fn read_line_returns_unterminated_tail_at_eof() {
        let mut cursor = Cursor::new(b"3\n7".to_vec());
        let mut pending = Vec::new();
        assert_eq!(read_line(&mut cursor, &mut pending).unwrap(), Some(b"3".to_vec()));
        assert_eq!(read_line(&mut cursor, &mut pending).unwrap(), Some(b"7".to_vec()));
        assert!(pending.is_empty());
        assert_eq!(read_line(&mut cursor, &mut pending).unwrap(), None);
    }

    #[test]
    fn read_line_rejects_overlong_line() {
        let mut data = vec![b'a'; MAX_LINE_LEN + 10];
        data.push(b'\n');
        let mut cursor = Cursor::new(data);
        let mut pending = Vec::new();
        let err = read_line(&mut cursor, &mut pending).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_line_accepts_line_at_limit() {
        let mut data = vec![b'a'; MAX_LINE_LEN];
        data.push(b'\n');
        let mut cursor = Cursor::new(data);
        let mut pending = Vec::new();
        let line = read_line(&mut cursor, &mut pending).unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);
    }

    /// A reader that yields its data in chunks and reports `WouldBlock`
    /// between them, like a non-blocking socket.
    struct Trickle {
        chunks: Vec<Vec<u8>>,
        blocked: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.blocked {
                self.blocked = false;
                return Err(io::ErrorKind::WouldBlock.into());
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            self.blocked = true;
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn read_line_keeps_partial_line_across_would_block() {
        let mut reader = BufReader::new(Trickle {
            chunks: vec![b"Q".to_vec(), b"\n".to_vec()],
            blocked: false,
        });
        let mut pending = Vec::new();

        let err = read_line(&mut reader, &mut pending).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert_eq!(pending, b"Q");

        assert_eq!(read_line(&mut reader, &mut pending).unwrap(), Some(b"Q".to_vec()));
    }

    #[test]
    fn server_messages_decode_in_sequence() {
        let mut wire = Vec::new();
        let messages = vec![
            ServerMessage::Waiting,
            ServerMessage::QueuePosition(QueuePosition::from_rank(2).unwrap()),
            ServerMessage::AssignMark(Mark::O),
            ServerMessage::Board(BoardSnapshot {
                cells: [None; 9],
                your_turn: false,
            }),
            ServerMessage::InvalidMove,
            ServerMessage::Won(WinStreak(4)),
            ServerMessage::OpponentLeft,
        ];
        for message in &messages {
            write_line(&mut wire, &message.encode()).unwrap();
        }

        let mut cursor = Cursor::new(wire);
        for expected in &messages {
            let got = read_server_message(&mut cursor).unwrap().unwrap();
            assert_eq!(&got, expected);
        }
        assert!(read_server_message(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn payload_bytes_equal_to_newline_do_not_split_frames() {
        let mut wire = Vec::new();
        write_line(
            &mut wire,
            &ServerMessage::QueuePosition(QueuePosition::from_rank(10).unwrap()).encode(),
        )
        .unwrap();
        write_line(&mut wire, &ServerMessage::Won(WinStreak(13)).encode()).unwrap();
        write_line(&mut wire, OPPONENT_LEFT.as_bytes()).unwrap();
        assert_eq!(&wire[..3], &[b'Q', b'\n', b'\n']);

        let mut cursor = Cursor::new(wire);
        assert_eq!(
            read_server_message(&mut cursor).unwrap(),
            Some(ServerMessage::QueuePosition(
                QueuePosition::from_rank(10).unwrap()
            ))
        );
        assert_eq!(
            read_server_message(&mut cursor).unwrap(),
            Some(ServerMessage::Won(WinStreak(13)))
        );
        assert_eq!(
            read_server_message(&mut cursor).unwrap(),
            Some(ServerMessage::OpponentLeft)
        );
    }

    #[test]
    fn truncated_payload_frame_is_an_error() {
        let mut cursor = Cursor::new(vec![b'W']);
        assert!(matches!(
            read_server_message(&mut cursor),
            Err(ProtocolError::UnexpectedEof)
        ));
    }
}
