//! Length-prefixed JSON framing for stream transports.
//!
//! Every message on the wire is a 4-byte **little-endian** `u32` length prefix
//! followed by that many bytes of UTF-8 JSON payload.
//!
//! # Wire format
//!
//! ```text
//! +----------------+------------------+
//! | Length (4B LE) | JSON Payload     |
//! +----------------+------------------+
//! ```

use std::io::{ErrorKind, Read, Write};

use actorlink_core::error::TransportError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Map socket errors, turning read/write timeouts into [`TransportError::Timeout`].
pub(crate) fn io_error(err: std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::Timeout,
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => TransportError::Disconnected,
        _ => TransportError::Io(err),
    }
}

/// Read a length-prefixed JSON message from a stream.
///
/// Returns `Ok(None)` if the stream reaches EOF before any bytes are read
/// (clean disconnect). Returns an error if the length prefix or payload
/// cannot be read, the payload exceeds `max_size`, or the JSON is invalid.
pub fn read_message<T: DeserializeOwned>(
    reader: &mut impl Read,
    max_size: usize,
) -> Result<Option<T>, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(io_error(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max_size {
        return Err(TransportError::PayloadTooLarge {
            size: len,
            max: max_size,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(io_error)?;

    let msg: T = serde_json::from_slice(&payload)?;
    Ok(Some(msg))
}

/// Write a length-prefixed JSON message to a stream.
///
/// Serialises `msg` to JSON, writes the 4-byte little-endian length prefix,
/// then writes the JSON payload. The stream is flushed after writing.
pub fn write_message<T: Serialize>(
    writer: &mut impl Write,
    msg: &T,
    max_size: usize,
) -> Result<(), TransportError> {
    let payload = serde_json::to_vec(msg)?;

    let too_large = || TransportError::PayloadTooLarge {
        size: payload.len(),
        max: max_size,
    };
    if payload.len() > max_size {
        return Err(too_large());
    }
    let len = u32::try_from(payload.len()).map_err(|_| too_large())?.to_le_bytes();

    writer.write_all(&len).map_err(io_error)?;
    writer.write_all(&payload).map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InboundMessage, InboundPayload, OutboundMessage, PeerCommand};
    use std::io::Cursor;

    const MAX: usize = 1024 * 1024;

    #[test]
    fn length_prefix_is_little_endian() {
        let mut buf = Vec::new();
        write_message(&mut buf, &OutboundMessage::closing(), MAX).unwrap();

        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, buf.len() - 4);
    }

    #[test]
    fn message_reads_back() {
        let msg = InboundMessage::ok(InboundPayload {
            command: PeerCommand::Quit,
            ..InboundPayload::default()
        });
        let mut buf = Vec::new();
        write_message(&mut buf, &msg, MAX).unwrap();

        let mut cursor = Cursor::new(&buf);
        let back: InboundMessage = read_message(&mut cursor, MAX).unwrap().unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn eof_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let result: Result<Option<OutboundMessage>, _> = read_message(&mut cursor, MAX);
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_disconnect() {
        let mut data = 100u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"{\"status\"");
        let mut cursor = Cursor::new(data);
        let result: Result<Option<OutboundMessage>, _> = read_message(&mut cursor, MAX);
        assert!(matches!(result, Err(TransportError::Disconnected)));
    }

    #[test]
    fn oversized_prefix_is_rejected() {
        let fake_len = (u32::try_from(MAX).unwrap() + 1).to_le_bytes();
        let mut cursor = Cursor::new(fake_len.to_vec());
        let result: Result<Option<OutboundMessage>, _> = read_message(&mut cursor, MAX);
        assert!(matches!(result, Err(TransportError::PayloadTooLarge { .. })));
    }

    #[test]
    fn oversized_write_is_rejected() {
        let mut buf = Vec::new();
        let result = write_message(&mut buf, &OutboundMessage::closing(), 4);
        assert!(matches!(result, Err(TransportError::PayloadTooLarge { max: 4, .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn invalid_json_returns_error() {
        let garbage = b"not json at all";
        let mut data = u32::try_from(garbage.len()).unwrap().to_le_bytes().to_vec();
        data.extend_from_slice(garbage);

        let mut cursor = Cursor::new(&data);
        let result: Result<Option<OutboundMessage>, _> = read_message(&mut cursor, MAX);
        assert!(matches!(result, Err(TransportError::Json(_))));
    }

    #[test]
    fn multiple_messages_in_sequence() {
        let mut buf = Vec::new();
        write_message(&mut buf, &OutboundMessage::closing(), MAX).unwrap();
        write_message(&mut buf, &OutboundMessage::closing(), MAX).unwrap();

        let mut cursor = Cursor::new(&buf);
        for _ in 0..2 {
            let msg: OutboundMessage = read_message(&mut cursor, MAX).unwrap().unwrap();
            assert_eq!(msg.status, crate::protocol::STATUS_CLOSING);
        }
        let end: Result<Option<OutboundMessage>, _> = read_message(&mut cursor, MAX);
        assert!(end.unwrap().is_none());
    }
}
