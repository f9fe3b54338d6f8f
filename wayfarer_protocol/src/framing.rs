// Length-delimited message framing over TCP.
//
// Wire format: a 4-byte big-endian length prefix followed by the payload.
// `write_message` and `read_message` move raw bytes only; JSON encoding of
// `message.rs` types happens in `link.rs`, keeping this module
// format-agnostic.
//
// `MAX_MESSAGE_SIZE` (1 MiB) guards against unbounded allocation from a
// malformed length prefix. The largest expected message is a
// `current_players` snapshot, a few hundred bytes per connected client.

use std::io::{self, Read, Write};

/// Maximum allowed message size (1 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Write a length-delimited message: 4-byte big-endian length, then payload.
pub fn write_message<W: Write>(writer: &mut W, msg: &[u8]) -> io::Result<()> {
    let len = msg.len();
    if len > MAX_MESSAGE_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message too large: {len} bytes (max {MAX_MESSAGE_SIZE})"),
        ));
    }
    #[expect(clippy::cast_possible_truncation)]
    let len_bytes = (len as u32).to_be_bytes();
    writer.write_all(&len_bytes)?;
    writer.write_all(msg)?;
    writer.flush()
}

/// Read a length-delimited message.
///
/// Returns `UnexpectedEof` if the stream closes before or during a message,
/// `InvalidData` if the prefix exceeds `MAX_MESSAGE_SIZE`.
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {len} bytes (max {MAX_MESSAGE_SIZE})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
