//! Frame codec
//!
//! A frame is a little-endian `u32` payload length followed by the
//! `bincode` encoding of one [`Message`].

use crate::error::{IpcError, Result};
use crate::message::Message;
use std::io::{ErrorKind, Read, Write};

/// Largest accepted payload
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Encode `message` as one frame
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(IpcError::FrameTooLarge(payload.len()));
    }
    let len = u32::try_from(payload.len()).map_err(|_| IpcError::FrameTooLarge(payload.len()))?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Decode one frame
///
/// # Returns
/// * `Some(message)` - a complete frame was read
/// * `None` - the stream ended cleanly before a new frame
pub fn read_message<R: Read>(reader: &mut R) -> Result<Option<Message>> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = usize::try_from(u32::from_le_bytes(header)).map_err(|_| IpcError::FrameTooLarge(usize::MAX))?;
    if len > MAX_FRAME_LEN {
        return Err(IpcError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(bincode::deserialize(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vmhost::config::VmHostParameters;

    #[test]
    fn test_frames_in_sequence() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, &Message::VersionRequest).unwrap();
        write_message(
            &mut buffer,
            &Message::Initialize {
                params: VmHostParameters::for_tests(),
            },
        )
        .unwrap();

        let mut reader = Cursor::new(buffer);
        assert_eq!(read_message(&mut reader).unwrap(), Some(Message::VersionRequest));
        assert!(matches!(read_message(&mut reader).unwrap(), Some(Message::Initialize { .. })));
        assert_eq!(read_message(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut reader = Cursor::new(u32::MAX.to_le_bytes().to_vec());
        assert!(matches!(read_message(&mut reader), Err(IpcError::FrameTooLarge(_))));
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, &Message::Stop).unwrap();
        buffer.extend_from_slice(&100u32.to_le_bytes());
        buffer.extend_from_slice(&[1, 2, 3]);

        let mut reader = Cursor::new(buffer);
        assert_eq!(read_message(&mut reader).unwrap(), Some(Message::Stop));
        assert!(matches!(read_message(&mut reader), Err(IpcError::Io(_))));
    }
}
