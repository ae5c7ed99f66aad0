//! Framing of messages: `[continuation][length][metadata][body]`.
use std::io::Read;

use arrow_format::ipc::planus::ReadAsRoot;
use arrow_format::ipc::{MessageHeaderRef, MessageRef};

use crate::buffer::Buffer;
use crate::error::{Error, Result};

use super::super::CONTINUATION_MARKER;
use super::OutOfSpecKind;

/// Decodes the length of a message's metadata from the first 4 bytes of its prefix,
/// reading the next 4 bytes when `prefix` is a continuation marker.
///
/// Returns `None` when the prefix is an end-of-stream marker, with or without a
/// continuation marker.
pub(super) fn read_length<R: Read>(prefix: [u8; 4], reader: &mut R) -> Result<Option<usize>> {
    let length = if prefix == CONTINUATION_MARKER {
        let mut length = [0; 4];
        reader.read_exact(&mut length)?;
        i32::from_le_bytes(length)
    } else {
        // legacy framing without continuation marker
        i32::from_le_bytes(prefix)
    };
    decode_length(length)
}

pub(super) fn decode_length(length: i32) -> Result<Option<usize>> {
    match length {
        0 => Ok(None),
        length => usize::try_from(length)
            .map(Some)
            .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger)),
    }
}

/// Reads the framed metadata of the next message into `buffer` and returns its length,
/// or `None` at an end-of-stream marker.
pub(super) fn read_metadata<R: Read>(reader: &mut R, buffer: &mut Vec<u8>) -> Result<Option<usize>> {
    let mut prefix = [0; 4];
    reader.read_exact(&mut prefix)?;
    read_metadata_after(prefix, reader, buffer)
}

/// Like [`read_metadata`], with the first 4 bytes of the frame already consumed.
pub(super) fn read_metadata_after<R: Read>(
    prefix: [u8; 4],
    reader: &mut R,
    buffer: &mut Vec<u8>,
) -> Result<Option<usize>> {
    let length = match read_length(prefix, reader)? {
        Some(length) => length,
        None => return Ok(None),
    };
    read_metadata_of_length(reader, length, buffer)?;
    Ok(Some(length))
}

/// Reads `length` bytes of framed metadata into `buffer`.
pub(super) fn read_metadata_of_length<R: Read>(
    reader: &mut R,
    length: usize,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    buffer.clear();
    buffer.try_reserve(length)?;
    reader.by_ref().take(length as u64).read_to_end(buffer)?;
    if buffer.len() != length {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "the message metadata is truncated",
        )));
    }
    tracing::trace!(length, "read message metadata");
    Ok(())
}

/// Parses framed metadata into a message.
pub(super) fn parse_message(metadata: &[u8]) -> Result<MessageRef<'_>> {
    MessageRef::read_as_root(metadata)
        .map_err(|err| Error::from(OutOfSpecKind::InvalidFlatbufferMessage(err)))
}

pub(super) fn header<'a>(message: &MessageRef<'a>) -> Result<MessageHeaderRef<'a>> {
    message
        .header()?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingMessageHeader))
}

/// The length of the body of `message`.
pub(super) fn body_length(message: &MessageRef) -> Result<usize> {
    message
        .body_length()?
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger))
}

/// Reads the `length` bytes of a message body.
pub(super) fn read_body<R: Read>(reader: &mut R, length: usize) -> Result<Buffer> {
    let mut body = vec![];
    body.try_reserve(length)?;
    reader.by_ref().take(length as u64).read_to_end(&mut body)?;
    if body.len() != length {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "the message body is truncated",
        )));
    }
    Ok(body.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_stream() -> Result<()> {
        let mut buffer = vec![];
        let mut current = &[0xffu8, 0xff, 0xff, 0xff, 0, 0, 0, 0][..];
        assert_eq!(read_metadata(&mut current, &mut buffer)?, None);
        assert!(current.is_empty());

        let mut legacy = &[0u8, 0, 0, 0][..];
        assert_eq!(read_metadata(&mut legacy, &mut buffer)?, None);
        assert!(legacy.is_empty());
        Ok(())
    }

    #[test]
    fn legacy_framing() -> Result<()> {
        let mut buffer = vec![];
        let mut reader = &[8u8, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9][..];
        assert_eq!(read_metadata(&mut reader, &mut buffer)?, Some(8));
        assert_eq!(buffer, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(reader, &[9u8]);
        Ok(())
    }

    #[test]
    fn negative_length() {
        let mut buffer = vec![];
        let mut reader = &[0xffu8, 0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff][..];
        assert!(matches!(
            read_metadata(&mut reader, &mut buffer),
            Err(Error::OutOfSpec(_))
        ));
    }

    #[test]
    fn truncated() {
        let mut buffer = vec![];
        let mut reader = &[0xffu8, 0xff, 0xff, 0xff, 16, 0, 0, 0, 1, 2][..];
        assert!(matches!(
            read_metadata(&mut reader, &mut buffer),
            Err(Error::Io(_))
        ));
    }
}
