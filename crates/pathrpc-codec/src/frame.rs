use std::io::{ErrorKind, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

/// Frame header: magic (2) + length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Magic bytes: "PR" (0x50 0x52).
pub const MAGIC: [u8; 2] = [0x50, 0x52];

/// Encode one payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Payload          │
/// │ 0x50 0x52    │ (4B LE)   │ (Length bytes)   │
/// │ "PR"         │           │                  │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame payload from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    if src[..2] != MAGIC {
        return Err(CodecError::InvalidMagic);
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&src[2..HEADER_SIZE]);
    let payload_len = u32::from_le_bytes(len_bytes) as usize;
    if payload_len > max_payload {
        return Err(CodecError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Encode `payload` into `scratch` and write the whole frame to `dst`.
pub fn write_frame<W: Write>(
    dst: &mut W,
    payload: &[u8],
    scratch: &mut BytesMut,
    max_payload: usize,
) -> Result<()> {
    if payload.len() > max_payload {
        return Err(CodecError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }

    scratch.clear();
    encode_frame(payload, scratch)?;

    let mut offset = 0usize;
    while offset < scratch.len() {
        match dst.write(&scratch[offset..]) {
            Ok(0) => return Err(CodecError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(CodecError::Io(err)),
        }
    }
    dst.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config::DEFAULT_MAX_PAYLOAD;

    #[test]
    fn encode_then_decode() {
        let mut buf = BytesMut::new();
        encode_frame(br#"{"Path":"a","Seq":1}"#, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 20);

        let payload = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(payload.as_ref(), br#"{"Path":"a","Seq":1}"#);
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_header_and_payload_need_more_data() {
        let mut buf = BytesMut::from(&[0x50, 0x52, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());

        let mut buf = BytesMut::new();
        encode_frame(b"null", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(CodecError::InvalidMagic)));
    }

    #[test]
    fn rejects_oversized_length() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(1024);
        let result = decode_frame(&mut buf, 16);
        assert!(matches!(
            result,
            Err(CodecError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn write_frame_rejects_oversized_payload() {
        let mut out = Cursor::new(Vec::new());
        let mut scratch = BytesMut::new();
        let err = write_frame(&mut out, &[0u8; 32], &mut scratch, 16).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
        assert!(out.into_inner().is_empty());
    }

    #[test]
    fn consecutive_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(b"1", &mut buf).unwrap();
        encode_frame(b"\"two\"", &mut buf).unwrap();

        let first = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        let second = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(first.as_ref(), b"1");
        assert_eq!(second.as_ref(), b"\"two\"");
        assert!(buf.is_empty());
    }
}
