use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};

use crate::body::BodySink;
use crate::error::{CodecError, Result};
use crate::frame::write_frame;
use crate::reader::FrameReader;
use crate::traits::Marshal;

/// Length-prefixed marshaler: every value travels in its own frame with a
/// JSON payload.
///
/// Unlike [`crate::JsonMarshal`], a discarded value is skipped without
/// parsing and an oversized value is rejected before it is read.
pub struct FramedMarshal<S> {
    reader: FrameReader<S>,
    scratch: BytesMut,
    payload: Vec<u8>,
}

impl<S: Read + Write> FramedMarshal<S> {
    pub fn new(stream: S, max_payload_size: usize) -> Self {
        Self {
            reader: FrameReader::new(stream, max_payload_size),
            scratch: BytesMut::new(),
            payload: Vec::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    fn required_frame(&mut self) -> Result<Bytes> {
        self.reader
            .next_frame()?
            .ok_or(CodecError::ConnectionClosed)
    }
}

impl<S: Read + Write> Marshal for FramedMarshal<S> {
    fn encode(&mut self, value: &dyn erased_serde::Serialize) -> Result<()> {
        self.payload.clear();
        serde_json::to_writer(&mut self.payload, value)?;
        let max = self.reader.max_payload_size();
        write_frame(self.reader.get_mut(), &self.payload, &mut self.scratch, max)
    }

    fn decode(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()> {
        let payload = self.required_frame()?;
        let Some(sink) = sink else {
            return Ok(());
        };

        let mut de = serde_json::Deserializer::from_slice(&payload);
        {
            let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
            sink.decode(&mut erased).map_err(CodecError::decode)?;
        }
        de.end()?;
        Ok(())
    }

    fn at_end(&mut self) -> Result<bool> {
        self.reader.at_end()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::body::Slot;
    use crate::config::DEFAULT_MAX_PAYLOAD;
    use crate::envelope::Request;
    use crate::frame::{encode_frame, HEADER_SIZE};

    #[test]
    fn encode_writes_one_frame_per_value() {
        let mut marshal = FramedMarshal::new(Cursor::new(Vec::new()), DEFAULT_MAX_PAYLOAD);
        marshal.encode(&Request::new("Ping", 4)).unwrap();
        marshal.encode(&()).unwrap();

        let wire = marshal.into_inner().into_inner();
        let header = br#"{"Path":"Ping","Seq":4}"#;
        assert_eq!(wire.len(), 2 * HEADER_SIZE + header.len() + 4);
        assert_eq!(&wire[HEADER_SIZE..HEADER_SIZE + header.len()], header);
    }

    #[test]
    fn decode_skips_discarded_frame_unparsed() {
        let mut wire = BytesMut::new();
        encode_frame(b"not json at all", &mut wire).unwrap();
        encode_frame(b"\"next\"", &mut wire).unwrap();

        let mut marshal = FramedMarshal::new(Cursor::new(wire.to_vec()), DEFAULT_MAX_PAYLOAD);
        marshal.decode(None).unwrap();

        let mut slot = Slot::<String>::new();
        marshal.decode(Some(&mut slot)).unwrap();
        assert_eq!(slot.take().as_deref(), Some("next"));
        assert!(marshal.at_end().unwrap());
    }

    #[test]
    fn trailing_bytes_in_frame_are_rejected() {
        let mut wire = BytesMut::new();
        encode_frame(b"1 2", &mut wire).unwrap();

        let mut marshal = FramedMarshal::new(Cursor::new(wire.to_vec()), DEFAULT_MAX_PAYLOAD);
        let mut slot = Slot::<u32>::new();
        let err = marshal.decode(Some(&mut slot)).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn missing_frame_is_connection_closed() {
        let mut marshal = FramedMarshal::new(Cursor::new(Vec::new()), DEFAULT_MAX_PAYLOAD);
        assert!(marshal.at_end().unwrap());
        let err = marshal.decode(None).unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }
}
