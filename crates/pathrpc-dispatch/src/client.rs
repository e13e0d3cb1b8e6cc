use pathrpc_codec::{ClientCodec, CodecError, Request, Slot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::error::ClientError;

/// Sequential caller over a [`ClientCodec`].
///
/// Sequence numbers start at 1 and increase by one per call. Each call
/// waits for its response before returning.
pub struct Client<C> {
    codec: C,
    next_seq: u64,
}

impl<C: ClientCodec> Client<C> {
    pub fn new(codec: C) -> Self {
        Self { codec, next_seq: 1 }
    }

    /// Call `path` with `arg` and decode the result as `R`.
    pub fn call<A, R>(&mut self, path: &str, arg: &A) -> Result<R, ClientError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!(seq, path, "calling");

        self.codec.write_request(&Request::new(path, seq), arg)?;
        let header = self.codec.read_response_header()?;
        if header.is_error() {
            self.codec.read_response_body(None)?;
            return Err(ClientError::Remote {
                message: header.error,
                path: header.error_path,
            });
        }
        if header.seq != seq {
            self.codec.read_response_body(None)?;
            return Err(ClientError::SequenceMismatch {
                sent: seq,
                received: header.seq,
            });
        }

        let mut result = Slot::<R>::new();
        self.codec.read_response_body(Some(&mut result))?;
        result
            .take()
            .ok_or(ClientError::Codec(CodecError::ConnectionClosed))
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }

    pub fn into_inner(self) -> C {
        self.codec
    }
}
