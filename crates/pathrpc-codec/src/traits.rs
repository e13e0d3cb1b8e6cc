use crate::body::BodySink;
use crate::envelope::{Request, Response};
use crate::error::Result;

/// Server side of a wire codec.
pub trait ServerCodec {
    /// Read the next request header.
    ///
    /// Returns `Ok(None)` when the peer has no more requests (clean end of
    /// stream). Any other failure is fatal for the connection.
    fn read_request_header(&mut self) -> Result<Option<Request>>;

    /// Read the body that follows the last header.
    ///
    /// With `None` the body is still consumed and discarded so the stream
    /// stays aligned for the next request.
    fn read_request_body(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()>;

    /// Write a response header followed by its result value.
    ///
    /// `body` is `None` on error or when the call produced no value.
    fn write_response(
        &mut self,
        response: &Response,
        body: Option<&dyn erased_serde::Serialize>,
    ) -> Result<()>;
}

/// Client side of a wire codec.
pub trait ClientCodec {
    /// Write a request header followed by its argument value.
    fn write_request(&mut self, request: &Request, arg: &dyn erased_serde::Serialize)
        -> Result<()>;

    /// Read the next response header.
    fn read_response_header(&mut self) -> Result<Response>;

    /// Read the result value that follows the last response header.
    ///
    /// With `None` the value is consumed and discarded.
    fn read_response_body(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()>;
}

/// Structured encoder/decoder a stream codec is built on.
///
/// Each call encodes or decodes exactly one value; framing is the
/// marshaler's concern.
pub trait Marshal {
    /// Encode one value onto the stream.
    fn encode(&mut self, value: &dyn erased_serde::Serialize) -> Result<()>;

    /// Decode one value into `sink`, or consume and discard it with `None`.
    fn decode(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()>;

    /// Whether the stream ended cleanly before another value started.
    fn at_end(&mut self) -> Result<bool>;
}
