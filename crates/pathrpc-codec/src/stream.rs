use std::io::{Read, Write};

use pathrpc_transport::RpcStream;
use tracing::trace;

use crate::body::{BodySink, Slot};
use crate::config::CodecConfig;
use crate::envelope::{Request, Response};
use crate::error::{CodecError, Result};
use crate::framed::FramedMarshal;
use crate::json::JsonMarshal;
use crate::traits::{ClientCodec, Marshal, ServerCodec};
use crate::xml::XmlMarshal;

/// Server codec over any [`Marshal`]: header, body and response value are
/// each one marshal operation.
pub struct StreamServerCodec<M> {
    marshal: M,
}

impl<M: Marshal> StreamServerCodec<M> {
    pub fn new(marshal: M) -> Self {
        Self { marshal }
    }

    pub fn into_inner(self) -> M {
        self.marshal
    }
}

impl<S: Read + Write> StreamServerCodec<JsonMarshal<S>> {
    /// JSON stream codec over any byte stream.
    pub fn json(stream: S) -> Self {
        Self::new(JsonMarshal::new(stream))
    }
}

impl<S: Read + Write> StreamServerCodec<FramedMarshal<S>> {
    /// Framed codec over any byte stream.
    pub fn framed(stream: S, config: &CodecConfig) -> Self {
        Self::new(FramedMarshal::new(stream, config.max_payload_size))
    }
}

impl<S: Read + Write> StreamServerCodec<XmlMarshal<S>> {
    /// XML element-stream codec over any byte stream.
    pub fn xml(stream: S) -> Self {
        Self::new(XmlMarshal::new(stream))
    }
}

impl StreamServerCodec<JsonMarshal<RpcStream>> {
    /// JSON stream codec over a transport stream with configured timeouts.
    pub fn json_over(stream: RpcStream, config: &CodecConfig) -> Result<Self> {
        config.apply(&stream)?;
        Ok(Self::new(JsonMarshal::with_limit(
            stream,
            config.max_payload_size,
        )))
    }
}

impl StreamServerCodec<FramedMarshal<RpcStream>> {
    /// Framed codec over a transport stream with configured timeouts.
    pub fn framed_over(stream: RpcStream, config: &CodecConfig) -> Result<Self> {
        config.apply(&stream)?;
        Ok(Self::framed(stream, config))
    }
}

impl StreamServerCodec<XmlMarshal<RpcStream>> {
    /// XML codec over a transport stream with configured timeouts.
    pub fn xml_over(stream: RpcStream, config: &CodecConfig) -> Result<Self> {
        config.apply(&stream)?;
        Ok(Self::new(XmlMarshal::with_limit(
            stream,
            config.max_payload_size,
        )))
    }
}

impl<M: Marshal> ServerCodec for StreamServerCodec<M> {
    fn read_request_header(&mut self) -> Result<Option<Request>> {
        if self.marshal.at_end()? {
            trace!("request stream ended");
            return Ok(None);
        }
        let mut slot = Slot::<Request>::new();
        self.marshal.decode(Some(&mut slot))?;
        slot.take().map(Some).ok_or(CodecError::ConnectionClosed)
    }

    fn read_request_body(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()> {
        self.marshal.decode(sink)
    }

    fn write_response(
        &mut self,
        response: &Response,
        body: Option<&dyn erased_serde::Serialize>,
    ) -> Result<()> {
        self.marshal.encode(response)?;
        self.marshal.encode(body.unwrap_or(&()))
    }
}

/// Client codec over any [`Marshal`].
pub struct StreamClientCodec<M> {
    marshal: M,
}

impl<M: Marshal> StreamClientCodec<M> {
    pub fn new(marshal: M) -> Self {
        Self { marshal }
    }

    pub fn into_inner(self) -> M {
        self.marshal
    }
}

impl<S: Read + Write> StreamClientCodec<JsonMarshal<S>> {
    pub fn json(stream: S) -> Self {
        Self::new(JsonMarshal::new(stream))
    }
}

impl<S: Read + Write> StreamClientCodec<FramedMarshal<S>> {
    pub fn framed(stream: S, config: &CodecConfig) -> Self {
        Self::new(FramedMarshal::new(stream, config.max_payload_size))
    }
}

impl<S: Read + Write> StreamClientCodec<XmlMarshal<S>> {
    pub fn xml(stream: S) -> Self {
        Self::new(XmlMarshal::new(stream))
    }
}

impl<M: Marshal> ClientCodec for StreamClientCodec<M> {
    fn write_request(
        &mut self,
        request: &Request,
        arg: &dyn erased_serde::Serialize,
    ) -> Result<()> {
        self.marshal.encode(request)?;
        self.marshal.encode(arg)
    }

    fn read_response_header(&mut self) -> Result<Response> {
        if self.marshal.at_end()? {
            return Err(CodecError::ConnectionClosed);
        }
        let mut slot = Slot::<Response>::new();
        self.marshal.decode(Some(&mut slot))?;
        slot.take().ok_or(CodecError::ConnectionClosed)
    }

    fn read_response_body(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()> {
        self.marshal.decode(sink)
    }
}
