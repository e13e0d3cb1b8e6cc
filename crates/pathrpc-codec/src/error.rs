/// Errors raised while encoding or decoding RPC traffic.
///
/// Every variant is a transport-level failure: the serving loop treats it as
/// fatal for the connection.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred on the underlying stream.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON value could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An XML element could not be encoded or decoded.
    #[error("xml error: {0}")]
    Xml(String),

    /// A body could not be decoded into the requested type.
    #[error("cannot decode body: {0}")]
    Decode(String),

    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5052 \"PR\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The peer closed the connection where a message was required.
    #[error("connection closed")]
    ConnectionClosed,

    /// The request path cannot be carried by this codec.
    #[error("bad path in RPC request: {0:?}")]
    BadPath(String),

    /// The HTTP exchange answered with a status that is not an RPC result.
    #[error("http error: {0}")]
    HttpStatus(String),

    /// The HTTP client or server failed below the RPC layer.
    #[error("http transport error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A response was read without a request in flight.
    #[error("no request in flight")]
    NoPendingRequest,

    /// The transport could not be configured for this codec.
    #[error("transport error: {0}")]
    Transport(#[from] pathrpc_transport::TransportError),
}

impl CodecError {
    /// Wrap a type-erased deserialization failure.
    pub fn decode(err: erased_serde::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
