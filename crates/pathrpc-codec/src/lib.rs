//! Request/response envelope and pluggable wire codecs for pathrpc.
//!
//! The dispatch pipeline talks to the wire only through the [`ServerCodec`]
//! and [`ClientCodec`] traits. Every request is a [`Request`] header followed
//! by one argument value; every response is a [`Response`] header followed by
//! one result value (`null` when absent).
//!
//! Stream codecs are built on a [`Marshal`]:
//! - [`JsonMarshal`]: self-delimiting JSON values separated by newlines
//! - [`FramedMarshal`]: one length-prefixed frame per value
//! - [`XmlMarshal`]: one `<value>` element per value
//!
//! Bodies are decoded through the type-erased [`BodySink`] so the same codec
//! serves any argument type the dispatch registry declares.

pub mod body;
pub mod config;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod framed;
pub mod json;
pub mod reader;
mod scan;
pub mod stream;
pub mod traits;
pub mod xml;

pub use body::{BodySink, Slot};
pub use config::{CodecConfig, DEFAULT_MAX_PAYLOAD};
pub use envelope::{Request, Response};
pub use error::{CodecError, Result};
pub use frame::{decode_frame, encode_frame, HEADER_SIZE, MAGIC};
pub use framed::FramedMarshal;
pub use json::JsonMarshal;
pub use reader::FrameReader;
pub use stream::{StreamClientCodec, StreamServerCodec};
pub use traits::{ClientCodec, Marshal, ServerCodec};
pub use xml::XmlMarshal;
