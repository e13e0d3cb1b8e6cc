//! RPC calls over HTTP POST.
//!
//! A call is `POST <base>/<path>` with the JSON-encoded argument in form
//! field `p`. Success answers `200 OK` with the JSON result; a failed call
//! answers `400 Bad Request` with `{"Error", "ErrorPath"}`. Both carry
//! `Content-Type: application/json` and an explicit `Content-Length`.
//!
//! - [`HttpClientCodec`]: client side, over `reqwest`'s blocking client.
//! - [`HttpServerCodec`]: server side of one exchange, over `tiny_http`.
//! - [`HttpHandler`]: runs the dispatch pipeline for each inbound request.

pub mod body;
pub mod client;
pub mod config;
pub mod handler;
pub mod server;

pub use body::{ErrorBody, ARG_FIELD, JSON_CONTENT_TYPE};
pub use client::HttpClientCodec;
pub use config::HttpConfig;
pub use handler::HttpHandler;
pub use server::HttpServerCodec;
