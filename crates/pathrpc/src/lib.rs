//! Path-routed RPC dispatch over sockets and HTTP.
//!
//! A server exposes a root object; every request names a slash-separated
//! path of members to walk from it (`Machine-0/SetAgentVersion`) and carries
//! a sequence number and an optional argument.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket and TCP streams and listeners
//! - [`codec`]: request/response envelopes, JSON stream and framed codecs
//! - [`dispatch`]: procedure registry, path resolver, serving loop, client
//! - [`http`]: HTTP POST codecs and handler (behind `http` feature)

/// Re-export transport types.
pub mod transport {
    pub use pathrpc_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use pathrpc_codec::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use pathrpc_dispatch::*;
}

/// Re-export HTTP types (requires `http` feature).
#[cfg(feature = "http")]
pub mod http {
    pub use pathrpc_http::*;
}
