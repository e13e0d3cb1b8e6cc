//! Connected stream and listener abstraction for pathrpc.
//!
//! Provides a unified interface over the local and network transports a
//! dispatch server accepts connections on:
//! - Unix domain sockets (Linux/macOS)
//! - TCP sockets
//!
//! This is the lowest layer of pathrpc. Codecs wrap the [`RpcStream`] type
//! provided here, and the acceptor drives any [`Listener`].

pub mod endpoint;
pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{BoundListener, Endpoint};
pub use error::{Result, TransportError};
pub use tcp::TcpSocket;
pub use traits::{Listener, RpcStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
