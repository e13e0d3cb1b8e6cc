use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};
use crate::tcp::TcpSocket;
use crate::traits::{Listener, RpcStream};
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Where a server listens or a client connects.
///
/// Parsed from `tcp://host:port`, `unix:///path/to.sock`, or a bare
/// filesystem path (treated as a Unix socket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl Endpoint {
    /// Bind a listener for this endpoint.
    pub fn bind(&self) -> Result<BoundListener> {
        match self {
            Self::Tcp(addr) => Ok(BoundListener::Tcp(TcpSocket::bind(addr.as_str())?)),
            #[cfg(unix)]
            Self::Unix(path) => Ok(BoundListener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Self::Unix(path) => Err(TransportError::InvalidEndpoint(path.display().to_string())),
        }
    }

    /// Connect to this endpoint.
    pub fn connect(&self) -> Result<RpcStream> {
        match self {
            Self::Tcp(addr) => TcpSocket::connect(addr.as_str()),
            #[cfg(unix)]
            Self::Unix(path) => UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            Self::Unix(path) => Err(TransportError::InvalidEndpoint(path.display().to_string())),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(addr) = s.strip_prefix("tcp://") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }
        let path = s.strip_prefix("unix://").unwrap_or(s);
        if path.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        Ok(Self::Unix(PathBuf::from(path)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// A bound listener for either transport.
pub enum BoundListener {
    Tcp(TcpSocket),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl Listener for BoundListener {
    type Stream = RpcStream;

    fn accept(&self) -> Result<RpcStream> {
        match self {
            Self::Tcp(socket) => socket.accept(),
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept(),
        }
    }

    fn local_addr(&self) -> String {
        match self {
            Self::Tcp(socket) => socket.local_addr(),
            #[cfg(unix)]
            Self::Unix(socket) => socket.local_addr(),
        }
    }
}
