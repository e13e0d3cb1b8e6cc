use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Listener, RpcStream};

/// TCP listener.
pub struct TcpSocket {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on a TCP address. Port `0` picks an ephemeral port.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening on tcp socket");
        Ok(Self { listener, addr })
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<RpcStream> {
        let stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected to tcp socket");
        Ok(RpcStream::from_tcp(stream))
    }

    /// The bound address, with the actual port when `0` was requested.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Listener for TcpSocket {
    type Stream = RpcStream;

    fn accept(&self) -> Result<RpcStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted tcp connection");
        Ok(RpcStream::from_tcp(stream))
    }

    fn local_addr(&self) -> String {
        self.addr.to_string()
    }
}
