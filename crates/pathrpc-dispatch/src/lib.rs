//! Path-routed procedure dispatch.
//!
//! A request path such as `Machine-0/Life` is walked hop by hop against an
//! explicit [`Registry`]: each element names a [`Procedure`] on the type the
//! previous hop returned, starting from the server's root value. The value a
//! hop returns is the receiver for the next one, and the last hop's value is
//! the result.
//!
//! - [`resolve_path`] matches a path against the registry without invoking
//!   anything.
//! - [`Server::serve_codec`] runs the request pipeline over any
//!   [`pathrpc_codec::ServerCodec`].
//! - [`Server::accept`] serves every connection of a
//!   [`pathrpc_transport::Listener`] on its own thread.
//! - [`Client`] issues sequential calls over any
//!   [`pathrpc_codec::ClientCodec`].

pub mod client;
pub mod error;
pub mod registry;
pub mod resolve;
pub mod server;
pub mod value;

pub use client::Client;
pub use error::{CallError, ClientError, PathError, RequestError, Result, ServerError};
pub use registry::{ArgType, CallResult, Procedure, Registry, RegistryBuilder, TypeBuilder};
pub use resolve::{resolve_path, split_path, ResolvedElement};
pub use server::Server;
pub use value::{Context, TypeKey, Value};
