use std::path::PathBuf;

use pathrpc_codec::{
    CodecConfig, FramedMarshal, JsonMarshal, StreamServerCodec, XmlMarshal, DEFAULT_MAX_PAYLOAD,
};
use pathrpc_dispatch::{Context, Server};
use pathrpc_http::{HttpConfig, HttpHandler};
use pathrpc_transport::{Endpoint, RpcStream};
use tracing::info;

use crate::cmd::{parse_duration, CodecKind, ServeArgs};
use crate::demo;
use crate::exit::{
    server_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR,
};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let server = demo::server().map_err(|err| server_error("server setup failed", err))?;
    let max_payload = args.max_payload.unwrap_or(DEFAULT_MAX_PAYLOAD);
    if args.http {
        return serve_http(server, &args.addr, max_payload);
    }

    let read_timeout = args
        .read_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let config = CodecConfig {
        max_payload_size: max_payload,
        read_timeout,
        ..CodecConfig::default()
    };

    let endpoint: Endpoint = args
        .addr
        .parse()
        .map_err(|err| transport_error("invalid address", err))?;
    let listener = endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    install_ctrlc_handler(socket_path(&endpoint))?;
    info!(%endpoint, codec = ?args.codec, "serving machine registry");

    let served = match args.codec {
        CodecKind::Json => server.accept(
            &listener,
            move |stream| StreamServerCodec::<JsonMarshal<RpcStream>>::json_over(stream, &config),
            connection_context,
        ),
        CodecKind::Framed => server.accept(
            &listener,
            move |stream| {
                StreamServerCodec::<FramedMarshal<RpcStream>>::framed_over(stream, &config)
            },
            connection_context,
        ),
        CodecKind::Xml => server.accept(
            &listener,
            move |stream| StreamServerCodec::<XmlMarshal<RpcStream>>::xml_over(stream, &config),
            connection_context,
        ),
    };
    served.map_err(|err| server_error("serve failed", err))?;
    Ok(SUCCESS)
}

fn serve_http(server: Server, addr: &str, max_payload: usize) -> CliResult<i32> {
    let addr = addr.strip_prefix("http://").unwrap_or(addr);
    let http = tiny_http::Server::http(addr)
        .map_err(|err| CliError::new(TRANSPORT_ERROR, format!("bind failed: {addr}: {err}")))?;
    install_ctrlc_handler(None)?;
    info!(addr, "serving machine registry over http");

    let handler = HttpHandler::new(server)
        .with_config(HttpConfig {
            max_body_size: max_payload,
        })
        .with_context(|request: &tiny_http::Request| {
            let caller = request
                .remote_addr()
                .map_or_else(|| "http".to_string(), |addr| format!("http {addr}"));
            demo::caller_context(caller)
        });
    handler
        .serve(&http)
        .map_err(|err| server_error("serve failed", err))?;
    Ok(SUCCESS)
}

/// Describe the peer: credentials on Unix sockets, the address on TCP.
fn connection_context(stream: &RpcStream) -> Context {
    let caller = match (stream.peer_credentials(), stream.peer_addr()) {
        (Some((uid, _, pid)), _) => format!("unix uid={uid} pid={pid}"),
        (None, Some(addr)) => format!("tcp {addr}"),
        (None, None) => stream.transport_name().to_string(),
    };
    demo::caller_context(caller)
}

fn socket_path(endpoint: &Endpoint) -> Option<PathBuf> {
    match endpoint {
        Endpoint::Unix(path) => Some(path.clone()),
        Endpoint::Tcp(_) => None,
    }
}

/// The accept loop never returns on its own, so an interrupt exits the
/// process after removing the socket file.
fn install_ctrlc_handler(socket: Option<PathBuf>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        info!("interrupted, shutting down");
        if let Some(path) = &socket {
            let _ = std::fs::remove_file(path);
        }
        std::process::exit(SUCCESS);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
