use std::borrow::Cow;

use pathrpc_codec::{ClientCodec, CodecConfig, StreamClientCodec};
use pathrpc_dispatch::Client;
use pathrpc_http::HttpClientCodec;
use pathrpc_transport::Endpoint;
use serde_json::Value;
use tracing::debug;

use crate::cmd::{parse_duration, CallArgs, CodecKind};
use crate::exit::{
    client_error, codec_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE,
};
use crate::output::{print_value, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let arg = parse_argument(args.json.as_deref())?;
    let path = normalize_path(&args.path);
    let timeout = parse_duration(&args.timeout)?;

    let result = if args.addr.starts_with("http://") {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CliError::new(INTERNAL, format!("http client setup failed: {err}")))?;
        let codec = HttpClientCodec::with_client(http, &args.addr)
            .map_err(|err| codec_error("invalid address", err))?;
        call(Client::new(codec), &path, &arg)?
    } else {
        let endpoint: Endpoint = args
            .addr
            .parse()
            .map_err(|err| transport_error("invalid address", err))?;
        let stream = endpoint
            .connect()
            .map_err(|err| transport_error("connect failed", err))?;
        let config = CodecConfig {
            read_timeout: Some(timeout),
            write_timeout: Some(timeout),
            ..CodecConfig::default()
        };
        config
            .apply(&stream)
            .map_err(|err| codec_error("connect failed", err))?;
        match args.codec {
            CodecKind::Json => call(Client::new(StreamClientCodec::json(stream)), &path, &arg)?,
            CodecKind::Framed => call(
                Client::new(StreamClientCodec::framed(stream, &config)),
                &path,
                &arg,
            )?,
            CodecKind::Xml => call(Client::new(StreamClientCodec::xml(stream)), &path, &arg)?,
        }
    };

    print_value(&result, format);
    Ok(SUCCESS)
}

fn call<C: ClientCodec>(mut client: Client<C>, path: &str, arg: &Value) -> CliResult<Value> {
    debug!(path, "calling");
    client
        .call(path, arg)
        .map_err(|err| client_error("call failed", err))
}

fn parse_argument(json: Option<&str>) -> CliResult<Value> {
    match json {
        None => Ok(Value::Null),
        Some(text) => serde_json::from_str(text)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}"))),
    }
}

fn normalize_path(path: &str) -> Cow<'_, str> {
    if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{path}"))
    }
}
