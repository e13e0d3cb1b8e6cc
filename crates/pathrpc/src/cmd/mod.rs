use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the demo machine registry.
    Serve(ServeArgs),
    /// Make a single call and print its result.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Wire encoding on stream transports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CodecKind {
    /// Newline-delimited JSON values.
    Json,
    /// Length-prefixed JSON frames.
    Framed,
    /// One `<value>` XML element per value.
    Xml,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path, unix:///path or tcp://host:port; host:port with --http.
    #[arg(env = "PATHRPC_ADDR")]
    pub addr: String,
    /// Stream codec.
    #[arg(long, env = "PATHRPC_CODEC", default_value = "json")]
    pub codec: CodecKind,
    /// Serve HTTP POST calls on host:port; --codec does not apply.
    #[arg(long)]
    pub http: bool,
    /// Largest accepted payload in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,
    /// Idle read timeout per connection (e.g. 30s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub read_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path, unix:///path, tcp://host:port or http://host:port.
    #[arg(env = "PATHRPC_ADDR")]
    pub addr: String,
    /// Call path, e.g. /Machine-0/Info.
    pub path: String,
    /// JSON argument. Default: null.
    #[arg(long)]
    pub json: Option<String>,
    /// Stream codec (ignored for http:// addresses).
    #[arg(long, env = "PATHRPC_CODEC", default_value = "json")]
    pub codec: CodecKind,
    /// Give up on the call after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Include build details.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}
