use pathrpc_codec::{CodecError, Response};
use pathrpc_transport::TransportError;

/// Failure returned by a registered procedure.
pub type CallError = Box<dyn std::error::Error + Send + Sync>;

/// An error annotated with the path elements processed up to and including
/// the one that failed.
#[derive(Debug, thiserror::Error)]
#[error("error at {:?}: {}", .elements.join("/"), .reason)]
pub struct PathError {
    #[source]
    pub reason: CallError,
    pub elements: Vec<String>,
}

impl PathError {
    pub fn new(reason: impl Into<CallError>, elements: &[&str]) -> Self {
        Self {
            reason: reason.into(),
            elements: elements.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// The `/`-joined element prefix reported as `ErrorPath`.
    pub fn error_path(&self) -> String {
        self.elements.join("/")
    }
}

/// Per-request failure. Reported in the response; the connection stays up.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("empty path")]
    EmptyPath,

    #[error(transparent)]
    Path(#[from] PathError),

    /// Failure of the last procedure in the chain.
    #[error("{0}")]
    Call(CallError),
}

impl RequestError {
    /// Response header describing this failure.
    pub fn to_response(&self, seq: u64) -> Response {
        match self {
            Self::Path(err) => Response::failed(seq, err.reason.to_string(), err.error_path()),
            other => Response::failed(seq, other.to_string(), ""),
        }
    }
}

/// Errors that end a serving loop or an acceptor.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Reading or writing the wire failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The listener failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The root value's type has no registry entry.
    #[error("root type {0} is not registered")]
    UnregisteredRoot(&'static str),

    /// The connection context was refused before serving.
    #[error("context rejected: {0}")]
    ContextRejected(#[source] CallError),

    /// A connection thread could not be started.
    #[error("cannot spawn connection thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors seen by a [`crate::Client`] caller.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The server answered with an error.
    #[error("{message}")]
    Remote { message: String, path: String },

    #[error("sequence mismatch: sent {sent}, received {received}")]
    SequenceMismatch { sent: u64, received: u64 },
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_error_display_quotes_joined_path() {
        let err = PathError::new("not found", &["foo", "baz"]);
        assert_eq!(err.to_string(), r#"error at "foo/baz": not found"#);
        assert_eq!(err.error_path(), "foo/baz");
    }

    #[test]
    fn path_error_response_carries_reason_and_path() {
        let err = RequestError::from(PathError::new("not found", &["foo", "baz"]));
        assert_eq!(
            err.to_response(4),
            Response::failed(4, "not found", "foo/baz")
        );
    }

    #[test]
    fn plain_errors_have_no_error_path() {
        assert_eq!(
            RequestError::EmptyPath.to_response(1),
            Response::failed(1, "empty path", "")
        );
        let err = RequestError::Call("machine is dead".into());
        assert_eq!(
            err.to_response(2),
            Response::failed(2, "machine is dead", "")
        );
    }
}
