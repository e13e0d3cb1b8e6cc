use serde::{Deserialize, Serialize};

/// Request header: the slash-delimited path and the caller's sequence number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub seq: u64,
}

impl Request {
    pub fn new(path: impl Into<String>, seq: u64) -> Self {
        Self {
            path: path.into(),
            seq,
        }
    }
}

/// Response header.
///
/// `error` is empty on success. `error_path` is the `/`-joined prefix of the
/// request path at which the error occurred, or empty when the failure is
/// not attributable to a single hop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_path: String,
}

impl Response {
    /// A successful response echoing `seq`.
    pub fn ok(seq: u64) -> Self {
        Self {
            seq,
            ..Self::default()
        }
    }

    /// A failed response echoing `seq`.
    pub fn failed(seq: u64, error: impl Into<String>, error_path: impl Into<String>) -> Self {
        Self {
            seq,
            error: error.into(),
            error_path: error_path.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}
