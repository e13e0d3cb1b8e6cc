use serde::{Deserialize, Serialize};

/// Content type of every RPC body sent over HTTP.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Form field carrying the JSON-encoded call argument.
pub const ARG_FIELD: &str = "p";

/// Body of a `400 Bad Request` answer to a failed call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_path: String,
}
