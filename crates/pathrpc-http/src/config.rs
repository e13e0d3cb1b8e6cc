use pathrpc_codec::DEFAULT_MAX_PAYLOAD;

/// Limits applied by the HTTP server codec.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Largest request body read in bytes. Default: 16 MiB.
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
