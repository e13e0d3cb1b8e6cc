use std::time::Duration;

use pathrpc_transport::RpcStream;

use crate::error::Result;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configuration shared by the stream codecs.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum size of one framed value in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout applied to the stream. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the stream. `None` blocks indefinitely.
    pub write_timeout: Option<Duration>,
}

impl CodecConfig {
    /// Apply the configured timeouts to a transport stream.
    pub fn apply(&self, stream: &RpcStream) -> Result<()> {
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
