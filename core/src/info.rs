//! Diagnostics recorded for the most recent execution.

use serde::Serialize;

/// Everything the executor knows about the last request.
///
/// Serializes to JSON for logging or for the CLI's `--info` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferInfo {
    /// URL as requested.
    pub url: String,
    /// URL of the final response; empty when no response arrived.
    pub effective_url: String,
    pub method: String,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub total_time_ms: u64,
    pub size_upload: u64,
    pub size_download: u64,
    /// Bytes in the response status line and header block.
    pub header_size: u64,
    pub redirected: bool,
    /// Outgoing header lines, captured only with header echo on.
    pub request_headers: Option<Vec<String>>,
    /// Transport error description; empty on success.
    pub error: String,
}

impl TransferInfo {
    pub fn succeeded(&self) -> bool {
        self.error.is_empty()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
