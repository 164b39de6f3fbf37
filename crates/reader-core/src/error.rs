//! The closed set of errors the engine ever surfaces to a caller.
//!
//! Internal plumbing (content-store I/O, settings I/O) keeps the
//! `Result<_, String>` idiom used throughout this workspace; this type is
//! the boundary error for anything a UI or CLI needs to branch on.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReaderError {
    #[error("fetch_failed")]
    FetchFailed,

    #[error("rate limit exceeded; retry in {}", .retry_after.map(|n| n.to_string()).unwrap_or_else(|| "?".into()))]
    RateLimited { retry_after: Option<u64> },

    #[error("proxy rejected; check shared secret")]
    ProxyRejected,

    #[error("Proxy returned {status}")]
    UpstreamError { status: u16 },

    #[error("too_large")]
    TooLarge,

    #[error("timeout")]
    Timeout,

    #[error("article appears empty after parsing")]
    ParseEmpty,

    #[error("unsupported_file")]
    UnsupportedFile,

    #[error("Playback stalled — auto-stopping to save battery")]
    PlaybackStalled,
}

impl ReaderError {
    /// Maps an HTTP status returned by the remote proxy to a [`ReaderError`],
    /// per the content/audio fetch contracts.
    pub fn from_proxy_status(status: u16, retry_after: Option<u64>) -> Self {
        match status {
            429 => ReaderError::RateLimited { retry_after },
            403 => ReaderError::ProxyRejected,
            s => ReaderError::UpstreamError { status: s },
        }
    }
}
