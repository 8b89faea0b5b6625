//! Error types for the fetch client.
//!
//! # Design
//! Misuse of the client (querying an option that was never set, handing it
//! a cookie path that does not exist, executing without a URL) is reported
//! synchronously as an `Err`. Network-level failures are not: the executor
//! records them on the client and the caller reads them back through
//! `FetchClient::error` / `FetchClient::status_code`. `TransportFailure`
//! exists so that callers who prefer `?` can convert that recorded state
//! with `FetchClient::check_transport`.

use thiserror::Error;

use crate::options::OptionKey;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by `FetchClient` operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The option was queried but has never been set (or was unset).
    #[error("unknown option: {0}")]
    NotFound(OptionKey),

    /// Malformed input: a header line without a name, a cookie path that is
    /// not an existing file, an unusable method name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The client is not in a state where the operation can run.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The last execution failed below HTTP (DNS, connect, TLS, timeout).
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// A client configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ClientError::InvalidArgument(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        ClientError::PreconditionFailed(msg.into())
    }

    /// True for errors caused by the caller rather than the network.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            ClientError::NotFound(_)
                | ClientError::InvalidArgument(_)
                | ClientError::PreconditionFailed(_)
        )
    }
}
