//! # Error Taxonomy
//!
//! Purpose: Give every fallible operation in this crate one shared error
//! type, in the same hand-rolled style `hkv-client` uses for `ClientError`
//! (manual `Display`/`Error` impls, no `thiserror`) rather than scattering
//! ad-hoc `String` errors across modules.
//!
//! ## Design Principles
//! 1. **One Enum, Many Callers**: every module (`pool`, `connection`,
//!    `engine`, `fetch`, `store`, `index`, `counter`) returns `RiakResult<T>`.
//! 2. **Fail Fast**: protocol and pool-capacity failures surface immediately,
//!    never retried beyond the single write-retry the engine performs.
//! 3. **No Silent Swallowing**: every branch that can fail returns an error;
//!    logging via `tracing` is informational only and never substitutes for it.

use std::fmt;

/// Result type used throughout the crate.
pub type RiakResult<T> = Result<T, RiakError>;

/// Errors surfaced by the client.
#[derive(Debug)]
pub enum RiakError {
    /// Operation attempted on a closed pool.
    Closed,
    /// No node in the pool was reachable.
    Unavail,
    /// Transport failure: timeout, reset, or closed-by-peer.
    Io(std::io::Error),
    /// Response code differed from the one expected for the request.
    Unexpected,
    /// Read returned no content (explicit or implied).
    NotFound,
    /// Content's tombstone flag was set.
    Deleted,
    /// A conditional (if-not-modified) write was refused by the server.
    Modified,
    /// An if-none-match create found an existing object.
    Exists,
    /// The operation needed a bucket/key/vclock that was missing.
    NoPath,
    /// Unresolved sibling versions with no merge hook (or repair budget exhausted).
    MultipleResponses {
        bucket: Vec<u8>,
        key: Vec<u8>,
        n: usize,
    },
    /// Raw error envelope returned by the server.
    Server { code: u32, message: Vec<u8> },
    /// Malformed frame or unparsable payload.
    Protocol,
    /// Sentinel a changeset function returns to mean "desired state already holds".
    ///
    /// Never surfaces to callers of `Client::push_changeset` — see `changeset.rs`.
    Done,
}

impl fmt::Display for RiakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiakError::Closed => write!(f, "pool is closed"),
            RiakError::Unavail => write!(f, "no node reachable"),
            RiakError::Io(err) => write!(f, "io error: {}", err),
            RiakError::Unexpected => write!(f, "unexpected response code"),
            RiakError::NotFound => write!(f, "not found"),
            RiakError::Deleted => write!(f, "object deleted"),
            RiakError::Modified => write!(f, "object modified since last read"),
            RiakError::Exists => write!(f, "object already exists"),
            RiakError::NoPath => write!(f, "bucket, key, or vclock not defined"),
            RiakError::MultipleResponses { bucket, key, n } => write!(
                f,
                "{} siblings found for {}/{}",
                n,
                String::from_utf8_lossy(bucket),
                String::from_utf8_lossy(key)
            ),
            RiakError::Server { code, message } => write!(
                f,
                "riak error ({}): {}",
                code,
                String::from_utf8_lossy(message)
            ),
            RiakError::Protocol => write!(f, "protocol error"),
            RiakError::Done => write!(f, "done"),
        }
    }
}

impl std::error::Error for RiakError {}

impl From<std::io::Error> for RiakError {
    fn from(err: std::io::Error) -> Self {
        RiakError::Io(err)
    }
}

impl From<tokio::time::error::Elapsed> for RiakError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RiakError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "deadline exceeded",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_server_error() {
        let err = RiakError::Server {
            code: 0,
            message: b"match_found".to_vec(),
        };
        assert_eq!(err.to_string(), "riak error (0): match_found");
    }

    #[test]
    fn displays_multiple_responses() {
        let err = RiakError::MultipleResponses {
            bucket: b"b".to_vec(),
            key: b"k".to_vec(),
            n: 3,
        };
        assert_eq!(err.to_string(), "3 siblings found for b/k");
    }
}
