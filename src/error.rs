//! Error taxonomy shared by every library operation.
//!
//! Fatal conditions are returned as [`Error`]; best-effort sub-operations
//! (URL resolution inside the sampler, per-song seeding) are logged and
//! degraded by their callers instead of surfacing here.

use thiserror::Error;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// No user is signed in to the session.
    #[error("no signed-in user")]
    AuthenticationRequired,

    /// A document the operation depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored value has the wrong shape or an out-of-range value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The remote endpoint or object store could not be reached.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Document store backend failure.
    #[error("store error: {0}")]
    Store(String),

    /// A value could not be encoded as a document body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_to_variants() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(Error::from(json_err), Error::Serialization(_)));

        let sql_err = sqlx::Error::RowNotFound;
        assert!(matches!(Error::from(sql_err), Error::Store(_)));
    }
}
