//! Common error types for CryptoFacade.

use thiserror::Error;

/// Internal reason behind an opaque cryptographic failure.
///
/// Reachable only through [`std::error::Error::source`]. Callers must not
/// branch on it; it exists for debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CryptoCause(pub &'static str);

/// Top-level error type for CryptoFacade operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The selected provider does not implement the requested algorithm.
    #[error("Algorithm not found: {0}")]
    AlgorithmNotFound(String),

    /// The algorithm is available but this sub-capability is not.
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    /// Cryptographic operation failed.
    ///
    /// The message is identical for every failure reason.
    #[error("Cryptographic operation failed")]
    Crypto(#[source] Option<CryptoCause>),

    /// The OS random source failed. Not recoverable.
    #[error("Secure random source failed: {0}")]
    RandomSource(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An API was used in a state that does not allow it.
    #[error("Usage error: {0}")]
    Usage(String),

    /// The execution strategy could not run or complete the work.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Opaque cryptographic failure without a recorded cause.
    pub fn crypto() -> Self {
        Error::Crypto(None)
    }

    /// Opaque cryptographic failure carrying an internal cause.
    pub fn crypto_because(cause: &'static str) -> Self {
        Error::Crypto(Some(CryptoCause(cause)))
    }

    /// Whether this is the opaque cryptographic failure kind.
    pub fn is_crypto(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
