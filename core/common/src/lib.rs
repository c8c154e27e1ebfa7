//! Common types shared across the CryptoFacade crates.
//!
//! This module provides the error taxonomy every layer reports through and
//! the typed identifiers used as registry keys.

pub mod error;
pub mod types;

pub use error::{CryptoCause, Error, Result};
pub use types::{AlgorithmId, KeyFormat};
