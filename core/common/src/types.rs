//! Common types used throughout CryptoFacade.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed, opaque identifier of one algorithm.
///
/// `A` is the capability interface a provider returns for this identifier
/// (for example `dyn DigestAlgorithm`). The identifier carries no behavior:
/// it is a registry key and a diagnostic name. Equality and hashing only look
/// at the name.
pub struct AlgorithmId<A: ?Sized> {
    name: &'static str,
    _family: PhantomData<fn() -> Box<A>>,
}

impl<A: ?Sized> AlgorithmId<A> {
    /// Create an identifier. Intended for `const` declarations.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _family: PhantomData,
        }
    }

    /// Stable, human-readable name (e.g. "SHA-256").
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<A: ?Sized> Clone for AlgorithmId<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: ?Sized> Copy for AlgorithmId<A> {}

impl<A: ?Sized> PartialEq for AlgorithmId<A> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<A: ?Sized> Eq for AlgorithmId<A> {}

impl<A: ?Sized> Hash for AlgorithmId<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<A: ?Sized> fmt::Debug for AlgorithmId<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlgorithmId({})", self.name)
    }
}

impl<A: ?Sized> fmt::Display for AlgorithmId<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Interchange format tag for key material.
///
/// The codecs themselves live outside this workspace; a backend supports the
/// formats its engine exposes natively and reports the rest as
/// `OperationNotSupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    Raw,
    Der,
    Pem,
    Jwk,
}

impl KeyFormat {
    /// All known format tags.
    pub const ALL: [KeyFormat; 4] = [KeyFormat::Raw, KeyFormat::Der, KeyFormat::Pem, KeyFormat::Jwk];

    pub fn name(&self) -> &'static str {
        match self {
            KeyFormat::Raw => "RAW",
            KeyFormat::Der => "DER",
            KeyFormat::Pem => "PEM",
            KeyFormat::Jwk => "JWK",
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
