//! Algorithm identifiers.
//!
//! Process-lifetime constants. A provider implements some subset of them;
//! check with `Provider::get_or_null` before relying on one.

use cryptofacade_common::AlgorithmId;

use crate::algorithms::{
    AeadAlgorithm, DigestAlgorithm, EcdhAlgorithm, EcdsaAlgorithm, HmacAlgorithm,
};

pub const SHA1: AlgorithmId<dyn DigestAlgorithm> = AlgorithmId::new("SHA-1");
pub const SHA256: AlgorithmId<dyn DigestAlgorithm> = AlgorithmId::new("SHA-256");
pub const SHA384: AlgorithmId<dyn DigestAlgorithm> = AlgorithmId::new("SHA-384");
pub const SHA512: AlgorithmId<dyn DigestAlgorithm> = AlgorithmId::new("SHA-512");
pub const BLAKE2B_512: AlgorithmId<dyn DigestAlgorithm> = AlgorithmId::new("BLAKE2b-512");
pub const BLAKE2S_256: AlgorithmId<dyn DigestAlgorithm> = AlgorithmId::new("BLAKE2s-256");

pub const HMAC: AlgorithmId<dyn HmacAlgorithm> = AlgorithmId::new("HMAC");

pub const AES_GCM: AlgorithmId<dyn AeadAlgorithm> = AlgorithmId::new("AES-GCM");
pub const CHACHA20_POLY1305: AlgorithmId<dyn AeadAlgorithm> =
    AlgorithmId::new("ChaCha20-Poly1305");
pub const XCHACHA20_POLY1305: AlgorithmId<dyn AeadAlgorithm> =
    AlgorithmId::new("XChaCha20-Poly1305");

pub const ECDSA: AlgorithmId<dyn EcdsaAlgorithm> = AlgorithmId::new("ECDSA");
pub const ECDH: AlgorithmId<dyn EcdhAlgorithm> = AlgorithmId::new("ECDH");

/// Digests selectable by name, e.g. from a command line.
pub const DIGESTS: [AlgorithmId<dyn DigestAlgorithm>; 6] =
    [SHA1, SHA256, SHA384, SHA512, BLAKE2B_512, BLAKE2S_256];

/// Look up a digest identifier by its name, ignoring ASCII case.
pub fn digest_by_name(name: &str) -> Option<AlgorithmId<dyn DigestAlgorithm>> {
    DIGESTS
        .iter()
        .copied()
        .find(|id| id.name().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_by_name() {
        assert_eq!(digest_by_name("sha-256"), Some(SHA256));
        assert_eq!(digest_by_name("BLAKE2B-512"), Some(BLAKE2B_512));
        assert_eq!(digest_by_name("MD5"), None);
    }
}
