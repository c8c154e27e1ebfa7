//! Algorithm families.
//!
//! An algorithm is an immutable bundle of operation factories bound to one
//! backend. Each family is its own capability trait; a provider hands out
//! `Arc<dyn Family>` for an `AlgorithmId<dyn Family>`.

use std::sync::Arc;

use cryptofacade_common::{AlgorithmId, Result};

use crate::cipher::Cipher;
use crate::digest::Hasher;
use crate::factory::OperationFactory;
use crate::keys::{EncodableKey, KeyAgreement, KeyDecoder, KeyGenerator};
use crate::params::{
    AeadKeyParameters, AeadParameters, EcCurve, EcKeyParameters, EcdsaParameters, Empty,
    HmacKeyParameters,
};
use crate::signature::{Signer, Verifier};

/// Cryptographic hash function.
pub trait DigestAlgorithm: Send + Sync {
    /// Digest length in bytes.
    fn digest_size(&self) -> usize;

    fn hasher(&self) -> &OperationFactory<Empty, Hasher>;
}

/// Authenticated encryption with associated data.
pub trait AeadAlgorithm: Send + Sync {
    fn key_generator(&self) -> &OperationFactory<AeadKeyParameters, KeyGenerator<Arc<dyn AeadKey>>>;

    fn key_decoder(&self) -> &dyn KeyDecoder<Arc<dyn AeadKey>>;
}

/// Symmetric AEAD key.
pub trait AeadKey: EncodableKey {
    /// Key length in bits.
    fn key_size(&self) -> usize;

    fn cipher(&self) -> &OperationFactory<AeadParameters, Cipher>;
}

/// Keyed-hash message authentication.
pub trait HmacAlgorithm: Send + Sync {
    fn key_generator(&self) -> &OperationFactory<HmacKeyParameters, KeyGenerator<Arc<dyn HmacKey>>>;

    /// Decoder for keys used with `digest`.
    ///
    /// # Errors
    /// - `OperationNotSupported` if this backend cannot pair HMAC with `digest`
    fn key_decoder(
        &self,
        digest: AlgorithmId<dyn DigestAlgorithm>,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn HmacKey>>>>;
}

/// HMAC key bound to one digest.
pub trait HmacKey: EncodableKey {
    fn digest(&self) -> AlgorithmId<dyn DigestAlgorithm>;

    fn signature_generator(&self) -> &OperationFactory<Empty, Signer>;

    fn signature_verifier(&self) -> &OperationFactory<Empty, Verifier>;
}

/// Elliptic-curve signatures.
pub trait EcdsaAlgorithm: Send + Sync {
    fn key_pair_generator(&self) -> &OperationFactory<EcKeyParameters, KeyGenerator<EcdsaKeyPair>>;

    /// # Errors
    /// - `OperationNotSupported` if `curve` is unavailable on this backend
    fn public_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdsaPublicKey>>>>;

    /// # Errors
    /// - `OperationNotSupported` if `curve` is unavailable on this backend
    fn private_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdsaPrivateKey>>>>;
}

pub trait EcdsaPublicKey: EncodableKey {
    fn curve(&self) -> EcCurve;

    fn signature_verifier(&self) -> &OperationFactory<EcdsaParameters, Verifier>;
}

pub trait EcdsaPrivateKey: EncodableKey {
    fn curve(&self) -> EcCurve;

    fn signature_generator(&self) -> &OperationFactory<EcdsaParameters, Signer>;
}

#[derive(Clone)]
pub struct EcdsaKeyPair {
    pub public_key: Arc<dyn EcdsaPublicKey>,
    pub private_key: Arc<dyn EcdsaPrivateKey>,
}

/// Elliptic-curve Diffie-Hellman.
pub trait EcdhAlgorithm: Send + Sync {
    fn key_pair_generator(&self) -> &OperationFactory<EcKeyParameters, KeyGenerator<EcdhKeyPair>>;

    /// # Errors
    /// - `OperationNotSupported` if `curve` is unavailable on this backend
    fn public_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdhPublicKey>>>>;

    /// # Errors
    /// - `OperationNotSupported` if `curve` is unavailable on this backend
    fn private_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdhPrivateKey>>>>;
}

pub trait EcdhPublicKey: EncodableKey {
    fn curve(&self) -> EcCurve;
}

pub trait EcdhPrivateKey: EncodableKey {
    fn curve(&self) -> EcCurve;

    fn shared_secret_generator(&self) -> &OperationFactory<Empty, KeyAgreement>;
}

#[derive(Clone)]
pub struct EcdhKeyPair {
    pub public_key: Arc<dyn EcdhPublicKey>,
    pub private_key: Arc<dyn EcdhPrivateKey>,
}
