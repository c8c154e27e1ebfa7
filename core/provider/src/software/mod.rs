//! Software backend built on the RustCrypto engines.
//!
//! Provided algorithms:
//! - Digests: SHA-256, SHA-384, SHA-512, BLAKE2b-512, BLAKE2s-256
//! - HMAC over SHA-256, SHA-384 and SHA-512
//! - AEAD: AES-GCM (128/192/256-bit keys, 12..=16 byte tags),
//!   ChaCha20-Poly1305 and XChaCha20-Poly1305
//! - ECDSA and ECDH on P-256
//!
//! Digest and MAC contexts are mutable and go through resource pools. AEAD
//! engines hold only the expanded key and are shared read-only between calls.
//! Keys are exported and imported in RAW form only.

mod aead;
mod digest;
mod ecdh;
mod ecdsa;
mod hmac;

use std::sync::Arc;

use cryptofacade_common::{Error, KeyFormat, Result};
use cryptofacade_crypto::algorithms::{
    AeadAlgorithm, DigestAlgorithm, EcdhAlgorithm, EcdsaAlgorithm, HmacAlgorithm,
};
use cryptofacade_crypto::{ids, EcCurve, Operation};
use cryptofacade_runtime::{ProviderState, RuntimeConfig, SecureRandom};
use zeroize::Zeroizing;

use crate::provider::{AlgorithmTable, Provider};

use self::aead::{AeadVariant, SoftwareAead};
use self::digest::{DigestKind, SoftwareDigest};
use self::ecdh::SoftwareEcdh;
use self::ecdsa::SoftwareEcdsa;
use self::hmac::SoftwareHmac;

/// Registry name of this backend.
pub const NAME: &str = "software";

/// Build the software provider from a runtime configuration.
///
/// # Errors
/// - `Execution` if the configured executor cannot be started
pub fn provider(config: &RuntimeConfig) -> Result<Provider> {
    with_state(ProviderState::new(config)?)
}

/// Build the software provider around an existing execution state.
pub fn with_state(state: ProviderState) -> Result<Provider> {
    let mut table = AlgorithmTable::new();

    for kind in DigestKind::ALL {
        table.register(&kind.id(), move |state| {
            Arc::new(SoftwareDigest::new(kind, state)) as Arc<dyn DigestAlgorithm>
        })?;
    }
    table.register(&ids::HMAC, |state| {
        Arc::new(SoftwareHmac::new(state)) as Arc<dyn HmacAlgorithm>
    })?;
    for variant in AeadVariant::ALL {
        table.register(&variant.id(), move |state| {
            Arc::new(SoftwareAead::new(variant, state)) as Arc<dyn AeadAlgorithm>
        })?;
    }
    table.register(&ids::ECDSA, |state| {
        Arc::new(SoftwareEcdsa::new(state)) as Arc<dyn EcdsaAlgorithm>
    })?;
    table.register(&ids::ECDH, |state| {
        Arc::new(SoftwareEcdh::new(state)) as Arc<dyn EcdhAlgorithm>
    })?;

    Ok(Provider::new(NAME, state, table))
}

/// Wrap a core in a handle scheduled by the provider's executor.
fn operation<T: ?Sized + Send + Sync + 'static>(core: Arc<T>, state: &ProviderState) -> Operation<T> {
    Operation::new(core, state.executor().clone())
}

fn unsupported_format(format: KeyFormat) -> Error {
    Error::OperationNotSupported(format!("{} key encoding", format))
}

fn unsupported_curve(curve: EcCurve) -> Error {
    Error::OperationNotSupported(format!("Curve {}", curve))
}

fn require_p256(curve: EcCurve) -> Result<()> {
    match curve {
        EcCurve::P256 => Ok(()),
        other => Err(unsupported_curve(other)),
    }
}

/// Draw a P-256 secret scalar from the provider's random source.
///
/// Out-of-range candidates (zero or not below the group order) are redrawn.
fn random_secret_key(random: SecureRandom) -> Result<p256::SecretKey> {
    loop {
        let candidate = Zeroizing::new(random.bytes(P256_SCALAR_SIZE)?);
        if let Ok(secret) = p256::SecretKey::from_slice(&candidate) {
            return Ok(secret);
        }
    }
}

/// Length of a P-256 scalar and of a shared secret, in bytes.
const P256_SCALAR_SIZE: usize = 32;
