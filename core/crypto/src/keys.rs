//! Key material contracts.
//!
//! Keys are opaque backend objects. They leave or enter a backend only through
//! [`EncodableKey::encode`] and [`KeyDecoder::decode`], tagged with a
//! [`KeyFormat`]. The codecs for formats other than the engine's native one
//! live outside this workspace.

use std::sync::Arc;
use zeroize::Zeroizing;

use cryptofacade_common::{KeyFormat, Result};

use crate::operation::Operation;

/// Key that can be exported.
pub trait EncodableKey: Send + Sync {
    /// Export in `format`.
    ///
    /// # Errors
    /// - `OperationNotSupported` if the backend has no encoder for `format`
    ///
    /// # Security
    /// Secret keys are returned in the clear. The caller owns the bytes.
    fn encode(&self, format: KeyFormat) -> Result<Vec<u8>>;
}

/// Imports keys of type `K`.
pub trait KeyDecoder<K>: Send + Sync {
    /// # Errors
    /// - `OperationNotSupported` if the backend has no decoder for `format`
    /// - `InvalidInput` if `bytes` is not a valid key in that format
    fn decode(&self, format: KeyFormat, bytes: &[u8]) -> Result<K>;
}

/// Blocking key generation.
pub trait KeyGenOp<K>: Send + Sync {
    /// # Errors
    /// - `RandomSource` if the secure random source failed
    fn generate(&self) -> Result<K>;
}

/// Key generation handle.
pub type KeyGenerator<K> = Operation<dyn KeyGenOp<K>>;

impl<K: Send + 'static> Operation<dyn KeyGenOp<K>> {
    pub fn generate(&self) -> Result<K> {
        self.core().generate()
    }

    pub async fn generate_async(&self) -> Result<K> {
        self.offload(|core| core.generate()).await
    }
}

/// Blocking key agreement with a fixed private key.
pub trait KeyAgreementOp: Send + Sync {
    /// Shared secret length in bytes.
    fn shared_secret_size(&self) -> usize;

    /// Derive the shared secret with a peer public key in RAW encoding.
    ///
    /// # Errors
    /// - `InvalidInput` if the peer key is not a point on this curve
    fn agree(&self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// Key agreement handle.
pub type KeyAgreement = Operation<dyn KeyAgreementOp>;

impl Operation<dyn KeyAgreementOp> {
    pub fn shared_secret_size(&self) -> usize {
        self.core().shared_secret_size()
    }

    /// Derive the shared secret with `peer`.
    ///
    /// The peer key may come from any provider; it is exchanged in RAW form.
    pub fn agree<K: EncodableKey + ?Sized>(&self, peer: &K) -> Result<Zeroizing<Vec<u8>>> {
        let peer = peer.encode(KeyFormat::Raw)?;
        self.core().agree(&peer)
    }

    pub async fn agree_async<K: EncodableKey + ?Sized>(&self, peer: &K) -> Result<Zeroizing<Vec<u8>>> {
        let peer: Arc<[u8]> = Arc::from(peer.encode(KeyFormat::Raw)?);
        self.offload(move |core| core.agree(&peer)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptofacade_common::Error;
    use cryptofacade_runtime::Executor;
    use std::sync::atomic::{AtomicU8, Ordering};

    struct Counter(AtomicU8);

    impl KeyGenOp<u8> for Counter {
        fn generate(&self) -> Result<u8> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    struct RawOnly(Vec<u8>);

    impl EncodableKey for RawOnly {
        fn encode(&self, format: KeyFormat) -> Result<Vec<u8>> {
            match format {
                KeyFormat::Raw => Ok(self.0.clone()),
                other => Err(Error::OperationNotSupported(format!("{} export", other))),
            }
        }
    }

    /// Shared secret is the peer key xor the private byte.
    struct XorAgreement(u8);

    impl KeyAgreementOp for XorAgreement {
        fn shared_secret_size(&self) -> usize {
            2
        }

        fn agree(&self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
            if peer_public_key.len() != 2 {
                return Err(Error::InvalidInput("peer key length".to_string()));
            }
            Ok(Zeroizing::new(
                peer_public_key.iter().map(|b| b ^ self.0).collect(),
            ))
        }
    }

    #[tokio::test]
    async fn test_key_generator_shapes() {
        let generator: KeyGenerator<u8> = Operation::new(
            Arc::new(Counter(AtomicU8::new(0))) as Arc<dyn KeyGenOp<u8>>,
            Executor::inline(),
        );
        assert_eq!(generator.generate().unwrap(), 0);
        assert_eq!(generator.generate_async().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_agreement_exchanges_raw_keys() {
        let agreement: KeyAgreement = Operation::new(
            Arc::new(XorAgreement(0x0f)) as Arc<dyn KeyAgreementOp>,
            Executor::inline(),
        );
        let peer = RawOnly(vec![0xf0, 0x00]);

        let secret = agreement.agree(&peer).unwrap();
        assert_eq!(secret.as_slice(), &[0xff, 0x0f]);
        assert_eq!(*agreement.agree_async(&peer).await.unwrap(), *secret);

        let bad_peer = RawOnly(vec![1]);
        assert!(matches!(agreement.agree(&bad_peer), Err(Error::InvalidInput(_))));
    }
}
