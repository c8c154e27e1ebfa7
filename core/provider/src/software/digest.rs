//! Pooled software digests.

use blake2::{Blake2b512, Blake2s256};
use sha2::digest::DynDigest;
use sha2::{Sha256, Sha384, Sha512};
use std::sync::Arc;

use cryptofacade_common::{AlgorithmId, Result};
use cryptofacade_crypto::algorithms::DigestAlgorithm;
use cryptofacade_crypto::{
    ids, Empty, FunctionCore, HashFunction, HashOp, Hasher, OperationFactory, StreamingFunction,
};
use cryptofacade_runtime::{Pooled, ProviderState, ResourcePool};

use super::operation;

pub(crate) type DigestContext = Box<dyn DynDigest + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DigestKind {
    Sha256,
    Sha384,
    Sha512,
    Blake2b512,
    Blake2s256,
}

impl DigestKind {
    pub const ALL: [DigestKind; 5] = [
        DigestKind::Sha256,
        DigestKind::Sha384,
        DigestKind::Sha512,
        DigestKind::Blake2b512,
        DigestKind::Blake2s256,
    ];

    pub fn id(&self) -> AlgorithmId<dyn DigestAlgorithm> {
        match self {
            DigestKind::Sha256 => ids::SHA256,
            DigestKind::Sha384 => ids::SHA384,
            DigestKind::Sha512 => ids::SHA512,
            DigestKind::Blake2b512 => ids::BLAKE2B_512,
            DigestKind::Blake2s256 => ids::BLAKE2S_256,
        }
    }

    pub fn from_id(id: AlgorithmId<dyn DigestAlgorithm>) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn output_size(&self) -> usize {
        match self {
            DigestKind::Sha256 | DigestKind::Blake2s256 => 32,
            DigestKind::Sha384 => 48,
            DigestKind::Sha512 | DigestKind::Blake2b512 => 64,
        }
    }

    /// Internal block size in bytes.
    pub fn block_size(&self) -> usize {
        match self {
            DigestKind::Sha256 | DigestKind::Blake2s256 => 64,
            DigestKind::Sha384 | DigestKind::Sha512 | DigestKind::Blake2b512 => 128,
        }
    }

    fn new_context(&self) -> DigestContext {
        match self {
            DigestKind::Sha256 => Box::new(Sha256::default()),
            DigestKind::Sha384 => Box::new(Sha384::default()),
            DigestKind::Sha512 => Box::new(Sha512::default()),
            DigestKind::Blake2b512 => Box::new(Blake2b512::default()),
            DigestKind::Blake2s256 => Box::new(Blake2s256::default()),
        }
    }

    /// The provider-wide pool of contexts for this digest.
    pub fn pool(&self, state: &ProviderState) -> Result<Arc<ResourcePool<DigestContext>>> {
        let kind = *self;
        state
            .pools()
            .get_or_create(self.id().name(), move || Ok(kind.new_context()))
    }
}

/// Check out a context ready for a new message.
pub(crate) fn fresh_context(
    pool: &Arc<ResourcePool<DigestContext>>,
) -> Result<Pooled<DigestContext>> {
    let mut context = pool.checkout()?;
    // A released streaming function may have left input behind.
    context.reset();
    Ok(context)
}

pub(crate) struct SoftwareDigest {
    kind: DigestKind,
    hasher: OperationFactory<Empty, Hasher>,
}

impl SoftwareDigest {
    pub fn new(kind: DigestKind, state: &Arc<ProviderState>) -> Self {
        let state = Arc::clone(state);
        let hasher = OperationFactory::new(Empty, move |_: &Empty| {
            let core = PooledHasher {
                kind,
                pool: kind.pool(&state)?,
            };
            Ok(operation(Arc::new(core) as Arc<dyn HashOp>, &state))
        });
        Self { kind, hasher }
    }
}

impl DigestAlgorithm for SoftwareDigest {
    fn digest_size(&self) -> usize {
        self.kind.output_size()
    }

    fn hasher(&self) -> &OperationFactory<Empty, Hasher> {
        &self.hasher
    }
}

struct PooledHasher {
    kind: DigestKind,
    pool: Arc<ResourcePool<DigestContext>>,
}

impl HashOp for PooledHasher {
    fn digest_size(&self) -> usize {
        self.kind.output_size()
    }

    fn hash(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut context = fresh_context(&self.pool)?;
        context.update(data);
        Ok(context.finalize_reset().into_vec())
    }

    fn hash_function(&self) -> Result<HashFunction> {
        let context = fresh_context(&self.pool)?;
        Ok(StreamingFunction::new(Box::new(DigestFunction { context })))
    }
}

struct DigestFunction {
    context: Pooled<DigestContext>,
}

impl FunctionCore for DigestFunction {
    type Chunk = ();
    type Output = Vec<u8>;

    fn update(&mut self, input: &[u8]) -> Result<()> {
        self.context.update(input);
        Ok(())
    }

    fn finish(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.context.update(input);
        Ok(self.context.finalize_reset().into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher(kind: DigestKind) -> Hasher {
        let state = Arc::new(ProviderState::default());
        SoftwareDigest::new(kind, &state).hasher().create().unwrap()
    }

    #[test]
    fn test_sha256_known_answer() {
        let digest = hasher(DigestKind::Sha256).hash(b"abc").unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_output_sizes_match_engine() {
        for kind in DigestKind::ALL {
            let hasher = hasher(kind);
            assert_eq!(hasher.hash(b"").unwrap().len(), kind.output_size());
            assert_eq!(hasher.digest_size(), kind.output_size());
        }
    }

    #[test]
    fn test_released_function_does_not_leak_into_next_call() {
        let state = Arc::new(ProviderState::default());
        let hasher = SoftwareDigest::new(DigestKind::Sha256, &state)
            .hasher()
            .create()
            .unwrap();
        let expected = hasher.hash(b"clean").unwrap();

        let mut abandoned = hasher.hash_function().unwrap();
        abandoned.update(b"leftover").unwrap();
        abandoned.close();

        let pool = DigestKind::Sha256.pool(&state).unwrap();
        assert!(pool.idle_count() >= 1);
        assert_eq!(hasher.hash(b"clean").unwrap(), expected);
    }

    #[test]
    fn test_from_id() {
        assert_eq!(DigestKind::from_id(ids::SHA384), Some(DigestKind::Sha384));
        assert_eq!(DigestKind::from_id(ids::SHA1), None);
    }
}
