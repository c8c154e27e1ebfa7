//! Hash contracts.

use std::sync::Arc;

use cryptofacade_common::Result;

use crate::function::HashFunction;
use crate::operation::Operation;

/// Blocking hash implementation.
pub trait HashOp: Send + Sync {
    /// Digest length in bytes.
    fn digest_size(&self) -> usize;

    fn hash(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Start an incremental hash. The function owns one engine context until
    /// it is released.
    fn hash_function(&self) -> Result<HashFunction>;
}

/// Hash handle.
pub type Hasher = Operation<dyn HashOp>;

impl Operation<dyn HashOp> {
    pub fn digest_size(&self) -> usize {
        self.core().digest_size()
    }

    pub fn hash(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.core().hash(data)
    }

    pub async fn hash_async(&self, data: &[u8]) -> Result<Vec<u8>> {
        let data: Arc<[u8]> = Arc::from(data);
        self.offload(move |core| core.hash(&data)).await
    }

    pub fn hash_function(&self) -> Result<HashFunction> {
        self.core().hash_function()
    }
}
