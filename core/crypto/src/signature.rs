//! Signature and MAC contracts.
//!
//! HMAC tags and ECDSA signatures share these traits: a MAC "signs" with the
//! shared key and "verifies" by recomputing in constant time.

use std::sync::Arc;

use cryptofacade_common::{Error, Result};

use crate::function::{SignFunction, VerifyFunction};
use crate::operation::Operation;

/// Blocking signature generation.
pub trait SignOp: Send + Sync {
    /// Largest signature this signer produces, in bytes. Exact for fixed-width
    /// formats, an upper bound for DER.
    fn signature_size(&self) -> usize;

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn sign_function(&self) -> Result<SignFunction>;
}

/// Blocking signature verification.
pub trait VerifyOp: Send + Sync {
    /// Check `signature` over `data`.
    ///
    /// A mismatch and a malformed signature both yield `Ok(false)`; errors are
    /// reserved for failures of the engine itself.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool>;

    fn verify_function(&self, signature: &[u8]) -> Result<VerifyFunction>;
}

/// Signing handle.
pub type Signer = Operation<dyn SignOp>;

/// Verification handle.
pub type Verifier = Operation<dyn VerifyOp>;

impl Operation<dyn SignOp> {
    pub fn signature_size(&self) -> usize {
        self.core().signature_size()
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.core().sign(data)
    }

    pub async fn sign_async(&self, data: &[u8]) -> Result<Vec<u8>> {
        let data: Arc<[u8]> = Arc::from(data);
        self.offload(move |core| core.sign(&data)).await
    }

    pub fn sign_function(&self) -> Result<SignFunction> {
        self.core().sign_function()
    }
}

impl Operation<dyn VerifyOp> {
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        self.core().verify(data, signature)
    }

    /// [`verify`](Self::verify), turning a mismatch into the opaque crypto
    /// failure.
    pub fn verify_or_fail(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        if self.verify(data, signature)? {
            Ok(())
        } else {
            Err(Error::crypto_because("signature mismatch"))
        }
    }

    pub async fn verify_async(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let data: Arc<[u8]> = Arc::from(data);
        let signature = signature.to_vec();
        self.offload(move |core| core.verify(&data, &signature)).await
    }

    pub fn verify_function(&self, signature: &[u8]) -> Result<VerifyFunction> {
        self.core().verify_function(signature)
    }
}
