//! HMAC over the SHA-2 family.
//!
//! A keyed MAC state is bound to its key, so every key owns its own pool of
//! states. Borrowed states are reset to the keyed initial state before use.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use cryptofacade_common::{AlgorithmId, Error, KeyFormat, Result};
use cryptofacade_crypto::algorithms::{DigestAlgorithm, HmacAlgorithm, HmacKey};
use cryptofacade_crypto::{
    EncodableKey, Empty, FunctionCore, HmacKeyParameters, KeyDecoder, KeyGenOp, KeyGenerator,
    OperationFactory, SignFunction, SignOp, Signer, StreamingFunction, Verifier,
    VerifyFunction, VerifyOp,
};
use cryptofacade_runtime::{Pooled, ProviderState, ResourcePool};

use super::digest::DigestKind;
use super::{operation, unsupported_format};

enum MacContext {
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

impl MacContext {
    fn new(kind: DigestKind, key: &[u8]) -> Result<Self> {
        let invalid = |_| Error::InvalidInput("HMAC key rejected by engine".to_string());
        let context = match kind {
            DigestKind::Sha256 => {
                MacContext::Sha256(<Hmac<Sha256> as Mac>::new_from_slice(key).map_err(invalid)?)
            }
            DigestKind::Sha384 => {
                MacContext::Sha384(<Hmac<Sha384> as Mac>::new_from_slice(key).map_err(invalid)?)
            }
            DigestKind::Sha512 => {
                MacContext::Sha512(<Hmac<Sha512> as Mac>::new_from_slice(key).map_err(invalid)?)
            }
            other => return Err(unsupported_digest(other.id())),
        };
        Ok(context)
    }

    fn reset(&mut self) {
        match self {
            MacContext::Sha256(mac) => Mac::reset(mac),
            MacContext::Sha384(mac) => Mac::reset(mac),
            MacContext::Sha512(mac) => Mac::reset(mac),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            MacContext::Sha256(mac) => Mac::update(mac, data),
            MacContext::Sha384(mac) => Mac::update(mac, data),
            MacContext::Sha512(mac) => Mac::update(mac, data),
        }
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        match self {
            MacContext::Sha256(mac) => mac.finalize_reset().into_bytes().to_vec(),
            MacContext::Sha384(mac) => mac.finalize_reset().into_bytes().to_vec(),
            MacContext::Sha512(mac) => mac.finalize_reset().into_bytes().to_vec(),
        }
    }
}

fn supported_kind(digest: AlgorithmId<dyn DigestAlgorithm>) -> Result<DigestKind> {
    match DigestKind::from_id(digest) {
        Some(kind @ (DigestKind::Sha256 | DigestKind::Sha384 | DigestKind::Sha512)) => Ok(kind),
        _ => Err(unsupported_digest(digest)),
    }
}

fn unsupported_digest(digest: AlgorithmId<dyn DigestAlgorithm>) -> Error {
    Error::OperationNotSupported(format!("HMAC with {}", digest))
}

pub(crate) struct SoftwareHmac {
    state: Arc<ProviderState>,
    key_generator: OperationFactory<HmacKeyParameters, KeyGenerator<Arc<dyn HmacKey>>>,
}

impl SoftwareHmac {
    pub fn new(state: &Arc<ProviderState>) -> Self {
        let state = Arc::clone(state);
        let generator_state = Arc::clone(&state);
        let key_generator = OperationFactory::new(
            HmacKeyParameters::default(),
            move |parameters: &HmacKeyParameters| {
                let kind = supported_kind(parameters.digest())?;
                let key_bytes = match parameters.key_size() {
                    Some(bits) => bits / 8,
                    None => kind.block_size(),
                };
                let core = HmacKeyGen {
                    kind,
                    key_bytes,
                    state: Arc::clone(&generator_state),
                };
                Ok(operation(
                    Arc::new(core) as Arc<dyn KeyGenOp<Arc<dyn HmacKey>>>,
                    &generator_state,
                ))
            },
        );
        Self {
            state,
            key_generator,
        }
    }
}

impl HmacAlgorithm for SoftwareHmac {
    fn key_generator(&self) -> &OperationFactory<HmacKeyParameters, KeyGenerator<Arc<dyn HmacKey>>> {
        &self.key_generator
    }

    fn key_decoder(
        &self,
        digest: AlgorithmId<dyn DigestAlgorithm>,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn HmacKey>>>> {
        let kind = supported_kind(digest)?;
        Ok(Arc::new(HmacKeyDecoder {
            kind,
            state: Arc::clone(&self.state),
        }))
    }
}

struct HmacKeyGen {
    kind: DigestKind,
    key_bytes: usize,
    state: Arc<ProviderState>,
}

impl KeyGenOp<Arc<dyn HmacKey>> for HmacKeyGen {
    fn generate(&self) -> Result<Arc<dyn HmacKey>> {
        let key = Zeroizing::new(self.state.random().bytes(self.key_bytes)?);
        Ok(Arc::new(SoftwareHmacKey::new(self.kind, key, &self.state)))
    }
}

struct HmacKeyDecoder {
    kind: DigestKind,
    state: Arc<ProviderState>,
}

impl KeyDecoder<Arc<dyn HmacKey>> for HmacKeyDecoder {
    fn decode(&self, format: KeyFormat, bytes: &[u8]) -> Result<Arc<dyn HmacKey>> {
        if format != KeyFormat::Raw {
            return Err(unsupported_format(format));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidInput("HMAC key must not be empty".to_string()));
        }
        let key = Zeroizing::new(bytes.to_vec());
        Ok(Arc::new(SoftwareHmacKey::new(self.kind, key, &self.state)))
    }
}

struct SoftwareHmacKey {
    kind: DigestKind,
    key: Arc<Zeroizing<Vec<u8>>>,
    signer: OperationFactory<Empty, Signer>,
    verifier: OperationFactory<Empty, Verifier>,
}

impl SoftwareHmacKey {
    /// Keyed MAC states are private to one key and never shared, so this
    /// pool lives and dies with the key instead of sitting in
    /// `state.pools()`. It takes its capacity from the provider's pools.
    fn new(kind: DigestKind, key: Zeroizing<Vec<u8>>, state: &Arc<ProviderState>) -> Self {
        let key = Arc::new(key);
        let factory_key = Arc::clone(&key);
        let pool = Arc::new(ResourcePool::new(
            format!("HMAC/{}", kind.id()),
            state.pools().capacity(),
            move || MacContext::new(kind, &factory_key),
        ));

        let core = Arc::new(MacCore { kind, pool });
        let signer_core = Arc::clone(&core);
        let signer_state = Arc::clone(state);
        let signer = OperationFactory::new(Empty, move |_: &Empty| {
            Ok(operation(
                Arc::clone(&signer_core) as Arc<dyn SignOp>,
                &signer_state,
            ))
        });
        let verifier_state = Arc::clone(state);
        let verifier = OperationFactory::new(Empty, move |_: &Empty| {
            Ok(operation(
                Arc::clone(&core) as Arc<dyn VerifyOp>,
                &verifier_state,
            ))
        });

        Self {
            kind,
            key,
            signer,
            verifier,
        }
    }
}

impl EncodableKey for SoftwareHmacKey {
    fn encode(&self, format: KeyFormat) -> Result<Vec<u8>> {
        match format {
            KeyFormat::Raw => Ok(self.key.to_vec()),
            other => Err(unsupported_format(other)),
        }
    }
}

impl HmacKey for SoftwareHmacKey {
    fn digest(&self) -> AlgorithmId<dyn DigestAlgorithm> {
        self.kind.id()
    }

    fn signature_generator(&self) -> &OperationFactory<Empty, Signer> {
        &self.signer
    }

    fn signature_verifier(&self) -> &OperationFactory<Empty, Verifier> {
        &self.verifier
    }
}

impl fmt::Debug for SoftwareHmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacKey({}, [REDACTED])", self.kind.id())
    }
}

struct MacCore {
    kind: DigestKind,
    pool: Arc<ResourcePool<MacContext>>,
}

impl MacCore {
    fn fresh_context(&self) -> Result<Pooled<MacContext>> {
        let mut context = self.pool.checkout()?;
        context.reset();
        Ok(context)
    }

    fn tag(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut context = self.fresh_context()?;
        context.update(data);
        Ok(context.finalize_reset())
    }
}

impl SignOp for MacCore {
    fn signature_size(&self) -> usize {
        self.kind.output_size()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.tag(data)
    }

    fn sign_function(&self) -> Result<SignFunction> {
        Ok(StreamingFunction::new(Box::new(MacFunction {
            context: self.fresh_context()?,
        })))
    }
}

impl VerifyOp for MacCore {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let expected = self.tag(data)?;
        Ok(expected.as_slice().ct_eq(signature).into())
    }

    fn verify_function(&self, signature: &[u8]) -> Result<VerifyFunction> {
        Ok(StreamingFunction::new(Box::new(MacVerifyFunction {
            inner: MacFunction {
                context: self.fresh_context()?,
            },
            signature: signature.to_vec(),
        })))
    }
}

struct MacFunction {
    context: Pooled<MacContext>,
}

impl FunctionCore for MacFunction {
    type Chunk = ();
    type Output = Vec<u8>;

    fn update(&mut self, input: &[u8]) -> Result<()> {
        self.context.update(input);
        Ok(())
    }

    fn finish(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.context.update(input);
        Ok(self.context.finalize_reset())
    }
}

struct MacVerifyFunction {
    inner: MacFunction,
    signature: Vec<u8>,
}

impl FunctionCore for MacVerifyFunction {
    type Chunk = ();
    type Output = bool;

    fn update(&mut self, input: &[u8]) -> Result<()> {
        self.inner.update(input)
    }

    fn finish(&mut self, input: &[u8]) -> Result<bool> {
        let expected = self.inner.finish(input)?;
        Ok(expected.as_slice().ct_eq(&self.signature).into())
    }
}
