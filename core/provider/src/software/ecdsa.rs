//! ECDSA on P-256.
//!
//! The message is hashed with a pooled digest context and the prehash is
//! signed by the curve engine, so streaming and one-shot calls produce the
//! same signatures.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use std::fmt;
use std::sync::Arc;

use cryptofacade_common::{AlgorithmId, Error, KeyFormat, Result};
use cryptofacade_crypto::algorithms::{
    DigestAlgorithm, EcdsaAlgorithm, EcdsaPrivateKey, EcdsaPublicKey,
};
use cryptofacade_crypto::{
    EcCurve, EcKeyParameters, EcdsaKeyPair, EcdsaParameters, EncodableKey, FunctionCore,
    KeyDecoder, KeyGenOp, KeyGenerator, OperationFactory, SignFunction, SignOp, SignatureFormat,
    Signer, StreamingFunction, Verifier, VerifyFunction, VerifyOp,
};
use cryptofacade_runtime::{Pooled, ProviderState, ResourcePool};

use super::digest::{fresh_context, DigestContext, DigestKind};
use super::{operation, random_secret_key, require_p256, unsupported_format, P256_SCALAR_SIZE};

/// Upper bound of a DER encoded P-256 signature.
const DER_SIGNATURE_MAX: usize = 72;

fn prehash_kind(digest: AlgorithmId<dyn DigestAlgorithm>) -> Result<DigestKind> {
    match DigestKind::from_id(digest) {
        Some(kind @ (DigestKind::Sha256 | DigestKind::Sha384 | DigestKind::Sha512)) => Ok(kind),
        _ => Err(Error::OperationNotSupported(format!(
            "ECDSA with {}",
            digest
        ))),
    }
}

pub(crate) struct SoftwareEcdsa {
    state: Arc<ProviderState>,
    key_pair_generator: OperationFactory<EcKeyParameters, KeyGenerator<EcdsaKeyPair>>,
}

impl SoftwareEcdsa {
    pub fn new(state: &Arc<ProviderState>) -> Self {
        let state = Arc::clone(state);
        let generator_state = Arc::clone(&state);
        let key_pair_generator = OperationFactory::new(
            EcKeyParameters::default(),
            move |parameters: &EcKeyParameters| {
                require_p256(parameters.curve())?;
                let core = EcdsaKeyGen {
                    state: Arc::clone(&generator_state),
                };
                Ok(operation(
                    Arc::new(core) as Arc<dyn KeyGenOp<EcdsaKeyPair>>,
                    &generator_state,
                ))
            },
        );
        Self {
            state,
            key_pair_generator,
        }
    }
}

impl EcdsaAlgorithm for SoftwareEcdsa {
    fn key_pair_generator(&self) -> &OperationFactory<EcKeyParameters, KeyGenerator<EcdsaKeyPair>> {
        &self.key_pair_generator
    }

    fn public_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdsaPublicKey>>>> {
        require_p256(curve)?;
        Ok(Arc::new(PublicKeyDecoder {
            state: Arc::clone(&self.state),
        }))
    }

    fn private_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdsaPrivateKey>>>> {
        require_p256(curve)?;
        Ok(Arc::new(PrivateKeyDecoder {
            state: Arc::clone(&self.state),
        }))
    }
}

struct EcdsaKeyGen {
    state: Arc<ProviderState>,
}

impl KeyGenOp<EcdsaKeyPair> for EcdsaKeyGen {
    fn generate(&self) -> Result<EcdsaKeyPair> {
        let signing_key = SigningKey::from(random_secret_key(self.state.random())?);
        let verifying_key = signing_key.verifying_key().clone();
        Ok(EcdsaKeyPair {
            public_key: Arc::new(SoftwareEcdsaPublicKey::new(verifying_key, &self.state)),
            private_key: Arc::new(SoftwareEcdsaPrivateKey::new(signing_key, &self.state)),
        })
    }
}

struct PublicKeyDecoder {
    state: Arc<ProviderState>,
}

impl KeyDecoder<Arc<dyn EcdsaPublicKey>> for PublicKeyDecoder {
    fn decode(&self, format: KeyFormat, bytes: &[u8]) -> Result<Arc<dyn EcdsaPublicKey>> {
        if format != KeyFormat::Raw {
            return Err(unsupported_format(format));
        }
        let key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| Error::InvalidInput("Not a P-256 public point".to_string()))?;
        Ok(Arc::new(SoftwareEcdsaPublicKey::new(key, &self.state)))
    }
}

struct PrivateKeyDecoder {
    state: Arc<ProviderState>,
}

impl KeyDecoder<Arc<dyn EcdsaPrivateKey>> for PrivateKeyDecoder {
    fn decode(&self, format: KeyFormat, bytes: &[u8]) -> Result<Arc<dyn EcdsaPrivateKey>> {
        if format != KeyFormat::Raw {
            return Err(unsupported_format(format));
        }
        if bytes.len() != P256_SCALAR_SIZE {
            return Err(Error::InvalidInput(format!(
                "P-256 private key must be {} bytes, got {}",
                P256_SCALAR_SIZE,
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(bytes)
            .map_err(|_| Error::InvalidInput("P-256 scalar out of range".to_string()))?;
        Ok(Arc::new(SoftwareEcdsaPrivateKey::new(key, &self.state)))
    }
}

struct SoftwareEcdsaPublicKey {
    key: VerifyingKey,
    verifier: OperationFactory<EcdsaParameters, Verifier>,
}

impl SoftwareEcdsaPublicKey {
    fn new(key: VerifyingKey, state: &Arc<ProviderState>) -> Self {
        let state = Arc::clone(state);
        let verifier_key = key.clone();
        let verifier = OperationFactory::new(
            EcdsaParameters::default(),
            move |parameters: &EcdsaParameters| {
                let prehash = Prehash::new(parameters.digest(), &state)?;
                let core = EcdsaVerifyCore {
                    key: verifier_key.clone(),
                    prehash,
                    format: parameters.format(),
                };
                Ok(operation(Arc::new(core) as Arc<dyn VerifyOp>, &state))
            },
        );
        Self { key, verifier }
    }
}

impl EncodableKey for SoftwareEcdsaPublicKey {
    fn encode(&self, format: KeyFormat) -> Result<Vec<u8>> {
        match format {
            KeyFormat::Raw => Ok(self.key.to_encoded_point(false).as_bytes().to_vec()),
            other => Err(unsupported_format(other)),
        }
    }
}

impl EcdsaPublicKey for SoftwareEcdsaPublicKey {
    fn curve(&self) -> EcCurve {
        EcCurve::P256
    }

    fn signature_verifier(&self) -> &OperationFactory<EcdsaParameters, Verifier> {
        &self.verifier
    }
}

impl fmt::Debug for SoftwareEcdsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdsaPublicKey({})", EcCurve::P256)
    }
}

struct SoftwareEcdsaPrivateKey {
    key: Arc<SigningKey>,
    signer: OperationFactory<EcdsaParameters, Signer>,
}

impl SoftwareEcdsaPrivateKey {
    fn new(key: SigningKey, state: &Arc<ProviderState>) -> Self {
        let key = Arc::new(key);
        let signer_key = Arc::clone(&key);
        let state = Arc::clone(state);
        let signer = OperationFactory::new(
            EcdsaParameters::default(),
            move |parameters: &EcdsaParameters| {
                let prehash = Prehash::new(parameters.digest(), &state)?;
                let core = EcdsaSignCore {
                    key: Arc::clone(&signer_key),
                    prehash,
                    format: parameters.format(),
                };
                Ok(operation(Arc::new(core) as Arc<dyn SignOp>, &state))
            },
        );
        Self { key, signer }
    }
}

impl EncodableKey for SoftwareEcdsaPrivateKey {
    fn encode(&self, format: KeyFormat) -> Result<Vec<u8>> {
        match format {
            KeyFormat::Raw => Ok(self.key.to_bytes().to_vec()),
            other => Err(unsupported_format(other)),
        }
    }
}

impl EcdsaPrivateKey for SoftwareEcdsaPrivateKey {
    fn curve(&self) -> EcCurve {
        EcCurve::P256
    }

    fn signature_generator(&self) -> &OperationFactory<EcdsaParameters, Signer> {
        &self.signer
    }
}

impl fmt::Debug for SoftwareEcdsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdsaPrivateKey({}, [REDACTED])", EcCurve::P256)
    }
}

/// Message hashing ahead of the curve operation.
struct Prehash {
    pool: Arc<ResourcePool<DigestContext>>,
}

impl Prehash {
    fn new(digest: AlgorithmId<dyn DigestAlgorithm>, state: &ProviderState) -> Result<Self> {
        let kind = prehash_kind(digest)?;
        Ok(Self {
            pool: kind.pool(state)?,
        })
    }

    fn digest(&self, data: &[u8]) -> Result<Box<[u8]>> {
        let mut context = fresh_context(&self.pool)?;
        context.update(data);
        Ok(context.finalize_reset())
    }

    fn context(&self) -> Result<Pooled<DigestContext>> {
        fresh_context(&self.pool)
    }
}

fn sign_prehash(key: &SigningKey, prehash: &[u8], format: SignatureFormat) -> Result<Vec<u8>> {
    let signature: Signature = key
        .sign_prehash(prehash)
        .map_err(|_| Error::crypto_because("ECDSA signing failed"))?;
    Ok(match format {
        SignatureFormat::Raw => signature.to_bytes().to_vec(),
        SignatureFormat::Der => signature.to_der().as_bytes().to_vec(),
    })
}

fn verify_prehash(
    key: &VerifyingKey,
    prehash: &[u8],
    signature: &[u8],
    format: SignatureFormat,
) -> bool {
    let parsed = match format {
        SignatureFormat::Raw => Signature::from_slice(signature),
        SignatureFormat::Der => Signature::from_der(signature),
    };
    match parsed {
        Ok(signature) => key.verify_prehash(prehash, &signature).is_ok(),
        // Malformed encodings never verify.
        Err(_) => false,
    }
}

struct EcdsaSignCore {
    key: Arc<SigningKey>,
    prehash: Prehash,
    format: SignatureFormat,
}

impl SignOp for EcdsaSignCore {
    fn signature_size(&self) -> usize {
        match self.format {
            SignatureFormat::Raw => 2 * P256_SCALAR_SIZE,
            SignatureFormat::Der => DER_SIGNATURE_MAX,
        }
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let prehash = self.prehash.digest(data)?;
        sign_prehash(&self.key, &prehash, self.format)
    }

    fn sign_function(&self) -> Result<SignFunction> {
        Ok(StreamingFunction::new(Box::new(EcdsaSignFunction {
            context: self.prehash.context()?,
            key: Arc::clone(&self.key),
            format: self.format,
        })))
    }
}

struct EcdsaVerifyCore {
    key: VerifyingKey,
    prehash: Prehash,
    format: SignatureFormat,
}

impl VerifyOp for EcdsaVerifyCore {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let prehash = self.prehash.digest(data)?;
        Ok(verify_prehash(&self.key, &prehash, signature, self.format))
    }

    fn verify_function(&self, signature: &[u8]) -> Result<VerifyFunction> {
        Ok(StreamingFunction::new(Box::new(EcdsaVerifyFunction {
            context: self.prehash.context()?,
            key: self.key.clone(),
            format: self.format,
            signature: signature.to_vec(),
        })))
    }
}

struct EcdsaSignFunction {
    context: Pooled<DigestContext>,
    key: Arc<SigningKey>,
    format: SignatureFormat,
}

impl FunctionCore for EcdsaSignFunction {
    type Chunk = ();
    type Output = Vec<u8>;

    fn update(&mut self, input: &[u8]) -> Result<()> {
        self.context.update(input);
        Ok(())
    }

    fn finish(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.context.update(input);
        let prehash = self.context.finalize_reset();
        sign_prehash(&self.key, &prehash, self.format)
    }
}

struct EcdsaVerifyFunction {
    context: Pooled<DigestContext>,
    key: VerifyingKey,
    format: SignatureFormat,
    signature: Vec<u8>,
}

impl FunctionCore for EcdsaVerifyFunction {
    type Chunk = ();
    type Output = bool;

    fn update(&mut self, input: &[u8]) -> Result<()> {
        self.context.update(input);
        Ok(())
    }

    fn finish(&mut self, input: &[u8]) -> Result<bool> {
        self.context.update(input);
        let prehash = self.context.finalize_reset();
        Ok(verify_prehash(&self.key, &prehash, &self.signature, self.format))
    }
}
