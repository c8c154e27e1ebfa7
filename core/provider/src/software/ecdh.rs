//! ECDH on P-256.

use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use cryptofacade_common::{Error, KeyFormat, Result};
use cryptofacade_crypto::algorithms::{EcdhAlgorithm, EcdhPrivateKey, EcdhPublicKey};
use cryptofacade_crypto::{
    EcCurve, EcKeyParameters, EcdhKeyPair, Empty, EncodableKey, KeyAgreement, KeyAgreementOp,
    KeyDecoder, KeyGenOp, KeyGenerator, OperationFactory,
};
use cryptofacade_runtime::ProviderState;

use super::{operation, random_secret_key, require_p256, unsupported_format, P256_SCALAR_SIZE};

fn decode_public(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| Error::InvalidInput("Not a P-256 public point".to_string()))
}

pub(crate) struct SoftwareEcdh {
    state: Arc<ProviderState>,
    key_pair_generator: OperationFactory<EcKeyParameters, KeyGenerator<EcdhKeyPair>>,
}

impl SoftwareEcdh {
    pub fn new(state: &Arc<ProviderState>) -> Self {
        let state = Arc::clone(state);
        let generator_state = Arc::clone(&state);
        let key_pair_generator = OperationFactory::new(
            EcKeyParameters::default(),
            move |parameters: &EcKeyParameters| {
                require_p256(parameters.curve())?;
                let core = EcdhKeyGen {
                    state: Arc::clone(&generator_state),
                };
                Ok(operation(
                    Arc::new(core) as Arc<dyn KeyGenOp<EcdhKeyPair>>,
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

impl EcdhAlgorithm for SoftwareEcdh {
    fn key_pair_generator(&self) -> &OperationFactory<EcKeyParameters, KeyGenerator<EcdhKeyPair>> {
        &self.key_pair_generator
    }

    fn public_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdhPublicKey>>>> {
        require_p256(curve)?;
        Ok(Arc::new(PublicKeyDecoder))
    }

    fn private_key_decoder(
        &self,
        curve: EcCurve,
    ) -> Result<Arc<dyn KeyDecoder<Arc<dyn EcdhPrivateKey>>>> {
        require_p256(curve)?;
        Ok(Arc::new(PrivateKeyDecoder {
            state: Arc::clone(&self.state),
        }))
    }
}

struct EcdhKeyGen {
    state: Arc<ProviderState>,
}

impl KeyGenOp<EcdhKeyPair> for EcdhKeyGen {
    fn generate(&self) -> Result<EcdhKeyPair> {
        let secret = random_secret_key(self.state.random())?;
        let public = secret.public_key();
        Ok(EcdhKeyPair {
            public_key: Arc::new(SoftwareEcdhPublicKey { key: public }),
            private_key: Arc::new(SoftwareEcdhPrivateKey::new(secret, &self.state)),
        })
    }
}

struct PublicKeyDecoder;

impl KeyDecoder<Arc<dyn EcdhPublicKey>> for PublicKeyDecoder {
    fn decode(&self, format: KeyFormat, bytes: &[u8]) -> Result<Arc<dyn EcdhPublicKey>> {
        if format != KeyFormat::Raw {
            return Err(unsupported_format(format));
        }
        Ok(Arc::new(SoftwareEcdhPublicKey {
            key: decode_public(bytes)?,
        }))
    }
}

struct PrivateKeyDecoder {
    state: Arc<ProviderState>,
}

impl KeyDecoder<Arc<dyn EcdhPrivateKey>> for PrivateKeyDecoder {
    fn decode(&self, format: KeyFormat, bytes: &[u8]) -> Result<Arc<dyn EcdhPrivateKey>> {
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
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| Error::InvalidInput("P-256 scalar out of range".to_string()))?;
        Ok(Arc::new(SoftwareEcdhPrivateKey::new(secret, &self.state)))
    }
}

struct SoftwareEcdhPublicKey {
    key: PublicKey,
}

impl EncodableKey for SoftwareEcdhPublicKey {
    fn encode(&self, format: KeyFormat) -> Result<Vec<u8>> {
        match format {
            KeyFormat::Raw => Ok(self.key.to_encoded_point(false).as_bytes().to_vec()),
            other => Err(unsupported_format(other)),
        }
    }
}

impl EcdhPublicKey for SoftwareEcdhPublicKey {
    fn curve(&self) -> EcCurve {
        EcCurve::P256
    }
}

impl fmt::Debug for SoftwareEcdhPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdhPublicKey({})", EcCurve::P256)
    }
}

struct SoftwareEcdhPrivateKey {
    secret: Arc<SecretKey>,
    agreement: OperationFactory<Empty, KeyAgreement>,
}

impl SoftwareEcdhPrivateKey {
    fn new(secret: SecretKey, state: &Arc<ProviderState>) -> Self {
        let secret = Arc::new(secret);
        let core = Arc::new(AgreementCore {
            secret: Arc::clone(&secret),
        });
        let state = Arc::clone(state);
        let agreement = OperationFactory::new(Empty, move |_: &Empty| {
            Ok(operation(
                Arc::clone(&core) as Arc<dyn KeyAgreementOp>,
                &state,
            ))
        });
        Self { secret, agreement }
    }
}

impl EncodableKey for SoftwareEcdhPrivateKey {
    fn encode(&self, format: KeyFormat) -> Result<Vec<u8>> {
        match format {
            KeyFormat::Raw => Ok(self.secret.to_bytes().to_vec()),
            other => Err(unsupported_format(other)),
        }
    }
}

impl EcdhPrivateKey for SoftwareEcdhPrivateKey {
    fn curve(&self) -> EcCurve {
        EcCurve::P256
    }

    fn shared_secret_generator(&self) -> &OperationFactory<Empty, KeyAgreement> {
        &self.agreement
    }
}

impl fmt::Debug for SoftwareEcdhPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdhPrivateKey({}, [REDACTED])", EcCurve::P256)
    }
}

struct AgreementCore {
    secret: Arc<SecretKey>,
}

impl KeyAgreementOp for AgreementCore {
    fn shared_secret_size(&self) -> usize {
        P256_SCALAR_SIZE
    }

    fn agree(&self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let peer = decode_public(peer_public_key)?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
    }
}
