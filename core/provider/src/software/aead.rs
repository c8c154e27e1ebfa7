//! AES-GCM and ChaCha20-Poly1305 family ciphers.
//!
//! The engines expose one-shot detached encryption only. Streaming functions
//! therefore buffer their input (zeroized on drop) and do all the work in
//! `finish`, which also means decryption never releases plaintext before the
//! tag has been checked.

use aes_gcm::aead::consts::{U12, U13, U14, U15, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::{Aes128, Aes192, Aes256};
use aes_gcm::AesGcm;
use chacha20poly1305::{ChaCha20Poly1305, XChaCha20Poly1305};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use cryptofacade_common::{AlgorithmId, Error, KeyFormat, Result};
use cryptofacade_crypto::algorithms::{AeadAlgorithm, AeadKey};
use cryptofacade_crypto::{
    ids, AeadKeyParameters, AeadParameters, Cipher, CipherBox, CipherFunction, CipherLayout,
    CipherOp, DecryptOp, EncodableKey, EncryptOp, FunctionCore, KeyDecoder, KeyGenOp,
    KeyGenerator, OperationFactory, StreamingFunction,
};
use cryptofacade_runtime::{ProviderState, SecureRandom};

use super::{operation, unsupported_format};

/// Keyed engine with detached tags.
trait AeadEngine: Send + Sync {
    /// Encrypt `buffer` in place and return the tag.
    fn seal(&self, nonce: &[u8], associated_data: &[u8], buffer: &mut [u8]) -> Result<Vec<u8>>;

    /// Authenticate and decrypt `buffer` in place.
    fn open(
        &self,
        nonce: &[u8],
        associated_data: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> Result<()>;
}

impl<C: AeadInPlace + Send + Sync> AeadEngine for C {
    fn seal(&self, nonce: &[u8], associated_data: &[u8], buffer: &mut [u8]) -> Result<Vec<u8>> {
        let tag = self
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), associated_data, buffer)
            .map_err(|_| Error::crypto_because("engine rejected plaintext"))?;
        Ok(tag.to_vec())
    }

    fn open(
        &self,
        nonce: &[u8],
        associated_data: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> Result<()> {
        self.decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            associated_data,
            buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| Error::crypto_because("authentication failed"))
    }
}

fn keyed<C>(key: &[u8]) -> Result<Arc<dyn AeadEngine>>
where
    C: KeyInit + AeadInPlace + Send + Sync + 'static,
{
    let engine = C::new_from_slice(key)
        .map_err(|_| Error::InvalidInput(format!("Invalid key length: {} bytes", key.len())))?;
    Ok(Arc::new(engine) as Arc<dyn AeadEngine>)
}

macro_rules! aes_gcm_with_tag {
    ($aes:ty, $key:expr, $tag_size:expr) => {
        match $tag_size {
            12 => keyed::<AesGcm<$aes, U12, U12>>($key),
            13 => keyed::<AesGcm<$aes, U12, U13>>($key),
            14 => keyed::<AesGcm<$aes, U12, U14>>($key),
            15 => keyed::<AesGcm<$aes, U12, U15>>($key),
            16 => keyed::<AesGcm<$aes, U12, U16>>($key),
            other => Err(Error::OperationNotSupported(format!(
                "AES-GCM with a {} byte tag",
                other
            ))),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AeadVariant {
    AesGcm,
    ChaCha20Poly1305,
    XChaCha20Poly1305,
}

impl AeadVariant {
    pub const ALL: [AeadVariant; 3] = [
        AeadVariant::AesGcm,
        AeadVariant::ChaCha20Poly1305,
        AeadVariant::XChaCha20Poly1305,
    ];

    pub fn id(&self) -> AlgorithmId<dyn AeadAlgorithm> {
        match self {
            AeadVariant::AesGcm => ids::AES_GCM,
            AeadVariant::ChaCha20Poly1305 => ids::CHACHA20_POLY1305,
            AeadVariant::XChaCha20Poly1305 => ids::XCHACHA20_POLY1305,
        }
    }

    fn nonce_size(&self) -> usize {
        match self {
            AeadVariant::AesGcm | AeadVariant::ChaCha20Poly1305 => 12,
            AeadVariant::XChaCha20Poly1305 => 24,
        }
    }

    /// Key lengths accepted, in bytes.
    fn key_sizes(&self) -> &'static [usize] {
        match self {
            AeadVariant::AesGcm => &[16, 24, 32],
            AeadVariant::ChaCha20Poly1305 | AeadVariant::XChaCha20Poly1305 => &[32],
        }
    }

    fn check_key_size(&self, bytes: usize) -> Result<()> {
        if self.key_sizes().contains(&bytes) {
            Ok(())
        } else {
            Err(Error::OperationNotSupported(format!(
                "{} with a {}-bit key",
                self.id(),
                bytes * 8
            )))
        }
    }

    fn engine(&self, key: &[u8], tag_size: usize) -> Result<Arc<dyn AeadEngine>> {
        match self {
            AeadVariant::AesGcm => match key.len() {
                16 => aes_gcm_with_tag!(Aes128, key, tag_size),
                24 => aes_gcm_with_tag!(Aes192, key, tag_size),
                32 => aes_gcm_with_tag!(Aes256, key, tag_size),
                other => Err(Error::InvalidInput(format!(
                    "Invalid key length: {} bytes",
                    other
                ))),
            },
            AeadVariant::ChaCha20Poly1305 | AeadVariant::XChaCha20Poly1305 if tag_size != 16 => {
                Err(Error::OperationNotSupported(format!(
                    "{} with a {} byte tag",
                    self.id(),
                    tag_size
                )))
            }
            AeadVariant::ChaCha20Poly1305 => keyed::<ChaCha20Poly1305>(key),
            AeadVariant::XChaCha20Poly1305 => keyed::<XChaCha20Poly1305>(key),
        }
    }
}

pub(crate) struct SoftwareAead {
    key_generator: OperationFactory<AeadKeyParameters, KeyGenerator<Arc<dyn AeadKey>>>,
    decoder: AeadKeyDecoder,
}

impl SoftwareAead {
    pub fn new(variant: AeadVariant, state: &Arc<ProviderState>) -> Self {
        let generator_state = Arc::clone(state);
        let key_generator = OperationFactory::new(
            AeadKeyParameters::default(),
            move |parameters: &AeadKeyParameters| {
                let key_bytes = parameters.key_size() / 8;
                variant.check_key_size(key_bytes)?;
                let core = AeadKeyGen {
                    variant,
                    key_bytes,
                    state: Arc::clone(&generator_state),
                };
                Ok(operation(
                    Arc::new(core) as Arc<dyn KeyGenOp<Arc<dyn AeadKey>>>,
                    &generator_state,
                ))
            },
        );
        Self {
            key_generator,
            decoder: AeadKeyDecoder {
                variant,
                state: Arc::clone(state),
            },
        }
    }
}

impl AeadAlgorithm for SoftwareAead {
    fn key_generator(&self) -> &OperationFactory<AeadKeyParameters, KeyGenerator<Arc<dyn AeadKey>>> {
        &self.key_generator
    }

    fn key_decoder(&self) -> &dyn KeyDecoder<Arc<dyn AeadKey>> {
        &self.decoder
    }
}

struct AeadKeyGen {
    variant: AeadVariant,
    key_bytes: usize,
    state: Arc<ProviderState>,
}

impl KeyGenOp<Arc<dyn AeadKey>> for AeadKeyGen {
    fn generate(&self) -> Result<Arc<dyn AeadKey>> {
        let key = Zeroizing::new(self.state.random().bytes(self.key_bytes)?);
        Ok(Arc::new(SoftwareAeadKey::new(self.variant, key, &self.state)))
    }
}

struct AeadKeyDecoder {
    variant: AeadVariant,
    state: Arc<ProviderState>,
}

impl KeyDecoder<Arc<dyn AeadKey>> for AeadKeyDecoder {
    fn decode(&self, format: KeyFormat, bytes: &[u8]) -> Result<Arc<dyn AeadKey>> {
        if format != KeyFormat::Raw {
            return Err(unsupported_format(format));
        }
        if !self.variant.key_sizes().contains(&bytes.len()) {
            return Err(Error::InvalidInput(format!(
                "Invalid {} key length: {} bytes",
                self.variant.id(),
                bytes.len()
            )));
        }
        let key = Zeroizing::new(bytes.to_vec());
        Ok(Arc::new(SoftwareAeadKey::new(self.variant, key, &self.state)))
    }
}

struct SoftwareAeadKey {
    variant: AeadVariant,
    key: Arc<Zeroizing<Vec<u8>>>,
    cipher: OperationFactory<AeadParameters, Cipher>,
}

impl SoftwareAeadKey {
    fn new(variant: AeadVariant, key: Zeroizing<Vec<u8>>, state: &Arc<ProviderState>) -> Self {
        let key = Arc::new(key);
        let cipher_key = Arc::clone(&key);
        let cipher_state = Arc::clone(state);
        let cipher = OperationFactory::new(
            AeadParameters::default(),
            move |parameters: &AeadParameters| {
                let tag_size = parameters.tag_size();
                let core = SoftwareCipher {
                    engine: variant.engine(&cipher_key, tag_size)?,
                    nonce_size: variant.nonce_size(),
                    tag_size,
                    random: cipher_state.random(),
                };
                Ok(operation(Arc::new(core) as Arc<dyn CipherOp>, &cipher_state))
            },
        );
        Self {
            variant,
            key,
            cipher,
        }
    }
}

impl EncodableKey for SoftwareAeadKey {
    fn encode(&self, format: KeyFormat) -> Result<Vec<u8>> {
        match format {
            KeyFormat::Raw => Ok(self.key.to_vec()),
            other => Err(unsupported_format(other)),
        }
    }
}

impl AeadKey for SoftwareAeadKey {
    fn key_size(&self) -> usize {
        self.key.len() * 8
    }

    fn cipher(&self) -> &OperationFactory<AeadParameters, Cipher> {
        &self.cipher
    }
}

impl fmt::Debug for SoftwareAeadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AeadKey({}, [REDACTED])", self.variant.id())
    }
}

#[derive(Clone)]
struct SoftwareCipher {
    engine: Arc<dyn AeadEngine>,
    nonce_size: usize,
    tag_size: usize,
    random: SecureRandom,
}

impl SoftwareCipher {
    fn nonce(&self, nonce: Option<&[u8]>) -> Result<Vec<u8>> {
        match nonce {
            Some(nonce) if nonce.len() != self.nonce_size => Err(Error::InvalidInput(format!(
                "Nonce must be {} bytes, got {}",
                self.nonce_size,
                nonce.len()
            ))),
            Some(nonce) => Ok(nonce.to_vec()),
            None => self.random.bytes(self.nonce_size),
        }
    }
}

impl CipherLayout for SoftwareCipher {
    fn nonce_size(&self) -> usize {
        self.nonce_size
    }

    fn tag_size(&self) -> usize {
        self.tag_size
    }
}

impl EncryptOp for SoftwareCipher {
    fn encrypt_box(
        &self,
        plaintext: &[u8],
        nonce: Option<&[u8]>,
        associated_data: &[u8],
    ) -> Result<CipherBox> {
        let nonce = self.nonce(nonce)?;
        let mut buffer = plaintext.to_vec();
        let tag = self.engine.seal(&nonce, associated_data, &mut buffer)?;
        Ok(CipherBox::new(nonce, buffer, tag))
    }

    fn encrypt_function(
        &self,
        nonce: Option<&[u8]>,
        associated_data: &[u8],
    ) -> Result<CipherFunction> {
        let nonce = self.nonce(nonce)?;
        Ok(StreamingFunction::new(Box::new(BufferedCipher {
            cipher: self.clone(),
            direction: Direction::Encrypt { nonce },
            associated_data: associated_data.to_vec(),
            buffer: Zeroizing::new(Vec::new()),
        })))
    }
}

impl DecryptOp for SoftwareCipher {
    fn decrypt_box(&self, cipher_box: &CipherBox, associated_data: &[u8]) -> Result<Vec<u8>> {
        if cipher_box.nonce.len() != self.nonce_size || cipher_box.tag.len() != self.tag_size {
            return Err(Error::crypto_because("malformed cipher box"));
        }
        let mut buffer = Zeroizing::new(cipher_box.ciphertext.clone());
        self.engine.open(
            &cipher_box.nonce,
            associated_data,
            &mut buffer,
            &cipher_box.tag,
        )?;
        Ok(std::mem::take(&mut *buffer))
    }

    fn decrypt_function(&self, associated_data: &[u8]) -> Result<CipherFunction> {
        Ok(StreamingFunction::new(Box::new(BufferedCipher {
            cipher: self.clone(),
            direction: Direction::Decrypt,
            associated_data: associated_data.to_vec(),
            buffer: Zeroizing::new(Vec::new()),
        })))
    }
}

enum Direction {
    Encrypt { nonce: Vec<u8> },
    Decrypt,
}

struct BufferedCipher {
    cipher: SoftwareCipher,
    direction: Direction,
    associated_data: Vec<u8>,
    buffer: Zeroizing<Vec<u8>>,
}

impl FunctionCore for BufferedCipher {
    type Chunk = Vec<u8>;
    type Output = Vec<u8>;

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.buffer.extend_from_slice(input);
        Ok(Vec::new())
    }

    fn finish(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.buffer.extend_from_slice(input);
        match &self.direction {
            Direction::Encrypt { nonce } => Ok(self
                .cipher
                .encrypt_box(&self.buffer, Some(nonce.as_slice()), &self.associated_data)?
                .to_flat()),
            Direction::Decrypt => {
                let cipher_box = CipherBox::from_flat(
                    &self.buffer,
                    self.cipher.nonce_size,
                    self.cipher.tag_size,
                )?;
                self.cipher.decrypt_box(&cipher_box, &self.associated_data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptofacade_crypto::Parameters;

    fn aes_key(key: &[u8]) -> Arc<dyn AeadKey> {
        let state = Arc::new(ProviderState::default());
        SoftwareAead::new(AeadVariant::AesGcm, &state)
            .key_decoder()
            .decode(KeyFormat::Raw, key)
            .unwrap()
    }

    #[test]
    fn test_aes_gcm_known_answers() {
        let cipher = aes_key(&[0u8; 16]).cipher().create().unwrap();
        let nonce = [0u8; 12];

        let empty = cipher.encrypt_with_nonce(b"", &nonce, None).unwrap();
        assert_eq!(hex::encode(&empty[12..]), "58e2fccefa7e3061367f1d57a4e7455a");

        let block = cipher.encrypt_with_nonce(&[0u8; 16], &nonce, None).unwrap();
        assert_eq!(hex::encode(&block[12..28]), "0388dace60b6a392f328c2b971b2fe78");
        assert_eq!(hex::encode(&block[28..]), "ab6e47d42cec13bdf53a67b21257bddf");
    }

    #[test]
    fn test_short_tags_roundtrip() {
        let key = aes_key(&[7u8; 32]);
        for tag_size in 12..=16 {
            let mut builder = AeadParameters::default().to_builder();
            builder.tag_size(tag_size);
            let parameters = AeadParameters::from_builder(builder).unwrap();
            let cipher = key.cipher().create_with(&parameters).unwrap();

            let flat = cipher.encrypt(b"short tags", None).unwrap();
            assert_eq!(flat.len(), 12 + 10 + tag_size);
            assert_eq!(cipher.decrypt(&flat, None).unwrap(), b"short tags");
        }
    }

    #[test]
    fn test_chacha_rejects_short_tag() {
        let state = Arc::new(ProviderState::default());
        let key = SoftwareAead::new(AeadVariant::ChaCha20Poly1305, &state)
            .key_decoder()
            .decode(KeyFormat::Raw, &[1u8; 32])
            .unwrap();
        let result = key.cipher().configure(|b| {
            b.tag_size(12);
        });
        assert!(matches!(result, Err(Error::OperationNotSupported(_))));
    }

    #[test]
    fn test_xchacha_uses_long_nonce() {
        let state = Arc::new(ProviderState::default());
        let algorithm = SoftwareAead::new(AeadVariant::XChaCha20Poly1305, &state);
        let key = algorithm.key_generator().create().unwrap().generate().unwrap();
        let cipher = key.cipher().create().unwrap();

        assert_eq!(cipher.nonce_size(), 24);
        let flat = cipher.encrypt(b"x", Some(b"ad")).unwrap();
        assert_eq!(flat.len(), 24 + 1 + 16);
        assert_eq!(cipher.decrypt(&flat, Some(b"ad")).unwrap(), b"x");
    }

    #[test]
    fn test_key_size_checks() {
        let state = Arc::new(ProviderState::default());
        let aes = SoftwareAead::new(AeadVariant::AesGcm, &state);
        let key = aes
            .key_generator()
            .configure(|b| {
                b.key_size(128);
            })
            .unwrap()
            .generate()
            .unwrap();
        assert_eq!(key.key_size(), 128);

        let result = aes.key_generator().configure(|b| {
            b.key_size(512);
        });
        assert!(matches!(result, Err(Error::OperationNotSupported(_))));
        assert!(matches!(
            aes.key_decoder().decode(KeyFormat::Raw, &[0u8; 20]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            aes.key_decoder().decode(KeyFormat::Pem, &[0u8; 16]),
            Err(Error::OperationNotSupported(_))
        ));
    }

    #[test]
    fn test_wrong_nonce_length_rejected() {
        let cipher = aes_key(&[0u8; 16]).cipher().create().unwrap();
        let result = cipher.encrypt_with_nonce(b"", &[0u8; 8], None);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_tampered_box_fails_opaquely() {
        let cipher = aes_key(&[3u8; 16]).cipher().create().unwrap();
        let mut cipher_box = cipher.encrypt_box(b"attack at dawn", None).unwrap();
        cipher_box.ciphertext[0] ^= 1;
        assert!(cipher.decrypt_box(&cipher_box, None).unwrap_err().is_crypto());

        cipher_box.ciphertext[0] ^= 1;
        cipher_box.tag.pop();
        assert!(cipher.decrypt_box(&cipher_box, None).unwrap_err().is_crypto());
    }
}
