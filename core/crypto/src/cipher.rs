//! Authenticated cipher contracts.
//!
//! Ciphertext comes in two lossless forms:
//! - flat: `nonce || ciphertext || tag`
//! - boxed: a [`CipherBox`] with the three parts kept apart
//!
//! Associated data is optional on every call. `None` and `Some(&[])` are the
//! same input.

use zeroize::Zeroizing;

use cryptofacade_common::{Error, Result};

use crate::function::CipherFunction;
use crate::operation::Operation;

/// Fixed framing of a cipher's output.
pub trait CipherLayout: Send + Sync {
    /// Nonce length in bytes.
    fn nonce_size(&self) -> usize;

    /// Authentication tag length in bytes.
    fn tag_size(&self) -> usize;
}

/// Encrypting side of an AEAD cipher.
pub trait EncryptOp: CipherLayout {
    /// Exact flat output length for `plaintext_size` input bytes.
    fn ciphertext_size(&self, plaintext_size: usize) -> usize {
        self.nonce_size() + plaintext_size + self.tag_size()
    }

    /// Encrypt in one call.
    ///
    /// A fresh random nonce is drawn when `nonce` is `None`.
    ///
    /// # Errors
    /// - `InvalidInput` if `nonce` has the wrong length
    /// - `RandomSource` if no nonce could be drawn
    fn encrypt_box(
        &self,
        plaintext: &[u8],
        nonce: Option<&[u8]>,
        associated_data: &[u8],
    ) -> Result<CipherBox>;

    /// Start an incremental encryption producing flat output.
    fn encrypt_function(
        &self,
        nonce: Option<&[u8]>,
        associated_data: &[u8],
    ) -> Result<CipherFunction>;
}

/// Decrypting side of an AEAD cipher.
pub trait DecryptOp: CipherLayout {
    /// Exact plaintext length for a flat input of `ciphertext_size` bytes.
    ///
    /// # Errors
    /// - `InvalidInput` if the input cannot hold a nonce and a tag
    fn plaintext_size(&self, ciphertext_size: usize) -> Result<usize> {
        let overhead = self.nonce_size() + self.tag_size();
        ciphertext_size.checked_sub(overhead).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Ciphertext of {} bytes is shorter than the {} byte overhead",
                ciphertext_size, overhead
            ))
        })
    }

    /// Authenticate and decrypt in one call.
    ///
    /// # Errors
    /// - `Crypto` on any authentication failure
    fn decrypt_box(&self, cipher_box: &CipherBox, associated_data: &[u8]) -> Result<Vec<u8>>;

    /// Start an incremental decryption of flat input.
    ///
    /// No plaintext is released before the tag has been checked.
    fn decrypt_function(&self, associated_data: &[u8]) -> Result<CipherFunction>;
}

/// Both directions of one keyed cipher.
pub trait CipherOp: EncryptOp + DecryptOp {}

impl<T: EncryptOp + DecryptOp + ?Sized> CipherOp for T {}

/// Structured AEAD output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherBox {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

impl CipherBox {
    pub fn new(nonce: Vec<u8>, ciphertext: Vec<u8>, tag: Vec<u8>) -> Self {
        Self {
            nonce,
            ciphertext,
            tag,
        }
    }

    /// Length of the flat form.
    pub fn flat_len(&self) -> usize {
        self.nonce.len() + self.ciphertext.len() + self.tag.len()
    }

    /// Concatenate into `nonce || ciphertext || tag`.
    pub fn to_flat(&self) -> Vec<u8> {
        let mut flat = Vec::with_capacity(self.flat_len());
        flat.extend_from_slice(&self.nonce);
        flat.extend_from_slice(&self.ciphertext);
        flat.extend_from_slice(&self.tag);
        flat
    }

    /// Split a flat buffer.
    ///
    /// # Errors
    /// - `Crypto` if `flat` is too short to hold a nonce and a tag
    pub fn from_flat(flat: &[u8], nonce_size: usize, tag_size: usize) -> Result<Self> {
        if flat.len() < nonce_size + tag_size {
            return Err(Error::crypto_because("ciphertext shorter than nonce and tag"));
        }
        let (nonce, rest) = flat.split_at(nonce_size);
        let (ciphertext, tag) = rest.split_at(rest.len() - tag_size);
        Ok(Self::new(nonce.to_vec(), ciphertext.to_vec(), tag.to_vec()))
    }
}

/// Keyed AEAD cipher handle.
pub type Cipher = Operation<dyn CipherOp>;

impl Operation<dyn CipherOp> {
    pub fn nonce_size(&self) -> usize {
        self.core().nonce_size()
    }

    pub fn tag_size(&self) -> usize {
        self.core().tag_size()
    }

    pub fn ciphertext_size(&self, plaintext_size: usize) -> usize {
        self.core().ciphertext_size(plaintext_size)
    }

    pub fn plaintext_size(&self, ciphertext_size: usize) -> Result<usize> {
        self.core().plaintext_size(ciphertext_size)
    }

    /// Encrypt under a fresh random nonce, returning the flat form.
    pub fn encrypt(&self, plaintext: &[u8], associated_data: Option<&[u8]>) -> Result<Vec<u8>> {
        Ok(self.encrypt_box(plaintext, associated_data)?.to_flat())
    }

    /// Encrypt under a caller-chosen nonce. The caller guarantees the nonce is
    /// never reused with this key.
    pub fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        Ok(self
            .core()
            .encrypt_box(plaintext, Some(nonce), associated_data.unwrap_or_default())?
            .to_flat())
    }

    pub fn encrypt_box(&self, plaintext: &[u8], associated_data: Option<&[u8]>) -> Result<CipherBox> {
        self.core()
            .encrypt_box(plaintext, None, associated_data.unwrap_or_default())
    }

    /// Decrypt the flat form.
    pub fn decrypt(&self, ciphertext: &[u8], associated_data: Option<&[u8]>) -> Result<Vec<u8>> {
        let cipher_box = CipherBox::from_flat(ciphertext, self.nonce_size(), self.tag_size())?;
        self.decrypt_box(&cipher_box, associated_data)
    }

    pub fn decrypt_box(
        &self,
        cipher_box: &CipherBox,
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        self.core()
            .decrypt_box(cipher_box, associated_data.unwrap_or_default())
    }

    pub async fn encrypt_async(
        &self,
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        Ok(self.encrypt_box_async(plaintext, associated_data).await?.to_flat())
    }

    pub async fn encrypt_box_async(
        &self,
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<CipherBox> {
        let plaintext = Zeroizing::new(plaintext.to_vec());
        let associated_data = associated_data.unwrap_or_default().to_vec();
        self.offload(move |core| core.encrypt_box(&plaintext, None, &associated_data))
            .await
    }

    pub async fn decrypt_async(
        &self,
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let cipher_box = CipherBox::from_flat(ciphertext, self.nonce_size(), self.tag_size())?;
        self.decrypt_box_async(cipher_box, associated_data).await
    }

    pub async fn decrypt_box_async(
        &self,
        cipher_box: CipherBox,
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let associated_data = associated_data.unwrap_or_default().to_vec();
        self.offload(move |core| core.decrypt_box(&cipher_box, &associated_data))
            .await
    }

    /// Incremental encryption under a fresh random nonce.
    pub fn encrypt_function(&self, associated_data: Option<&[u8]>) -> Result<CipherFunction> {
        self.core()
            .encrypt_function(None, associated_data.unwrap_or_default())
    }

    pub fn encrypt_function_with_nonce(
        &self,
        nonce: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<CipherFunction> {
        self.core()
            .encrypt_function(Some(nonce), associated_data.unwrap_or_default())
    }

    /// Incremental decryption of the flat form.
    pub fn decrypt_function(&self, associated_data: Option<&[u8]>) -> Result<CipherFunction> {
        self.core()
            .decrypt_function(associated_data.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionCore, StreamingFunction};
    use cryptofacade_runtime::Executor;
    use std::sync::Arc;

    /// XOR "cipher" with a checksum tag. Enough to exercise the handle plumbing.
    struct XorCipher;

    const KEY: u8 = 0x5a;

    fn checksum(nonce: &[u8], ciphertext: &[u8], ad: &[u8]) -> Vec<u8> {
        let sum = nonce
            .iter()
            .chain(ciphertext)
            .chain(ad)
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        vec![sum, !sum]
    }

    impl CipherLayout for XorCipher {
        fn nonce_size(&self) -> usize {
            3
        }

        fn tag_size(&self) -> usize {
            2
        }
    }

    impl EncryptOp for XorCipher {
        fn encrypt_box(&self, plaintext: &[u8], nonce: Option<&[u8]>, ad: &[u8]) -> Result<CipherBox> {
            let nonce = nonce.unwrap_or(&[1, 2, 3]).to_vec();
            let ciphertext: Vec<u8> = plaintext.iter().map(|b| b ^ KEY).collect();
            let tag = checksum(&nonce, &ciphertext, ad);
            Ok(CipherBox::new(nonce, ciphertext, tag))
        }

        fn encrypt_function(&self, nonce: Option<&[u8]>, ad: &[u8]) -> Result<CipherFunction> {
            Ok(StreamingFunction::new(Box::new(Buffered {
                encrypt: true,
                nonce: nonce.map(<[u8]>::to_vec),
                ad: ad.to_vec(),
                buffer: Vec::new(),
            })))
        }
    }

    impl DecryptOp for XorCipher {
        fn decrypt_box(&self, cipher_box: &CipherBox, ad: &[u8]) -> Result<Vec<u8>> {
            if checksum(&cipher_box.nonce, &cipher_box.ciphertext, ad) != cipher_box.tag {
                return Err(Error::crypto_because("tag mismatch"));
            }
            Ok(cipher_box.ciphertext.iter().map(|b| b ^ KEY).collect())
        }

        fn decrypt_function(&self, ad: &[u8]) -> Result<CipherFunction> {
            Ok(StreamingFunction::new(Box::new(Buffered {
                encrypt: false,
                nonce: None,
                ad: ad.to_vec(),
                buffer: Vec::new(),
            })))
        }
    }

    struct Buffered {
        encrypt: bool,
        nonce: Option<Vec<u8>>,
        ad: Vec<u8>,
        buffer: Vec<u8>,
    }

    impl FunctionCore for Buffered {
        type Chunk = Vec<u8>;
        type Output = Vec<u8>;

        fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
            self.buffer.extend_from_slice(input);
            Ok(Vec::new())
        }

        fn finish(&mut self, input: &[u8]) -> Result<Vec<u8>> {
            self.buffer.extend_from_slice(input);
            if self.encrypt {
                let nonce = self.nonce.as_deref();
                Ok(XorCipher.encrypt_box(&self.buffer, nonce, &self.ad)?.to_flat())
            } else {
                let cipher_box = CipherBox::from_flat(&self.buffer, 3, 2)?;
                XorCipher.decrypt_box(&cipher_box, &self.ad)
            }
        }
    }

    fn cipher() -> Cipher {
        Operation::new(Arc::new(XorCipher) as Arc<dyn CipherOp>, Executor::inline())
    }

    #[test]
    fn test_flat_and_box_forms_agree() {
        let cipher = cipher();
        let cipher_box = cipher.encrypt_box(b"hello", None).unwrap();
        let flat = cipher.encrypt(b"hello", None).unwrap();

        assert_eq!(flat, cipher_box.to_flat());
        assert_eq!(CipherBox::from_flat(&flat, 3, 2).unwrap(), cipher_box);
        assert_eq!(flat.len(), cipher.ciphertext_size(5));
        assert_eq!(cipher.plaintext_size(flat.len()).unwrap(), 5);
    }

    #[test]
    fn test_absent_associated_data_equals_empty() {
        let cipher = cipher();
        let absent = cipher.encrypt(b"data", None).unwrap();
        let empty = cipher.encrypt(b"data", Some(&[])).unwrap();
        assert_eq!(absent, empty);
        assert_eq!(cipher.decrypt(&absent, Some(&[])).unwrap(), b"data");
    }

    #[test]
    fn test_wrong_associated_data_fails() {
        let cipher = cipher();
        let flat = cipher.encrypt(b"data", Some(b"header")).unwrap();
        let err = cipher.decrypt(&flat, Some(b"other")).unwrap_err();
        assert!(err.is_crypto());
    }

    #[test]
    fn test_short_input_is_opaque_failure() {
        let cipher = cipher();
        assert!(cipher.decrypt(&[0; 4], None).unwrap_err().is_crypto());
        assert!(matches!(
            cipher.plaintext_size(4),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_box_from_flat_boundaries() {
        let cipher_box = CipherBox::from_flat(&[1, 2, 3, 4, 5], 3, 2).unwrap();
        assert!(cipher_box.ciphertext.is_empty());
        assert_eq!(cipher_box.tag, vec![4, 5]);
        assert_eq!(cipher_box.flat_len(), 5);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let cipher = cipher();
        let one_shot = cipher.encrypt_with_nonce(b"abcdef", &[7, 7, 7], None).unwrap();

        let mut function = cipher.encrypt_function_with_nonce(&[7, 7, 7], None).unwrap();
        let mut streamed = function.update(b"ab").unwrap();
        streamed.extend(function.update(b"cd").unwrap());
        streamed.extend(function.finish(b"ef").unwrap());
        function.close();
        assert_eq!(streamed, one_shot);

        let plaintext = cipher
            .decrypt_function(None)
            .unwrap()
            .run(|f| {
                f.update(&one_shot[..4])?;
                f.finish(&one_shot[4..])
            })
            .unwrap();
        assert_eq!(plaintext, b"abcdef");
    }

    #[tokio::test]
    async fn test_async_matches_blocking() {
        let cipher = cipher();
        let blocking = cipher.encrypt(b"payload", Some(b"ad")).unwrap();
        let asynchronous = cipher.encrypt_async(b"payload", Some(b"ad")).await.unwrap();
        assert_eq!(blocking, asynchronous);

        let plaintext = cipher.decrypt_async(&asynchronous, Some(b"ad")).await.unwrap();
        assert_eq!(plaintext, b"payload");
    }
}
