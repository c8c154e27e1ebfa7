//! Operation parameters.
//!
//! Parameters are immutable values. A factory's defaults are never changed in
//! place: overriding a field goes through the type's builder and produces a
//! new value.

use serde::{Deserialize, Serialize};
use std::fmt;

use cryptofacade_common::{AlgorithmId, Error, Result};

use crate::algorithms::DigestAlgorithm;
use crate::ids;

/// Immutable configuration for constructing an operation.
pub trait Parameters: Clone + fmt::Debug + Send + Sync + 'static {
    /// Mutable companion used for copy-with-override.
    type Builder;

    /// Copy this value into a fresh builder.
    fn to_builder(&self) -> Self::Builder;

    /// Validate a builder and freeze it into a value.
    ///
    /// # Errors
    /// - `InvalidInput` if the builder holds an invalid combination
    fn from_builder(builder: Self::Builder) -> Result<Self>;
}

/// Parameters of operations that take no configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Empty;

impl Parameters for Empty {
    type Builder = Empty;

    fn to_builder(&self) -> Empty {
        Empty
    }

    fn from_builder(builder: Empty) -> Result<Self> {
        Ok(builder)
    }
}

/// Default AEAD authentication tag length in bytes.
pub const DEFAULT_TAG_SIZE: usize = 16;

/// Shortest AEAD tag accepted, in bytes.
pub const MIN_TAG_SIZE: usize = 12;

/// Parameters of an AEAD cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AeadParameters {
    tag_size: usize,
}

impl AeadParameters {
    /// Authentication tag length in bytes.
    pub fn tag_size(&self) -> usize {
        self.tag_size
    }
}

impl Default for AeadParameters {
    fn default() -> Self {
        Self {
            tag_size: DEFAULT_TAG_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AeadParametersBuilder {
    tag_size: usize,
}

impl AeadParametersBuilder {
    pub fn tag_size(&mut self, bytes: usize) -> &mut Self {
        self.tag_size = bytes;
        self
    }
}

impl Parameters for AeadParameters {
    type Builder = AeadParametersBuilder;

    fn to_builder(&self) -> AeadParametersBuilder {
        AeadParametersBuilder {
            tag_size: self.tag_size,
        }
    }

    fn from_builder(builder: AeadParametersBuilder) -> Result<Self> {
        if !(MIN_TAG_SIZE..=DEFAULT_TAG_SIZE).contains(&builder.tag_size) {
            return Err(Error::InvalidInput(format!(
                "Tag size must be between {} and {} bytes, got {}",
                MIN_TAG_SIZE, DEFAULT_TAG_SIZE, builder.tag_size
            )));
        }
        Ok(Self {
            tag_size: builder.tag_size,
        })
    }
}

/// Parameters for generating a symmetric AEAD key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AeadKeyParameters {
    key_size: usize,
}

impl AeadKeyParameters {
    /// Key length in bits.
    pub fn key_size(&self) -> usize {
        self.key_size
    }
}

impl Default for AeadKeyParameters {
    fn default() -> Self {
        Self { key_size: 256 }
    }
}

#[derive(Debug, Clone)]
pub struct AeadKeyParametersBuilder {
    key_size: usize,
}

impl AeadKeyParametersBuilder {
    /// Key length in bits.
    pub fn key_size(&mut self, bits: usize) -> &mut Self {
        self.key_size = bits;
        self
    }
}

impl Parameters for AeadKeyParameters {
    type Builder = AeadKeyParametersBuilder;

    fn to_builder(&self) -> AeadKeyParametersBuilder {
        AeadKeyParametersBuilder {
            key_size: self.key_size,
        }
    }

    fn from_builder(builder: AeadKeyParametersBuilder) -> Result<Self> {
        if builder.key_size == 0 || builder.key_size % 8 != 0 {
            return Err(Error::InvalidInput(format!(
                "Key size must be a positive multiple of 8 bits, got {}",
                builder.key_size
            )));
        }
        Ok(Self {
            key_size: builder.key_size,
        })
    }
}

/// Parameters for generating an HMAC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HmacKeyParameters {
    digest: AlgorithmId<dyn DigestAlgorithm>,
    key_size: Option<usize>,
}

impl HmacKeyParameters {
    /// Underlying hash function.
    pub fn digest(&self) -> AlgorithmId<dyn DigestAlgorithm> {
        self.digest
    }

    /// Key length in bits; `None` means the digest's block size.
    pub fn key_size(&self) -> Option<usize> {
        self.key_size
    }
}

impl Default for HmacKeyParameters {
    fn default() -> Self {
        Self {
            digest: ids::SHA256,
            key_size: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HmacKeyParametersBuilder {
    digest: AlgorithmId<dyn DigestAlgorithm>,
    key_size: Option<usize>,
}

impl HmacKeyParametersBuilder {
    pub fn digest(&mut self, digest: AlgorithmId<dyn DigestAlgorithm>) -> &mut Self {
        self.digest = digest;
        self
    }

    pub fn key_size(&mut self, bits: usize) -> &mut Self {
        self.key_size = Some(bits);
        self
    }
}

impl Parameters for HmacKeyParameters {
    type Builder = HmacKeyParametersBuilder;

    fn to_builder(&self) -> HmacKeyParametersBuilder {
        HmacKeyParametersBuilder {
            digest: self.digest,
            key_size: self.key_size,
        }
    }

    fn from_builder(builder: HmacKeyParametersBuilder) -> Result<Self> {
        if let Some(bits) = builder.key_size {
            if bits == 0 || bits % 8 != 0 {
                return Err(Error::InvalidInput(format!(
                    "Key size must be a positive multiple of 8 bits, got {}",
                    bits
                )));
            }
        }
        Ok(Self {
            digest: builder.digest,
            key_size: builder.key_size,
        })
    }
}

/// Named elliptic curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl EcCurve {
    pub fn name(&self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
            EcCurve::P521 => "P-521",
        }
    }

    /// Field element length in bytes.
    pub fn field_size(&self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters for generating an elliptic-curve key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcKeyParameters {
    curve: EcCurve,
}

impl EcKeyParameters {
    pub fn curve(&self) -> EcCurve {
        self.curve
    }
}

impl Default for EcKeyParameters {
    fn default() -> Self {
        Self {
            curve: EcCurve::P256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EcKeyParametersBuilder {
    curve: EcCurve,
}

impl EcKeyParametersBuilder {
    pub fn curve(&mut self, curve: EcCurve) -> &mut Self {
        self.curve = curve;
        self
    }
}

impl Parameters for EcKeyParameters {
    type Builder = EcKeyParametersBuilder;

    fn to_builder(&self) -> EcKeyParametersBuilder {
        EcKeyParametersBuilder { curve: self.curve }
    }

    fn from_builder(builder: EcKeyParametersBuilder) -> Result<Self> {
        Ok(Self {
            curve: builder.curve,
        })
    }
}

/// Encoding of an ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureFormat {
    /// Fixed-width `r || s`.
    Raw,
    /// ASN.1 DER `SEQUENCE { r, s }`.
    Der,
}

/// Parameters of an ECDSA signer or verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaParameters {
    digest: AlgorithmId<dyn DigestAlgorithm>,
    format: SignatureFormat,
}

impl EcdsaParameters {
    /// Hash applied to the message before signing.
    pub fn digest(&self) -> AlgorithmId<dyn DigestAlgorithm> {
        self.digest
    }

    pub fn format(&self) -> SignatureFormat {
        self.format
    }
}

impl Default for EcdsaParameters {
    fn default() -> Self {
        Self {
            digest: ids::SHA256,
            format: SignatureFormat::Der,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EcdsaParametersBuilder {
    digest: AlgorithmId<dyn DigestAlgorithm>,
    format: SignatureFormat,
}

impl EcdsaParametersBuilder {
    pub fn digest(&mut self, digest: AlgorithmId<dyn DigestAlgorithm>) -> &mut Self {
        self.digest = digest;
        self
    }

    pub fn format(&mut self, format: SignatureFormat) -> &mut Self {
        self.format = format;
        self
    }
}

impl Parameters for EcdsaParameters {
    type Builder = EcdsaParametersBuilder;

    fn to_builder(&self) -> EcdsaParametersBuilder {
        EcdsaParametersBuilder {
            digest: self.digest,
            format: self.format,
        }
    }

    fn from_builder(builder: EcdsaParametersBuilder) -> Result<Self> {
        Ok(Self {
            digest: builder.digest,
            format: builder.format,
        })
    }
}
