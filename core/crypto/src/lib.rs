//! Operation contracts for CryptoFacade.
//!
//! This crate defines what a backend has to provide and what callers get back:
//! - Typed algorithm families and their identifiers
//! - Immutable operation parameters with copy-with-override builders
//! - Operation factories binding defaults to a backend constructor
//! - Operation handles exposing blocking, asynchronous and streaming calls
//!
//! It contains no cryptography of its own. Backends live in
//! `cryptofacade-provider`.
//!
//! # Security Guarantees
//! - Plaintext copied for asynchronous calls is zeroized after use
//! - No plaintext, key material or nonce is ever logged

pub mod algorithms;
pub mod cipher;
pub mod digest;
pub mod factory;
pub mod function;
pub mod ids;
pub mod keys;
pub mod operation;
pub mod params;
pub mod signature;

pub use algorithms::{
    AeadAlgorithm, AeadKey, DigestAlgorithm, EcdhAlgorithm, EcdhKeyPair, EcdhPrivateKey,
    EcdhPublicKey, EcdsaAlgorithm, EcdsaKeyPair, EcdsaPrivateKey, EcdsaPublicKey, HmacAlgorithm,
    HmacKey,
};
pub use cipher::{Cipher, CipherBox, CipherLayout, CipherOp, DecryptOp, EncryptOp};
pub use digest::{HashOp, Hasher};
pub use factory::OperationFactory;
pub use function::{
    CipherFunction, FunctionCore, FunctionState, HashFunction, SignFunction, StreamingFunction,
    VerifyFunction,
};
pub use keys::{EncodableKey, KeyAgreement, KeyAgreementOp, KeyDecoder, KeyGenOp, KeyGenerator};
pub use operation::Operation;
pub use params::{
    AeadKeyParameters, AeadParameters, EcCurve, EcKeyParameters, EcdsaParameters, Empty,
    HmacKeyParameters, Parameters, SignatureFormat,
};
pub use signature::{SignOp, Signer, Verifier, VerifyOp};
