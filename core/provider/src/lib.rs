//! Providers for CryptoFacade.
//!
//! A [`Provider`] resolves algorithm identifiers to algorithm instances for
//! one backend and memoizes them. Providers are built by named factories held
//! in a [`ProviderRegistry`], tried in registration order.
//!
//! The `software` backend wraps the RustCrypto engines and is always
//! available.

pub mod provider;
pub mod registry;
pub mod software;

pub use provider::{AlgorithmTable, Provider};
pub use registry::{create_default_registry, default_provider, ProviderFactory, ProviderRegistry};
