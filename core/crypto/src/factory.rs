//! Operation factories.

use std::fmt;
use std::sync::Arc;

use cryptofacade_common::Result;

use crate::params::Parameters;

type Construct<P, O> = dyn Fn(&P) -> Result<O> + Send + Sync;

/// Binds default parameters to a backend constructor.
///
/// Invoking a factory is cheap: backends do no I/O here and defer any pooled
/// handle checkout to the first call on the returned operation.
pub struct OperationFactory<P: Parameters, O> {
    defaults: P,
    construct: Arc<Construct<P, O>>,
}

impl<P: Parameters, O> OperationFactory<P, O> {
    pub fn new(defaults: P, construct: impl Fn(&P) -> Result<O> + Send + Sync + 'static) -> Self {
        Self {
            defaults,
            construct: Arc::new(construct),
        }
    }

    /// Parameters used by [`create`](Self::create).
    pub fn defaults(&self) -> &P {
        &self.defaults
    }

    /// Construct an operation with the default parameters.
    pub fn create(&self) -> Result<O> {
        (self.construct)(&self.defaults)
    }

    /// Construct an operation with explicit parameters.
    ///
    /// # Errors
    /// - `OperationNotSupported` if the backend cannot honour `parameters`
    pub fn create_with(&self, parameters: &P) -> Result<O> {
        (self.construct)(parameters)
    }

    /// Copy the defaults into a builder, let `block` override fields, and
    /// construct an operation from the result.
    ///
    /// The defaults themselves are left untouched.
    ///
    /// # Errors
    /// - `InvalidInput` if the overridden parameters fail validation
    /// - `OperationNotSupported` if the backend cannot honour them
    pub fn configure(&self, block: impl FnOnce(&mut P::Builder)) -> Result<O> {
        let mut builder = self.defaults.to_builder();
        block(&mut builder);
        let parameters = P::from_builder(builder)?;
        self.create_with(&parameters)
    }

    /// Same constructor, different defaults.
    pub fn with_defaults(&self, defaults: P) -> Self {
        Self {
            defaults,
            construct: Arc::clone(&self.construct),
        }
    }
}

impl<P: Parameters, O> Clone for OperationFactory<P, O> {
    fn clone(&self) -> Self {
        Self {
            defaults: self.defaults.clone(),
            construct: Arc::clone(&self.construct),
        }
    }
}

impl<P: Parameters, O> fmt::Debug for OperationFactory<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationFactory")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{AeadParameters, Empty};
    use cryptofacade_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tag_echo() -> OperationFactory<AeadParameters, usize> {
        OperationFactory::new(AeadParameters::default(), |p: &AeadParameters| {
            Ok(p.tag_size())
        })
    }

    #[test]
    fn test_create_uses_defaults() {
        assert_eq!(tag_echo().create().unwrap(), 16);
    }

    #[test]
    fn test_configure_overrides_without_mutating_defaults() {
        let factory = tag_echo();
        let configured = factory
            .configure(|b| {
                b.tag_size(13);
            })
            .unwrap();

        assert_eq!(configured, 13);
        assert_eq!(factory.defaults().tag_size(), 16);
        assert_eq!(factory.create().unwrap(), 16);
    }

    #[test]
    fn test_configure_validation_error() {
        let result = tag_echo().configure(|b| {
            b.tag_size(4);
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_each_invocation_constructs_anew() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory = OperationFactory::new(Empty, move |_: &Empty| {
            Ok(counter.fetch_add(1, Ordering::SeqCst))
        });

        assert_eq!(factory.create().unwrap(), 0);
        assert_eq!(factory.clone().create().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_with_defaults_rebinds() {
        let mut builder = AeadParameters::default().to_builder();
        builder.tag_size(12);
        let short = AeadParameters::from_builder(builder).unwrap();

        let factory = tag_echo().with_defaults(short);
        assert_eq!(factory.create().unwrap(), 12);
    }
}
