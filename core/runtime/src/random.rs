//! Secure random byte sourcing.
//!
//! Backed by the best primitive the OS offers (`getrandom(2)`, `BCryptGenRandom`,
//! `SecRandomCopyBytes`, the browser's `crypto.getRandomValues`). Transient
//! interruptions are retried, short fills are never reported as success, and
//! on platforms where the kernel pool may be unseeded the call waits for it.

use rand_core::{CryptoRng, RngCore};
use tracing::error;

use cryptofacade_common::{Error, Result};

/// Handle to the OS secure random source.
///
/// Failures are fatal. There is no fallback to a weaker generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecureRandom;

impl SecureRandom {
    pub fn new() -> Self {
        Self
    }

    /// Fill `buffer` completely with secure random bytes.
    ///
    /// # Errors
    /// - `RandomSource` if the OS source reports a non-transient failure
    pub fn fill(&self, buffer: &mut [u8]) -> Result<()> {
        getrandom::getrandom(buffer).map_err(|e| {
            error!("Secure random source failed: {}", e);
            Error::RandomSource(e.to_string())
        })
    }

    /// Allocate `len` secure random bytes.
    pub fn bytes(&self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.fill(&mut buffer)?;
        Ok(buffer)
    }
}

impl RngCore for SecureRandom {
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    /// Panics if the OS source fails, like every infallible `RngCore` fill.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(err) = self.fill(dest) {
            panic!("{}", err);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        getrandom::getrandom(dest).map_err(rand_core::Error::from)
    }
}

impl CryptoRng for SecureRandom {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_produces_distinct_output() {
        let random = SecureRandom::new();
        let first = random.bytes(32).unwrap();
        let second = random.bytes(32).unwrap();

        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_fill_succeeds() {
        let random = SecureRandom::new();
        assert!(random.bytes(0).unwrap().is_empty());
        random.fill(&mut []).unwrap();
    }

    #[test]
    fn test_rng_core_interface() {
        let mut random = SecureRandom::new();
        let mut buffer = [0u8; 64];
        random.try_fill_bytes(&mut buffer).unwrap();

        assert!(buffer.iter().any(|b| *b != 0));
        assert_ne!(random.next_u64(), random.next_u64());
    }
}
