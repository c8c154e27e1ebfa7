//! Streaming functions.
//!
//! A [`StreamingFunction`] owns exactly one backend context (usually a pooled
//! handle) for its whole life. Callers feed it with `update`, end it with one
//! `finish`, and release it with `close`. Release also happens on drop and at
//! the end of [`StreamingFunction::run`], so the context goes back to its pool
//! on every exit path.
//!
//! # States
//! - `Open`: accepts `update` and `finish`
//! - `Finished`: after `finish`, or after any failed call; only `close` is valid
//! - `Closed`: context released; every call fails with `Error::Usage`

use std::fmt;
use tracing::trace;

use cryptofacade_common::{Error, Result};

/// Backend side of a streaming function.
///
/// Implementations hold the native context. They are only ever driven by a
/// [`StreamingFunction`], which enforces the state machine.
pub trait FunctionCore: Send {
    /// Output produced by each `update`.
    type Chunk;
    /// Terminal result.
    type Output;

    fn update(&mut self, input: &[u8]) -> Result<Self::Chunk>;

    /// Absorb the last input and produce the terminal result.
    fn finish(&mut self, input: &[u8]) -> Result<Self::Output>;
}

/// Lifecycle state of a [`StreamingFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionState {
    Open,
    Finished,
    Closed,
}

type BoxedCore<C, O> = Box<dyn FunctionCore<Chunk = C, Output = O>>;

/// Stateful incremental call shape of an operation.
pub struct StreamingFunction<C, O> {
    core: Option<BoxedCore<C, O>>,
    state: FunctionState,
}

/// Incremental hash; `finish` yields the digest.
pub type HashFunction = StreamingFunction<(), Vec<u8>>;

/// Incremental cipher; every call yields output bytes.
pub type CipherFunction = StreamingFunction<Vec<u8>, Vec<u8>>;

/// Incremental signature; `finish` yields the signature.
pub type SignFunction = StreamingFunction<(), Vec<u8>>;

/// Incremental verification; `finish` yields whether the signature matched.
pub type VerifyFunction = StreamingFunction<(), bool>;

impl<C, O> StreamingFunction<C, O> {
    pub fn new(core: BoxedCore<C, O>) -> Self {
        Self {
            core: Some(core),
            state: FunctionState::Open,
        }
    }

    pub fn state(&self) -> FunctionState {
        self.state
    }

    /// Feed one chunk of input.
    ///
    /// # Errors
    /// - `Usage` if the function is finished or closed
    /// - Any backend error; the function is then finished
    pub fn update(&mut self, input: &[u8]) -> Result<C> {
        self.ensure_open("update")?;
        let core = self.core.as_mut().ok_or_else(closed)?;
        match core.update(input) {
            Ok(chunk) => Ok(chunk),
            Err(e) => {
                self.state = FunctionState::Finished;
                Err(e)
            }
        }
    }

    /// Feed the last chunk and return the terminal result.
    ///
    /// The function is finished afterwards whether or not this succeeded.
    ///
    /// # Errors
    /// - `Usage` if the function is finished or closed
    /// - Any backend error
    pub fn finish(&mut self, input: &[u8]) -> Result<O> {
        self.ensure_open("finish")?;
        let core = self.core.as_mut().ok_or_else(closed)?;
        self.state = FunctionState::Finished;
        core.finish(input)
    }

    /// [`finish`](Self::finish) with no final chunk.
    pub fn complete(&mut self) -> Result<O> {
        self.finish(&[])
    }

    /// Release the backend context. Calling it again has no effect.
    pub fn close(&mut self) {
        if self.core.take().is_some() {
            trace!(state = ?self.state, "Streaming function released");
        }
        self.state = FunctionState::Closed;
    }

    /// Run `block` with this function and release it afterwards, whatever
    /// `block` returned.
    pub fn run<R>(mut self, block: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let result = block(&mut self);
        self.close();
        result
    }

    fn ensure_open(&self, call: &str) -> Result<()> {
        match self.state {
            FunctionState::Open => Ok(()),
            FunctionState::Finished => Err(Error::Usage(format!(
                "{} called on a finished streaming function",
                call
            ))),
            FunctionState::Closed => Err(closed()),
        }
    }
}

fn closed() -> Error {
    Error::Usage("Streaming function is closed".to_string())
}

impl<C, O> Drop for StreamingFunction<C, O> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C, O> fmt::Debug for StreamingFunction<C, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingFunction")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Sums input bytes; drops count releases.
    struct Summing {
        total: u64,
        released: Arc<AtomicUsize>,
    }

    impl FunctionCore for Summing {
        type Chunk = usize;
        type Output = u64;

        fn update(&mut self, input: &[u8]) -> Result<usize> {
            if input == b"bad" {
                return Err(Error::crypto());
            }
            self.total += input.iter().map(|b| *b as u64).sum::<u64>();
            Ok(input.len())
        }

        fn finish(&mut self, input: &[u8]) -> Result<u64> {
            self.update(input)?;
            Ok(self.total)
        }
    }

    impl Drop for Summing {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn summing() -> (StreamingFunction<usize, u64>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let core = Summing {
            total: 0,
            released: Arc::clone(&released),
        };
        (StreamingFunction::new(Box::new(core)), released)
    }

    #[test]
    fn test_update_then_finish() {
        let (mut function, released) = summing();
        assert_eq!(function.update(&[1, 2]).unwrap(), 2);
        assert_eq!(function.update(&[]).unwrap(), 0);
        assert_eq!(function.finish(&[3]).unwrap(), 6);
        assert_eq!(function.state(), FunctionState::Finished);

        function.close();
        assert_eq!(function.state(), FunctionState::Closed);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_calls_after_finish_are_usage_errors() {
        let (mut function, _) = summing();
        function.complete().unwrap();

        assert!(matches!(function.update(&[1]), Err(Error::Usage(_))));
        assert!(matches!(function.complete(), Err(Error::Usage(_))));
    }

    #[test]
    fn test_calls_after_close_are_usage_errors() {
        let (mut function, _) = summing();
        function.close();

        assert!(matches!(function.update(&[1]), Err(Error::Usage(_))));
        assert!(matches!(function.finish(&[]), Err(Error::Usage(_))));
    }

    #[test]
    fn test_failed_update_finishes_function() {
        let (mut function, released) = summing();
        let failed = function.update(b"bad");

        assert!(failed.unwrap_err().is_crypto());
        assert_eq!(function.state(), FunctionState::Finished);
        assert!(matches!(function.update(&[1]), Err(Error::Usage(_))));

        function.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut function, released) = summing();
        function.close();
        function.close();
        drop(function);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_open_function() {
        let (mut function, released) = summing();
        function.update(&[9]).unwrap();
        drop(function);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_releases_on_error() {
        let (function, released) = summing();
        let result = function.run(|f| {
            f.update(&[1])?;
            f.update(b"bad")?;
            f.complete()
        });

        assert!(result.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_returns_block_result() {
        let (function, released) = summing();
        let total = function.run(|f| f.finish(&[4, 5])).unwrap();
        assert_eq!(total, 9);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    // Byte values stay below b'a' so no chunk spells the failing input.
    proptest! {
        #[test]
        fn prop_chunked_input_matches_single_finish(
            chunks in proptest::collection::vec(proptest::collection::vec(0u8..90, 0..16), 0..12),
            last in proptest::collection::vec(0u8..90, 0..16),
        ) {
            let expected: u64 = chunks.iter().chain([&last]).flatten().map(|b| *b as u64).sum();

            let (mut function, released) = summing();
            for chunk in &chunks {
                prop_assert_eq!(function.update(chunk).unwrap(), chunk.len());
                prop_assert_eq!(function.state(), FunctionState::Open);
            }
            prop_assert_eq!(function.finish(&last).unwrap(), expected);
            prop_assert_eq!(function.state(), FunctionState::Finished);
            prop_assert!(matches!(function.update(&last), Err(Error::Usage(_))));

            drop(function);
            prop_assert_eq!(released.load(Ordering::SeqCst), 1);
        }
    }
}
