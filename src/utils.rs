use std::sync::Mutex;

use rand::{Rng, RngCore, SeedableRng, distr::Alphanumeric, rngs::StdRng};

/// Length of bearer tokens handed out to music boxes.
pub const BEARER_TOKEN_LENGTH: usize = 64;

/// Length of the per-authorization CSRF nonce.
pub const CSRF_NONCE_LENGTH: usize = 32;

/// Produces opaque alphanumeric strings for bearer tokens and CSRF nonces.
///
/// The generator owns its randomness source. Production code seeds it from
/// the operating system; tests inject a seeded [`StdRng`] to get
/// reproducible output.
pub struct TokenGenerator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl TokenGenerator {
    /// Creates a generator seeded from the operating system's entropy source.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a generator backed by the given randomness source.
    pub fn with_rng<R>(rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Returns `length` symbols drawn uniformly from `[A-Za-z0-9]`.
    pub fn generate(&self, length: usize) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (0..length)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect()
    }

    pub fn bearer_token(&self) -> String {
        self.generate(BEARER_TOKEN_LENGTH)
    }

    pub fn csrf_nonce(&self) -> String {
        self.generate(CSRF_NONCE_LENGTH)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Compares two strings without stopping at the first differing byte.
///
/// One side of every call is a secret checked against request input: the
/// provisioning secret on identity issuance, and on the linking callback the
/// OAuth state kept in the session and the bearer token it names. Only the
/// length is allowed to leak.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |diff, (x, y)| diff | (x ^ y))
            == 0
}
