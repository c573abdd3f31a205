//! Deterministic random number generation utilities.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A seed for deterministic weight initialization and synthetic data.
///
/// The same seed always produces the same sequence of random numbers.
///
/// # Example
///
/// ```rust
/// use vidrec_core::Seed;
/// use rand::Rng;
///
/// let mut rng = Seed::new(7).to_rng();
/// let mut rng2 = Seed::new(7).to_rng();
/// assert_eq!(rng.gen::<f32>(), rng2.gen::<f32>());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Seed(u64);

impl Seed {
    /// Create a new seed with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the underlying seed value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Create a ChaCha8 generator from this seed.
    #[must_use]
    pub fn to_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Derive an independent seed for a named sub-stream.
    ///
    /// Used to give the backbone and the head their own initialization
    /// streams from one recognizer seed. The key selects a ChaCha8 stream
    /// through its FNV-1a hash, so derived seeds are the same on every
    /// platform and toolchain.
    ///
    /// ```rust
    /// use vidrec_core::Seed;
    ///
    /// let master = Seed::new(42);
    /// assert_ne!(master.derive("backbone"), master.derive("cls_head"));
    /// assert_eq!(master.derive("backbone"), master.derive("backbone"));
    /// ```
    #[must_use]
    pub fn derive(&self, key: &str) -> Self {
        let mut rng = self.to_rng();
        rng.set_stream(fnv1a(key.as_bytes()));
        Self(rng.next_u64())
    }
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}
