//! Challenge generation.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::bytes::ByteSequence;
use crate::error::{KeywardError, Result, MIN_CHALLENGE_LENGTH};

/// Default challenge length in bytes.
pub const DEFAULT_CHALLENGE_LENGTH: usize = 32;

/// Source of fresh ceremony challenges.
///
/// Implementations must return cryptographically random values of at least
/// [`MIN_CHALLENGE_LENGTH`] bytes that are never reused.
pub trait ChallengeGenerator: Send + Sync {
    fn generate_challenge(&self) -> Result<ByteSequence>;
}

/// Challenges drawn from the operating system RNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomChallengeGenerator {
    length: usize,
}

impl RandomChallengeGenerator {
    pub fn new() -> Self {
        Self {
            length: DEFAULT_CHALLENGE_LENGTH,
        }
    }

    pub fn with_length(length: usize) -> Result<Self> {
        if length < MIN_CHALLENGE_LENGTH {
            return Err(KeywardError::InvalidConfig(format!(
                "challenge length {} is below the minimum of {}",
                length, MIN_CHALLENGE_LENGTH
            )));
        }
        Ok(Self { length })
    }
}

impl Default for RandomChallengeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeGenerator for RandomChallengeGenerator {
    fn generate_challenge(&self) -> Result<ByteSequence> {
        let mut buf = vec![0u8; self.length];
        getrandom::fill(&mut buf).map_err(|e| KeywardError::Entropy(e.to_string()))?;
        Ok(ByteSequence::from(buf))
    }
}

/// Deterministic challenges derived from a seed and a counter.
/// WARNING: Do not use in production - challenges are predictable!
#[derive(Debug)]
pub struct SeededChallengeGenerator {
    seed: u64,
    counter: AtomicU64,
}

impl SeededChallengeGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }
}

impl ChallengeGenerator for SeededChallengeGenerator {
    fn generate_challenge(&self) -> Result<ByteSequence> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(n.to_le_bytes());
        hasher.update(b"keyward-seeded-challenge");
        Ok(ByteSequence::from(hasher.finalize().to_vec()))
    }
}
